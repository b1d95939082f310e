//! Per-request state machine: navigate, wait, bypass, prune, extract, validate.
use crate::normalize::{normalize, normalize_inline};
use crate::{candidates, challenge, prune, quality};
use lookup_common::{ExtractorConfig, LookupError, Result};
use lookup_drivers::lookup_browser::behavioral::BehavioralEngine;
use lookup_drivers::lookup_browser::context::BrowsingContext;
use lookup_drivers::lookup_browser::session::{SessionError, SessionManager};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

/// Minimal readiness signal after navigation.
const READY_SELECTOR: &str = "body";
/// Upper bound on tearing down one context.
pub const CONTEXT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One extraction call. Validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    timeout: Duration,
    max_attempts: u32,
}

impl FetchRequest {
    /// ```
    /// use lookup_web::FetchRequest;
    /// use std::time::Duration;
    ///
    /// assert!(FetchRequest::new("https://example.com", Duration::from_secs(30), 3).is_ok());
    /// assert!(FetchRequest::new("", Duration::from_secs(30), 3).is_err());
    /// assert!(FetchRequest::new("https://example.com", Duration::ZERO, 3).is_err());
    /// assert!(FetchRequest::new("https://example.com", Duration::from_secs(30), 0).is_err());
    /// ```
    pub fn new(url: impl Into<String>, timeout: Duration, max_attempts: u32) -> Result<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(LookupError::InvalidRequest("url must not be empty".into()));
        }
        let parsed = Url::parse(&url)
            .map_err(|e| LookupError::InvalidRequest(format!("invalid url {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LookupError::InvalidRequest(format!(
                "unsupported scheme {:?}",
                parsed.scheme()
            )));
        }
        if timeout.is_zero() {
            return Err(LookupError::InvalidRequest("timeout must be > 0".into()));
        }
        if max_attempts == 0 {
            return Err(LookupError::InvalidRequest("max_attempts must be >= 1".into()));
        }
        Ok(Self {
            url,
            timeout,
            max_attempts,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Sub-wait budgets and backoff bounds. Sub-waits are carved out of the request timeout.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub ready_timeout: Duration,
    pub challenge_budget: Duration,
    pub challenge_poll: Duration,
    pub settle_delay: Duration,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
}

impl From<&ExtractorConfig> for FetchPolicy {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            challenge_budget: Duration::from_millis(config.challenge_budget_ms),
            challenge_poll: Duration::from_millis(config.challenge_poll_ms.max(1)),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            backoff_min_ms: config.backoff_min_ms,
            backoff_max_ms: config.backoff_max_ms,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from(&ExtractorConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Init,
    Navigating,
    AwaitingReady,
    DetectingChallenge,
    BypassWaiting,
    Pruning,
    Extracting,
    Validating,
    Done,
    Retry,
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Navigating => "navigating",
            Self::AwaitingReady => "awaiting_ready",
            Self::DetectingChallenge => "detecting_challenge",
            Self::BypassWaiting => "bypass_waiting",
            Self::Pruning => "pruning",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::Done => "done",
            Self::Retry => "retry",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(state: FetchState, attempt: u32) {
    debug!(target: "fetch.state", %state, attempt, "state transition");
}

/// Result of one attempt. Only `Retryable` lets the loop continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { title: String, content: String },
    Retryable(String),
    Fatal(String),
}

/// How the interstitial wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeWait {
    NotDetected,
    Cleared { waited: Duration },
    Persistent { waited: Duration },
}

/// Successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub url: String,
    /// `None` when the page had no usable title.
    pub title: Option<String>,
    pub content: String,
    /// Attempt (1-based) that produced this page.
    pub attempts: u32,
}

impl ExtractedPage {
    pub fn new(url: &str, title: &str, content: String, attempts: u32) -> Self {
        let title = normalize_inline(title);
        let title = if title.is_empty() || challenge::contains_marker(&title) {
            None
        } else {
            Some(title)
        };
        Self {
            url: url.to_string(),
            title,
            content,
            attempts,
        }
    }

    /// The text blob handed to callers.
    ///
    /// ```
    /// use lookup_web::ExtractedPage;
    ///
    /// let page = ExtractedPage::new("https://example.com", "Example", "Body text".into(), 1);
    /// assert_eq!(page.render(), "标题: Example\n\n内容:\nBody text");
    ///
    /// let untitled = ExtractedPage::new("https://example.com", "  ", "Body text".into(), 1);
    /// assert_eq!(untitled.render(), "内容:\nBody text");
    /// ```
    pub fn render(&self) -> String {
        match &self.title {
            Some(title) => format!("标题: {title}\n\n内容:\n{}", self.content),
            None => format!("内容:\n{}", self.content),
        }
    }
}

impl fmt::Display for ExtractedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Drives attempts strictly one after another against the shared session.
pub struct FetchOrchestrator {
    sessions: Arc<SessionManager>,
    policy: FetchPolicy,
    behavioral_engine: BehavioralEngine,
}

impl FetchOrchestrator {
    pub fn new(sessions: Arc<SessionManager>, policy: FetchPolicy) -> Self {
        Self {
            sessions,
            policy,
            behavioral_engine: BehavioralEngine::new(),
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Run up to `max_attempts` attempts with jittered, growing backoff between them.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<ExtractedPage> {
        let mut last_reason = String::new();

        for attempt in 1..=request.max_attempts {
            enter(FetchState::Init, attempt);
            info!(
                target: "fetch.attempt",
                attempt,
                max_attempts = request.max_attempts,
                url = %request.url,
                "starting attempt"
            );

            match self.attempt(request, attempt).await {
                AttemptOutcome::Success { title, content } => {
                    enter(FetchState::Done, attempt);
                    info!(
                        target: "fetch.attempt",
                        attempt,
                        chars = content.chars().count(),
                        "extraction succeeded"
                    );
                    return Ok(ExtractedPage::new(&request.url, &title, content, attempt));
                }
                AttemptOutcome::Fatal(reason) => {
                    enter(FetchState::Failed, attempt);
                    warn!(target: "fetch.attempt", attempt, %reason, "attempt failed fatally");
                    return Err(LookupError::Fatal(reason));
                }
                AttemptOutcome::Retryable(reason) => {
                    warn!(target: "fetch.attempt", attempt, %reason, "attempt failed");
                    last_reason = reason;
                    if attempt < request.max_attempts {
                        enter(FetchState::Retry, attempt);
                        let delay = self.behavioral_engine.backoff_delay(
                            attempt,
                            self.policy.backoff_min_ms,
                            self.policy.backoff_max_ms,
                        );
                        info!(
                            target: "fetch.attempt",
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            "backing off before retry"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        enter(FetchState::Failed, request.max_attempts);
        Err(LookupError::ExhaustedRetries {
            attempts: request.max_attempts,
            last: last_reason,
        })
    }

    /// One attempt with its own context. The context is closed before returning.
    pub async fn attempt(&self, request: &FetchRequest, attempt: u32) -> AttemptOutcome {
        let deadline = Instant::now() + request.timeout;

        let mut context = match self.sessions.acquire_context().await {
            Ok(context) => context,
            Err(err @ SessionError::Launch(_)) => {
                return AttemptOutcome::Fatal(LookupError::Session(err.to_string()).to_string());
            }
            Err(err @ SessionError::Context(_)) => {
                return AttemptOutcome::Retryable(err.to_string());
            }
        };

        let result = self
            .run(context.as_mut(), request, attempt, deadline)
            .await;

        match timeout(CONTEXT_CLOSE_TIMEOUT, context.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(target: "browser.context", attempt, error = %err, "context close failed");
            }
            Err(_) => {
                warn!(
                    target: "browser.context",
                    attempt,
                    timeout_ms = CONTEXT_CLOSE_TIMEOUT.as_millis() as u64,
                    "context close timed out; abandoning it"
                );
            }
        }

        match result {
            Ok((title, content)) => AttemptOutcome::Success { title, content },
            Err(err) if err.is_retryable() => AttemptOutcome::Retryable(err.to_string()),
            Err(err) => AttemptOutcome::Fatal(err.to_string()),
        }
    }

    async fn run(
        &self,
        page: &mut dyn BrowsingContext,
        request: &FetchRequest,
        attempt: u32,
        deadline: Instant,
    ) -> Result<(String, String)> {
        enter(FetchState::Navigating, attempt);
        let budget = remaining(deadline);
        match timeout(budget, page.navigate(&request.url, budget)).await {
            Err(_) => {
                return Err(LookupError::Navigation(format!(
                    "timed out after {}ms",
                    request.timeout.as_millis()
                )));
            }
            Ok(Err(err)) => return Err(LookupError::Navigation(format!("{err:#}"))),
            Ok(Ok(Some(status))) if !(200..400).contains(&status) => {
                warn!(target: "fetch.attempt", attempt, status, "unexpected response status");
            }
            Ok(Ok(_)) => {}
        }

        enter(FetchState::AwaitingReady, attempt);
        let ready_budget = self.policy.ready_timeout.min(remaining(deadline));
        match timeout(
            ready_budget,
            page.wait_for_selector(READY_SELECTOR, ready_budget),
        )
        .await
        {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) | Err(_) => {
                warn!(target: "fetch.attempt", attempt, "readiness wait timed out; continuing");
            }
            Ok(Err(err)) => {
                warn!(target: "fetch.attempt", attempt, error = %err, "readiness wait failed; continuing");
            }
        }

        enter(FetchState::DetectingChallenge, attempt);
        match self.await_challenge_clearance(&*page, attempt, deadline).await {
            ChallengeWait::NotDetected => {}
            ChallengeWait::Cleared { waited } => {
                info!(
                    target: "fetch.challenge",
                    attempt,
                    waited_ms = waited.as_millis() as u64,
                    "challenge cleared"
                );
            }
            ChallengeWait::Persistent { waited } => {
                warn!(
                    target: "fetch.challenge",
                    attempt,
                    waited_ms = waited.as_millis() as u64,
                    "challenge persisted; leaving it to quality validation"
                );
            }
        }

        enter(FetchState::Pruning, attempt);
        prune::prune(&*page).await;

        enter(FetchState::Extracting, attempt);
        let title = match page.title().await {
            Ok(title) => normalize_inline(&title),
            Err(err) => {
                debug!(target: "page.select", error = %err, "title unavailable");
                String::new()
            }
        };
        let raw = candidates::extract_main_content(&*page).await;

        enter(FetchState::Validating, attempt);
        // Judged after cleanup: fragment-only text can pass raw and normalize to nothing.
        let content = normalize(&raw);
        quality::assess(&title, &content)
            .map_err(|issue| LookupError::ContentQuality(issue.to_string()))?;

        Ok((title, content))
    }

    /// Poll until the interstitial clears or the capped budget runs out.
    ///
    /// The budget never exceeds what is left of the request timeout. After a
    /// clear, waits the settle delay before returning.
    pub async fn await_challenge_clearance(
        &self,
        page: &dyn BrowsingContext,
        attempt: u32,
        deadline: Instant,
    ) -> ChallengeWait {
        if !challenge::is_challenge(page).await {
            return ChallengeWait::NotDetected;
        }

        enter(FetchState::BypassWaiting, attempt);
        let budget = self.policy.challenge_budget.min(remaining(deadline));
        info!(
            target: "fetch.challenge",
            attempt,
            budget_ms = budget.as_millis() as u64,
            "challenge page detected; waiting"
        );

        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if waited >= budget {
                return ChallengeWait::Persistent { waited };
            }
            sleep(self.policy.challenge_poll.min(budget - waited)).await;

            if !challenge::is_challenge(page).await {
                let waited = started.elapsed();
                sleep(self.policy.settle_delay.min(remaining(deadline))).await;
                return ChallengeWait::Cleared { waited };
            }
        }
    }
}
