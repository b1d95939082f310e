//! Public facade: one long-lived extractor per process.
use crate::fetch::{ExtractedPage, FetchOrchestrator, FetchPolicy, FetchRequest};
use async_trait::async_trait;
use lookup_common::{ExtractorConfig, LookupError, Result};
use lookup_drivers::lookup_browser::context::BrowserEngine;
use lookup_drivers::lookup_browser::driver::ChromeDriverEngine;
use lookup_drivers::lookup_browser::session::SessionManager;
use lookup_drivers::lookup_browser::stealth::StealthProfile;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Launch the shared browser. Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Fetch `url` and return the rendered text blob.
    ///
    /// `None` falls back to the configured timeout and attempt count.
    async fn extract(
        &self,
        url: &str,
        timeout: Option<Duration>,
        max_attempts: Option<u32>,
    ) -> Result<String>;

    /// Release the browser. Idempotent, never fails.
    async fn dispose(&self);
}

pub struct WebPageTextExtractor {
    sessions: Arc<SessionManager>,
    orchestrator: FetchOrchestrator,
    default_timeout: Duration,
    default_max_attempts: u32,
}

impl WebPageTextExtractor {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: &ExtractorConfig) -> Result<Self> {
        config.validate()?;
        let sessions = Arc::new(SessionManager::new(
            engine,
            StealthProfile::from(config.stealth_level),
        ));
        let orchestrator = FetchOrchestrator::new(sessions.clone(), FetchPolicy::from(config));
        Ok(Self {
            sessions,
            orchestrator,
            default_timeout: config.default_timeout(),
            default_max_attempts: config.default_max_attempts,
        })
    }

    /// Extractor backed by chromedriver as described by `config`.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Self::new(Arc::new(ChromeDriverEngine::new(config)), config)
    }

    /// Like [`TextExtractor::extract`] but keeps the structured result.
    pub async fn extract_page(
        &self,
        url: &str,
        timeout: Option<Duration>,
        max_attempts: Option<u32>,
    ) -> Result<ExtractedPage> {
        let request = FetchRequest::new(
            url,
            timeout.unwrap_or(self.default_timeout),
            max_attempts.unwrap_or(self.default_max_attempts),
        )?;

        let span = info_span!(
            "extract",
            request_id = %Uuid::new_v4(),
            url = %request.url()
        );
        async {
            info!(
                target: "fetch.attempt",
                timeout_ms = request.timeout().as_millis() as u64,
                max_attempts = request.max_attempts(),
                "extraction requested"
            );
            self.orchestrator.fetch(&request).await
        }
        .instrument(span)
        .await
    }

    pub async fn is_initialized(&self) -> bool {
        self.sessions.is_active().await
    }
}

#[async_trait]
impl TextExtractor for WebPageTextExtractor {
    async fn initialize(&self) -> Result<()> {
        self.sessions
            .initialize()
            .await
            .map(|_| ())
            .map_err(|err| LookupError::Session(err.to_string()))
    }

    async fn extract(
        &self,
        url: &str,
        timeout: Option<Duration>,
        max_attempts: Option<u32>,
    ) -> Result<String> {
        self.extract_page(url, timeout, max_attempts)
            .await
            .map(|page| page.render())
    }

    async fn dispose(&self) {
        self.sessions.release().await;
    }
}
