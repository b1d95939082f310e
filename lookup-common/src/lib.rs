//! Common types and utilities shared across Lookup crates.
//!
//! This crate defines the extractor configuration, the shared error taxonomy and the
//! observability helpers used throughout the Lookup workspace. It is intentionally
//! lightweight so that every crate can depend on it without heavy transitive costs.
//!
//! # Overview
//!
//! - [`ExtractorConfig`]: runtime knobs for the page-text extraction engine
//! - [`StealthLevel`]: how aggressively browser fingerprints are spoofed
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`LookupError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use lookup_common::{ExtractorConfig, StealthLevel};
//!
//! let mut cfg = ExtractorConfig::default();
//! cfg.stealth_level = StealthLevel::Maximum;
//! assert_eq!(cfg.default_max_attempts, 3);
//! assert!(cfg.validate().is_ok());
//! ```
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod observability;

/// Configuration for the page-text extraction engine.
///
/// Every field has a default, so partial YAML sections and environment overrides
/// deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// WebDriver endpoint the browser contexts are opened against.
    pub webdriver_url: String,
    /// When set, the engine spawns this chromedriver binary itself and owns its lifetime.
    pub chromedriver_path: Option<PathBuf>,
    /// Optional Chrome/Chromium binary handed to chromedriver.
    pub chrome_binary: Option<PathBuf>,
    /// Browser fingerprint spoofing level.
    pub stealth_level: StealthLevel,
    /// Per-call timeout used when the caller does not pass one.
    pub default_timeout_ms: u64,
    /// Per-call attempt budget used when the caller does not pass one.
    pub default_max_attempts: u32,
    /// Cap for the post-navigation readiness wait.
    pub ready_timeout_ms: u64,
    /// Cap for waiting out an anti-bot interstitial.
    pub challenge_budget_ms: u64,
    /// Interval between interstitial re-checks.
    pub challenge_poll_ms: u64,
    /// Pause after an interstitial clears, before touching the DOM.
    pub settle_delay_ms: u64,
    /// Lower bound of the per-attempt backoff jitter.
    pub backoff_min_ms: u64,
    /// Upper bound of the per-attempt backoff jitter.
    pub backoff_max_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            chromedriver_path: None,
            chrome_binary: None,
            stealth_level: StealthLevel::Balanced,
            default_timeout_ms: 30_000,
            default_max_attempts: 3,
            ready_timeout_ms: 10_000,
            challenge_budget_ms: 30_000,
            challenge_poll_ms: 2_000,
            settle_delay_ms: 2_000,
            backoff_min_ms: 3_000,
            backoff_max_ms: 8_000,
        }
    }
}

impl ExtractorConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.webdriver_url.trim().is_empty() {
            return Err(LookupError::Config("webdriver_url must not be empty".into()));
        }
        if self.default_timeout_ms == 0 {
            return Err(LookupError::Config("default_timeout_ms must be > 0".into()));
        }
        if self.default_max_attempts == 0 {
            return Err(LookupError::Config("default_max_attempts must be >= 1".into()));
        }
        if self.challenge_poll_ms == 0 {
            return Err(LookupError::Config("challenge_poll_ms must be > 0".into()));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(LookupError::Config(format!(
                "backoff range is inverted: {}..{}",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// Error types used across the Lookup system.
#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    /// The caller handed in a request the engine refuses to run.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// DNS, connection or timeout failure while loading the page.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The extracted text did not look like real page content.
    #[error("Content quality check failed: {0}")]
    ContentQuality(String),

    /// The browser engine could not be started.
    #[error("Browser session error: {0}")]
    Session(String),

    /// A driver (browser, DOM evaluation) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// An attempt failed in a way retrying cannot fix.
    #[error("Extraction aborted: {0}")]
    Fatal(String),

    /// Every attempt failed; carries the last attempt's reason.
    #[error("Extraction failed after {attempts} attempt(s): {last}")]
    ExhaustedRetries { attempts: u32, last: String },
}

impl LookupError {
    /// Whether a fresh attempt could plausibly succeed after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Navigation(_) | Self::ContentQuality(_) | Self::Driver(_)
        )
    }
}

/// Convenient alias for results that use [`LookupError`].
pub type Result<T> = std::result::Result<T, LookupError>;
