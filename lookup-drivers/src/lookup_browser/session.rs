//! Shared browser engine with one isolated context per attempt.
use crate::lookup_browser::context::{BrowserEngine, BrowserHandle, BrowsingContext};
use crate::lookup_browser::fingerprint::UserAgentManager;
use crate::lookup_browser::stealth::StealthProfile;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The engine itself could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(#[source] anyhow::Error),

    /// The engine is up but refused to open a context.
    #[error("failed to open browsing context: {0}")]
    Context(#[source] anyhow::Error),
}

/// Owns the lazily launched browser handle.
///
/// The handle is created on first use and shared by every caller; contexts are
/// never shared. [`SessionManager::release`] closes the handle, and the next
/// acquisition launches a new one.
pub struct SessionManager {
    engine: Arc<dyn BrowserEngine>,
    browser: Mutex<Option<Arc<dyn BrowserHandle>>>,
    user_agents: UserAgentManager,
    stealth: StealthProfile,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn BrowserEngine>, stealth: StealthProfile) -> Self {
        Self {
            engine,
            browser: Mutex::new(None),
            user_agents: UserAgentManager::new(),
            stealth,
        }
    }

    /// Launch the shared browser unless it is already running.
    pub async fn initialize(&self) -> Result<Arc<dyn BrowserHandle>, SessionError> {
        let mut slot = self.browser.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        info!(target: "browser.session", "launching shared browser");
        let handle = self.engine.launch().await.map_err(SessionError::Launch)?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Open a new isolated context with a freshly drawn fingerprint.
    pub async fn acquire_context(&self) -> Result<Box<dyn BrowsingContext>, SessionError> {
        let handle = self.initialize().await?;
        let profile = self.user_agents.context_profile(self.stealth);
        debug!(
            target: "browser.session",
            user_agent = %profile.user_agent,
            "opening browsing context"
        );
        handle
            .new_context(&profile)
            .await
            .map_err(SessionError::Context)
    }

    /// Close the shared browser. Safe to call repeatedly; close failures are logged only.
    pub async fn release(&self) {
        let handle = self.browser.lock().await.take();
        if let Some(handle) = handle {
            info!(target: "browser.session", "closing shared browser");
            if let Err(err) = handle.close().await {
                warn!(target: "browser.session", error = %err, "browser close failed");
            }
        }
    }

    pub async fn is_active(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}
