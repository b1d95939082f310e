//! Seams between the extraction core and a browser implementation.
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Launches the shared browser engine. Called at most once per live session.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>>;
}

/// A running browser engine able to hand out isolated browsing contexts.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open a fresh context (own cookies, storage and page) configured from `profile`.
    async fn new_context(&self, profile: &ContextProfile) -> Result<Box<dyn BrowsingContext>>;

    /// Tear the engine down. Contexts requested afterwards fail.
    async fn close(&self) -> Result<()>;
}

/// One isolated page. Owned by exactly one in-flight attempt.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Navigate and resolve once the DOM content is loaded.
    ///
    /// `timeout` bounds the load on the browser side as well, so a stalled
    /// navigation does not keep the context busy after the caller gives up.
    /// Returns the main document's HTTP status when the browser exposes it.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<Option<u16>>;

    /// Wait up to `timeout` for `selector` to be present. `Ok(false)` on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    async fn title(&self) -> Result<String>;

    /// Visible text of the whole `body`.
    async fn body_text(&self) -> Result<String>;

    /// Visible text of every element matching `selector`, in document order.
    async fn element_texts(&self, selector: &str) -> Result<Vec<String>>;

    /// Remove every element matching `selector`; returns how many were removed.
    async fn remove_elements(&self, selector: &str) -> Result<usize>;

    /// Layout and text facts for every element matching `selector`, in document order.
    async fn inspect_elements(&self, selector: &str) -> Result<Vec<ElementFacts>>;

    /// Remove the matches of `selector` at the given document-order positions.
    async fn remove_element_indices(&self, selector: &str, indices: &[usize]) -> Result<usize>;

    /// Close the context and its page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// What the pruner needs to know about a matched element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementFacts {
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub id: String,
    /// Rendered height in CSS pixels.
    #[serde(default)]
    pub height: f64,
    /// Length of the trimmed visible text, in characters.
    #[serde(default)]
    pub text_length: usize,
}

/// Per-context identity: user agent, headers, viewport and the pre-navigation script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub languages: Vec<String>,
    /// Extra request headers sent with every request of the context.
    pub headers: Vec<(String, String)>,
    /// Evaluated in every document before page scripts run.
    pub init_script: String,
}
