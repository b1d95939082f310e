//! Anti-bot interstitial detection.
use lookup_drivers::lookup_browser::context::BrowsingContext;
use tracing::debug;

/// Lower-cased phrases shown by common "checking your browser" pages.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "checking your browser",
    "checking if the site connection is secure",
    "ddos protection",
    "verifying you are human",
    "verify you are human",
    "security check",
    "attention required",
    "please enable javascript and cookies",
    "请稍候",
    "正在验证",
];

/// True when `text` contains any challenge marker, ignoring case.
pub fn contains_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Classify a title/body pair.
pub fn is_challenge_text(title: &str, body: &str) -> bool {
    contains_marker(title) || contains_marker(body)
}

/// Classify the page currently rendered in `page`.
///
/// Title and body are read best-effort; a page that cannot be read is not
/// reported as a challenge.
pub async fn is_challenge(page: &dyn BrowsingContext) -> bool {
    let title = match page.title().await {
        Ok(title) => title,
        Err(err) => {
            debug!(target: "fetch.challenge", error = %err, "title unavailable");
            return false;
        }
    };
    let body = match page.body_text().await {
        Ok(body) => body,
        Err(err) => {
            debug!(target: "fetch.challenge", error = %err, "body text unavailable");
            return false;
        }
    };
    is_challenge_text(&title, &body)
}
