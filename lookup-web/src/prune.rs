//! Boilerplate removal on the rendered DOM.
use lookup_drivers::lookup_browser::context::{BrowsingContext, ElementFacts};
use tracing::{debug, warn};

/// Removed wherever they appear.
pub const ALWAYS_REMOVE: &[&str] = &["script", "style", "noscript", "nav", "header", "footer"];

/// Ad and UI-chrome selectors; matches are removed only when [`should_remove`] agrees.
pub const CHROME_SELECTORS: &[&str] = &[
    "[class*='ad']",
    "[id*='ad']",
    "[class*='banner']",
    "[id*='banner']",
    "[class*='sidebar']",
    "[id*='sidebar']",
    "[class*='menu']",
    "[id*='menu']",
    "[class*='popup']",
    "[class*='comment']",
    "[id*='comment']",
    "[class*='social']",
    "[class*='share']",
    "[class*='cookie']",
    "[id*='cookie']",
    "[class*='modal']",
    "[class*='overlay']",
];

/// Elements shorter than this are treated as chrome.
pub const MAX_CHROME_HEIGHT_PX: f64 = 100.0;
/// Elements with less visible text than this are treated as chrome.
pub const MIN_CONTENT_TEXT_CHARS: usize = 50;

/// Whether a chrome-selector match is safe to delete.
///
/// Small or nearly empty elements go; so does anything whose class or id
/// carries an actual ad token. A large text block that merely shares a
/// substring ("thread", "header-shadow") stays.
pub fn should_remove(facts: &ElementFacts) -> bool {
    facts.height < MAX_CHROME_HEIGHT_PX
        || facts.text_length < MIN_CONTENT_TEXT_CHARS
        || has_ad_token(&facts.class_name)
        || has_ad_token(&facts.id)
}

/// `ad`, `ads` or `advert...` as a whole class/id token (split on non-alphanumerics).
pub fn has_ad_token(value: &str) -> bool {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .any(|token| token == "ad" || token == "ads" || token.starts_with("advert"))
}

/// Result of one removal rule.
#[derive(Debug)]
pub struct RuleOutcome {
    pub selector: &'static str,
    /// Removed count, or the evaluation error.
    pub result: Result<usize, String>,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub outcomes: Vec<RuleOutcome>,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Strip boilerplate from `page`. Each rule runs independently; a failing
/// rule is recorded and the rest still run.
pub async fn prune(page: &dyn BrowsingContext) -> PruneReport {
    let mut report = PruneReport::default();

    for &selector in ALWAYS_REMOVE {
        let result = page
            .remove_elements(selector)
            .await
            .map_err(|e| e.to_string());
        report.outcomes.push(RuleOutcome { selector, result });
    }

    for &selector in CHROME_SELECTORS {
        let result = prune_guarded(page, selector).await.map_err(|e| e.to_string());
        report.outcomes.push(RuleOutcome { selector, result });
    }

    for outcome in &report.outcomes {
        if let Err(err) = &outcome.result {
            warn!(target: "page.prune", selector = outcome.selector, error = %err, "cleanup rule failed");
        }
    }
    debug!(
        target: "page.prune",
        removed = report.removed(),
        failed = report.failures(),
        "boilerplate pruned"
    );
    report
}

async fn prune_guarded(page: &dyn BrowsingContext, selector: &str) -> anyhow::Result<usize> {
    let facts = page.inspect_elements(selector).await?;
    let doomed: Vec<usize> = facts
        .iter()
        .enumerate()
        .filter(|(_, f)| should_remove(f))
        .map(|(i, _)| i)
        .collect();
    if doomed.is_empty() {
        return Ok(0);
    }
    page.remove_element_indices(selector, &doomed).await
}
