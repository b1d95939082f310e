//! Main-content selection.
use lookup_drivers::lookup_browser::context::BrowsingContext;
use tracing::{debug, warn};

/// Content selectors in priority order: semantic tags, then structural
/// classes, then generic containers.
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "#content",
    ".post",
    ".entry",
    ".article",
    ".main-content",
    "#main",
    ".container",
    ".wrapper",
];

/// A selector's best element must be longer than this to win.
pub const MIN_CANDIDATE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub selector: String,
    pub text: String,
    /// Character count of `text`.
    pub length: usize,
}

/// Longest of one selector's matches. Earlier matches win ties.
pub fn best_match(selector: &str, texts: Vec<String>) -> Option<ExtractionCandidate> {
    let mut best: Option<ExtractionCandidate> = None;
    for text in texts {
        let text = text.trim().to_string();
        let length = text.chars().count();
        if best.as_ref().is_none_or(|b| length > b.length) {
            best = Some(ExtractionCandidate {
                selector: selector.to_string(),
                text,
                length,
            });
        }
    }
    best
}

/// First selector, in priority order, whose best element clears the floor.
///
/// Priority dominates across selectors; length only breaks ties among one
/// selector's matches. A selector whose query fails is skipped.
pub async fn select_candidate(
    page: &dyn BrowsingContext,
    selectors: &[&str],
) -> Option<ExtractionCandidate> {
    for selector in selectors {
        let texts = match page.element_texts(selector).await {
            Ok(texts) => texts,
            Err(err) => {
                warn!(target: "page.select", %selector, error = %err, "selector query failed");
                continue;
            }
        };
        match best_match(selector, texts) {
            Some(candidate) if candidate.length > MIN_CANDIDATE_CHARS => {
                debug!(
                    target: "page.select",
                    %selector,
                    length = candidate.length,
                    "content candidate selected"
                );
                return Some(candidate);
            }
            Some(candidate) => {
                debug!(
                    target: "page.select",
                    %selector,
                    length = candidate.length,
                    "candidate below floor"
                );
            }
            None => {}
        }
    }
    None
}

/// Main content text: the winning candidate, else the whole body, else empty.
pub async fn extract_main_content(page: &dyn BrowsingContext) -> String {
    if let Some(candidate) = select_candidate(page, CONTENT_SELECTORS).await {
        return candidate.text;
    }
    match page.body_text().await {
        Ok(text) => {
            debug!(target: "page.select", "falling back to body text");
            text
        }
        Err(err) => {
            warn!(target: "page.select", error = %err, "body text unavailable");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_wins_within_selector() {
        let best = best_match(
            "article",
            vec!["short".into(), "  a much longer block  ".into(), "mid size".into()],
        )
        .unwrap();
        assert_eq!(best.text, "a much longer block");
        assert_eq!(best.length, 19);
        assert_eq!(best.selector, "article");
    }

    #[test]
    fn ties_keep_document_order() {
        let best = best_match(".post", vec!["first".into(), "later".into()]).unwrap();
        assert_eq!(best.text, "first");
    }

    #[test]
    fn no_matches_no_candidate() {
        assert!(best_match("main", Vec::new()).is_none());
    }

    #[test]
    fn length_counts_characters() {
        let best = best_match("main", vec!["正文内容".into()]).unwrap();
        assert_eq!(best.length, 4);
    }

    #[test]
    fn semantic_tags_come_first() {
        assert_eq!(CONTENT_SELECTORS[0], "article");
        assert_eq!(CONTENT_SELECTORS[1], "main");
        assert_eq!(CONTENT_SELECTORS.last(), Some(&".wrapper"));
    }
}
