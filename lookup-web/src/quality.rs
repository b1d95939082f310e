//! Last-line check that extracted text is real content.
//!
//! The thresholds are tunable policy rather than hard guarantees: short but
//! valid pages can be rejected, and placeholder pages with incidental digits
//! can slip through.
#![allow(clippy::expect_used)]

use crate::challenge;
use regex::Regex;
use std::sync::LazyLock;

/// Content shorter than this (in characters, after trimming) is rejected.
pub const MIN_CONTENT_CHARS: usize = 50;
/// A run this long of CJK characters and punctuation counts as meaningful.
pub const MIN_CJK_RUN: usize = 20;
/// A run this long of Latin letters and spaces counts as meaningful.
pub const MIN_LATIN_RUN: usize = 50;

static CJK_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"[\p{{Han}}\p{{Hiragana}}\p{{Katakana}}\p{{Hangul}}　-〿＀-￯]{{{MIN_CJK_RUN},}}"
    ))
    .expect("CJK_RUN regex")
});

static LATIN_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"[A-Za-z\s]{{{MIN_LATIN_RUN},}}")).expect("LATIN_RUN regex")
});

static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("DIGIT regex"));

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    #[error("content too short ({chars} chars, need at least {})", MIN_CONTENT_CHARS)]
    TooShort { chars: usize },

    #[error("title looks like an anti-bot page: {title:?}")]
    ChallengeTitle { title: String },

    #[error("no meaningful text found")]
    NoMeaningfulText,
}

/// Check `content` (and its page `title`), reporting why it was rejected.
pub fn assess(title: &str, content: &str) -> Result<(), QualityIssue> {
    let chars = content.trim().chars().count();
    if chars < MIN_CONTENT_CHARS {
        return Err(QualityIssue::TooShort { chars });
    }
    if challenge::contains_marker(title) {
        return Err(QualityIssue::ChallengeTitle {
            title: title.trim().to_string(),
        });
    }
    if CJK_RUN.is_match(content) || LATIN_RUN.is_match(content) || DIGIT.is_match(content) {
        Ok(())
    } else {
        Err(QualityIssue::NoMeaningfulText)
    }
}

pub fn is_valid(title: &str, content: &str) -> bool {
    assess(title, content).is_ok()
}
