//! Whitespace and fragment cleanup for extracted text.

/// Lines shorter than this are dropped by [`normalize`] (icons, "×", "▶", ...).
pub const STRICT_MIN_LINE_CHARS: usize = 3;

/// Clean extracted text, dropping lines shorter than [`STRICT_MIN_LINE_CHARS`].
///
/// Runs of horizontal whitespace become one space, blank-line runs collapse,
/// every line is trimmed and empty or too-short lines are dropped. Idempotent.
///
/// ```
/// use lookup_web::normalize::normalize;
///
/// let text = "  Title\t\t here \n\n\n ×\n  body   text \r\n";
/// assert_eq!(normalize(text), "Title here\nbody text");
/// ```
pub fn normalize(text: &str) -> String {
    normalize_with(text, STRICT_MIN_LINE_CHARS)
}

/// Like [`normalize`], but keeps every non-empty line.
pub fn normalize_lenient(text: &str) -> String {
    normalize_with(text, 1)
}

/// Collapse all whitespace, newlines included, into single spaces.
pub fn normalize_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_with(text: &str, min_line_chars: usize) -> String {
    collapse_blank_lines(&collapse_horizontal(text))
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().count() >= min_line_chars)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every run of non-newline whitespace (including `\r`, tabs, NBSP) becomes one space.
fn collapse_horizontal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch != '\n' && ch.is_whitespace() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

/// At most one blank line between content lines.
fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = false;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            if !blank_run && !out.is_empty() {
                out.push("");
            }
            blank_run = true;
        } else {
            out.push(line);
            blank_run = false;
        }
    }
    out.join("\n")
}
