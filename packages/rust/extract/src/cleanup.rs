//! Cleanup passes for text pulled out of an HTML tree.
//!
//! Each pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw extracted text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = replace_nbsp(&result);
    result = collapse_inline_whitespace(&result);
    result = trim_lines(&result);
    result = collapse_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Non-breaking and zero-width characters
// ---------------------------------------------------------------------------

fn replace_nbsp(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\u{200b}' && *c != '\u{feff}')
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Collapse runs of spaces/tabs
// ---------------------------------------------------------------------------

fn collapse_inline_whitespace(text: &str) -> String {
    static INLINE_WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\r\x0C]+").expect("valid regex"));

    INLINE_WS_RE.replace_all(text, " ").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Trim each line
// ---------------------------------------------------------------------------

fn trim_lines(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Collapse excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines into exactly one.
fn collapse_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n").to_string()
}
