//! HTML to plain text conversion for helpdesk message bodies.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid pattern")
});

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid pattern"));

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(p|div|li|tr|h[1-6])\s*>").expect("valid pattern"));

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid pattern"));

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid pattern"));

/// Convert an HTML fragment to readable plain text.
///
/// Line breaks and closing block tags become newlines, every other tag is
/// dropped, the common entities are decoded and runs of blank lines are
/// collapsed. Plain text passes through unchanged apart from whitespace
/// normalisation.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = BLOCK_END.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    normalize_whitespace(&text)
}

/// Decode the entities helpdesk editors emit.
///
/// `&amp;` is decoded last so that `&amp;lt;` yields the literal `&lt;`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed_lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let joined = trimmed_lines.join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

#[cfg(test)]
#[path = "html_tests.rs"]
mod tests;
