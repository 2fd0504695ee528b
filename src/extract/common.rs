//! Shared noise filters and the inclusion-rule check used by every
//! format-specific extractor.

use std::sync::OnceLock;

use regex::Regex;

/// Strips HTML comments from a text fragment.
pub fn strip_html_comments(text: &str) -> String {
    static COMMENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = COMMENT_RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
    re.replace_all(text, "").into_owned()
}

/// Drops footnote markers like `[^1]` or `[1]` at the end of a line/word.
pub fn strip_footnote_markers(text: &str) -> String {
    static FOOTNOTE_RE: OnceLock<Regex> = OnceLock::new();
    let re = FOOTNOTE_RE.get_or_init(|| Regex::new(r"\[\^?\d+\]").unwrap());
    re.replace_all(text, "").into_owned()
}

/// Markdown link `[text](url)` collapses to `text`; images are dropped
/// entirely.
pub fn strip_markdown_links_and_images(text: &str) -> String {
    static IMAGE_RE: OnceLock<Regex> = OnceLock::new();
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    let image_re = IMAGE_RE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
    let link_re = LINK_RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
    let without_images = image_re.replace_all(text, "");
    link_re.replace_all(&without_images, "$1").into_owned()
}

/// A line that is only a badge/shield image or navigation-only link, once
/// stripped, renders to nothing meaningful and should be dropped entirely
/// rather than leaving a blank description line.
pub fn is_noise_line(original: &str, stripped: &str) -> bool {
    let trimmed = stripped.trim();
    if trimmed.is_empty() && !original.trim().is_empty() {
        return true;
    }
    false
}

/// Runs the full noise-filter pipeline over one fragment of prose text and
/// returns `None` if the result carries no signal.
pub fn clean_description_fragment(raw: &str) -> Option<String> {
    let no_comments = strip_html_comments(raw);
    let no_footnotes = strip_footnote_markers(&no_comments);
    let no_links = strip_markdown_links_and_images(&no_footnotes);
    let collapsed = no_links.split_whitespace().collect::<Vec<_>>().join(" ");
    if is_noise_line(raw, &collapsed) || collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Significant token: not pure punctuation, longer than one character.
fn is_significant_token(token: &str) -> bool {
    token.chars().count() > 1 && token.chars().any(|c| c.is_alphanumeric())
}

/// Applies the single-line inclusion rule: a one-line block needs at least
/// three significant whitespace-separated tokens to be kept. Multi-line
/// blocks are always included.
pub fn passes_inclusion_rule(code: &str) -> bool {
    let line_count = code.lines().filter(|l| !l.trim().is_empty()).count();
    if line_count > 1 {
        return true;
    }
    let significant = code
        .split_whitespace()
        .filter(|t| is_significant_token(t))
        .count();
    significant >= 3
}

/// Heading levels recognized across every format (h1..h6, or RST's
/// equivalent overline/underline rank once normalized by the RST scanner).
pub const MAX_HEADING_LEVEL: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_two_tokens_dropped() {
        assert!(!passes_inclusion_rule("x = 1"));
    }

    #[test]
    fn single_line_three_tokens_kept() {
        assert!(passes_inclusion_rule("import numpy package"));
    }

    #[test]
    fn multi_line_always_kept() {
        assert!(passes_inclusion_rule("a\nb"));
    }

    #[test]
    fn link_collapses_to_text() {
        assert_eq!(
            strip_markdown_links_and_images("see [the docs](https://example.com) for more"),
            "see the docs for more"
        );
    }

    #[test]
    fn image_is_dropped() {
        assert_eq!(
            strip_markdown_links_and_images("![badge](https://img.shields.io/x.svg)"),
            ""
        );
    }

    #[test]
    fn footnote_marker_removed() {
        assert_eq!(strip_footnote_markers("see note[^1] here"), "see note here");
    }

    #[test]
    fn badge_only_line_is_noise() {
        let raw = "![build](https://img.shields.io/x.svg)";
        assert!(clean_description_fragment(raw).is_none());
    }
}
