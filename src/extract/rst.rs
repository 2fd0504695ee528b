//! Hand-rolled reStructuredText scanner.
//!
//! No mature RST parser crate exists in the corpus, so this extractor, like
//! the teacher's bespoke line-oriented scanners elsewhere in the codebase,
//! walks the source line by line tracking indentation instead of building a
//! parse tree.

use std::sync::OnceLock;

use regex::Regex;

use crate::extract::common::passes_inclusion_rule;
use crate::models::{ExtractedCodeBlock, ExtractedContext};

struct OpenHeading {
    level: u8,
    text: String,
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>\s*)\.\.\s+(code-block|code|sourcecode)::\s*(?P<lang>\S*)\s*$").unwrap()
    })
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`<]+)\s*<[^>]*>`_+").unwrap())
}

/// Underline characters recognized as heading markers, ranked by first
/// appearance order within the document (RST has no fixed level-to-char
/// mapping; the convention is whichever character is used first is h1).
const HEADING_CHARS: &[char] = &['=', '-', '~', '^', '"', '\'', '`', '#', '*', '+'];

fn strip_references(text: &str) -> String {
    reference_re().replace_all(text, "$1").into_owned()
}

pub fn extract(source: &str, _source_url: Option<&str>) -> Vec<ExtractedCodeBlock> {
    let lines: Vec<&str> = source.lines().collect();
    let mut blocks = Vec::new();
    let mut heading_stack: Vec<OpenHeading> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut description_lines: Vec<String> = Vec::new();
    let mut char_rank: Vec<char> = Vec::new();
    let mut block_index = 0usize;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if let Some((level, text)) = detect_heading(&lines, i, &mut char_rank) {
            while heading_stack.last().map(|h| h.level >= level).unwrap_or(false) {
                heading_stack.pop();
            }
            heading_stack.push(OpenHeading { level, text: text.clone() });
            current_title = Some(text);
            description_lines.clear();
            i += 2;
            continue;
        }

        if let Some(caps) = directive_re().captures(line) {
            let indent = caps.name("indent").unwrap().as_str().len();
            let lang = caps.name("lang").map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
            let (body, consumed) = read_indented_block(&lines, i + 1, indent, true);
            i += 1 + consumed;
            push_block(
                &mut blocks,
                &mut block_index,
                body,
                lang,
                &current_title,
                &description_lines,
                &heading_stack,
            );
            continue;
        }

        if line.trim_end().ends_with("::") && !line.trim().starts_with("..") {
            let base_indent = indent_of(line);
            let (body, consumed) = read_indented_block(&lines, i + 1, base_indent, false);
            if !body.trim().is_empty() {
                i += 1 + consumed;
                push_block(
                    &mut blocks,
                    &mut block_index,
                    body,
                    None,
                    &current_title,
                    &description_lines,
                    &heading_stack,
                );
                continue;
            }
        }

        if !line.trim().is_empty() {
            let cleaned = strip_references(line.trim());
            if !cleaned.is_empty() {
                description_lines.push(cleaned);
            }
        }
        i += 1;
    }

    blocks
}

#[allow(clippy::too_many_arguments)]
fn push_block(
    blocks: &mut Vec<ExtractedCodeBlock>,
    block_index: &mut usize,
    body: String,
    lang: Option<String>,
    current_title: &Option<String>,
    description_lines: &[String],
    heading_stack: &[OpenHeading],
) {
    if !passes_inclusion_rule(&body) {
        return;
    }
    let hierarchy = heading_stack
        .iter()
        .map(|h| format!("h{}:{}", h.level, h.text))
        .collect();
    blocks.push(ExtractedCodeBlock {
        language: lang,
        code: body,
        context: ExtractedContext {
            title: current_title.clone(),
            description: description_lines.join(" "),
            hierarchy,
            raw_lines: (0, 0),
        },
        line_span: (*block_index, *block_index),
        filename_hint: None,
    });
    *block_index += 1;
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Reads lines indented more than `min_indent` starting at `start`,
/// stopping at the first line that dedents back to `min_indent` or less
/// (blank lines are included so the block can contain intentional spacing).
/// When `skip_option_lines` is set, leading `:field:` directive option
/// lines are dropped.
fn read_indented_block(lines: &[&str], start: usize, min_indent: usize, skip_option_lines: bool) -> (String, usize) {
    let mut i = start;
    // Skip a single blank separator line, if present.
    if i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }

    if skip_option_lines {
        while i < lines.len() {
            let trimmed = lines[i].trim_start();
            if trimmed.starts_with(':') && trimmed.trim_end().ends_with(':') {
                i += 1;
            } else {
                break;
            }
        }
        if i < lines.len() && lines[i].trim().is_empty() {
            i += 1;
        }
    }

    let body_start = i;
    let mut body_indent: Option<usize> = None;
    let mut end = i;

    while end < lines.len() {
        let line = lines[end];
        if line.trim().is_empty() {
            end += 1;
            continue;
        }
        let this_indent = indent_of(line);
        if this_indent <= min_indent {
            break;
        }
        if body_indent.is_none() {
            body_indent = Some(this_indent);
        }
        end += 1;
    }

    // Trim trailing blank lines collected inside the loop.
    let mut trimmed_end = end;
    while trimmed_end > body_start && lines[trimmed_end - 1].trim().is_empty() {
        trimmed_end -= 1;
    }

    let dedent = body_indent.unwrap_or(min_indent + 1);
    let body = lines[body_start..trimmed_end]
        .iter()
        .map(|l| {
            if l.len() >= dedent {
                &l[dedent.min(l.len())..]
            } else {
                ""
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    (body, end - start)
}

/// A heading in RST is a line of text followed (or, for overline style,
/// preceded) by a line of a single repeated punctuation character at least
/// as long as the text. This checks the underline-only form, which is what
/// the vast majority of real documents use.
fn detect_heading(lines: &[&str], i: usize, char_rank: &mut Vec<char>) -> Option<(u8, String)> {
    let text_line = lines[i];
    if text_line.trim().is_empty() {
        return None;
    }
    let underline = lines.get(i + 1)?;
    let trimmed = underline.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    let first = trimmed.chars().next()?;
    if !HEADING_CHARS.contains(&first) {
        return None;
    }
    if !trimmed.chars().all(|c| c == first) {
        return None;
    }
    if trimmed.len() < text_line.trim().len() {
        return None;
    }

    if !char_rank.contains(&first) {
        char_rank.push(first);
    }
    let level = char_rank.iter().position(|c| *c == first).unwrap() as u8 + 1;
    Some((level, text_line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_block_directive_with_language() {
        let rst = "Install\n=======\n\n.. code-block:: python\n\n    import codedox\n    codedox.run()\n";
        let blocks = extract(rst, None);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("python"));
        assert!(blocks[0].code.contains("import codedox"));
    }

    #[test]
    fn literal_block_via_double_colon() {
        let rst = "Example::\n\n    foo = bar()\n    baz = qux()\n";
        let blocks = extract(rst, None);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].code.contains("foo = bar()"));
    }

    #[test]
    fn reference_syntax_collapses_to_text() {
        assert_eq!(strip_references("see `the docs <https://example.com>`_ here"), "see the docs here");
    }
}
