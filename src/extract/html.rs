//! HTML extractor: recognizes code containers, strips UI chrome, and walks
//! the preceding-heading chain for context.
//!
//! Grounded on the pack's `scraper`-based page extractors
//! (`dIB59-seo::extractor::page_extractor`, `PerkyZZ999-ContextBuilder`'s
//! platform adapters), adapted from page-metadata extraction to code-block
//! extraction.

use std::sync::OnceLock;

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::extract::common::{clean_description_fragment, passes_inclusion_rule};
use crate::models::{ExtractedCodeBlock, ExtractedContext};

fn code_container_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse(
            "pre > code, pre, div.highlight pre, div[class*=codeblock] pre, \
             div[class*=code-block] pre, textarea[class*=code], \
             div[data-language] pre, figure pre",
        )
        .unwrap()
    })
}

fn heading_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap())
}

fn chrome_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse(
            "button, .copy-button, .copy, .line-numbers, .gutter, .linenodiv, .toolbar",
        )
        .unwrap()
    })
}

fn heading_level(el: &ElementRef) -> Option<u8> {
    el.value().name().strip_prefix('h')?.parse().ok()
}

/// Extracts every code block from a rendered HTML page, with semantic
/// context computed by walking up and backward from each block.
pub fn extract(html: &str, _source_url: Option<&str>) -> Vec<ExtractedCodeBlock> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();

    for (idx, container) in document.select(code_container_selector()).enumerate() {
        // A `pre > code` match also matches the enclosing `pre` separately;
        // keep only the innermost node among overlapping selector hits.
        if container.value().name() == "pre" && container.select(&Selector::parse("code").unwrap()).next().is_some() {
            continue;
        }
        if is_inline(&container) {
            continue;
        }

        let raw_text = container_text(&container);
        if raw_text.trim().is_empty() {
            continue;
        }
        if !passes_inclusion_rule(&raw_text) {
            continue;
        }

        let language = detect_language(&container);
        let filename_hint = detect_filename_hint(&container);
        let context = build_context(&container);

        blocks.push(ExtractedCodeBlock {
            language,
            code: raw_text,
            context,
            line_span: (idx, idx),
            filename_hint,
        });
    }

    blocks
}

/// Inline code: a `<code>` with no `<pre>` ancestor, embedded in flowing
/// prose rather than standing alone as a block.
fn is_inline(el: &ElementRef) -> bool {
    if el.value().name() != "code" {
        return false;
    }
    !el.ancestors().any(|a| {
        a.value()
            .as_element()
            .map(|e| e.name() == "pre")
            .unwrap_or(false)
    })
}

fn container_text(container: &ElementRef) -> String {
    let mut text = String::new();
    collect_text_excluding_chrome(container, &mut text);
    text.trim_end_matches('\n').to_string()
}

fn collect_text_excluding_chrome(el: &ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let classes: Vec<&str> = e.classes().collect();
                    let is_chrome = matches!(e.name(), "button")
                        || classes.iter().any(|c| {
                            matches!(*c, "copy-button" | "copy" | "line-numbers" | "gutter" | "linenodiv" | "toolbar")
                        });
                    if is_chrome {
                        continue;
                    }
                    if e.name() == "br" {
                        out.push('\n');
                        continue;
                    }
                    collect_text_excluding_chrome(&child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn detect_language(container: &ElementRef) -> Option<String> {
    let class_lang = |el: &ElementRef| -> Option<String> {
        el.value().classes().find_map(|c| {
            c.strip_prefix("language-")
                .or_else(|| c.strip_prefix("lang-"))
                .map(|s| s.to_string())
        })
    };

    if let Some(lang) = class_lang(container) {
        return Some(lang);
    }
    if let Some(code_child) = container.select(&Selector::parse("code").unwrap()).next() {
        if let Some(lang) = class_lang(&code_child) {
            return Some(lang);
        }
    }
    if let Some(attr) = container.value().attr("data-language") {
        return Some(attr.to_string());
    }

    // Enclosing figure caption, e.g. <figcaption>Python</figcaption>.
    for ancestor in container.ancestors() {
        if let Some(ancestor_el) = ElementRef::wrap(ancestor) {
            if ancestor_el.value().name() == "figure" {
                if let Some(caption) = ancestor_el
                    .select(&Selector::parse("figcaption").unwrap())
                    .next()
                {
                    let text = caption.text().collect::<String>().trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
    }
    None
}

fn detect_filename_hint(container: &ElementRef) -> Option<String> {
    for ancestor in container.ancestors() {
        if let Some(ancestor_el) = ElementRef::wrap(ancestor) {
            let classes: Vec<&str> = ancestor_el.value().classes().collect();
            if classes.iter().any(|c| c.contains("code-tabs") || c.contains("file-tab") || c.contains("tabs")) {
                if let Some(tab) = ancestor_el
                    .select(&Selector::parse(".tab-label, .file-name, .filename").unwrap())
                    .next()
                {
                    let text = tab.text().collect::<String>().trim().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
    }
    container.value().attr("data-filename").map(|s| s.to_string())
}

/// Walks upward from the code block, scanning preceding siblings at each
/// ancestor level for the nearest heading, collecting in-between prose as
/// the description, and recording the enclosing heading hierarchy.
fn build_context(container: &ElementRef) -> ExtractedContext {
    let mut title: Option<String> = None;
    let mut description_parts = Vec::new();
    let mut hierarchy = Vec::new();

    let mut current: NodeRef<Node> = **container;
    'levels: loop {
        let mut sibling = current.prev_sibling();
        let mut between = Vec::new();
        while let Some(node) = sibling {
            if let Some(el) = ElementRef::wrap(node) {
                if let Some(level) = heading_level(&el) {
                    title = Some(el.text().collect::<String>().trim().to_string());
                    for part in between.into_iter().rev() {
                        description_parts.insert(0, part);
                    }
                    hierarchy.insert(0, format!("h{level}:{}", title.clone().unwrap_or_default()));
                    break 'levels;
                }
                if let Some(text) = clean_description_fragment(&el.text().collect::<String>()) {
                    between.push(text);
                }
            }
            sibling = node.prev_sibling();
        }
        for part in between.into_iter().rev() {
            description_parts.insert(0, part);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    // Collect enclosing ancestor headings above the title's own level, so
    // `hierarchy` reflects the full h1..hN chain, not just the nearest one.
    let mut ancestor_headings = Vec::new();
    let mut node = **container;
    while let Some(parent) = node.parent() {
        let mut sib = node.prev_sibling();
        while let Some(s) = sib {
            if let Some(el) = ElementRef::wrap(s) {
                if let Some(level) = heading_level(&el) {
                    let text = el.text().collect::<String>().trim().to_string();
                    ancestor_headings.push((level, text));
                }
            }
            sib = s.prev_sibling();
        }
        node = parent;
    }
    ancestor_headings.reverse();
    if hierarchy.is_empty() && !ancestor_headings.is_empty() {
        hierarchy = ancestor_headings
            .iter()
            .map(|(lvl, text)| format!("h{lvl}:{text}"))
            .collect();
    }

    ExtractedContext {
        title,
        description: description_parts.join(" "),
        hierarchy,
        raw_lines: (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_pre_code_with_language_class() {
        let html = r#"<html><body>
            <h2>Installing</h2>
            <p>Run the following command.</p>
            <pre><code class="language-bash">cargo install codedox</code></pre>
        </body></html>"#;
        let blocks = extract(html, None);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("bash"));
        assert_eq!(blocks[0].context.title.as_deref(), Some("Installing"));
        assert!(blocks[0].context.description.contains("Run the following command"));
    }

    #[test]
    fn drops_inline_code_without_pre_ancestor() {
        let html = r#"<html><body><p>Use <code>foo()</code> to begin.</p></body></html>"#;
        let blocks = extract(html, None);
        assert!(blocks.is_empty());
    }

    #[test]
    fn drops_short_single_line_block() {
        let html = r#"<html><body><pre><code>x = 1</code></pre></body></html>"#;
        let blocks = extract(html, None);
        assert!(blocks.is_empty());
    }

    #[test]
    fn keeps_single_line_block_with_three_tokens() {
        let html = r#"<html><body><pre><code>let x = 1</code></pre></body></html>"#;
        let blocks = extract(html, None);
        assert_eq!(blocks.len(), 1);
    }
}
