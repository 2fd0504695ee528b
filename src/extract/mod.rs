//! Extractor set: converts a rendered page or uploaded file into a list of
//! `ExtractedCodeBlock`s, dispatched by content type or file extension.

pub mod common;
pub mod html;
pub mod markdown;
pub mod rst;

use crate::models::ExtractedCodeBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Html,
    Markdown,
    Rst,
}

impl ExtractorKind {
    /// Chooses an extractor by MIME content type, falling back to the file
    /// extension of `url_or_path` when the content type is absent or
    /// generic (`application/octet-stream`, uploads without a server-set
    /// type).
    pub fn detect(content_type: Option<&str>, url_or_path: &str) -> Self {
        if let Some(ct) = content_type {
            let ct = ct.split(';').next().unwrap_or(ct).trim();
            match ct {
                "text/html" | "application/xhtml+xml" => return Self::Html,
                "text/markdown" => return Self::Markdown,
                _ => {}
            }
        }

        let lower = url_or_path.to_lowercase();
        let ext = lower.rsplit('.').next().unwrap_or("");
        match ext {
            "md" | "mdx" | "txt" => Self::Markdown,
            "rst" | "rest" | "restx" | "rtxt" | "rstx" => Self::Rst,
            _ => Self::Html,
        }
    }

    /// Pure function of input bytes plus source URL: running it twice on
    /// identical input yields an identical, ordered list of blocks.
    pub fn extract(&self, content: &str, source_url: Option<&str>) -> Vec<ExtractedCodeBlock> {
        match self {
            Self::Html => html::extract(content, source_url),
            Self::Markdown => markdown::extract(content, source_url),
            Self::Rst => rst::extract(content, source_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_content_type() {
        assert_eq!(ExtractorKind::detect(Some("text/html"), "page"), ExtractorKind::Html);
        assert_eq!(ExtractorKind::detect(Some("text/markdown"), "page"), ExtractorKind::Markdown);
    }

    #[test]
    fn detects_by_extension_when_content_type_absent() {
        assert_eq!(ExtractorKind::detect(None, "guide.mdx"), ExtractorKind::Markdown);
        assert_eq!(ExtractorKind::detect(None, "guide.rst"), ExtractorKind::Rst);
        assert_eq!(ExtractorKind::detect(None, "guide.txt"), ExtractorKind::Markdown);
        assert_eq!(ExtractorKind::detect(None, "index.html"), ExtractorKind::Html);
    }
}
