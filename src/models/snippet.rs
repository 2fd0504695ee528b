//! CodeSnippet and the in-flight ExtractedCodeBlock it is derived from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Semantic context gathered for one code block by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContext {
    /// Nearest preceding heading, walking up the element tree.
    pub title: Option<String>,
    /// Text of every element strictly between the heading and the block.
    pub description: String,
    /// Ordered ancestor/sibling headings (h1..hN) enclosing the block.
    pub hierarchy: Vec<String>,
    /// Raw source lines the block spans, for filename/line-span bookkeeping.
    pub raw_lines: (usize, usize),
}

/// One code block produced by an extractor, not yet persisted.
///
/// Extractors are pure functions of input bytes plus source URL: running one
/// twice on identical input must yield an identical list of these, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCodeBlock {
    pub language: Option<String>,
    pub code: String,
    pub context: ExtractedContext,
    pub line_span: (usize, usize),
    pub filename_hint: Option<String>,
}

impl ExtractedCodeBlock {
    pub fn code_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.code.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// One extracted code block, persisted and searchable.
///
/// `(document_id, code_hash)` is unique: duplicates within the same document
/// collapse to the first occurrence. The same code may appear as distinct
/// rows across different documents/sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub id: Uuid,
    pub document_id: Uuid,
    pub language: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub filename_hint: Option<String>,
    pub hierarchy: Vec<String>,
    pub line_span: (i32, i32),
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeSnippet {
    pub fn code_hash_of(code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Build a persisted snippet from an in-flight extracted block.
    pub fn from_block(id: Uuid, document_id: Uuid, block: &ExtractedCodeBlock, now: DateTime<Utc>) -> Self {
        Self {
            id,
            document_id,
            language: block.language.clone().unwrap_or_default(),
            code: block.code.clone(),
            title: block.context.title.clone().unwrap_or_default(),
            description: block.context.description.clone(),
            filename_hint: block.filename_hint.clone(),
            hierarchy: block.context.hierarchy.clone(),
            line_span: (block.line_span.0 as i32, block.line_span.1 as i32),
            code_hash: block.code_hash(),
            created_at: now,
            updated_at: now,
        }
    }
}
