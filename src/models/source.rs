//! Source and Document models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a source's documents were ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Crawl,
    Upload,
    Repo,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Upload => "upload",
            Self::Repo => "repo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "crawl" => Some(Self::Crawl),
            "upload" => Some(Self::Upload),
            "repo" => Some(Self::Repo),
            _ => None,
        }
    }
}

/// A logical documentation collection. `(name, version)` is unique; version
/// may be null, and a null version is treated as a distinct key from any
/// other version of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub base_url: Option<String>,
    pub kind: SourceKind,
    pub created_at: DateTime<Utc>,
}

/// One ingested page or file belonging to a source.
///
/// `(source_id, url)` is unique. `content_hash` is the SHA-256 of the
/// normalized content and drives skip-on-unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: String,
    pub crawl_depth: i32,
    pub content_hash: String,
    pub markdown: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// SHA-256 of whitespace-normalized content, used for skip-on-unchanged
    /// comparisons by the crawl pipeline.
    pub fn compute_content_hash(normalized: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hex::encode(hasher.finalize())
    }
}
