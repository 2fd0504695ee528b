//! Domain models for the data model described in the specification.
//!
//! Modeled as flat rows with foreign keys (source -> document -> snippet);
//! hierarchy and cross-links are computed on read rather than stored as a
//! pointer graph, per the "cycle-prone pointer graphs" design note.

mod failed_page;
mod job;
mod snippet;
mod source;

pub use failed_page::FailedPage;
pub use job::{CrawlJob, JobPhase, JobStatus};
pub use snippet::{CodeSnippet, ExtractedCodeBlock, ExtractedContext};
pub use source::{Document, Source, SourceKind};
