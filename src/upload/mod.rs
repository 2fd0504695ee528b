//! Upload ingestion: the non-crawl path into the same Document/Snippet
//! storage, for Markdown/RST/text files and `multipart/form-data` uploads
//! posted directly to the API. Shares the extractor dispatch and
//! annotation pipeline with the crawl path but skips the work queue and
//! Job Manager entirely — an upload is a single synchronous ingest, not a
//! long-running job.
//!
//! Gated behind `Config::uploads_enabled` at the HTTP boundary (see
//! `server::handlers::upload`), per the Open Question in the
//! specification resolved in `SPEC_FULL.md` as "ship behind a feature
//! flag matching the config".

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::annotate::{annotate_all, CodeAnnotator};
use crate::error::Result;
use crate::extract::ExtractorKind;
use crate::models::{CodeSnippet, Document, SourceKind};
use crate::repository::documents::UpsertOutcome;
use crate::repository::Repositories;

/// One file to ingest: its effective URL/path (used both as the unique key
/// within the source and as the extractor's `source_url` hint), a content
/// type or filename used for dispatch, and the raw text content.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub url: String,
    pub content_type: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document: Document,
    pub snippets_extracted: i64,
}

/// Ingest one file into `source_name`/`source_version`, creating the
/// source on first use (kind `Upload`), exactly mirroring the crawl path's
/// extract-then-persist step but without a job to report counters through.
pub async fn ingest_file(
    repos: &Repositories,
    annotator: Arc<dyn CodeAnnotator>,
    annotator_batch_size: usize,
    annotator_num_parallel: usize,
    source_name: &str,
    source_version: Option<&str>,
    file: UploadFile,
) -> Result<UploadOutcome> {
    let source = repos
        .sources
        .get_or_create(source_name, source_version, None, SourceKind::Upload)
        .await?;

    let content_hash = Document::compute_content_hash(&file.content);
    let title = file
        .url
        .rsplit('/')
        .next()
        .unwrap_or(&file.url)
        .to_string();

    let outcome = repos
        .documents
        .upsert(source.id, &file.url, &title, 0, &content_hash, Some(&file.content))
        .await?;

    let (document, snippets_extracted) = match outcome {
        UpsertOutcome::Unchanged(doc) => {
            let count = repos.snippets.count_by_document(doc.id).await?;
            (doc, count)
        }
        UpsertOutcome::Changed(doc) => {
            let kind = ExtractorKind::detect(file.content_type.as_deref(), &file.url);
            let blocks = kind.extract(&file.content, Some(&file.url));
            let annotated = annotate_all(annotator, blocks, annotator_batch_size, annotator_num_parallel).await;

            let now = Utc::now();
            let snippets: Vec<CodeSnippet> = annotated
                .iter()
                .map(|b| CodeSnippet::from_block(Uuid::new_v4(), doc.id, b, now))
                .collect();
            let stored = repos.snippets.replace_for_document(doc.id, &snippets).await?;
            (doc, stored as i64)
        }
    };

    Ok(UploadOutcome { document, snippets_extracted })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_the_final_path_segment() {
        let file = UploadFile {
            url: "upload://docs/guide.md".to_string(),
            content_type: Some("text/markdown".to_string()),
            content: String::new(),
        };
        assert_eq!(file.url.rsplit('/').next().unwrap(), "guide.md");
    }
}
