//! `/upload/*` routes: synchronous ingestion of files posted directly to
//! the API, bypassing the crawl work queue. Gated behind
//! `Config::uploads_enabled`.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppContext;
use crate::error::{CodeDoxError, Result};
use crate::upload::{ingest_file, UploadFile};

fn require_enabled(ctx: &AppContext) -> Result<()> {
    if ctx.config.uploads_enabled {
        Ok(())
    } else {
        Err(CodeDoxError::Validation("uploads are disabled".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document_id: uuid::Uuid,
    pub url: String,
    pub snippets_extracted: i64,
}

#[derive(Debug, Deserialize)]
pub struct MarkdownUploadRequest {
    pub source_name: String,
    #[serde(default)]
    pub source_version: Option<String>,
    pub url: String,
    pub content: String,
}

/// `POST /upload/markdown`: one inline markdown document, no multipart
/// overhead for the common "paste a page" case.
pub async fn upload_markdown(
    State(ctx): State<AppContext>,
    Json(req): Json<MarkdownUploadRequest>,
) -> Result<Json<UploadResponse>> {
    require_enabled(&ctx)?;
    let outcome = ingest_file(
        &ctx.repos,
        std::sync::Arc::clone(&ctx.annotator),
        crate::config::DEFAULT_ANNOTATOR_BATCH_SIZE,
        ctx.config.llm_num_parallel,
        &req.source_name,
        req.source_version.as_deref(),
        UploadFile {
            url: req.url,
            content_type: Some("text/markdown".to_string()),
            content: req.content,
        },
    )
    .await?;
    Ok(Json(UploadResponse {
        document_id: outcome.document.id,
        url: outcome.document.url,
        snippets_extracted: outcome.snippets_extracted,
    }))
}

/// `POST /upload/file`: one `multipart/form-data` file field, plus
/// `source_name`/`source_version` text fields.
pub async fn upload_file(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    require_enabled(&ctx)?;
    let mut outcomes = ingest_multipart(&ctx, multipart).await?;
    let response = outcomes.pop().ok_or_else(|| CodeDoxError::Validation("no file field in upload".to_string()))?;
    Ok(Json(response))
}

/// `POST /upload/files`: one or more `multipart/form-data` file fields.
pub async fn upload_files(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadResponse>>> {
    require_enabled(&ctx)?;
    Ok(Json(ingest_multipart(&ctx, multipart).await?))
}

async fn ingest_multipart(ctx: &AppContext, mut multipart: Multipart) -> Result<Vec<UploadResponse>> {
    let mut source_name: Option<String> = None;
    let mut source_version: Option<String> = None;
    let mut files: Vec<(String, Option<String>, String)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CodeDoxError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "source_name" => {
                source_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| CodeDoxError::Validation(e.to_string()))?,
                )
            }
            "source_version" => {
                source_version = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| CodeDoxError::Validation(e.to_string()))?,
                )
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| CodeDoxError::Validation(e.to_string()))?;
                let content = String::from_utf8(bytes.to_vec())
                    .map_err(|_| CodeDoxError::Validation("uploaded file is not valid UTF-8".to_string()))?;
                files.push((file_name, content_type, content));
            }
            _ => {}
        }
    }

    let source_name = source_name.ok_or_else(|| CodeDoxError::Validation("source_name is required".to_string()))?;
    if files.is_empty() {
        return Err(CodeDoxError::Validation("at least one file field is required".to_string()));
    }

    let mut responses = Vec::with_capacity(files.len());
    for (name, content_type, content) in files {
        let outcome = ingest_file(
            &ctx.repos,
            std::sync::Arc::clone(&ctx.annotator),
            crate::config::DEFAULT_ANNOTATOR_BATCH_SIZE,
            ctx.config.llm_num_parallel,
            &source_name,
            source_version.as_deref(),
            UploadFile { url: format!("upload://{name}"), content_type, content },
        )
        .await?;
        responses.push(UploadResponse {
            document_id: outcome.document.id,
            url: outcome.document.url,
            snippets_extracted: outcome.snippets_extracted,
        });
    }
    Ok(responses)
}
