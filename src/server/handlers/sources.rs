//! `/sources/*` CRUD plus the recrawl/regenerate actions that operate on an
//! existing source without a fresh `init_crawl` call.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppContext;
use crate::error::Result;
use crate::jobs::JobView;
use crate::models::{CodeSnippet, Document, Source};
use crate::progress::{ProgressEvent, Topic};

pub async fn list(State(ctx): State<AppContext>) -> Result<Json<Vec<Source>>> {
    Ok(Json(ctx.repos.sources.list().await?))
}

pub async fn get(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> Result<Json<Source>> {
    Ok(Json(ctx.repos.sources.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

pub async fn rename(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<Source>> {
    Ok(Json(ctx.repos.sources.rename(id, &req.name, req.version.as_deref()).await?))
}

pub async fn delete(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>> {
    ctx.repos.sources.delete(id).await?;
    Ok(Json(serde_json::json!({ "status": "deleted", "id": id })))
}

pub async fn documents(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> Result<Json<Vec<Document>>> {
    Ok(Json(ctx.repos.documents.list_by_source(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SnippetsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn snippets(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<SnippetsQuery>,
) -> Result<Json<Vec<CodeSnippet>>> {
    let (snippets, _total) = ctx
        .repos
        .snippets
        .recent_by_source(id, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(snippets))
}

pub async fn recrawl(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> Result<Json<JobView>> {
    let job = ctx.job_manager.recrawl(id).await?;
    Ok(Json(ctx.job_manager.view(&job)))
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub processed: i64,
    pub changed: i64,
    pub failed: i64,
}

pub async fn regenerate(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> Result<Json<RegenerateResponse>> {
    // Fails fast if the source doesn't exist; regenerate itself has nothing
    // to validate against beyond that.
    ctx.repos.sources.get(id).await?;

    let annotator = std::sync::Arc::clone(&ctx.annotator);
    let summary = crate::annotate::regenerate_source(
        &ctx.repos,
        annotator,
        &ctx.progress,
        id,
        crate::config::DEFAULT_ANNOTATOR_BATCH_SIZE,
        ctx.config.llm_num_parallel,
    )
    .await?;

    ctx.progress.publish(
        Topic::Source(id),
        ProgressEvent::Completed { job_id: id, status: "completed" },
    );

    Ok(Json(RegenerateResponse {
        processed: summary.processed,
        changed: summary.changed,
        failed: summary.failed,
    }))
}
