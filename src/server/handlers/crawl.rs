//! `/crawl/*` job-lifecycle routes: the HTTP mirror of `init_crawl` plus the
//! status/cancel/resume/list operations the MCP surface doesn't expose.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppContext;
use crate::error::Result;
use crate::jobs::{JobView, NewJobParams};
use crate::models::JobStatus;

#[derive(Debug, Deserialize)]
pub struct InitCrawlRequest {
    pub name: String,
    pub start_urls: Vec<String>,
    #[serde(default)]
    pub max_depth: i32,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub domain_filter: Option<String>,
    #[serde(default)]
    pub max_concurrent_crawls: Option<i32>,
    #[serde(default)]
    pub max_pages: Option<i32>,
}

pub async fn init(
    State(ctx): State<AppContext>,
    Json(req): Json<InitCrawlRequest>,
) -> Result<Json<JobView>> {
    let job = ctx
        .job_manager
        .create_and_start(NewJobParams {
            name: req.name,
            start_urls: req.start_urls,
            max_depth: req.max_depth,
            include_patterns: req.include_patterns,
            exclude_patterns: req.exclude_patterns,
            domain_filter: req.domain_filter,
            max_concurrent_crawls: req.max_concurrent_crawls,
            max_pages: req.max_pages,
        })
        .await?;
    Ok(Json(ctx.job_manager.view(&job)))
}

pub async fn status(State(ctx): State<AppContext>, Path(job_id): Path<Uuid>) -> Result<Json<JobView>> {
    let job = ctx.job_manager.get(job_id).await?;
    Ok(Json(ctx.job_manager.view(&job)))
}

pub async fn cancel(State(ctx): State<AppContext>, Path(job_id): Path<Uuid>) -> Result<Json<JobView>> {
    let job = ctx.job_manager.cancel(job_id).await?;
    Ok(Json(ctx.job_manager.view(&job)))
}

pub async fn resume(State(ctx): State<AppContext>, Path(job_id): Path<Uuid>) -> Result<Json<JobView>> {
    let job = ctx.job_manager.resume(job_id).await?;
    Ok(Json(ctx.job_manager.view(&job)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
}

pub async fn list(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobListResponse>> {
    let status = query
        .status
        .as_deref()
        .and_then(JobStatus::from_str);
    let jobs = ctx.job_manager.list(status).await?;
    let jobs = jobs.iter().map(|j| ctx.job_manager.view(j)).collect();
    Ok(Json(JobListResponse { jobs }))
}
