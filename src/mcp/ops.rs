//! Tool bodies shared by the stdio `rmcp` server and the `/mcp/*` HTTP
//! shims, so the two transports can never drift in behavior.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::app::AppContext;
use crate::error::Result;
use crate::jobs::{JobView, NewJobParams};
use crate::models::{CodeSnippet, Source};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InitCrawlParams {
    /// Name of the library/source this crawl belongs to.
    pub name: String,
    /// One or more URLs to start crawling from.
    pub start_urls: Vec<String>,
    /// How many link hops to follow from a start URL (0-3). Defaults to 2.
    #[serde(default)]
    pub max_depth: Option<i32>,
    /// Only crawl pages that match every one of these glob patterns.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Never crawl pages matching any of these glob patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Restrict the crawl to this domain, ignoring off-domain links.
    #[serde(default)]
    pub domain_filter: Option<String>,
    /// In-flight page fetches for this job (1-100). Defaults to the server config.
    #[serde(default)]
    pub max_concurrent_crawls: Option<i32>,
    /// Stop after this many pages have been crawled.
    #[serde(default)]
    pub max_pages: Option<i32>,
}

pub async fn init_crawl(ctx: &AppContext, params: InitCrawlParams) -> Result<JobView> {
    let job = ctx
        .job_manager
        .create_and_start(NewJobParams {
            name: params.name,
            start_urls: params.start_urls,
            max_depth: params.max_depth.unwrap_or(2),
            include_patterns: params.include_patterns,
            exclude_patterns: params.exclude_patterns,
            domain_filter: params.domain_filter,
            max_concurrent_crawls: params.max_concurrent_crawls,
            max_pages: params.max_pages,
        })
        .await?;
    Ok(ctx.job_manager.view(&job))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchLibrariesParams {
    /// Name substring to match; every library is returned when omitted.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LibraryPageView {
    pub libraries: Vec<Source>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

pub async fn search_libraries(ctx: &AppContext, params: SearchLibrariesParams) -> Result<LibraryPageView> {
    let page = ctx
        .search
        .search_libraries(params.query.as_deref(), params.limit, params.page)
        .await?;
    Ok(LibraryPageView { libraries: page.libraries, total: page.total, page: page.page, pages: page.pages })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetContentParams {
    /// Library id, exact name, or unique name prefix.
    pub library_id: String,
    /// Full-text query; the most recently updated snippets are returned when omitted.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SnippetPageView {
    pub snippets: Vec<CodeSnippet>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

pub async fn get_content(ctx: &AppContext, params: GetContentParams) -> Result<SnippetPageView> {
    let page = ctx
        .search
        .get_content(&params.library_id, params.query.as_deref(), params.limit, params.page)
        .await?;
    Ok(SnippetPageView { snippets: page.snippets, total: page.total, page: page.page, pages: page.pages })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPageMarkdownParams {
    /// URL of a previously crawled page.
    pub url: String,
    #[serde(default)]
    pub query: Option<String>,
    /// Maximum tokens per chunk, estimated by character count. Defaults to 2048.
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Which chunk to return when the page's markdown spans more than one.
    #[serde(default)]
    pub chunk_index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MarkdownChunkView {
    pub url: String,
    pub markdown: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

pub async fn get_page_markdown(ctx: &AppContext, params: GetPageMarkdownParams) -> Result<MarkdownChunkView> {
    let chunk = ctx
        .search
        .get_page_markdown(&params.url, params.query.as_deref(), params.max_tokens, params.chunk_index)
        .await?;
    Ok(MarkdownChunkView {
        url: chunk.document.url,
        markdown: chunk.markdown_content,
        chunk_index: chunk.chunk_index,
        total_chunks: chunk.total_chunks,
    })
}
