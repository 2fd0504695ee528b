//! MCP tool surface: `init_crawl`, `search_libraries`, `get_content`, and
//! `get_page_markdown`, exposed three ways from the same business logic —
//! a stdio `rmcp` server for `serve --mcp`, and two HTTP shims
//! (`GET /mcp/tools`, `POST /mcp/execute/{tool}`, `POST /mcp`) so an HTTP-only
//! client gets the identical tool contract.
//!
//! Grounded on `linggen-linggen/backend/mcp-server/src/main.rs`: a
//! `#[derive(Clone)]` tool struct holding a `ToolRouter<Self>`, `#[tool]`
//! methods taking `Parameters<T>`, and `#[tool_handler] impl ServerHandler`.
//! That example only ever talks to its own HTTP backend; this one wraps the
//! in-process `AppContext` directly since MCP and HTTP share one binary.
//!
//! The pack has no example of `rmcp`'s `StreamableHttpService` transport, so
//! rather than guess at an unverified API surface, `POST /mcp` is a small
//! hand-authored JSON-RPC dispatch (`initialize`, `tools/list`, `tools/call`)
//! over the same tool functions the stdio server calls. See DESIGN.md.

mod ops;
mod rest;
mod rpc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError};

use crate::app::AppContext;

pub use ops::{GetContentParams, GetPageMarkdownParams, InitCrawlParams, SearchLibrariesParams};

/// HTTP mirror of the tool surface: `GET /mcp/tools`, `POST
/// /mcp/execute/{tool_name}`, and `POST /mcp` (JSON-RPC), merged into the
/// main API router before it receives its shared state.
pub fn http_router() -> axum::Router<AppContext> {
    rest::router().merge(rpc::router())
}

#[derive(Clone)]
pub struct CodeDoxTool {
    ctx: AppContext,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CodeDoxTool {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, tool_router: Self::tool_router() }
    }

    #[tool(description = "Start crawling a documentation site: registers a job and returns immediately with its id and status. Use get_content or search_libraries once it completes.")]
    async fn init_crawl(
        &self,
        params: Parameters<InitCrawlParams>,
    ) -> Result<CallToolResult, McpError> {
        let view = ops::init_crawl(&self.ctx, params.0).await.map_err(to_mcp_error)?;
        Ok(text_result(&view))
    }

    #[tool(description = "Search for documentation libraries/sources by name. Returns matching libraries with their ids, names, and versions.")]
    async fn search_libraries(
        &self,
        params: Parameters<SearchLibrariesParams>,
    ) -> Result<CallToolResult, McpError> {
        let page = ops::search_libraries(&self.ctx, params.0).await.map_err(to_mcp_error)?;
        Ok(text_result(&page))
    }

    #[tool(description = "Fetch code snippets for a library, optionally full-text filtered by query. `library_id` accepts a library id, exact name, or unique name prefix.")]
    async fn get_content(
        &self,
        params: Parameters<GetContentParams>,
    ) -> Result<CallToolResult, McpError> {
        let page = ops::get_content(&self.ctx, params.0).await.map_err(to_mcp_error)?;
        Ok(text_result(&page))
    }

    #[tool(description = "Fetch the stored markdown for one crawled page by URL, chunked to stay within max_tokens.")]
    async fn get_page_markdown(
        &self,
        params: Parameters<GetPageMarkdownParams>,
    ) -> Result<CallToolResult, McpError> {
        let chunk = ops::get_page_markdown(&self.ctx, params.0).await.map_err(to_mcp_error)?;
        Ok(text_result(&chunk))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for CodeDoxTool {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codedox".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Crawl documentation sites, then search the extracted code snippets by library \
                 and query."
                    .to_string(),
            ),
        }
    }
}

fn text_result<T: serde::Serialize>(value: &T) -> CallToolResult {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    CallToolResult::success(vec![Content::text(text)])
}

fn to_mcp_error(e: crate::error::CodeDoxError) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

/// Run the stdio MCP server until the client disconnects, per
/// `serve --mcp`.
pub async fn serve_stdio(ctx: AppContext) -> anyhow::Result<()> {
    use rmcp::service::ServiceExt;
    use rmcp::transport::stdio;

    let tool = CodeDoxTool::new(ctx);
    let service = tool.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
