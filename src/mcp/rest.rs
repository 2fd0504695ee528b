//! `GET /mcp/tools` and `POST /mcp/execute/{tool_name}`: an HTTP-native
//! shim over the same tool bodies the stdio server calls, for clients that
//! would rather make plain REST calls than speak MCP's JSON-RPC framing.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rmcp::schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use crate::app::AppContext;
use crate::error::{CodeDoxError, Result};

use super::ops::{self, GetContentParams, GetPageMarkdownParams, InitCrawlParams, SearchLibrariesParams};

pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/mcp/tools", get(list_tools))
        .route("/mcp/execute/:tool_name", post(execute))
}

#[derive(Debug, Serialize)]
struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

const TOOL_NAMES: [&str; 4] = ["init_crawl", "search_libraries", "get_content", "get_page_markdown"];

async fn list_tools() -> Json<Vec<ToolDescriptor>> {
    Json(vec![
        ToolDescriptor {
            name: "init_crawl",
            description: "Start crawling a documentation site and return immediately with the job id and status.",
            input_schema: serde_json::to_value(schema_for!(InitCrawlParams)).unwrap_or_default(),
        },
        ToolDescriptor {
            name: "search_libraries",
            description: "Search for documentation libraries/sources by name.",
            input_schema: serde_json::to_value(schema_for!(SearchLibrariesParams)).unwrap_or_default(),
        },
        ToolDescriptor {
            name: "get_content",
            description: "Fetch code snippets for a library, optionally full-text filtered by query.",
            input_schema: serde_json::to_value(schema_for!(GetContentParams)).unwrap_or_default(),
        },
        ToolDescriptor {
            name: "get_page_markdown",
            description: "Fetch the stored markdown for one crawled page by URL, chunked to stay within max_tokens.",
            input_schema: serde_json::to_value(schema_for!(GetPageMarkdownParams)).unwrap_or_default(),
        },
    ])
}

async fn execute(
    State(ctx): State<AppContext>,
    Path(tool_name): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>> {
    let args = body.map(|Json(v)| v).unwrap_or(Value::Null);
    dispatch(&ctx, &tool_name, args).await.map(Json)
}

/// Parses `args` into the named tool's parameter type and runs it. Shared
/// with the JSON-RPC `tools/call` handler so both surfaces reject the same
/// malformed input the same way.
pub(super) async fn dispatch(ctx: &AppContext, tool_name: &str, args: Value) -> Result<Value> {
    match tool_name {
        "init_crawl" => {
            let params: InitCrawlParams = parse_args(args)?;
            let view = ops::init_crawl(ctx, params).await?;
            Ok(serde_json::to_value(view)?)
        }
        "search_libraries" => {
            let params: SearchLibrariesParams = parse_args(args)?;
            let page = ops::search_libraries(ctx, params).await?;
            Ok(serde_json::to_value(page)?)
        }
        "get_content" => {
            let params: GetContentParams = parse_args(args)?;
            let page = ops::get_content(ctx, params).await?;
            Ok(serde_json::to_value(page)?)
        }
        "get_page_markdown" => {
            let params: GetPageMarkdownParams = parse_args(args)?;
            let chunk = ops::get_page_markdown(ctx, params).await?;
            Ok(serde_json::to_value(chunk)?)
        }
        other => Err(CodeDoxError::NotFound(format!("unknown tool '{other}'"))),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| CodeDoxError::Validation(format!("invalid tool arguments: {e}")))
}

pub(super) fn known_tool_names() -> &'static [&'static str] {
    &TOOL_NAMES
}
