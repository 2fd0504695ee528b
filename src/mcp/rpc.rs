//! `POST /mcp`: a minimal hand-rolled JSON-RPC 2.0 endpoint covering
//! `initialize`, `tools/list`, and `tools/call` — the subset of MCP's
//! Streamable HTTP transport needed for a client that posts one request at
//! a time and reads one response back, without committing to `rmcp`'s
//! `StreamableHttpService` API (unverified against this pack; see
//! DESIGN.md).

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppContext;

use super::rest::{dispatch, known_tool_names};

pub fn router() -> Router<AppContext> {
    Router::new().route("/mcp", post(handle))
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

async fn handle(State(ctx): State<AppContext>, Json(req): Json<RpcRequest>) -> Json<Value> {
    let result = match req.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": "2025-06-18",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "codedox", "version": env!("CARGO_PKG_VERSION") },
        })),
        "tools/list" => Ok(json!({ "tools": known_tool_names() })),
        "tools/call" => {
            let name = req.params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let args = req.params.get("arguments").cloned().unwrap_or(Value::Null);
            dispatch(&ctx, &name, args).await.map(|v| {
                json!({ "content": [{ "type": "text", "text": v.to_string() }], "isError": false })
            })
        }
        other => Err(crate::error::CodeDoxError::Validation(format!("unknown method '{other}'"))),
    };

    match result {
        Ok(value) => Json(json!({ "jsonrpc": "2.0", "id": req.id, "result": value })),
        Err(e) => Json(json!({
            "jsonrpc": "2.0",
            "id": req.id,
            "error": { "code": -32000, "message": e.to_string(), "kind": e.kind() },
        })),
    }
}
