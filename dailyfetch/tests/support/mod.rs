// Mock tool server shared by the integration tests
#![allow(dead_code)]

use mockito::{Matcher, Mock, Request, ServerGuard};
use serde_json::{json, Value};
use std::time::Duration;

use dailyfetch::mcp::McpChannel;

pub const SESSION_ID: &str = "3f2c7a10-session";

pub fn channel_for(server: &ServerGuard) -> McpChannel {
    McpChannel::new(
        format!("{}/mcp", server.url()),
        format!("{}/health", server.url()),
        Duration::from_secs(5),
    )
}

/// Id of the JSON-RPC request carried by `request`
pub fn request_id(request: &Request) -> Value {
    request
        .body()
        .ok()
        .and_then(|body| serde_json::from_slice::<Value>(body).ok())
        .and_then(|message| message.get("id").cloned())
        .unwrap_or(Value::Null)
}

/// JSON-RPC success reply echoing the request id
pub fn reply(result: Value) -> impl Fn(&Request) -> Vec<u8> + Send + Sync + 'static {
    move |request| {
        json!({"jsonrpc": "2.0", "id": request_id(request), "result": result})
            .to_string()
            .into_bytes()
    }
}

/// JSON-RPC error reply echoing the request id
pub fn reply_error(code: i64, message: &str) -> impl Fn(&Request) -> Vec<u8> + Send + Sync + 'static {
    let message = message.to_string();
    move |request| {
        json!({"jsonrpc": "2.0", "id": request_id(request), "error": {"code": code, "message": message}})
            .to_string()
            .into_bytes()
    }
}

/// `initialize` only, issuing [`SESSION_ID`].
pub async fn mock_initialize(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/mcp")
        .match_body(Matcher::PartialJson(json!({"method": "initialize"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("mcp-session-id", SESSION_ID)
        .with_body_from_request(reply(json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "news_tools", "version": "1.0.0"}
        })))
        .create_async()
        .await
}

/// `initialize` plus `notifications/initialized`, issuing [`SESSION_ID`].
pub async fn mock_handshake(server: &mut ServerGuard) -> (Mock, Mock) {
    let initialize = mock_initialize(server).await;
    let initialized = server
        .mock("POST", "/mcp")
        .match_body(Matcher::PartialJson(json!({"method": "notifications/initialized"})))
        .match_header("mcp-session-id", SESSION_ID)
        .with_status(202)
        .create_async()
        .await;

    (initialize, initialized)
}

/// Session teardown
pub async fn mock_close(server: &mut ServerGuard) -> Mock {
    server
        .mock("DELETE", "/mcp")
        .match_header("mcp-session-id", SESSION_ID)
        .with_status(200)
        .create_async()
        .await
}

/// `tools/call` answering with `payload` as the first text block.
pub async fn mock_news_call(server: &mut ServerGuard, payload: &str) -> Mock {
    server
        .mock("POST", "/mcp")
        .match_body(Matcher::PartialJson(json!({
            "method": "tools/call",
            "params": {"name": "news_fetcher"}
        })))
        .match_header("mcp-session-id", SESSION_ID)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(reply(tool_result(payload)))
        .create_async()
        .await
}

/// `tools/call` result carrying `payload` as its only text block
pub fn tool_result(payload: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": payload}],
        "isError": false
    })
}

/// Tool payload with a single category/source pair.
pub fn news_payload(category: &str, source: &str, titles: &[&str]) -> String {
    let data: Vec<Value> = titles
        .iter()
        .map(|t| json!({"title": t, "link_flair_text": "", "source_url": "https://example.org"}))
        .collect();
    json!({
        "results": {
            category: {
                source: {"source": source, "category": category, "data": data, "error": ""}
            }
        }
    })
    .to_string()
}
