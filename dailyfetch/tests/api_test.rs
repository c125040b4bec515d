mod support;

use mockito::{Matcher, ServerGuard};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use common::Config;
use dailyfetch::mcp::McpChannel;
use dailyfetch::orchestrator::QueryOrchestrator;
use dailyfetch::server::{build_rocket, AppState};
use support::{mock_close, mock_handshake, mock_news_call, news_payload};

const UNSET_KEY_ENV: &str = "DAILYFETCH_TEST_KEY_THAT_IS_NEVER_SET";

fn test_config(server: &ServerGuard) -> Config {
    let mut config = Config::default();
    config.mcp.url = format!("{}/mcp", server.url());
    config.llm.provider = "OPENAI".to_string();
    config.llm.api_key_env = Some(UNSET_KEY_ENV.to_string());
    config.llm.openai_base_url = server.url();
    config.server.static_dir = "/nonexistent/static".to_string();
    config
}

async fn client_for(server: &ServerGuard) -> Client {
    let config = test_config(server);
    let channel = McpChannel::from_config(&config.mcp).expect("channel");
    let orchestrator = QueryOrchestrator::new(channel, config.mcp.tool_name.clone());
    let state = AppState::new(Arc::new(config), orchestrator);
    let figment = rocket::Config::figment().merge(("log_level", "off"));
    Client::tracked(build_rocket(state, figment))
        .await
        .expect("valid rocket instance")
}

async fn select_openai(client: &Client) {
    let response = client
        .post("/set_model")
        .header(ContentType::JSON)
        .body(r#"{"model": "OPENAI", "api_key": "sk-test"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
}

async fn mock_openai(server: &mut ServerGuard, reply: &str) -> mockito::Mock {
    server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"choices": [{"message": {"role": "assistant", "content": reply}}]}).to_string())
        .create_async()
        .await
}

#[tokio::test]
async fn root_redirects_to_browser_ui() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server).await;

    let response = client.get("/").dispatch().await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/static/index.html"));
}

#[tokio::test]
async fn health_mirrors_tool_server_probe() {
    let mut server = mockito::Server::new_async().await;
    let up = server.mock("GET", "/health").with_status(200).create_async().await;
    let client = client_for(&server).await;

    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().await.as_deref(), Some("OK"));
    up.remove_async().await;

    let _down = server.mock("GET", "/health").with_status(500).create_async().await;
    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::ServiceUnavailable);
}

#[tokio::test]
async fn set_model_without_any_key_is_rejected() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server).await;

    let response = client
        .post("/set_model")
        .header(ContentType::JSON)
        .body(r#"{"model": "OPENAI"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    let body = response.into_string().await.unwrap_or_default();
    assert!(body.contains(UNSET_KEY_ENV));
}

#[tokio::test]
async fn set_model_reports_selected_provider() {
    let server = mockito::Server::new_async().await;
    let client = client_for(&server).await;

    let response = client
        .post("/set_model")
        .header(ContentType::JSON)
        .body(r#"{"model": "google", "api_key": "g-key"}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["model"], "GOOGLE");
    assert_eq!(body["model_name"], "gemini-2.5-flash");

    let status: Value = client
        .get("/api/v1/status")
        .dispatch()
        .await
        .into_json()
        .await
        .expect("status json");
    assert_eq!(status["provider"], "GOOGLE");
    assert_eq!(status["tool_name"], "news_fetcher");
}

#[tokio::test]
async fn list_model_tools_returns_schemas() {
    let mut server = mockito::Server::new_async().await;
    let _handshake = mock_handshake(&mut server).await;
    let _list = server
        .mock("POST", "/mcp")
        .match_body(Matcher::PartialJson(json!({"method": "tools/list"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(support::reply(json!({"tools": [{
            "name": "news_fetcher",
            "description": "Fetch news",
            "inputSchema": {"type": "object"}
        }]})))
        .create_async()
        .await;
    let _close = mock_close(&mut server).await;
    let client = client_for(&server).await;
    select_openai(&client).await;

    let response = client.get("/list_model_tools").dispatch().await;

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["model"], "OPENAI");
    assert_eq!(body["tools"][0]["name"], "news_fetcher");
    assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
}

#[tokio::test]
async fn summarize_news_returns_report() {
    let mut server = mockito::Server::new_async().await;
    let _handshake = mock_handshake(&mut server).await;
    let call = server
        .mock("POST", "/mcp")
        .match_body(Matcher::PartialJson(json!({
            "method": "tools/call",
            "params": {"arguments": {"sources": ["reddit"], "categories": ["technology", "science"]}}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body_from_request(support::reply(support::tool_result(&news_payload(
            "technology",
            "reddit",
            &["AI breakthrough"],
        ))))
        .create_async()
        .await;
    let _close = mock_close(&mut server).await;
    let _llm = mock_openai(&mut server, "- AI breakthrough").await;
    let client = client_for(&server).await;
    select_openai(&client).await;

    let response = client
        .post("/summarize_news?news_categories=technology&news_categories=science&news_sources=reddit")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let body = response.into_string().await.unwrap_or_default();
    assert!(body.contains("**Technology**"));
    assert!(body.contains("- AI breakthrough"));
    call.assert_async().await;
}

#[tokio::test]
async fn json_summarize_accepts_scalar_and_list() {
    let mut server = mockito::Server::new_async().await;
    let _handshake = mock_handshake(&mut server).await;
    let _call = mock_news_call(&mut server, &news_payload("sport", "guardian", &["Final score"])).await;
    let _close = mock_close(&mut server).await;
    let _llm = mock_openai(&mut server, "- Final score").await;
    let client = client_for(&server).await;
    select_openai(&client).await;

    let response = client
        .post("/api/v1/summarize")
        .header(ContentType::JSON)
        .body(r#"{"news_categories": "sport", "news_sources": ["guardian"]}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().await.unwrap_or_default().contains("**Sport**"));
}

#[tokio::test]
async fn values_outside_allow_lists_are_rejected_before_fetching() {
    let mut server = mockito::Server::new_async().await;
    let initialize = server.mock("POST", "/mcp").expect(0).create_async().await;
    let client = client_for(&server).await;
    select_openai(&client).await;

    let response = client
        .post("/summarize_news?news_categories=cooking&news_sources=reddit")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert!(response.into_string().await.unwrap_or_default().contains("category 'cooking'"));
    initialize.assert_async().await;
}

#[tokio::test]
async fn unreachable_tool_server_is_bad_request() {
    let mut server = mockito::Server::new_async().await;
    let _broken = server.mock("POST", "/mcp").with_status(502).create_async().await;
    let client = client_for(&server).await;
    select_openai(&client).await;

    let response = client.post("/summarize_news").dispatch().await;

    assert_eq!(response.status(), Status::BadRequest);
    assert!(response.into_string().await.unwrap_or_default().starts_with("ERROR"));
}
