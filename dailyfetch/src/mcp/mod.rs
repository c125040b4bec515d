//! Remote tool channel over MCP streamable HTTP, built on `rmcp`.
//!
//! A [`Session`] only exists once the `initialize` handshake has completed, so
//! a tool call can never be sent on an uninitialized session. The one-shot
//! helpers on [`McpChannel`] open a fresh session per logical request, run a
//! single operation and tear the session down again, even when the operation
//! failed. One deadline covers handshake, operation and teardown.

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, ClientJsonRpcMessage, Implementation,
    LoggingLevel, LoggingMessageNotificationParam, PaginatedRequestParam, ProtocolVersion,
    RawContent, ServerJsonRpcMessage,
};
use rmcp::service::{NotificationContext, RunningService};
use rmcp::transport::common::http_header::{EVENT_STREAM_MIME_TYPE, HEADER_SESSION_ID, JSON_MIME_TYPE};
use rmcp::transport::streamable_http_client::{
    SseError, StreamableHttpClient, StreamableHttpClientTransportConfig, StreamableHttpError,
    StreamableHttpPostResponse,
};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ClientHandler, RoleClient};
use serde_json::Value;
use sse_stream::{Sse, SseStream};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{DailyFetchError, DailyFetchResult};

/// Tool metadata advertised by the server
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInvocationResult {
    pub content: Vec<ToolContent>,
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

impl ToolInvocationResult {
    /// Text of the first text content block
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ToolContent::Text { text } => Some(text.as_str()),
            ToolContent::Other => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text { text: String },
    Other,
}

/// Connection settings for one tool server.
#[derive(Clone)]
pub struct McpChannel {
    url: String,
    health_url: String,
    timeout: Duration,
    health_timeout: Duration,
    client_name: String,
    http: reqwest::Client,
}

impl McpChannel {
    pub fn new(url: impl Into<String>, health_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("DailyFetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to create HTTP client, using default config: {}", e);
                reqwest::Client::new()
            });
        Self {
            url: url.into(),
            health_url: health_url.into(),
            timeout,
            health_timeout: Duration::from_secs(2),
            client_name: "dailyfetch".to_string(),
            http,
        }
    }

    pub fn from_config(config: &common::McpConfig) -> DailyFetchResult<Self> {
        let health_url = config
            .resolved_health_url()
            .map_err(|e| DailyFetchError::Channel(format!("{:#}", e)))?;
        let mut channel = Self::new(
            config.url.clone(),
            health_url,
            Duration::from_secs(config.timeout_seconds),
        );
        channel.health_timeout = Duration::from_secs(config.health_timeout_seconds);
        channel.client_name = config.client_name.clone();
        Ok(channel)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open an initialized session. The channel timeout bounds the whole
    /// session, including [`Session::close`].
    pub async fn open(&self) -> DailyFetchResult<Session> {
        self.open_until(Instant::now() + self.timeout).await
    }

    async fn open_until(&self, deadline: Instant) -> DailyFetchResult<Session> {
        info!(url = %self.url, "connecting to tool server");
        let http = SessionHttpClient::new(self.http.clone());
        let transport = StreamableHttpClientTransport::with_client(
            http.clone(),
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );
        let handler = NewsClientHandler {
            info: client_info(&self.client_name),
        };

        let handshake = tokio::time::timeout_at(deadline, rmcp::serve_client(handler, transport)).await;
        let service = match handshake {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => {
                // A session issued before the failure is deleted by the
                // transport as it shuts down.
                http.await_teardown(deadline).await;
                return Err(DailyFetchError::Channel(format!(
                    "handshake with {} failed: {}",
                    self.url, e
                )));
            }
            Err(_) => return Err(DailyFetchError::Channel("handshake timed out".to_string())),
        };

        if let Some(server) = service.peer().peer_info() {
            info!(
                server = %server.server_info.name,
                server_version = %server.server_info.version,
                session_id = http.session_id().unwrap_or("-"),
                protocol = ?server.protocol_version,
                "tool server session initialized"
            );
        }

        Ok(Session {
            service,
            http,
            deadline,
        })
    }

    /// List tools in a one-shot session.
    pub async fn list_tools(&self) -> DailyFetchResult<Vec<ToolDescriptor>> {
        let session = self.open().await?;
        let outcome = within(session.deadline, "tools/list", session.list_tools()).await;
        session.close().await;

        let tools = outcome?;
        for tool in &tools {
            info!(
                tool = %tool.name,
                description = tool.description.as_deref().unwrap_or(""),
                input_schema = %tool.input_schema,
                "available tool"
            );
        }
        Ok(tools)
    }

    /// Invoke one tool in a one-shot session.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> DailyFetchResult<ToolInvocationResult> {
        let session = self.open().await?;
        let outcome = within(session.deadline, "tools/call", session.call_tool(name, arguments)).await;
        session.close().await;
        outcome
    }

    /// GET the tool server's health endpoint; any non-success status is a failure.
    pub async fn probe_health(&self) -> DailyFetchResult<()> {
        let response = self
            .http
            .get(&self.health_url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| DailyFetchError::Channel(format!("error pinging the tool server: {}", e)))?;
        let status = response.status();
        if status.is_success() {
            debug!(url = %self.health_url, "tool server healthy");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DailyFetchError::Channel(format!(
            "tool server responded with status {}: {}",
            status, body
        )))
    }
}

async fn within<T, F>(deadline: Instant, what: &str, fut: F) -> DailyFetchResult<T>
where
    F: std::future::Future<Output = DailyFetchResult<T>>,
{
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| DailyFetchError::Channel(format!("{} timed out", what)))?
}

fn client_info(client_name: &str) -> ClientInfo {
    ClientInfo {
        protocol_version: ProtocolVersion::LATEST,
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: client_name.to_string(),
            title: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            icons: None,
            website_url: None,
        },
    }
}

#[derive(Clone)]
struct NewsClientHandler {
    info: ClientInfo,
}

impl ClientHandler for NewsClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let LoggingMessageNotificationParam { level, logger, data } = params;
        let logger = logger.as_deref().unwrap_or("-");
        match level {
            LoggingLevel::Critical | LoggingLevel::Error => error!(logger, %data, "tool server log"),
            LoggingLevel::Warning => warn!(logger, %data, "tool server log"),
            LoggingLevel::Debug => debug!(logger, %data, "tool server log"),
            _ => info!(logger, %data, "tool server log"),
        }
    }
}

/// reqwest-backed HTTP side of one session.
///
/// Remembers the session id the server issued and signals once the transport
/// has sent the session `DELETE`, so teardown can be awaited.
#[derive(Clone)]
struct SessionHttpClient {
    client: reqwest::Client,
    session_id: Arc<OnceLock<String>>,
    deleted: Arc<Notify>,
}

impl SessionHttpClient {
    fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            session_id: Arc::new(OnceLock::new()),
            deleted: Arc::new(Notify::new()),
        }
    }

    fn session_id(&self) -> Option<&str> {
        self.session_id.get().map(String::as_str)
    }

    /// Wait until the issued session has been deleted, or the deadline passes.
    async fn await_teardown(&self, deadline: Instant) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        if tokio::time::timeout_at(deadline, self.deleted.notified()).await.is_err() {
            warn!(session_id, "session teardown not confirmed before the deadline");
        }
    }
}

impl StreamableHttpClient for SessionHttpClient {
    type Error = reqwest::Error;

    // One-shot sessions never wait for server-initiated messages, so the
    // standalone event stream is not opened.
    async fn get_stream(
        &self,
        _uri: Arc<str>,
        _session_id: Arc<str>,
        _last_event_id: Option<String>,
        _auth_token: Option<String>,
    ) -> Result<futures_util::stream::BoxStream<'static, Result<Sse, SseError>>, StreamableHttpError<Self::Error>>
    {
        Err(StreamableHttpError::ServerDoesNotSupportSse)
    }

    async fn delete_session(
        &self,
        uri: Arc<str>,
        session: Arc<str>,
        auth_token: Option<String>,
    ) -> Result<(), StreamableHttpError<Self::Error>> {
        let mut request = self.client.delete(uri.as_ref()).header(HEADER_SESSION_ID, session.as_ref());
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let outcome = request.send().await;
        let result = match outcome {
            Ok(response)
                if response.status().is_success()
                    || response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED =>
            {
                debug!(session_id = %session, "session closed");
                Ok(())
            }
            Ok(response) => {
                warn!(session_id = %session, status = %response.status(), "session close rejected");
                response.error_for_status().map(|_| ()).map_err(StreamableHttpError::from)
            }
            Err(e) => {
                warn!(session_id = %session, error = %e, "session close failed");
                Err(StreamableHttpError::from(e))
            }
        };
        self.deleted.notify_one();
        result
    }

    async fn post_message(
        &self,
        uri: Arc<str>,
        message: ClientJsonRpcMessage,
        session_id: Option<Arc<str>>,
        auth_token: Option<String>,
    ) -> Result<StreamableHttpPostResponse, StreamableHttpError<Self::Error>> {
        let mut request = self
            .client
            .post(uri.as_ref())
            .header(ACCEPT, [EVENT_STREAM_MIME_TYPE, JSON_MIME_TYPE].join(", "));
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(session_id) = session_id {
            request = request.header(HEADER_SESSION_ID, session_id.as_ref());
        }

        let response = request.json(&message).send().await?;
        let status = response.status();
        let response = response.error_for_status()?;
        debug!(%status, "tool server replied");

        if matches!(status, reqwest::StatusCode::ACCEPTED | reqwest::StatusCode::NO_CONTENT) {
            return Ok(StreamableHttpPostResponse::Accepted);
        }

        let issued = response
            .headers()
            .get(HEADER_SESSION_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(id) = &issued {
            let _ = self.session_id.set(id.clone());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(str::to_string);
        match content_type.as_deref() {
            Some(ct) if ct.starts_with(EVENT_STREAM_MIME_TYPE) => {
                let events = SseStream::from_byte_stream(response.bytes_stream()).boxed();
                Ok(StreamableHttpPostResponse::Sse(events, issued))
            }
            Some(ct) if ct.starts_with(JSON_MIME_TYPE) => {
                let message: ServerJsonRpcMessage = response.json().await?;
                Ok(StreamableHttpPostResponse::Json(message, issued))
            }
            _ => {
                // Some servers answer notifications with an empty 200 and no content type.
                let bytes = response.bytes().await?;
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    return Ok(StreamableHttpPostResponse::Accepted);
                }
                match serde_json::from_slice::<ServerJsonRpcMessage>(&bytes) {
                    Ok(message) => Ok(StreamableHttpPostResponse::Json(message, issued)),
                    Err(_) => Err(StreamableHttpError::UnexpectedContentType(content_type)),
                }
            }
        }
    }
}

/// An initialized MCP session.
pub struct Session {
    service: RunningService<RoleClient, NewsClientHandler>,
    http: SessionHttpClient,
    deadline: Instant,
}

impl Session {
    /// Server-assigned session id, if the server issued one
    pub fn id(&self) -> Option<&str> {
        self.http.session_id()
    }

    /// All tools advertised by the server, following pagination cursors.
    pub async fn list_tools(&self) -> DailyFetchResult<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .service
                .peer()
                .list_tools(Some(PaginatedRequestParam { cursor }))
                .await
                .map_err(|e| DailyFetchError::Channel(format!("tools/list failed: {}", e)))?;
            tools.extend(page.tools.into_iter().map(|tool| ToolDescriptor {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: Value::Object((*tool.input_schema).clone()),
            }));
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Invoke `name`; a result flagged `isError` is reported as a channel error.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> DailyFetchResult<ToolInvocationResult> {
        info!(tool = %name, arguments = %arguments, "calling tool");
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(DailyFetchError::Channel(format!(
                    "tool arguments must be an object, got {}",
                    other
                )))
            }
        };
        let result = self
            .service
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| DailyFetchError::Channel(format!("tools/call '{}' failed: {}", name, e)))?;

        let invocation = ToolInvocationResult {
            content: result
                .content
                .into_iter()
                .map(|block| match block.raw {
                    RawContent::Text(text) => ToolContent::Text { text: text.text },
                    _ => ToolContent::Other,
                })
                .collect(),
            structured_content: result.structured_content,
            is_error: result.is_error.unwrap_or(false),
        };
        if invocation.is_error {
            return Err(DailyFetchError::Channel(format!(
                "tool '{}' reported an error: {}",
                name,
                invocation.first_text().unwrap_or("no details")
            )));
        }
        Ok(invocation)
    }

    /// Stop the session and delete it on the server, within the session
    /// deadline. Failures are logged, not returned.
    pub async fn close(self) {
        let Session {
            service,
            http,
            deadline,
        } = self;
        match tokio::time::timeout_at(deadline, service.cancel()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "session task ended abnormally"),
            Err(_) => {
                warn!(session_id = http.session_id().unwrap_or("-"), "session teardown timed out");
                return;
            }
        }
        http.await_teardown(deadline).await;
    }
}
