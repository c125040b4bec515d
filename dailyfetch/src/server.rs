use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::status::{Created, Custom};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use common::Config;

use crate::error::{DailyFetchError, DailyFetchResult};
use crate::llm::{ModelAdapter, ModelSettings, ProviderKind};
use crate::news::{NewsQuery, OneOrMany};
use crate::orchestrator::QueryOrchestrator;

/// Application state stored inside Rocket managed state.
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub orchestrator: QueryOrchestrator,
    /// Active summarization model. Replaced wholesale by `/set_model`; every
    /// request works on the snapshot it cloned when it started.
    model: RwLock<Option<Arc<ModelAdapter>>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, orchestrator: QueryOrchestrator) -> Self {
        Self {
            started_at: Utc::now(),
            config,
            orchestrator,
            model: RwLock::new(None),
        }
    }

    /// Build an adapter for `provider` and make it the active one.
    ///
    /// The slot is left untouched when the credential cannot be resolved.
    pub async fn configure_model(&self, provider: &str, api_key: Option<String>) -> DailyFetchResult<Arc<ModelAdapter>> {
        let settings = ModelSettings::from_config(&self.config.llm, provider, api_key);
        let adapter = Arc::new(ModelAdapter::new(settings)?);
        *self.model.write().await = Some(adapter.clone());
        Ok(adapter)
    }

    /// Snapshot of the active adapter, configuring the default provider on first use.
    pub async fn current_model(&self) -> DailyFetchResult<Arc<ModelAdapter>> {
        if let Some(adapter) = self.model.read().await.as_ref() {
            return Ok(adapter.clone());
        }
        let provider = self.config.llm.provider.clone();
        tracing::info!(provider = %provider, "no model selected yet, using configured default");
        let settings = ModelSettings::from_config(&self.config.llm, &provider, None);
        let adapter = Arc::new(ModelAdapter::new(settings)?);
        Ok(self.install_default(adapter).await)
    }

    /// Fill an empty slot with `adapter`. A model selected while the default
    /// was being built wins and is returned instead.
    async fn install_default(&self, adapter: Arc<ModelAdapter>) -> Arc<ModelAdapter> {
        let mut slot = self.model.write().await;
        match slot.as_ref() {
            Some(selected) => selected.clone(),
            None => {
                *slot = Some(adapter.clone());
                adapter
            }
        }
    }

    async fn model_snapshot(&self) -> Option<Arc<ModelAdapter>> {
        self.model.read().await.clone()
    }

    fn default_query(&self) -> NewsQuery {
        NewsQuery::with_fallback(
            self.config.query.default_categories.clone(),
            self.config.query.default_sources.clone(),
            &NewsQuery::default(),
        )
    }
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    provider: Option<ProviderKind>,
    model: Option<String>,
    tool_server: String,
    tool_name: String,
}

/// Body of `/set_model`.
#[derive(Deserialize)]
struct SetModelRequest {
    model: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ModelResponse {
    model: ProviderKind,
    model_name: String,
}

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: Option<String>,
    input_schema: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    model: ProviderKind,
    tools: Vec<ToolInfo>,
}

/// Body of `/api/v1/summarize`; each field takes a string or a list.
#[derive(Deserialize, Default)]
struct SummarizeRequest {
    #[serde(default)]
    news_categories: Option<OneOrMany>,
    #[serde(default)]
    news_sources: Option<OneOrMany>,
}

type ApiError = Custom<String>;

fn api_error(err: &DailyFetchError) -> ApiError {
    let status = Status::from_code(err.http_status_code()).unwrap_or(Status::InternalServerError);
    Custom(status, err.to_string())
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

/// "OK" only while the tool server answers its health probe.
#[get("/health")]
async fn health(state: &State<AppState>) -> Result<&'static str, ApiError> {
    state
        .orchestrator
        .channel()
        .probe_health()
        .await
        .map(|_| "OK")
        .map_err(|e| {
            tracing::warn!(error = %e, "tool server health probe failed");
            Custom(Status::ServiceUnavailable, e.to_string())
        })
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let model = state.model_snapshot().await;

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        provider: model.as_ref().map(|m| m.kind()),
        model: model.as_ref().map(|m| m.model().to_string()),
        tool_server: state.orchestrator.channel().url().to_string(),
        tool_name: state.orchestrator.tool_name().to_string(),
    })
}

#[post("/set_model", format = "json", data = "<body>")]
async fn set_model(
    state: &State<AppState>,
    body: Json<SetModelRequest>,
) -> Result<Created<Json<ModelResponse>>, ApiError> {
    let request = body.into_inner();
    let adapter = state
        .configure_model(&request.model, request.api_key)
        .await
        .map_err(|e| {
            tracing::error!(model = %request.model, error = %e, "failed to configure model");
            api_error(&e)
        })?;

    Ok(Created::new("/set_model").body(Json(ModelResponse {
        model: adapter.kind(),
        model_name: adapter.model().to_string(),
    })))
}

#[get("/list_model_tools")]
async fn list_model_tools(state: &State<AppState>) -> Result<Json<ToolListResponse>, ApiError> {
    let adapter = state.current_model().await.map_err(|e| api_error(&e))?;
    let tools = state.orchestrator.list_tools().await.map_err(|e| {
        tracing::error!(error = %e, "listing tools failed");
        api_error(&e)
    })?;

    Ok(Json(ToolListResponse {
        model: adapter.kind(),
        tools: tools
            .into_iter()
            .map(|t| ToolInfo {
                name: t.name,
                description: t.description,
                input_schema: t.input_schema,
            })
            .collect(),
    }))
}

#[post("/summarize_news?<news_categories>&<news_sources>")]
async fn summarize_news(
    state: &State<AppState>,
    news_categories: Option<Vec<String>>,
    news_sources: Option<Vec<String>>,
) -> Result<String, ApiError> {
    let query = NewsQuery::with_fallback(
        OneOrMany::Many(news_categories.unwrap_or_default()).into_vec(),
        OneOrMany::Many(news_sources.unwrap_or_default()).into_vec(),
        &state.default_query(),
    );
    run_summary(state, query).await
}

#[post("/api/v1/summarize", format = "json", data = "<body>")]
async fn summarize_json(state: &State<AppState>, body: Json<SummarizeRequest>) -> Result<String, ApiError> {
    let request = body.into_inner();
    let query = NewsQuery::with_fallback(
        request.news_categories.map(OneOrMany::into_vec).unwrap_or_default(),
        request.news_sources.map(OneOrMany::into_vec).unwrap_or_default(),
        &state.default_query(),
    );
    run_summary(state, query).await
}

/// Shared body of both summarize routes. Every failure is a 400 carrying the reason.
async fn run_summary(state: &AppState, query: NewsQuery) -> Result<String, ApiError> {
    let rejected = query.disallowed(
        &state.config.query.allowed_categories,
        &state.config.query.allowed_sources,
    );
    if !rejected.is_empty() {
        let err = DailyFetchError::InvalidRequest(format!("unsupported {}", rejected.join(", ")));
        tracing::warn!(error = %err, "rejecting summarize request");
        return Err(Custom(Status::BadRequest, err.to_string()));
    }

    let bad_request = |e: DailyFetchError| {
        tracing::error!(error = %e, "summarize request failed");
        Custom(Status::BadRequest, format!("ERROR: {}", e))
    };
    let model = state.current_model().await.map_err(bad_request)?;
    let report = state
        .orchestrator
        .process_query(&query, model.as_ref())
        .await
        .map_err(bad_request)?;
    report_response(report)
}

/// A rendered report that is itself an error text goes out as a 400.
fn report_response(report: String) -> Result<String, ApiError> {
    if report.starts_with("ERROR") {
        return Err(Custom(Status::BadRequest, report));
    }
    Ok(report)
}

/// Rocket figment with `[server]` bind and port applied.
pub fn figment(config: &Config) -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("address", config.server.bind.clone()))
        .merge(("port", config.server.port))
}

/// Assemble the Rocket instance: routes, managed state and the browser UI.
pub fn build_rocket(state: AppState, figment: rocket::figment::Figment) -> Rocket<Build> {
    let static_dir = state.config.server.static_dir.clone();
    let rocket = rocket::custom(figment).manage(state).mount(
        "/",
        routes![
            index_redirect,
            health,
            status,
            set_model,
            list_model_tools,
            summarize_news,
            summarize_json,
        ],
    );

    if Path::new(&static_dir).is_dir() {
        rocket.mount("/static", FileServer::from(static_dir))
    } else {
        tracing::warn!(dir = %static_dir, "static directory not found, browser UI disabled");
        rocket
    }
}

/// Launch the HTTP API and run until shutdown.
pub async fn launch_rocket(state: AppState) -> Result<()> {
    let fig = figment(&state.config);
    tracing::info!(
        bind = %state.config.server.bind,
        port = state.config.server.port,
        "Starting Rocket HTTP server"
    );
    build_rocket(state, fig)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
