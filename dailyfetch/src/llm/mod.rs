use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::{DailyFetchError, DailyFetchResult};

pub mod google;
pub mod openai;

use google::GoogleProvider;
use openai::OpenAiProvider;

/// Text-to-text summarization capability implemented by every provider
#[async_trait::async_trait]
pub trait Summarize: Send + Sync {
    /// Summarize `text`; any transport or shape failure is `SummarizationFailed`
    async fn summarize(&self, text: &str) -> DailyFetchResult<String>;
}

/// Supported inference providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderKind {
    Google,
    OpenAi,
}

impl ProviderKind {
    /// Case-insensitive "GOOGLE" selects Google; anything else selects OpenAI.
    pub fn from_config_str(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("GOOGLE") {
            ProviderKind::Google
        } else {
            ProviderKind::OpenAi
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Google => "gemini-2.5-flash",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_key_env(self) -> &'static str {
        match self {
            ProviderKind::Google => "GOOGLE_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "GOOGLE"),
            ProviderKind::OpenAi => write!(f, "OPENAI"),
        }
    }
}

/// Everything needed to build a [`ModelAdapter`] apart from the credential lookup.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl ModelSettings {
    /// Settings for `provider` taken from the `[llm]` config section.
    pub fn from_config(config: &common::LlmConfig, provider: &str, api_key: Option<String>) -> Self {
        let kind = ProviderKind::from_config_str(provider);
        let base_url = match kind {
            ProviderKind::Google => config.google_base_url.clone(),
            ProviderKind::OpenAi => config.openai_base_url.clone(),
        };
        // Model name and key variable configured for another provider must not leak across.
        let configured = ProviderKind::from_config_str(&config.provider) == kind;
        Self {
            kind,
            model: config.model.clone().filter(|_| configured),
            api_key,
            api_key_env: config.api_key_env.clone().filter(|_| configured),
            base_url,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

enum Provider {
    Google(GoogleProvider),
    OpenAi(OpenAiProvider),
}

/// A configured provider: identifier, model name and resolved credential.
///
/// Built once per configuration change and shared read-only afterwards.
pub struct ModelAdapter {
    kind: ProviderKind,
    model: String,
    provider: Provider,
}

impl ModelAdapter {
    /// Build an adapter resolving the credential from the process environment.
    pub fn new(settings: ModelSettings) -> DailyFetchResult<Self> {
        Self::with_env(settings, |key| std::env::var(key).ok())
    }

    /// Build an adapter with an explicit environment lookup.
    ///
    /// Fails with `MissingCredential` before any network activity when neither
    /// an explicit key nor the environment provides one.
    pub fn with_env<F>(settings: ModelSettings, env: F) -> DailyFetchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = settings.kind;
        let key_env = settings
            .api_key_env
            .clone()
            .unwrap_or_else(|| kind.default_key_env().to_string());
        let api_key = resolve_credential(settings.api_key.as_deref(), &key_env, env)?;
        let model = settings
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        let provider = match kind {
            ProviderKind::Google => Provider::Google(GoogleProvider::new(
                &settings.base_url,
                api_key,
                &model,
                settings.timeout,
            )),
            ProviderKind::OpenAi => Provider::OpenAi(OpenAiProvider::new(
                &settings.base_url,
                api_key,
                &model,
                settings.timeout,
            )),
        };
        tracing::info!(provider = %kind, model = %model, "model adapter configured");

        Ok(Self {
            kind,
            model,
            provider,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Summarize for ModelAdapter {
    async fn summarize(&self, text: &str) -> DailyFetchResult<String> {
        match &self.provider {
            Provider::Google(p) => p.summarize(text).await,
            Provider::OpenAi(p) => p.summarize(text).await,
        }
    }
}

/// Explicit non-empty key first, then the environment variable `key_env`.
pub fn resolve_credential<F>(explicit: Option<&str>, key_env: &str, env: F) -> DailyFetchResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match env(key_env).filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(key),
        None => {
            tracing::error!(env = key_env, "no API key supplied and environment variable unset");
            Err(DailyFetchError::MissingCredential(format!(
                "no API key given and {} is not set",
                key_env
            )))
        }
    }
}

/// Read a whole provider response, mapping transport problems to `SummarizationFailed`.
pub(crate) async fn read_success_body(
    response: Result<reqwest::Response, reqwest::Error>,
    provider: ProviderKind,
) -> DailyFetchResult<String> {
    let response = response.map_err(|e| {
        let reason = if e.is_timeout() { "timed out" } else { "request failed" };
        DailyFetchError::SummarizationFailed(format!("{} {}: {}", provider, reason, e))
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        DailyFetchError::SummarizationFailed(format!("{} response unreadable: {}", provider, e))
    })?;
    if !status.is_success() {
        return Err(DailyFetchError::SummarizationFailed(format!(
            "{} API error {}: {}",
            provider, status, body
        )));
    }
    Ok(body)
}
