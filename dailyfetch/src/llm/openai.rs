use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{read_success_body, ProviderKind};
use crate::error::{DailyFetchError, DailyFetchResult};

const SYSTEM_PROMPT: &str = "You are a news summarizer.";

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// `base_url` is the API root, e.g. "https://api.openai.com/v1"
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub async fn summarize(&self, text: &str) -> DailyFetchResult<String> {
        let req_body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                Message {
                    role: "user".to_string(),
                    content: Some(text.to_string()),
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await;
        let body = read_success_body(response, ProviderKind::OpenAi).await?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            DailyFetchError::SummarizationFailed(format!("unexpected OpenAI response shape: {}", e))
        })?;
        if let Some(usage) = &parsed.usage {
            tracing::info!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens.unwrap_or(0),
                completion_tokens = usage.completion_tokens.unwrap_or(0),
                "OpenAI summarization complete"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                DailyFetchError::SummarizationFailed("OpenAI response has no message content".to_string())
            })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
}
