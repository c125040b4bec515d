use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{read_success_body, ProviderKind};
use crate::error::{DailyFetchError, DailyFetchResult};

const PROMPT_PREFIX: &str = "Summarize the following news article. The result must be presented as a bullet point list in a markdown format. Here are the news:\n\n";

/// Gemini `generateContent` provider
pub struct GoogleProvider {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// `base_url` is the API host, e.g. "https://generativelanguage.googleapis.com"
    pub fn new(base_url: &str, api_key: impl Into<String>, model: &str, timeout: Duration) -> Self {
        Self {
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key: api_key.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub async fn summarize(&self, text: &str) -> DailyFetchResult<String> {
        let req_body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(format!("{}{}", PROMPT_PREFIX, text)),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("x-goog-api-key", &self.api_key)
            .json(&req_body)
            .send()
            .await;
        let body = read_success_body(response, ProviderKind::Google).await?;

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            DailyFetchError::SummarizationFailed(format!("unexpected Gemini response shape: {}", e))
        })?;

        let summary: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if summary.is_empty() {
            return Err(DailyFetchError::SummarizationFailed(
                "Gemini response has no text candidates".to_string(),
            ));
        }
        tracing::info!(chars = summary.len(), "Gemini summarization complete");
        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}
