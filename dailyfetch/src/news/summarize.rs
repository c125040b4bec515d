// Per-category summarization
use serde::Serialize;
use tracing::{info, warn};

use super::{CategoryResult, NewsItem};
use crate::error::{DailyFetchError, DailyFetchResult};
use crate::llm::Summarize;

pub const SOURCE_SEPARATOR: &str = "\n\n======\n\n";
pub const ERROR_PREFIX: &str = "ERROR in news results: ";
pub const NOTHING_TO_SUMMARIZE: &str = "No valid news results to summarize";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// The provider produced a summary
    Summarized,
    /// Every contributing source reported an error
    Failed,
    /// No source had data and none reported an error
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub text: String,
    pub status: SummaryStatus,
}

impl CategorySummary {
    pub fn failed(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
            status: SummaryStatus::Failed,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status != SummaryStatus::Summarized
    }
}

/// Summarize the sources of one category with a single provider call.
///
/// Errored sources are collected into the error text, empty sources are
/// skipped and the remaining items are flattened into one text block. Only a
/// provider failure is returned as `Err`.
pub async fn summarize_category<S: Summarize + ?Sized>(
    category: &str,
    results: &CategoryResult,
    sink: &S,
) -> DailyFetchResult<CategorySummary> {
    let mut text = String::new();
    let mut errors = String::new();

    for (source, result) in results {
        if !result.error.is_empty() {
            warn!(category, source = %source, error = %result.error, "source reported an error");
            errors.push_str(&error_tag(category, source, &result.error));
            continue;
        }
        if result.data.is_empty() {
            info!(category, source = %source, "source returned no items");
            continue;
        }
        match format_items(&result.data) {
            Ok(block) => {
                text.push_str(&block);
                text.push_str(SOURCE_SEPARATOR);
            }
            Err(reason) => {
                warn!(category, source = %source, %reason, "source data could not be formatted");
                errors.push_str(&error_tag(category, source, &reason));
            }
        }
    }

    if text.is_empty() {
        let summary = if errors.is_empty() {
            CategorySummary {
                category: category.to_string(),
                text: NOTHING_TO_SUMMARIZE.to_string(),
                status: SummaryStatus::Empty,
            }
        } else {
            CategorySummary::failed(category, format!("{}{}", ERROR_PREFIX, errors))
        };
        return Ok(summary);
    }

    let summary = sink.summarize(&text).await.map_err(|e| match e {
        DailyFetchError::SummarizationFailed(_) => e,
        other => DailyFetchError::SummarizationFailed(other.to_string()),
    })?;
    info!(category, chars = summary.len(), "category summarized");

    Ok(CategorySummary {
        category: category.to_string(),
        text: summary,
        status: SummaryStatus::Summarized,
    })
}

/// Render items as prompt lines; fails on the first item without a title.
pub fn format_items(items: &[NewsItem]) -> Result<String, String> {
    let mut out = String::new();
    for (idx, item) in items.iter().enumerate() {
        let title = item
            .title
            .as_deref()
            .ok_or_else(|| format!("item {} has no title", idx))?;
        match item.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => {
                out.push_str(&format!("Title: {}. Description: {}\n", title, description))
            }
            None => out.push_str(&format!("Title: {}\n", title)),
        }
    }
    Ok(out)
}

fn error_tag(category: &str, source: &str, error: &str) -> String {
    format!("[{}/{}] {}\n", category, source, error)
}
