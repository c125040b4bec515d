use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::error::DailyFetchResult;
use crate::llm::Summarize;
use crate::mcp::{McpChannel, ToolDescriptor};
use crate::news::normalize;
use crate::news::summarize::{summarize_category, CategorySummary, NOTHING_TO_SUMMARIZE};
use crate::news::{NewsQuery, NewsResultSet};

/// Entry point of the fetch-and-summarize pipeline
#[derive(Clone)]
pub struct QueryOrchestrator {
    channel: McpChannel,
    tool_name: String,
}

/// Per-category outcomes of one query, in category order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub summaries: Vec<CategorySummary>,
}

impl QueryOrchestrator {
    pub fn new(channel: McpChannel, tool_name: impl Into<String>) -> Self {
        Self {
            channel,
            tool_name: tool_name.into(),
        }
    }

    pub fn channel(&self) -> &McpChannel {
        &self.channel
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub async fn list_tools(&self) -> DailyFetchResult<Vec<ToolDescriptor>> {
        self.channel.list_tools().await
    }

    /// Call the news tool and decode its payload.
    pub async fn fetch(&self, query: &NewsQuery) -> DailyFetchResult<NewsResultSet> {
        info!(
            categories = ?query.categories,
            sources = ?query.sources,
            "fetching news"
        );
        let raw = self
            .channel
            .call_tool(&self.tool_name, query.tool_arguments())
            .await?;
        normalize::parse(&raw)
    }

    /// Fetch and summarize every category. Channel and payload failures abort
    /// the whole query; a provider failure only marks its own category.
    pub async fn build_report(&self, query: &NewsQuery, sink: &dyn Summarize) -> DailyFetchResult<Report> {
        let results = self.fetch(query).await?;
        let mut report = Report::default();

        for (category, sources) in &results {
            let summary = match summarize_category(category, sources, sink).await {
                Ok(summary) => summary,
                Err(e) if !e.aborts_request() => {
                    error!(category = %category, error = %e, "category skipped");
                    CategorySummary::failed(category, format!("ERROR {}", e))
                }
                Err(e) => return Err(e),
            };
            report.summaries.push(summary);
        }
        Ok(report)
    }

    /// Run one query end to end and render the final text.
    pub async fn process_query(&self, query: &NewsQuery, sink: &dyn Summarize) -> DailyFetchResult<String> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("query", %request_id);
        let report = self.build_report(query, sink).instrument(span.clone()).await?;
        span.in_scope(|| {
            info!(
                categories = report.summaries.len(),
                failed = report.summaries.iter().filter(|s| s.is_error()).count(),
                "query complete"
            )
        });
        Ok(report.render())
    }
}

impl Report {
    /// Markdown report: one section per summarized category, then the failures.
    pub fn render(&self) -> String {
        if self.summaries.is_empty() {
            return format!("{}.", NOTHING_TO_SUMMARIZE);
        }

        let mut summary = String::new();
        let mut errors = String::new();
        for entry in &self.summaries {
            let section = format!(
                "\n\n**{}**  \n {}\n --- \n",
                capitalize(&entry.category),
                entry.text
            );
            if entry.is_error() {
                errors.push_str(&section);
            } else {
                summary.push_str(&section);
            }
        }

        if summary.is_empty() {
            return format!("{}  \n {}", NOTHING_TO_SUMMARIZE, errors);
        }
        if !errors.is_empty() {
            summary.push_str("\n\n**Errors**  \n");
            summary.push_str(&errors);
        }
        summary
    }
}

/// Upper-case the first character, lower-case the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
