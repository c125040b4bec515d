use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod normalize;
pub mod summarize;

/// category → source → result, as returned by the news tool
pub type NewsResultSet = BTreeMap<String, CategoryResult>;

/// source → result for one category
pub type CategoryResult = BTreeMap<String, SourceResult>;

/// Outcome of fetching one source for one category.
///
/// The tool server sets either `data` or `error`. A result carrying both is
/// reported as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<NewsItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
}

impl SourceResult {
    pub fn with_items(items: Vec<NewsItem>) -> Self {
        Self {
            data: items,
            ..Self::default()
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

/// A single headline.
///
/// `title` is only required when the item is formatted for summarization, so
/// decoding accepts items without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: Option<String>,
    /// Feeds published by the tool server name this field `link_flair_text`
    #[serde(default, alias = "link_flair_text")]
    pub description: Option<String>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<NewsItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<NewsItem>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A value given either as a single string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flatten into a list, dropping blank entries.
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(value: Vec<String>) -> Self {
        OneOrMany::Many(value)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(value: Vec<&str>) -> Self {
        OneOrMany::Many(value.into_iter().map(str::to_string).collect())
    }
}

/// The categories and sources one request asks the news tool for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub categories: Vec<String>,
    pub sources: Vec<String>,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            categories: vec!["general".to_string()],
            sources: vec!["googlenews".to_string()],
        }
    }
}

impl NewsQuery {
    /// Build a query; an empty side falls back to `general` / `googlenews`.
    pub fn new(categories: impl Into<OneOrMany>, sources: impl Into<OneOrMany>) -> Self {
        Self::with_fallback(
            categories.into().into_vec(),
            sources.into().into_vec(),
            &Self::default(),
        )
    }

    /// Build a query; an empty side is taken from `fallback`.
    pub fn with_fallback(categories: Vec<String>, sources: Vec<String>, fallback: &NewsQuery) -> Self {
        Self {
            categories: if categories.is_empty() {
                fallback.categories.clone()
            } else {
                categories
            },
            sources: if sources.is_empty() {
                fallback.sources.clone()
            } else {
                sources
            },
        }
    }

    /// Arguments of the news tool call
    pub fn tool_arguments(&self) -> serde_json::Value {
        serde_json::json!({
            "sources": self.sources,
            "categories": self.categories,
        })
    }

    /// Names of requested values missing from the allow-lists
    pub fn disallowed(&self, allowed_categories: &[String], allowed_sources: &[String]) -> Vec<String> {
        let bad_categories = self
            .categories
            .iter()
            .filter(|c| !allowed_categories.iter().any(|a| a.eq_ignore_ascii_case(c)))
            .map(|c| format!("category '{}'", c));
        let bad_sources = self
            .sources
            .iter()
            .filter(|s| !allowed_sources.iter().any(|a| a.eq_ignore_ascii_case(s)))
            .map(|s| format!("source '{}'", s));
        bad_categories.chain(bad_sources).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_result_accepts_null_data_and_flair_alias() {
        let json = r#"{
            "source": "googlenews",
            "category": "general",
            "data": [{"title": "Headline", "link_flair_text": "Some text", "source_url": "https://x"}],
            "error": ""
        }"#;
        let parsed: SourceResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].description.as_deref(), Some("Some text"));

        let errored: SourceResult =
            serde_json::from_str(r#"{"data": null, "error": "Error: timeout"}"#).unwrap();
        assert!(errored.data.is_empty());
        assert_eq!(errored.error, "Error: timeout");
    }

    #[test]
    fn scalar_and_list_inputs_normalize_to_lists() {
        let q = NewsQuery::new("technology", vec!["reddit", "guardian"]);
        assert_eq!(q.categories, vec!["technology"]);
        assert_eq!(q.sources, vec!["reddit", "guardian"]);

        let empty = NewsQuery::new(Vec::<String>::new(), " ");
        assert_eq!(empty, NewsQuery::default());
    }

    #[test]
    fn one_or_many_deserializes_both_shapes() {
        let one: OneOrMany = serde_json::from_str(r#""sport""#).unwrap();
        let many: OneOrMany = serde_json::from_str(r#"["sport", "science"]"#).unwrap();
        assert_eq!(one.into_vec(), vec!["sport"]);
        assert_eq!(many.into_vec(), vec!["sport", "science"]);
    }

    #[test]
    fn tool_arguments_carry_both_lists() {
        let q = NewsQuery::new("technology", "reddit");
        assert_eq!(
            q.tool_arguments(),
            serde_json::json!({"sources": ["reddit"], "categories": ["technology"]})
        );
    }

    #[test]
    fn disallowed_reports_unknown_values() {
        let q = NewsQuery::new(vec!["Technology", "cooking"], "myspace");
        let allowed_c = vec!["technology".to_string()];
        let allowed_s = vec!["reddit".to_string()];
        assert_eq!(
            q.disallowed(&allowed_c, &allowed_s),
            vec!["category 'cooking'", "source 'myspace'"]
        );
    }
}
