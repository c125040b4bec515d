//! Decoding of the news tool payload into a [`NewsResultSet`].
//!
//! The payload is text holding a nested mapping. It is decoded with a
//! structural JSON parser only. Before decoding, bare null tokens other than
//! JSON's `null` (`None`, `nil`) are rewritten to `null` so they decode as
//! absent values. Tokens inside string literals are left untouched.

use serde_json::Value;
use tracing::{debug, info};

use super::NewsResultSet;
use crate::error::{DailyFetchError, DailyFetchResult};
use crate::mcp::ToolInvocationResult;

/// Bare tokens decoded as JSON `null`
const NULL_TOKENS: &[&str] = &["None", "nil"];

const RESULTS_KEY: &str = "results";

/// Decode a tool invocation into a result set.
///
/// The first text block is preferred; a result without one falls back to
/// `structuredContent`.
pub fn parse(raw: &ToolInvocationResult) -> DailyFetchResult<NewsResultSet> {
    if let Some(text) = raw.first_text() {
        return parse_text(text);
    }
    match &raw.structured_content {
        Some(value) => extract_results(value.clone()),
        None => Err(DailyFetchError::MalformedPayload(
            "tool result has neither text content nor structured content".to_string(),
        )),
    }
}

/// Decode the textual payload of the news tool.
pub fn parse_text(text: &str) -> DailyFetchResult<NewsResultSet> {
    let canonical = substitute_null_tokens(text);
    let value: Value = serde_json::from_str(&canonical)
        .map_err(|e| DailyFetchError::MalformedPayload(format!("payload is not decodable: {}", e)))?;
    let results = extract_results(value)?;
    info!(
        categories = results.len(),
        preview = %preview(text, 100),
        "decoded news tool payload"
    );
    Ok(results)
}

fn extract_results(value: Value) -> DailyFetchResult<NewsResultSet> {
    let Value::Object(mut top) = value else {
        return Err(DailyFetchError::MalformedPayload(
            "payload is not a mapping".to_string(),
        ));
    };
    let results = top.remove(RESULTS_KEY).ok_or_else(|| {
        DailyFetchError::MalformedPayload(format!("payload has no '{}' key", RESULTS_KEY))
    })?;
    if results.is_null() {
        debug!("'results' is null, treating as empty");
        return Ok(NewsResultSet::new());
    }
    serde_json::from_value(results)
        .map_err(|e| DailyFetchError::MalformedPayload(format!("unexpected results shape: {}", e)))
}

/// Rewrite bare alternative null tokens to `null`, skipping string literals.
pub fn substitute_null_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((start, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    end = i + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &text[start..end];
            if NULL_TOKENS.contains(&word) {
                out.push_str("null");
            } else {
                out.push_str(word);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{CategoryResult, NewsItem, SourceResult};

    #[test]
    fn null_tokens_outside_strings_are_replaced() {
        let input = r#"{"a": None, "b": "None of it", "c": nil, "None": [None]}"#;
        assert_eq!(
            substitute_null_tokens(input),
            r#"{"a": null, "b": "None of it", "c": null, "None": [null]}"#
        );
    }

    #[test]
    fn identifiers_containing_a_token_are_kept() {
        assert_eq!(substitute_null_tokens("[Nonel, nils, true]"), "[Nonel, nils, true]");
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let input = r#"{"t": "say \"None\" loudly", "d": None}"#;
        assert_eq!(
            substitute_null_tokens(input),
            r#"{"t": "say \"None\" loudly", "d": null}"#
        );
    }

    #[test]
    fn parses_tool_payload_with_none_data() {
        let text = r#"{"results": {"technology": {
            "reddit": {"source": "reddit", "category": "technology", "data": None, "error": "Error: timeout"},
            "guardian": {"source": "guardian", "category": "technology", "data": [{"title": "X"}], "error": ""}
        }}}"#;
        let parsed = parse_text(text).unwrap();
        let tech = &parsed["technology"];
        assert!(tech["reddit"].data.is_empty());
        assert_eq!(tech["reddit"].error, "Error: timeout");
        assert_eq!(tech["guardian"].data, vec![NewsItem::new("X")]);
    }

    #[test]
    fn missing_results_key_is_malformed() {
        let err = parse_text(r#"{"items": {}}"#).unwrap_err();
        assert!(matches!(err, DailyFetchError::MalformedPayload(_)));
    }

    #[test]
    fn undecodable_text_is_malformed() {
        let err = parse_text("__import__('os').system('rm -rf /')").unwrap_err();
        assert!(matches!(err, DailyFetchError::MalformedPayload(_)));
    }

    #[test]
    fn empty_results_decode_to_empty_set() {
        assert!(parse_text(r#"{"results": {}}"#).unwrap().is_empty());
        assert!(parse_text(r#"{"results": null}"#).unwrap().is_empty());
    }

    #[test]
    fn serialized_result_set_decodes_back_to_equal_structure() {
        let mut sport = CategoryResult::new();
        sport.insert(
            "guardian".to_string(),
            SourceResult::with_items(vec![
                NewsItem::new("Final tonight").with_description("Cup final preview"),
                NewsItem::new("Transfer news"),
            ]),
        );
        sport.insert("reddit".to_string(), SourceResult::with_error("Error HTTP (429): slow down"));
        let mut expected = NewsResultSet::new();
        expected.insert("sport".to_string(), sport);
        expected.insert("science".to_string(), CategoryResult::new());

        let wire = serde_json::json!({ "results": expected }).to_string();
        assert_eq!(parse_text(&wire).unwrap(), expected);
    }

    #[test]
    fn structured_content_is_used_without_text() {
        let raw = ToolInvocationResult {
            content: Vec::new(),
            structured_content: Some(serde_json::json!({"results": {"general": {}}})),
            is_error: false,
        };
        let parsed = parse(&raw).unwrap();
        assert!(parsed.contains_key("general"));
    }
}
