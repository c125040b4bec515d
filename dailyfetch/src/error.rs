use thiserror::Error;

/// Failures of the fetch-and-summarize pipeline.
///
/// `Channel` and `MalformedPayload` abort a whole request, `SummarizationFailed`
/// only the category it happened in, and `MissingCredential` surfaces while a
/// model is being configured, before any network call.
#[derive(Error, Debug)]
pub enum DailyFetchError {
    #[error("Tool server channel error: {0}")]
    Channel(String),

    #[error("Malformed tool payload: {0}")]
    MalformedPayload(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type DailyFetchResult<T> = Result<T, DailyFetchError>;

impl DailyFetchError {
    /// HTTP status reported by the API for this error
    pub fn http_status_code(&self) -> u16 {
        match self {
            DailyFetchError::Channel(_) => 502,
            DailyFetchError::MalformedPayload(_) => 502,
            DailyFetchError::MissingCredential(_) => 400,
            DailyFetchError::SummarizationFailed(_) => 502,
            DailyFetchError::InvalidRequest(_) => 400,
        }
    }

    /// Whether the error ends the whole request rather than a single category
    pub fn aborts_request(&self) -> bool {
        !matches!(self, DailyFetchError::SummarizationFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(DailyFetchError::Channel("x".into()).http_status_code(), 502);
        assert_eq!(DailyFetchError::MalformedPayload("x".into()).http_status_code(), 502);
        assert_eq!(DailyFetchError::MissingCredential("x".into()).http_status_code(), 400);
        assert_eq!(DailyFetchError::SummarizationFailed("x".into()).http_status_code(), 502);
        assert_eq!(DailyFetchError::InvalidRequest("x".into()).http_status_code(), 400);
    }

    #[test]
    fn only_summarization_failures_are_category_scoped() {
        assert!(DailyFetchError::Channel("x".into()).aborts_request());
        assert!(DailyFetchError::MalformedPayload("x".into()).aborts_request());
        assert!(!DailyFetchError::SummarizationFailed("x".into()).aborts_request());
    }

    #[test]
    fn display_includes_detail() {
        let err = DailyFetchError::MissingCredential("GOOGLE_API_KEY not set".into());
        assert_eq!(err.to_string(), "Missing credential: GOOGLE_API_KEY not set");
    }
}
