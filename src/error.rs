//! Error types at the aggregation boundary

use crate::models::AggregateResult;

/// Transport or HTTP failure from one upstream source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    /// HTTP status when the upstream answered, `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "upstream returned {}: {}", status, self.message),
            None => write!(f, "upstream request failed: {}", self.message),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::status(status.as_u16(), err.to_string()),
            None => FetchError::transport(err.to_string()),
        }
    }
}

/// Failure of a whole aggregation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Every source in the decisive round failed.
    AllSourcesFailed { message: String },
    /// The caller's deadline elapsed; the late result was discarded.
    Timeout { after_ms: u64 },
}

impl AggregateError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Empty page for callers that render a degraded state.
    pub fn degraded_result(&self, virtual_page: u32) -> AggregateResult {
        AggregateResult::empty(virtual_page)
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllSourcesFailed { message } => write!(f, "all sources failed: {}", message),
            Self::Timeout { after_ms } => write!(f, "aggregation timed out after {}ms", after_ms),
        }
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(
            FetchError::status(503, "maintenance").to_string(),
            "upstream returned 503: maintenance"
        );
        assert_eq!(
            FetchError::transport("connection reset").to_string(),
            "upstream request failed: connection reset"
        );
    }

    #[test]
    fn test_degraded_result_is_empty() {
        let err = AggregateError::AllSourcesFailed {
            message: "movie: timeout".to_string(),
        };
        let page = err.degraded_result(3);
        assert_eq!(page.virtual_page, 3);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages_estimate, 0);
        assert!(err.message().contains("movie: timeout"));
    }
}
