//! Error types for the research pipeline

use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Upstream returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Event stream closed: {0}")]
    StreamClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResearchError {
    pub fn api(msg: impl Into<String>) -> Self {
        ResearchError::Api(msg.into())
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        ResearchError::Http {
            status,
            body: body.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        ResearchError::Network(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        ResearchError::Timeout(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        ResearchError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ResearchError::Config(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ResearchError::InvalidRequest(msg.into())
    }

    pub fn stream_closed(msg: impl Into<String>) -> Self {
        ResearchError::StreamClosed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ResearchError::Internal(msg.into())
    }

    /// Whether a model call that failed with this error may be attempted again.
    ///
    /// Only transport failures, rate limiting and upstream 5xx responses qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResearchError::Network(_) | ResearchError::Timeout(_) => true,
            ResearchError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the client side of the stream went away
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, ResearchError::StreamClosed(_))
    }
}

/// Result type alias for research operations
pub type ResearchResult<T> = Result<T, ResearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ResearchError::network("reset").is_retryable());
        assert!(ResearchError::timeout("120s").is_retryable());
        assert!(ResearchError::http(429, "slow down").is_retryable());
        assert!(ResearchError::http(503, "unavailable").is_retryable());
        assert!(!ResearchError::http(401, "bad key").is_retryable());
        assert!(!ResearchError::parse("no choices").is_retryable());
        assert!(!ResearchError::config("missing key").is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ResearchError::http(500, "boom").to_string(),
            "Upstream returned 500: boom"
        );
        assert_eq!(
            ResearchError::api("quota exceeded").to_string(),
            "API error: quota exceeded"
        );
    }
}
