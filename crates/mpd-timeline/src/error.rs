use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum TimelineError {
    // Segment index box decoding
    #[error("Segment index box declares {declared} bytes but only {available} are available")]
    IndexTooShort { declared: u64, available: usize },

    #[error("Unexpected box type {0:?}, expected sidx")]
    IndexSignature([u8; 4]),

    #[error("Hierarchical segment index references are not supported")]
    NestedIndexUnsupported,

    #[error(transparent)]
    IndexRead(#[from] std::io::Error),

    // Manifest consistency
    #[error("Dynamic manifest is missing {0}")]
    MissingDynamicTimestamp(&'static str),

    #[error("Invalid SegmentTimeline: {0}")]
    InvalidTimeline(String),

    #[error("Invalid byte range: {0:?}")]
    InvalidByteRange(String),

    #[error("Invalid base url")]
    InvalidBaseUrl,

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    // Index fetching
    #[error("Failed to fetch segment index from {url}")]
    IndexFetch {
        url: Url,
        #[source]
        source: FetchError,
    },
}

/// Outcome of a single index request attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl FetchError {
    /// Timeouts and transient server statuses are worth another attempt.
    /// Everything else, `404 Not Found` included, is definitive.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::Status(status) => matches!(status.as_u16(), 408 | 500 | 502 | 503 | 504),
            FetchError::Request(error) => error.is_timeout(),
            FetchError::Cancelled => false,
        }
    }
}

pub type TimelineResult<T> = Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!FetchError::Status(StatusCode::NOT_FOUND).is_retryable());
        assert!(!FetchError::Status(StatusCode::FORBIDDEN).is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
    }
}
