use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapydError {
    #[error("failed to build request: {0}")]
    Build(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("{url} returned {status}")]
    Http {
        status: StatusCode,
        url: String,
        body: Option<String>,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    /// The daemon answered but reported something other than `"ok"`.
    #[error("{url} rejected the request (status={status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        url: String,
        status: String,
        message: Option<String>,
    },
    #[error("io error while {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ScrapydError {
    pub(crate) fn io(action: &'static str, source: std::io::Error) -> Self {
        Self::Io { action, source }
    }

    /// Whether the failure happened before the daemon produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ScrapydError::Timeout | ScrapydError::Network(_) | ScrapydError::Http { .. }
        )
    }
}
