use std::time::Duration;

use backstop_net::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("request IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
    #[error("server answered {status}")]
    Status {
        status: u16,
        retry_after_secs: Option<u64>,
        body: String,
    },
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a `429 Too Many Requests` answer.
    pub fn is_throttled(&self) -> bool {
        self.status() == Some(429)
    }
}
