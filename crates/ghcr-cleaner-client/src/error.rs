//! Error types for ghcr-cleaner-client

use ghcr_cleaner_core::CleanerError;
use thiserror::Error;

/// Errors that can occur while talking to GitHub or the registry
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status code
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Response body could not be decoded
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Registry token exchange failed
    #[error("registry authentication failed: {0}")]
    Auth(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl ClientError {
    /// Error for a request that got a non-success status back.
    pub fn from_status(method: &reqwest::Method, url: &str, status: u16, body: &[u8]) -> Self {
        ClientError::Status {
            method: method.as_str().to_string(),
            url: url.to_string(),
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for CleanerError {
    fn from(err: ClientError) -> Self {
        CleanerError::Inventory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ClientError::Status {
            method: "GET".to_string(),
            url: "https://api.github.com/repos/o/r/pulls/1".to_string(),
            status: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("returned 404"));
    }

    #[test]
    fn test_status_error_keeps_request_method() {
        let err = ClientError::from_status(
            &reqwest::Method::PUT,
            "https://api.github.com/x",
            409,
            b"conflict",
        );
        assert!(err.to_string().starts_with("PUT https://api.github.com/x returned 409"));

        let err = ClientError::from_status(&reqwest::Method::DELETE, "u", 404, b"");
        assert!(matches!(err, ClientError::Status { ref method, .. } if method == "DELETE"));
    }
}
