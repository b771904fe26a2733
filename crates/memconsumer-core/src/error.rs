//! Error types for memconsumer-core

use crate::{Response, StatusCode};
use thiserror::Error;

/// Result type alias for memconsumer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the memory consumer service
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Route could not be registered
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] memconsumer_router::InsertError),

    /// Path parameter missing or not parseable
    #[error("Invalid path parameter `{name}`: {reason}")]
    InvalidParam { name: String, reason: String },

    /// Memory figures could not be read from the platform
    #[error("Memory information unavailable: {0}")]
    MemoryUnavailable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidMethod(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as a plain-text error response
    pub fn into_response(self) -> Response {
        Response::error(self.status(), &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_param_is_client_error() {
        let err = Error::InvalidParam {
            name: "bytes".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let res = err.into_response();
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            res.body_string().as_deref(),
            Some("Invalid path parameter `bytes`: invalid digit found in string\n")
        );
    }

    #[test]
    fn test_other_errors_are_server_errors() {
        let err = Error::MemoryUnavailable("no statm".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
