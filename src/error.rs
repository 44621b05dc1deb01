// SPDX-License-Identifier: MIT

//! Error types for the router synchronization core

use thiserror::Error;

/// Main application error type
///
/// Policy rejections and partial bulk failures are deliberately absent:
/// those are structured results, not errors (see the adapter result types).
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect/read/write failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// `!trap` in reply to `/login`
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed length framing or unexpected sentence shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `!trap` on any command other than `/login`, carries the router's message
    #[error("RouterOS error: {0}")]
    RouterApi(String),

    /// Collaborator store failure (ban source, config store, audit sink, cache)
    #[error("Store error: {0}")]
    Store(String),
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Network("operation timed out".to_string())
    }
}

/// Convenient alias for Result with application error
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = AppError::Config("missing host".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing host");
    }

    #[test]
    fn test_router_api_error() {
        let err = AppError::RouterApi("no such item".to_string());
        assert_eq!(err.to_string(), "RouterOS error: no such item");
    }

    #[test]
    fn test_authentication_error() {
        let err = AppError::Authentication("invalid user name or password".to_string());
        assert!(err.to_string().starts_with("Authentication failed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    // audit rows and adapter result messages carry this string verbatim
    #[test]
    fn test_io_error_includes_source() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset by peer");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.to_string(), "IO error: connection reset by peer");
    }
}
