//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout pgcrud.
//! Every client operation returns a `Result` carrying one of these errors instead of
//! printing and swallowing it; callers decide whether to halt or continue.
//!
//! # Error Categories
//! - `NotConnected`: Operation attempted before `connect` or after `close`
//! - `ConnectionFailed`: Database connection errors
//! - `QueryFailed`: Statement preparation, execution or decoding errors
//! - `InvalidInput`: Rejected identifiers, column definitions, arguments or queries
//! - `ConfigError`: Connection profile or environment resolution errors
//! - `Io`: Writing status output failed

use thiserror::Error;

/// Main error type for pgcrud operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// No open connection
    #[error("Not connected: call connect() before running statements")]
    NotConnected,

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Invalid input (identifier, column definition, argument, query text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (profile not found, invalid JSON, missing env var)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Writing status output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Stable error code string
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Human-readable error message
    ///
    /// Never contains the connection password.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Describe a driver error, preferring the server's own message and SQLSTATE
pub(crate) fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}

/// Result type alias for pgcrud operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ClientError::NotConnected.error_code(), "NOT_CONNECTED");
        assert_eq!(ClientError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(ClientError::query_failed("test").error_code(), "QUERY_FAILED");
        assert_eq!(ClientError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(ClientError::config_error("test").error_code(), "CONFIG_ERROR");

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        assert_eq!(ClientError::from(io).error_code(), "IO_ERROR");
    }

    #[test]
    fn test_error_messages() {
        let err = ClientError::invalid_input("Identifier cannot be empty");
        assert_eq!(err.message(), "Invalid input: Identifier cannot be empty");

        let err = ClientError::NotConnected;
        assert!(err.message().contains("connect()"));
    }

    #[test]
    fn test_error_constructors() {
        let err = ClientError::connection_failed("test");
        assert!(matches!(err, ClientError::ConnectionFailed(_)));

        let err = ClientError::query_failed("test");
        assert!(matches!(err, ClientError::QueryFailed(_)));

        let err = ClientError::invalid_input("test");
        assert!(matches!(err, ClientError::InvalidInput(_)));

        let err = ClientError::config_error("test");
        assert!(matches!(err, ClientError::ConfigError(_)));
    }
}
