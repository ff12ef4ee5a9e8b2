//! Error types for rowbase

use thiserror::Error;

/// Result type alias for rowbase operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// The database could not be reached or refused the credentials
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected a statement (malformed SQL, constraint violation, ...)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Invalid relationship descriptor, unknown model, unknown database, ...
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input handed to a builder or converter
    #[error("Validation error: {0}")]
    Validation(String),

    /// An operation refused to run against a protected, remote or production target
    #[error("{0}")]
    Guard(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Create a guard (refusal) error
    pub fn guard(message: impl Into<String>) -> Self {
        Self::Guard(message.into())
    }

    /// Check if this is a guard refusal
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::Guard(_))
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Split a `mysql_async` error into connection and execution failures.
    pub fn from_driver_error(err: mysql_async::Error) -> Self {
        match err {
            mysql_async::Error::Server(server) => {
                // 1044/1045: access denied, 1049: unknown database
                if matches!(server.code, 1044 | 1045 | 1049) {
                    Self::Connection(format!("{} ({})", server.message, server.code))
                } else {
                    Self::Execution(format!("{} ({})", server.message, server.code))
                }
            }
            mysql_async::Error::Io(err) => Self::Connection(err.to_string()),
            mysql_async::Error::Driver(err) => Self::Connection(err.to_string()),
            other => Self::Execution(other.to_string()),
        }
    }
}

impl From<mysql_async::Error> for OrmError {
    fn from(err: mysql_async::Error) -> Self {
        Self::from_driver_error(err)
    }
}
