//! Error types for the MySQL session.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! The session never terminates the process: every failure is surfaced as a
//! `SessionError` and the caller decides whether it is fatal.

use thiserror::Error;

/// MySQL client error raised when the server cannot be reached.
pub const CR_CONNECTION_ERROR: u16 = 2002;
/// MySQL client error raised when an established connection drops.
pub const CR_SERVER_LOST: u16 = 2013;
/// MySQL client error raised when a character set cannot be used.
pub const CR_CANT_READ_CHARSET: u16 = 2019;
/// MySQL's error number for a syntax error.
pub const ER_PARSE_ERROR: u16 = 1064;

/// Error reported by the underlying driver: a MySQL error number and description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct DriverError {
    pub code: u16,
    pub message: String,
}

impl DriverError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Convert sqlx errors to DriverError.
///
/// Server-side errors keep their MySQL error number; client-side failures
/// are reported as a lost connection.
impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number())
                    .unwrap_or(0);
                DriverError::new(code, db_err.message())
            }
            sqlx::Error::Configuration(msg) => {
                DriverError::new(CR_CONNECTION_ERROR, format!("Configuration error: {}", msg))
            }
            sqlx::Error::Io(io_err) => {
                DriverError::new(CR_SERVER_LOST, format!("I/O error: {}", io_err))
            }
            sqlx::Error::Tls(tls_err) => {
                DriverError::new(CR_SERVER_LOST, format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                DriverError::new(CR_SERVER_LOST, format!("Protocol error: {}", msg))
            }
            other => DriverError::new(0, other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection failed to database host: [{code}] {message}")]
    Connection { code: u16, message: String },

    #[error("Cannot select database '{database}': [{code}] {message}")]
    DatabaseSelect {
        database: String,
        code: u16,
        message: String,
    },

    #[error("Invalid SQL: [{code}] {message}")]
    Query {
        /// The statement exactly as it was sent.
        sql: String,
        code: u16,
        message: String,
    },

    #[error("Cannot set charset '{charset}': [{code}] {message}")]
    Charset {
        charset: String,
        code: u16,
        message: String,
    },

    #[error("No query result available; execute a query first")]
    NoResult,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Log sink error: {0}")]
    Log(#[from] std::io::Error),
}

impl SessionError {
    /// Create a connection error from a driver error.
    pub fn connection(err: DriverError) -> Self {
        Self::Connection {
            code: err.code,
            message: err.message,
        }
    }

    /// Create a database selection error.
    pub fn database_select(database: impl Into<String>, err: DriverError) -> Self {
        Self::DatabaseSelect {
            database: database.into(),
            code: err.code,
            message: err.message,
        }
    }

    /// Create a query error carrying the SQL text.
    pub fn query(sql: impl Into<String>, err: DriverError) -> Self {
        Self::Query {
            sql: sql.into(),
            code: err.code,
            message: err.message,
        }
    }

    /// Create a charset error.
    pub fn charset(charset: impl Into<String>, err: DriverError) -> Self {
        Self::Charset {
            charset: charset.into(),
            code: err.code,
            message: err.message,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// MySQL error number behind this error, if it came from the driver.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Connection { code, .. }
            | Self::DatabaseSelect { code, .. }
            | Self::Query { code, .. }
            | Self::Charset { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Driver-reported description, if any.
    pub fn driver_message(&self) -> Option<&str> {
        match self {
            Self::Connection { message, .. }
            | Self::DatabaseSelect { message, .. }
            | Self::Query { message, .. }
            | Self::Charset { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Check if this error happened while establishing the session.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::DatabaseSelect { .. } | Self::Charset { .. }
        )
    }

    /// Title used for the compatibility error log entry.
    pub fn log_title(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection failed to database host",
            Self::DatabaseSelect { .. } => "Cannot select database",
            Self::Query { .. } => "Invalid SQL",
            Self::Charset { .. } => "Cannot set charset",
            Self::NoResult => "No query result",
            Self::InvalidConfig { .. } => "Invalid configuration",
            Self::Log(_) => "Log sink error",
        }
    }
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::connection(DriverError::new(2002, "Connection refused"));
        assert!(err.to_string().contains("Connection failed"));
        assert!(err.to_string().contains("2002"));
    }

    #[test]
    fn test_query_error_keeps_sql() {
        let err = SessionError::query("SELEC 1", DriverError::new(1064, "syntax error"));
        match &err {
            SessionError::Query { sql, code, .. } => {
                assert_eq!(sql, "SELEC 1");
                assert_eq!(*code, 1064);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.code(), Some(1064));
        assert_eq!(err.driver_message(), Some("syntax error"));
    }

    #[test]
    fn test_is_connection() {
        assert!(SessionError::connection(DriverError::new(2002, "x")).is_connection());
        assert!(
            SessionError::database_select("shop", DriverError::new(1049, "Unknown database"))
                .is_connection()
        );
        assert!(!SessionError::query("SELECT 1", DriverError::new(1064, "x")).is_connection());
        assert!(!SessionError::NoResult.is_connection());
    }

    #[test]
    fn test_code_absent_for_non_driver_errors() {
        assert_eq!(SessionError::NoResult.code(), None);
        assert_eq!(SessionError::invalid_config("bad").code(), None);
    }

    #[test]
    fn test_log_titles() {
        assert_eq!(
            SessionError::query("x", DriverError::new(1, "y")).log_title(),
            "Invalid SQL"
        );
        assert_eq!(
            SessionError::database_select("d", DriverError::new(1, "y")).log_title(),
            "Cannot select database"
        );
    }

    #[test]
    fn test_sqlx_io_error_maps_to_server_lost() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = DriverError::from(sqlx::Error::Io(io));
        assert_eq!(err.code, CR_SERVER_LOST);
        assert!(err.message.contains("reset"));
    }
}
