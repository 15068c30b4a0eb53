//! Driver seam between the session and a MySQL client implementation.
//!
//! `DatabaseSession` only talks to these traits. The production
//! implementation lives in `db::mysql`; `db::mock` provides a scripted one.
//! All calls block until the driver returns.

use crate::error::DriverError;
use serde_json::Value as JsonValue;

/// Fully buffered output of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    /// The statement returned a result set, possibly with no rows
    pub has_result_set: bool,
}

impl RawResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            columns,
            rows,
            has_result_set: true,
        }
    }

    /// Result of a statement that produced no result set (INSERT, UPDATE, ...).
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Opens connections to a server.
pub trait Connector {
    type Connection: Connection;

    fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<Self::Connection, DriverError>;
}

/// An open connection.
///
/// The accessor methods describe the most recent operation on the
/// connection: a successful call resets `errno` to 0 and `error` to "".
pub trait Connection {
    fn set_charset(&mut self, charset: &str) -> Result<(), DriverError>;

    fn select_db(&mut self, database: &str) -> Result<(), DriverError>;

    /// Run a statement verbatim and buffer everything it returns.
    fn query(&mut self, sql: &str) -> Result<RawResult, DriverError>;

    fn affected_rows(&self) -> u64;

    fn insert_id(&self) -> u64;

    fn server_info(&self) -> &str;

    fn errno(&self) -> u16;

    fn error(&self) -> &str;

    fn escape_string(&self, s: &str) -> String {
        super::escape::escape_string(s)
    }

    fn close(&mut self);
}

/// Outcome of the last operation, shared bookkeeping for implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastStatus {
    pub errno: u16,
    pub error: String,
}

impl LastStatus {
    pub fn record<T>(&mut self, result: &Result<T, DriverError>) {
        match result {
            Ok(_) => {
                self.errno = 0;
                self.error.clear();
            }
            Err(e) => {
                self.errno = e.code;
                self.error = e.message.clone();
            }
        }
    }
}
