//! In-memory scripted driver.
//!
//! `MockConnector` answers statements from a script instead of a server.
//! It counts how many connections were opened and records every statement
//! sent, so tests can assert on both.

use crate::db::driver::{Connection, Connector, LastStatus, RawResult};
use crate::error::{CR_CANT_READ_CHARSET, CR_CONNECTION_ERROR, CR_SERVER_LOST, DriverError};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub use crate::error::ER_PARSE_ERROR;
/// MySQL's error number for an unknown database.
pub const ER_BAD_DB_ERROR: u16 = 1049;

/// Scripted answer to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    Rows(RawResult),
    Write { affected_rows: u64, insert_id: u64 },
    Error(DriverError),
}

#[derive(Debug, Default)]
struct MockState {
    connects: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

/// Connector returning scripted connections.
#[derive(Debug, Clone)]
pub struct MockConnector {
    server_version: String,
    unreachable: Option<DriverError>,
    databases: HashSet<String>,
    charsets: HashSet<String>,
    responses: Arc<HashMap<String, MockResponse>>,
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            server_version: "8.0.36-mock".to_string(),
            unreachable: None,
            databases: HashSet::new(),
            charsets: ["utf8", "utf8mb4", "latin1", "binary"]
                .into_iter()
                .map(String::from)
                .collect(),
            responses: Arc::new(HashMap::new()),
            state: Arc::new(MockState::default()),
        }
    }

    /// Every connect attempt fails as if the host could not be reached.
    pub fn unreachable(mut self, message: impl Into<String>) -> Self {
        self.unreachable = Some(DriverError::new(CR_CONNECTION_ERROR, message));
        self
    }

    pub fn with_database(mut self, name: impl Into<String>) -> Self {
        self.databases.insert(name.into());
        self
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    /// Restrict the charsets the server accepts.
    pub fn with_charsets<I, S>(mut self, charsets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.charsets = charsets.into_iter().map(Into::into).collect();
        self
    }

    pub fn respond(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.into(), response);
        self
    }

    /// Script a result set.
    pub fn with_rows(self, sql: impl Into<String>, columns: &[&str], rows: Vec<Vec<JsonValue>>) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.respond(sql, MockResponse::Rows(RawResult::new(columns, rows)))
    }

    /// Script a statement that changes rows.
    pub fn with_write(self, sql: impl Into<String>, affected_rows: u64, insert_id: u64) -> Self {
        self.respond(
            sql,
            MockResponse::Write {
                affected_rows,
                insert_id,
            },
        )
    }

    /// Script a server error.
    pub fn with_error(self, sql: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        self.respond(sql, MockResponse::Error(DriverError::new(code, message)))
    }

    /// Number of successful connects so far, across all clones.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Statements sent through `query`, in order, across all connections.
    pub fn executed(&self) -> Vec<String> {
        self.state
            .executed
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    fn connect(
        &self,
        host: &str,
        port: u16,
        _username: &str,
        _password: &str,
    ) -> Result<MockConnection, DriverError> {
        if let Some(err) = &self.unreachable {
            return Err(DriverError::new(
                err.code,
                format!("{} ({}:{})", err.message, host, port),
            ));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            connector: self.clone(),
            open: true,
            affected_rows: 0,
            insert_id: 0,
            status: LastStatus::default(),
        })
    }
}

/// Connection handed out by `MockConnector`.
#[derive(Debug)]
pub struct MockConnection {
    connector: MockConnector,
    open: bool,
    affected_rows: u64,
    insert_id: u64,
    status: LastStatus,
}

impl MockConnection {
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::new(CR_SERVER_LOST, "Connection is closed"))
        }
    }

    fn answer(&mut self, sql: &str) -> Result<RawResult, DriverError> {
        self.ensure_open()?;
        if let Ok(mut executed) = self.connector.state.executed.lock() {
            executed.push(sql.to_string());
        }
        match self.connector.responses.get(sql) {
            Some(MockResponse::Rows(raw)) => {
                self.affected_rows = raw.rows.len() as u64;
                self.insert_id = 0;
                Ok(raw.clone())
            }
            Some(MockResponse::Write {
                affected_rows,
                insert_id,
            }) => {
                self.affected_rows = *affected_rows;
                self.insert_id = *insert_id;
                Ok(RawResult::empty())
            }
            Some(MockResponse::Error(err)) => Err(err.clone()),
            None => Err(DriverError::new(
                ER_PARSE_ERROR,
                format!(
                    "You have an error in your SQL syntax; check the manual near '{}'",
                    sql
                ),
            )),
        }
    }
}

impl Connection for MockConnection {
    fn set_charset(&mut self, charset: &str) -> Result<(), DriverError> {
        let result = self.ensure_open().and_then(|_| {
            if self.connector.charsets.contains(charset) {
                Ok(())
            } else {
                Err(DriverError::new(
                    CR_CANT_READ_CHARSET,
                    format!("Can't initialize character set {}", charset),
                ))
            }
        });
        self.status.record(&result);
        result
    }

    fn select_db(&mut self, database: &str) -> Result<(), DriverError> {
        let result = self.ensure_open().and_then(|_| {
            if self.connector.databases.contains(database) {
                Ok(())
            } else {
                Err(DriverError::new(
                    ER_BAD_DB_ERROR,
                    format!("Unknown database '{}'", database),
                ))
            }
        });
        self.status.record(&result);
        result
    }

    fn query(&mut self, sql: &str) -> Result<RawResult, DriverError> {
        let result = self.answer(sql);
        self.status.record(&result);
        result
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn server_info(&self) -> &str {
        &self.connector.server_version
    }

    fn errno(&self) -> u16 {
        self.status.errno
    }

    fn error(&self) -> &str {
        &self.status.error
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connect_counts() {
        let connector = MockConnector::new();
        let clone = connector.clone();
        connector.connect("localhost", 3306, "root", "").unwrap();
        clone.connect("localhost", 3306, "root", "").unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn test_unreachable() {
        let connector = MockConnector::new().unreachable("Connection refused");
        let err = connector.connect("db.invalid", 3306, "root", "").unwrap_err();
        assert_eq!(err.code, CR_CONNECTION_ERROR);
        assert!(err.message.contains("Connection refused"));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_scripted_query_and_status() {
        let connector = MockConnector::new().with_rows("SELECT 1", &["1"], vec![vec![json!(1)]]);
        let mut conn = connector.connect("localhost", 3306, "root", "").unwrap();

        let raw = conn.query("SELECT 1").unwrap();
        assert_eq!(raw.rows, vec![vec![json!(1)]]);
        assert_eq!(conn.errno(), 0);

        assert!(conn.query("SELEC 1").is_err());
        assert_eq!(conn.errno(), ER_PARSE_ERROR);
        assert!(conn.error().contains("SELEC 1"));
        assert_eq!(connector.executed(), vec!["SELECT 1", "SELEC 1"]);
    }

    #[test]
    fn test_closed_connection_rejects_queries() {
        let connector = MockConnector::new().with_write("DELETE FROM t", 3, 0);
        let mut conn = connector.connect("localhost", 3306, "root", "").unwrap();
        conn.close();
        assert!(!conn.is_open());
        let err = conn.query("DELETE FROM t").unwrap_err();
        assert_eq!(err.code, CR_SERVER_LOST);
    }
}
