//! MySQL driver backed by sqlx.
//!
//! sqlx is asynchronous; each connection owns a current-thread tokio runtime
//! and blocks on it, so callers see plain synchronous calls. Do not use a
//! `MySqlConnection` from inside an async task: move it to a blocking
//! thread (`tokio::task::spawn_blocking`) instead.

use crate::db::driver::{Connection, Connector, LastStatus, RawResult};
use crate::db::escape::quote_identifier;
use crate::db::types::{column_names, row_values};
use crate::error::{
    CR_CANT_READ_CHARSET, CR_CONNECTION_ERROR, CR_SERVER_LOST, DriverError, ER_PARSE_ERROR,
};
use futures_util::TryStreamExt;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Column, ConnectOptions, Connection as _, Either, Executor, Statement};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Charsets the connection may switch to. sqlx always sends statement text
/// as UTF-8 and decodes strings as UTF-8, and `escape_string` only knows
/// single-byte-safe encodings, so nothing else is usable.
const SUPPORTED_CHARSETS: &[&str] = &["utf8", "utf8mb3", "utf8mb4", "ascii"];

/// Connector producing real MySQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Connection options that leave the server's session state alone.
///
/// sqlx adds `PIPES_AS_CONCAT` and `NO_ENGINE_SUBSTITUTION` to `sql_mode`
/// and pins `time_zone` to UTC unless told otherwise.
fn connect_options(host: &str, port: u16, username: &str, password: &str) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(username)
        .password(password)
        .pipes_as_concat(false)
        .no_engine_substitution(false)
        .timezone(None::<String>)
        // statements are never prepared for reuse
        .statement_cache_capacity(0)
}

impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    fn connect(
        &self,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<MySqlConnection, DriverError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                DriverError::new(CR_CONNECTION_ERROR, format!("Failed to start runtime: {}", e))
            })?;

        let options = connect_options(host, port, username, password);

        let (conn, server_info) = runtime
            .block_on(async {
                let mut conn = options.connect().await?;
                let version = sqlx::query_scalar::<_, String>("SELECT VERSION()")
                    .fetch_one(&mut conn)
                    .await?;
                Ok::<_, sqlx::Error>((conn, version))
            })
            .map_err(connect_error)?;

        debug!(version = %server_info, "Got server version");

        Ok(MySqlConnection {
            runtime,
            conn: Some(conn),
            server_info,
            affected_rows: 0,
            insert_id: 0,
            status: LastStatus::default(),
        })
    }
}

/// Failures before the handshake completes mean the host was unreachable.
fn connect_error(err: sqlx::Error) -> DriverError {
    let mut err = DriverError::from(err);
    if err.code == CR_SERVER_LOST || err.code == 0 {
        err.code = CR_CONNECTION_ERROR;
    }
    err
}

fn closed_error() -> DriverError {
    DriverError::new(CR_SERVER_LOST, "Connection is closed")
}

fn supported_charset(charset: &str) -> bool {
    SUPPORTED_CHARSETS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(charset))
}

/// Collects the response to one query text.
///
/// The server answers each statement with its rows followed by a single
/// completion packet. Anything after the first completion belongs to a
/// second statement and is refused. The server has already run that
/// statement by then; only its result is discarded.
#[derive(Debug, Default)]
struct ResponseFold {
    result: RawResult,
    rows_affected: u64,
    last_insert_id: u64,
    finished: bool,
}

impl ResponseFold {
    fn row(
        &mut self,
        values: Vec<JsonValue>,
        columns: impl FnOnce() -> Vec<String>,
    ) -> Result<(), DriverError> {
        self.ensure_single()?;
        if !self.result.has_result_set {
            self.result.columns = columns();
            self.result.has_result_set = true;
        }
        self.result.rows.push(values);
        Ok(())
    }

    fn done(&mut self, rows_affected: u64, last_insert_id: u64) -> Result<(), DriverError> {
        self.ensure_single()?;
        self.finished = true;
        self.rows_affected = rows_affected;
        self.last_insert_id = last_insert_id;
        Ok(())
    }

    fn ensure_single(&self) -> Result<(), DriverError> {
        if self.finished {
            return Err(DriverError::new(
                ER_PARSE_ERROR,
                "Multiple statements in one query are not supported",
            ));
        }
        Ok(())
    }

    /// An empty SELECT and a write that touched nothing look the same on
    /// the wire: no rows and a zeroed completion.
    fn is_ambiguous(&self) -> bool {
        !self.result.has_result_set && self.rows_affected == 0 && self.last_insert_id == 0
    }

    /// Record the column names of an empty result set.
    fn describe(&mut self, columns: Vec<String>) {
        if !columns.is_empty() {
            self.result.columns = columns;
            self.result.has_result_set = true;
        }
    }

    /// Rows returned for a result set, the server's count otherwise.
    fn affected_rows(&self) -> u64 {
        if self.result.has_result_set {
            self.result.rows.len() as u64
        } else {
            self.rows_affected
        }
    }
}

/// A blocking MySQL connection.
pub struct MySqlConnection {
    runtime: Runtime,
    conn: Option<sqlx::MySqlConnection>,
    server_info: String,
    affected_rows: u64,
    insert_id: u64,
    status: LastStatus,
}

impl MySqlConnection {
    fn run_statement(&mut self, sql: &str) -> Result<(), DriverError> {
        let conn = self.conn.as_mut().ok_or_else(closed_error)?;
        self.runtime
            .block_on(conn.execute(sql))
            .map(|_| ())
            .map_err(DriverError::from)
    }

    fn fetch_buffered(&mut self, sql: &str) -> Result<ResponseFold, DriverError> {
        let conn = self.conn.as_mut().ok_or_else(closed_error)?;
        self.runtime.block_on(async {
            let mut fold = ResponseFold::default();
            {
                let mut stream = (&mut *conn).fetch_many(sql);
                while let Some(item) = stream.try_next().await.map_err(DriverError::from)? {
                    match item {
                        Either::Left(done) => {
                            fold.done(done.rows_affected(), done.last_insert_id())?
                        }
                        Either::Right(row) => fold.row(row_values(&row), || column_names(&row))?,
                    }
                }
            }

            if fold.is_ambiguous() {
                // Preparing does not execute; statements that cannot be
                // prepared have no result set to describe.
                if let Ok(statement) = (&mut *conn).prepare(sql).await {
                    fold.describe(
                        statement
                            .columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect(),
                    );
                }
            }
            Ok::<_, DriverError>(fold)
        })
    }
}

impl Connection for MySqlConnection {
    fn set_charset(&mut self, charset: &str) -> Result<(), DriverError> {
        let result = if supported_charset(charset) {
            self.run_statement(&format!("SET NAMES {}", charset))
        } else {
            Err(DriverError::new(
                CR_CANT_READ_CHARSET,
                format!("Can't initialize character set {}", charset),
            ))
        };
        self.status.record(&result);
        result
    }

    fn select_db(&mut self, database: &str) -> Result<(), DriverError> {
        let result = self.run_statement(&format!("USE {}", quote_identifier(database)));
        self.status.record(&result);
        result
    }

    fn query(&mut self, sql: &str) -> Result<RawResult, DriverError> {
        let outcome = self.fetch_buffered(sql);
        self.status.record(&outcome);
        let fold = outcome?;
        self.affected_rows = fold.affected_rows();
        self.insert_id = fold.last_insert_id;
        Ok(fold.result)
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn server_info(&self) -> &str {
        &self.server_info
    }

    fn errno(&self) -> u16 {
        self.status.errno
    }

    fn error(&self) -> &str {
        &self.status.error
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.close()) {
                warn!(error = %e, "Error while closing connection");
            }
        }
    }
}

impl Drop for MySqlConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("server_info", &self.server_info)
            .field("open", &self.conn.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_supported_charsets() {
        assert!(supported_charset("utf8"));
        assert!(supported_charset("utf8mb3"));
        assert!(supported_charset("UTF8MB4"));
        assert!(supported_charset("ascii"));
        assert!(!supported_charset(""));
        assert!(!supported_charset("latin1"));
        assert!(!supported_charset("gbk"));
        assert!(!supported_charset("big5"));
        assert!(!supported_charset("utf8; DROP TABLE users"));
    }

    #[test]
    fn test_connect_options_target() {
        let options = connect_options("db.internal", 3307, "app", "pw");
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), None);
    }

    #[test]
    fn test_fold_single_result_set() {
        let mut fold = ResponseFold::default();
        fold.row(vec![json!(1)], || names(&["a"])).unwrap();
        fold.row(vec![json!(2)], || names(&["ignored"])).unwrap();
        fold.done(0, 0).unwrap();

        assert!(!fold.is_ambiguous());
        assert_eq!(fold.affected_rows(), 2);
        assert_eq!(fold.result.columns, names(&["a"]));
        assert_eq!(fold.result.rows, vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_fold_write() {
        let mut fold = ResponseFold::default();
        fold.done(3, 42).unwrap();
        assert!(!fold.is_ambiguous());
        assert!(!fold.result.has_result_set);
        assert_eq!(fold.affected_rows(), 3);
        assert_eq!(fold.last_insert_id, 42);
    }

    #[test]
    fn test_fold_rejects_second_result_set() {
        // SELECT 1 AS a; SELECT 'x' AS b, 2 AS c
        let mut fold = ResponseFold::default();
        fold.row(vec![json!(1)], || names(&["a"])).unwrap();
        fold.done(0, 0).unwrap();

        let err = fold
            .row(vec![json!("x"), json!(2)], || names(&["b", "c"]))
            .unwrap_err();
        assert_eq!(err.code, ER_PARSE_ERROR);
        assert_eq!(fold.result.rows.len(), 1);
    }

    #[test]
    fn test_fold_rejects_second_statement() {
        // UPDATE ...; DELETE ...
        let mut fold = ResponseFold::default();
        fold.done(1, 0).unwrap();
        let err = fold.done(5, 0).unwrap_err();
        assert_eq!(err.code, ER_PARSE_ERROR);
        assert_eq!(fold.affected_rows(), 1);
    }

    #[test]
    fn test_fold_empty_select_described() {
        let mut fold = ResponseFold::default();
        fold.done(0, 0).unwrap();
        assert!(fold.is_ambiguous());

        fold.describe(names(&["id", "name"]));
        assert!(fold.result.has_result_set);
        assert_eq!(fold.result.columns, names(&["id", "name"]));
        assert!(fold.result.rows.is_empty());
        assert_eq!(fold.affected_rows(), 0);
    }

    #[test]
    fn test_fold_noop_write_stays_without_result_set() {
        let mut fold = ResponseFold::default();
        fold.done(0, 0).unwrap();
        fold.describe(Vec::new());
        assert!(!fold.result.has_result_set);
    }

    #[test]
    fn test_unreachable_host_is_connection_error() {
        // Port 1 on loopback is never a MySQL server
        let result = MySqlConnector::new().connect("127.0.0.1", 1, "root", "");
        let err = result.expect_err("connecting to a closed port must fail");
        assert_eq!(err.code, CR_CONNECTION_ERROR);
        assert!(!err.message.is_empty());
    }
}
