//! The database session: one connection plus its current result.
//!
//! A session is either fully connected with its database selected, or it
//! does not exist: `open` either returns a ready session or an error.
//!
//! # Current result
//!
//! Each successful `execute` stores its result as the session's current
//! result. `fetch_row` and `count_rows` read the current result when no
//! handle is passed; passing a handle makes it the new current result.
//! Prefer calling `QueryResult::fetch_row` on the handle returned by
//! `execute`: two results interleaved through the session's slot overwrite
//! each other.
//!
//! A session is meant for one task at a time. Share it only behind a lock
//! (see `SessionRegistry`) and never share its current result across tasks.

use crate::db::driver::{Connection, Connector};
use crate::db::mysql::{MySqlConnection, MySqlConnector};
use crate::db::result::QueryResult;
use crate::error::{SessionError, SessionResult};
use crate::log::DEBUG_TITLE;
use crate::models::{ConnectionConfig, FetchMode, FetchedRow, SessionOptions};
use chrono::Local;
use tracing::{debug, error, info, warn};

pub struct DatabaseSession<C: Connection = MySqlConnection> {
    conn: C,
    current: Option<QueryResult>,
    options: SessionOptions,
    database: String,
}

impl DatabaseSession<MySqlConnection> {
    /// Connect to a MySQL server and select the configured database.
    pub fn open(config: &ConnectionConfig, options: SessionOptions) -> SessionResult<Self> {
        Self::open_with(&MySqlConnector::new(), config, options)
    }
}

impl<C: Connection> DatabaseSession<C> {
    /// Open a session through the given connector.
    ///
    /// Order: connect, apply the charset (if non-empty), select the database.
    /// Any failure is written to the log sink (when enabled) before it is
    /// returned, and the half-open connection is closed.
    pub fn open_with<K>(
        connector: &K,
        config: &ConnectionConfig,
        options: SessionOptions,
    ) -> SessionResult<Self>
    where
        K: Connector<Connection = C>,
    {
        if let Err(e) = config.validate() {
            log_failure(&options, &e, "");
            return Err(e);
        }

        let mut conn = match connector.connect(
            &config.host,
            config.port_or_default(),
            &config.username,
            &config.password,
        ) {
            Ok(conn) => conn,
            Err(driver_err) => {
                let err = SessionError::connection(driver_err);
                log_failure(&options, &err, &config.masked());
                return Err(err);
            }
        };

        if !config.charset.is_empty() {
            if let Err(driver_err) = conn.set_charset(&config.charset) {
                let err = SessionError::charset(&config.charset, driver_err);
                if options.strict_charset {
                    log_failure(&options, &err, &config.masked());
                    conn.close();
                    return Err(err);
                }
                warn!(charset = %config.charset, error = %err, "Ignoring charset failure");
            }
        }

        if let Err(driver_err) = conn.select_db(&config.database) {
            let err = SessionError::database_select(&config.database, driver_err);
            log_failure(&options, &err, &config.masked());
            conn.close();
            return Err(err);
        }

        info!(
            target_db = %config.masked(),
            server_version = %conn.server_info(),
            "Connected to database"
        );

        Ok(Self {
            conn,
            current: None,
            options,
            database: config.database.clone(),
        })
    }

    /// Send a statement verbatim and store its result as the current result.
    ///
    /// No parameter binding happens here: never splice untrusted input into
    /// `sql`, even escaped.
    pub fn execute(&mut self, sql: &str) -> SessionResult<QueryResult> {
        self.run(sql, false)
    }

    /// Like `execute`, and also writes the statement to the log sink as a
    /// `DEBUG` entry.
    pub fn execute_debug(&mut self, sql: &str) -> SessionResult<QueryResult> {
        self.run(sql, true)
    }

    fn run(&mut self, sql: &str, debug_mode: bool) -> SessionResult<QueryResult> {
        match self.conn.query(sql) {
            Ok(raw) => {
                let result = QueryResult::new(raw);
                debug!(
                    sql = %sql,
                    rows = result.num_rows(),
                    affected_rows = self.conn.affected_rows(),
                    "Executed query"
                );
                if debug_mode {
                    self.append_log(DEBUG_TITLE, sql);
                }
                self.current = Some(result.clone());
                Ok(result)
            }
            Err(driver_err) => {
                self.current = None;
                let detail = if debug_mode {
                    format!("{}\r\n{}", sql, driver_err.message)
                } else {
                    driver_err.message.clone()
                };
                let err = SessionError::query(sql, driver_err);
                log_failure(&self.options, &err, &detail);
                Err(err)
            }
        }
    }

    /// Next row of `result`, or of the current result when `None`.
    ///
    /// A passed handle replaces the current result. Returns `Ok(None)` once
    /// the rows are exhausted.
    pub fn fetch_row(
        &mut self,
        result: Option<&QueryResult>,
        mode: FetchMode,
    ) -> SessionResult<Option<FetchedRow>> {
        Ok(self.select_result(result)?.fetch_row(mode))
    }

    /// Total rows of `result`, or of the current result when `None`.
    ///
    /// Same override rule as `fetch_row`. Statements without a result set
    /// count as zero rows.
    pub fn count_rows(&mut self, result: Option<&QueryResult>) -> SessionResult<usize> {
        Ok(self.select_result(result)?.num_rows())
    }

    fn select_result(&mut self, result: Option<&QueryResult>) -> SessionResult<&QueryResult> {
        if let Some(result) = result {
            self.current = Some(result.clone());
        }
        self.current.as_ref().ok_or(SessionError::NoResult)
    }

    pub fn current_result(&self) -> Option<&QueryResult> {
        self.current.as_ref()
    }

    /// Apply a connection charset. Unlike `open`, failures are always returned.
    pub fn set_charset(&mut self, charset: &str) -> SessionResult<()> {
        self.conn.set_charset(charset).map_err(|driver_err| {
            let err = SessionError::charset(charset, driver_err);
            log_failure(&self.options, &err, "");
            err
        })
    }

    /// Rows changed (or returned, for SELECT) by the last statement.
    pub fn affected_rows(&self) -> u64 {
        self.conn.affected_rows()
    }

    /// AUTO_INCREMENT id produced by the last INSERT, 0 if none.
    pub fn last_insert_id(&self) -> u64 {
        self.conn.insert_id()
    }

    pub fn server_version(&self) -> &str {
        self.conn.server_info()
    }

    /// MySQL error number of the last operation, 0 on success.
    pub fn last_error_code(&self) -> u16 {
        self.conn.errno()
    }

    /// MySQL error description of the last operation, empty on success.
    pub fn last_error_message(&self) -> &str {
        self.conn.error()
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Escape a value for use inside a quoted SQL literal.
    ///
    /// This is a weaker defense than bound parameters; do not rely on it for
    /// untrusted input.
    pub fn escape_string(&self, s: &str) -> String {
        self.conn.escape_string(s)
    }

    /// Escape every value of a mapping, keeping its keys.
    pub fn escape_all<K, M>(&self, map: M) -> M
    where
        M: IntoIterator<Item = (K, String)> + FromIterator<(K, String)>,
    {
        map.into_iter()
            .map(|(k, v)| {
                let escaped = self.escape_string(&v);
                (k, escaped)
            })
            .collect()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn set_error_logging(&mut self, enabled: bool) {
        self.options.error_logging = enabled;
    }

    /// Close the connection. Dropping the session does the same.
    pub fn close(self) {
        drop(self);
    }

    fn append_log(&self, title: &str, message: &str) {
        append_log(&self.options, title, message);
    }
}

impl<C: Connection> Drop for DatabaseSession<C> {
    fn drop(&mut self) {
        self.current = None;
        self.conn.close();
        debug!(database = %self.database, "Session closed");
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for DatabaseSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession")
            .field("conn", &self.conn)
            .field("database", &self.database)
            .field("has_current_result", &self.current.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Report a failed operation through tracing and, if enabled, the log sink.
fn log_failure(options: &SessionOptions, err: &SessionError, detail: &str) {
    error!(error = %err, "{}", err.log_title());
    append_log(options, err.log_title(), detail);
}

fn append_log(options: &SessionOptions, title: &str, message: &str) {
    if !options.error_logging {
        return;
    }
    if let Err(e) = options.log_sink.append(Local::now(), title, message) {
        warn!(error = %e, title = %title, "Failed to write log entry");
    }
}
