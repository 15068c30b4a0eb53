//! mysql-session - Main entry point.
//!
//! Opens one session, runs the given statement and prints the rows as JSON
//! lines. Any session error is fatal here: it is reported and the process
//! exits non-zero.

use mysql_session::config::{Config, RowFormat};
use mysql_session::{DatabaseSession, FetchMode, SessionError};
use std::io::{BufWriter, Write};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn fetch_mode(format: RowFormat) -> FetchMode {
    match format {
        RowFormat::Assoc => FetchMode::Assoc,
        RowFormat::Num => FetchMode::Num,
        RowFormat::Both => FetchMode::Both,
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let conn_config = config.connection_config()?;
    let options = config.session_options();

    if options.error_logging {
        config.log_sink().check_writable().map_err(SessionError::Log)?;
    }

    let mut session = DatabaseSession::open(&conn_config, options)?;
    info!(
        server_version = %session.server_version(),
        database = %session.database(),
        "Session opened"
    );

    let result = if config.debug {
        session.execute_debug(&config.sql)?
    } else {
        session.execute(&config.sql)?
    };

    let mode = fetch_mode(config.format);
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    while let Some(row) = result.fetch_row(mode) {
        serde_json::to_writer(&mut out, &row.to_json())?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    if result.has_result_set() {
        info!(rows = result.num_rows(), "Query executed");
    } else {
        info!(
            affected_rows = session.affected_rows(),
            insert_id = session.last_insert_id(),
            "Statement executed"
        );
    }

    session.close();
    Ok(())
}

fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "mysql-session failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
