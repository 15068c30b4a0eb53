//! MySQL Session Library
//!
//! A synchronous MySQL session: one connection, the most recent query
//! result, typed errors, and an append-only error log compatible with
//! existing daily log files.

pub mod config;
pub mod db;
pub mod error;
pub mod log;
pub mod models;

pub use config::Config;
pub use db::{DatabaseSession, QueryResult, SessionRegistry};
pub use error::{DriverError, SessionError, SessionResult};
pub use models::{ConnectionConfig, FetchMode, FetchedRow, SessionOptions};
