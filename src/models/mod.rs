//! Data models for the MySQL session.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, DEFAULT_CHARSET, DEFAULT_PORT, SessionOptions,
};
pub use query::{FetchMode, FetchedRow};
