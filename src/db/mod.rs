//! Database session layer.
//!
//! This module provides:
//! - The driver seam (`Connector`/`Connection`) and its MySQL implementation
//! - Column value decoding
//! - String escaping
//! - Buffered result handles
//! - `DatabaseSession` and the optional `SessionRegistry` adapter
//! - A scripted in-memory driver for tests

pub mod driver;
pub mod escape;
pub mod mock;
pub mod mysql;
pub mod registry;
pub mod result;
pub mod session;
pub mod types;

pub use driver::{Connection, Connector, RawResult};
pub use mock::{MockConnection, MockConnector, MockResponse};
pub use mysql::{MySqlConnection, MySqlConnector};
pub use registry::{SessionRegistry, SharedSession};
pub use result::QueryResult;
pub use session::DatabaseSession;
