//! Process-wide session adapter.
//!
//! The registry holds at most one session and opens it on first use. Code
//! that can receive a `DatabaseSession` directly should do so; the registry
//! exists for call sites that expect a single shared instance.
//!
//! The held session sits behind a `Mutex`: only one task uses it at a time,
//! and its current-result slot must not be relied on across lock scopes.

use crate::db::driver::Connector;
use crate::db::mysql::MySqlConnector;
use crate::db::session::DatabaseSession;
use crate::error::SessionResult;
use crate::models::{ConnectionConfig, SessionOptions};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Shared handle to the registry's session.
pub type SharedSession<C> = Arc<Mutex<DatabaseSession<C>>>;

pub struct SessionRegistry<K: Connector = MySqlConnector> {
    connector: K,
    config: ConnectionConfig,
    options: SessionOptions,
    slot: Mutex<Option<SharedSession<K::Connection>>>,
}

impl SessionRegistry<MySqlConnector> {
    pub fn mysql(config: ConnectionConfig, options: SessionOptions) -> Self {
        Self::new(MySqlConnector::new(), config, options)
    }
}

impl<K: Connector> SessionRegistry<K> {
    pub fn new(connector: K, config: ConnectionConfig, options: SessionOptions) -> Self {
        Self {
            connector,
            config,
            options,
            slot: Mutex::new(None),
        }
    }

    /// The shared session, connecting on the first call.
    ///
    /// Concurrent first calls serialize on the slot lock, so exactly one
    /// connection is opened. A failed open leaves the registry empty and
    /// the next call tries again.
    pub fn get(&self) -> SessionResult<SharedSession<K::Connection>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        debug!(target_db = %self.config.masked(), "Opening shared session");
        let session = DatabaseSession::open_with(&self.connector, &self.config, self.options.clone())?;
        let shared = Arc::new(Mutex::new(session));
        *slot = Some(shared.clone());
        info!("Shared session initialized");
        Ok(shared)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the held session. Handles already given out keep it alive until
    /// they are dropped; the next `get` opens a new one.
    pub fn reset(&self) {
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            debug!("Shared session released");
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}
