use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::StateError;
use crate::schema;

/// Owns the single SQLite connection backing an agent's local state.
/// Cloned handles share the same underlying connection.
#[derive(Clone)]
pub struct DatabaseManager {
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseManager {
    /// Open (creating if absent) the database at `path` and run migrations.
    pub fn initialize(path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&conn)?;
        tracing::info!(path = %path.display(), "state store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database; used by tests.
    pub fn initialize_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the scoped connection guard for one unit of work.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("state store mutex poisoned")
    }

    /// No-op placeholder mirroring the store's lifecycle contract; the
    /// underlying connection closes when the last handle is dropped.
    pub fn close(&self) {
        tracing::debug!("state store handle released");
    }
}
