//! SQLite handle for the chat history store.
//!
//! One connection behind a `std::sync::Mutex`. Calls are short and
//! synchronous, so async callers use it directly.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use compass_core::error::CompassError;

use crate::migrations;

/// File databases also get WAL journaling.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;";

const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the history database at `path`, creating parent
    /// directories, and bring its schema up to date.
    pub fn new(path: &Path) -> Result<Self, CompassError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CompassError::Storage(format!("Failed to open database: {}", e)))?;
        let db = Self::prepare(conn, FILE_PRAGMAS)?;
        info!(path = %path.display(), "History database ready");
        Ok(db)
    }

    /// A throwaway database for tests.
    pub fn in_memory() -> Result<Self, CompassError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CompassError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::prepare(conn, MEMORY_PRAGMAS)
    }

    fn prepare(conn: Connection, pragmas: &str) -> Result<Self, CompassError> {
        conn.execute_batch(pragmas)
            .map_err(|e| CompassError::Storage(format!("Failed to set pragmas: {}", e)))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` while holding the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CompassError>
    where
        F: FnOnce(&Connection) -> Result<T, CompassError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CompassError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
