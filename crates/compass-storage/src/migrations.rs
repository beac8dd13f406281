//! Database schema migrations.
//!
//! Applies the chat history schema: chat_sessions, chat_messages, and the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use compass_core::error::CompassError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), CompassError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CompassError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CompassError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: chat_history");
    }

    Ok(())
}

/// Version 1: sessions and their ordered messages.
fn apply_v1(conn: &Connection) -> Result<(), CompassError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id              TEXT PRIMARY KEY NOT NULL,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id              TEXT PRIMARY KEY NOT NULL,
            session_id      TEXT NOT NULL,
            position        INTEGER NOT NULL,
            role            TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant')),
            text            TEXT NOT NULL DEFAULT '',
            media           TEXT NOT NULL DEFAULT '{}',
            suggestions     TEXT NOT NULL DEFAULT '[]',
            status          TEXT NOT NULL DEFAULT 'delivered'
                            CHECK (status IN ('delivered', 'fallback')),
            timestamp_ms    INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE,
            UNIQUE (session_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, position ASC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'chat_history');
        ",
    )
    .map_err(|e| CompassError::Storage(format!("Failed to apply migration v1: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_pending_status_rejected() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO chat_sessions (id, created_at) VALUES ('s', 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO chat_messages (id, session_id, position, role, status, timestamp_ms)
             VALUES ('m', 's', 0, 'assistant', 'pending', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_messages_cascade_with_session() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO chat_sessions (id, created_at) VALUES ('s', 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chat_messages (id, session_id, position, role, timestamp_ms)
             VALUES ('m', 's', 0, 'user', 0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM chat_sessions WHERE id = 's'", [])
            .unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
