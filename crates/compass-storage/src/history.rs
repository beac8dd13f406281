//! Chat history repository.
//!
//! Messages are stored per session in insertion order. Pending
//! placeholders are never written.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use compass_core::error::CompassError;
use compass_core::types::{ChatMessage, Media, MessageStatus, Role};

use crate::db::Database;

/// Repository for persisted conversation history.
pub struct HistoryRepository {
    db: Arc<Database>,
}

impl HistoryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a session. Idempotent.
    pub fn open_session(&self, session_id: Uuid) -> Result<(), CompassError> {
        self.db.with_conn(|conn| register(conn, session_id))
    }

    /// Append one message to a session. Pending messages are skipped.
    pub fn append(&self, session_id: Uuid, message: &ChatMessage) -> Result<(), CompassError> {
        if message.is_pending() {
            return Ok(());
        }
        self.db.with_conn(|conn| {
            register(conn, session_id)?;
            insert(conn, session_id, message)?;
            touch(conn, session_id)
        })?;

        debug!(session_id = %session_id, message_id = %message.id, "Message persisted");
        Ok(())
    }

    /// Replace the stored history of a session with `messages`.
    ///
    /// Runs in one transaction: on failure the previous history is kept.
    pub fn save(&self, session_id: Uuid, messages: &[ChatMessage]) -> Result<(), CompassError> {
        let saved = self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| CompassError::Storage(format!("Failed to begin save: {}", e)))?;
            register(&tx, session_id)?;
            tx.execute(
                "DELETE FROM chat_messages WHERE session_id = ?1",
                rusqlite::params![session_id.to_string()],
            )
            .map_err(|e| CompassError::Storage(format!("Failed to clear history: {}", e)))?;

            let mut saved = 0usize;
            for message in messages.iter().filter(|m| !m.is_pending()) {
                insert(&tx, session_id, message)?;
                saved += 1;
            }
            touch(&tx, session_id)?;
            tx.commit()
                .map_err(|e| CompassError::Storage(format!("Failed to commit save: {}", e)))?;
            Ok(saved)
        })?;

        debug!(session_id = %session_id, saved, "History saved");
        Ok(())
    }

    /// Load a session's history in insertion order.
    pub fn load(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, CompassError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, role, text, media, suggestions, status, timestamp_ms
                     FROM chat_messages
                     WHERE session_id = ?1
                     ORDER BY position ASC",
                )
                .map_err(|e| CompassError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| CompassError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| CompassError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    /// Delete every stored message of a session.
    pub fn clear(&self, session_id: Uuid) -> Result<(), CompassError> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM chat_messages WHERE session_id = ?1",
                    rusqlite::params![session_id.to_string()],
                )
                .map_err(|e| CompassError::Storage(format!("Failed to clear history: {}", e)))?;
            debug!(session_id = %session_id, removed, "History cleared");
            Ok(())
        })
    }

    pub fn count(&self, session_id: Uuid) -> Result<u64, CompassError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
                    rusqlite::params![session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| CompassError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

fn register(conn: &Connection, session_id: Uuid) -> Result<(), CompassError> {
    conn.execute(
        "INSERT OR IGNORE INTO chat_sessions (id, created_at) VALUES (?1, ?2)",
        rusqlite::params![session_id.to_string(), Utc::now().timestamp()],
    )
    .map_err(|e| CompassError::Storage(format!("Failed to open session: {}", e)))?;
    Ok(())
}

/// Insert at the next position of the session.
fn insert(
    conn: &Connection,
    session_id: Uuid,
    message: &ChatMessage,
) -> Result<(), CompassError> {
    let media = serde_json::to_string(&message.media)?;
    let suggestions = serde_json::to_string(&message.suggestions)?;
    conn.execute(
        "INSERT INTO chat_messages
            (id, session_id, position, role, text, media, suggestions, status, timestamp_ms)
         VALUES (?1, ?2,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM chat_messages WHERE session_id = ?2),
            ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            message.id.to_string(),
            session_id.to_string(),
            message.role.as_str(),
            message.text,
            media,
            suggestions,
            status_str(message.status),
            message.timestamp.timestamp_millis(),
        ],
    )
    .map_err(|e| CompassError::Storage(format!("Failed to save message: {}", e)))?;
    Ok(())
}

fn touch(conn: &Connection, session_id: Uuid) -> Result<(), CompassError> {
    conn.execute(
        "UPDATE chat_sessions SET updated_at = strftime('%s', 'now') WHERE id = ?1",
        rusqlite::params![session_id.to_string()],
    )
    .map_err(|e| CompassError::Storage(e.to_string()))?;
    Ok(())
}

fn status_str(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Fallback => "fallback",
        MessageStatus::Delivered | MessageStatus::Pending => "delivered",
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<ChatMessage, CompassError> {
    let get_text = |idx: usize| -> Result<String, CompassError> {
        row.get(idx)
            .map_err(|e| CompassError::Storage(e.to_string()))
    };
    let id = get_text(0)?;
    let role = get_text(1)?;
    let text = get_text(2)?;
    let media = get_text(3)?;
    let suggestions = get_text(4)?;
    let status = get_text(5)?;
    let timestamp_ms: i64 = row
        .get(6)
        .map_err(|e| CompassError::Storage(e.to_string()))?;

    Ok(ChatMessage {
        id: Uuid::parse_str(&id)
            .map_err(|e| CompassError::Storage(format!("Invalid UUID: {}", e)))?,
        role: role.parse::<Role>()?,
        text,
        media: serde_json::from_str::<Media>(&media)?,
        suggestions: serde_json::from_str(&suggestions)?,
        timestamp: Utc
            .timestamp_millis_opt(timestamp_ms)
            .single()
            .unwrap_or_default(),
        status: match status.as_str() {
            "fallback" => MessageStatus::Fallback,
            _ => MessageStatus::Delivered,
        },
    })
}
