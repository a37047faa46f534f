use rusqlite::{params, Connection};

use crate::error::StateError;
use crate::repos::inbox::MAX_LIST_LIMIT;

#[derive(Debug, Clone)]
pub struct OutboxMessageRecord {
    pub message_id: String,
    pub swarm_id: String,
    pub recipient_id: String,
    pub message_type: String,
    pub content: String,
    pub sent_at: String,
    pub delivered_at: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

pub struct OutboxRepository;

impl OutboxRepository {
    pub fn insert_sent(
        conn: &Connection,
        message_id: &str,
        swarm_id: &str,
        recipient_id: &str,
        message_type: &str,
        content: &str,
    ) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR IGNORE INTO outbox
                (message_id, swarm_id, recipient_id, message_type, content, sent_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'sent')",
            params![message_id, swarm_id, recipient_id, message_type, content, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// `sent -> delivered`, only once.
    pub fn mark_delivered(conn: &Connection, message_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "UPDATE outbox SET status = 'delivered', delivered_at = ?2
             WHERE message_id = ?1 AND status = 'sent'",
            params![message_id, chrono::Utc::now().to_rfc3339()],
        )?)
    }

    /// `sent -> failed`, only once.
    pub fn mark_failed(conn: &Connection, message_id: &str, error: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "UPDATE outbox SET status = 'failed', error = ?2 WHERE message_id = ?1 AND status = 'sent'",
            params![message_id, error],
        )?)
    }

    pub fn list_all(conn: &Connection, limit: i64) -> Result<Vec<OutboxMessageRecord>, StateError> {
        Self::list(conn, None, limit)
    }

    pub fn list_by_swarm(
        conn: &Connection,
        swarm_id: &str,
        limit: i64,
    ) -> Result<Vec<OutboxMessageRecord>, StateError> {
        Self::list(conn, Some(swarm_id), limit)
    }

    fn list(conn: &Connection, swarm_id: Option<&str>, limit: i64) -> Result<Vec<OutboxMessageRecord>, StateError> {
        if limit <= 0 {
            return Err(StateError::Validation("limit must be positive".into()));
        }
        let limit = limit.min(MAX_LIST_LIMIT);

        let base = "SELECT message_id, swarm_id, recipient_id, message_type, content,
                           sent_at, delivered_at, status, error
                    FROM outbox";
        let rows = if let Some(swarm_id) = swarm_id {
            let mut stmt =
                conn.prepare(&format!("{base} WHERE swarm_id = ?1 ORDER BY sent_at DESC LIMIT ?2"))?;
            stmt.query_map(params![swarm_id, limit], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare(&format!("{base} ORDER BY sent_at DESC LIMIT ?1"))?;
            stmt.query_map(params![limit], row_to_record)?.collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    pub fn count_by_swarm(conn: &Connection, swarm_id: &str) -> Result<i64, StateError> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE swarm_id = ?1",
            params![swarm_id],
            |row| row.get(0),
        )?)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<OutboxMessageRecord> {
    Ok(OutboxMessageRecord {
        message_id: row.get(0)?,
        swarm_id: row.get(1)?,
        recipient_id: row.get(2)?,
        message_type: row.get(3)?,
        content: row.get(4)?,
        sent_at: row.get(5)?,
        delivered_at: row.get(6)?,
        status: row.get(7)?,
        error: row.get(8)?,
    })
}
