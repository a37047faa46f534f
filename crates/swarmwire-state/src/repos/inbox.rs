use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StateError;

pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxStatus {
    Unread,
    Read,
    Archived,
    Deleted,
}

impl InboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxStatus::Unread => "unread",
            InboxStatus::Read => "read",
            InboxStatus::Archived => "archived",
            InboxStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(InboxStatus::Unread),
            "read" => Some(InboxStatus::Read),
            "archived" => Some(InboxStatus::Archived),
            "deleted" => Some(InboxStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InboxMessageRecord {
    pub message_id: String,
    pub swarm_id: String,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    pub message_type: String,
    pub content: String,
    pub received_at: String,
    pub read_at: Option<String>,
    pub deleted_at: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct InboxCounts {
    pub unread: i64,
    pub read: i64,
    pub archived: i64,
    pub deleted: i64,
    pub total: i64,
}

pub struct InboxRepository;

impl InboxRepository {
    /// Insert a received message. On primary-key conflict (duplicate
    /// `message_id`) this is a silent no-op — the idempotency property
    /// required of message ingress.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        conn: &Connection,
        message_id: &str,
        swarm_id: &str,
        sender_id: &str,
        recipient_id: Option<&str>,
        message_type: &str,
        content: &str,
    ) -> Result<bool, StateError> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO inbox
                (message_id, swarm_id, sender_id, recipient_id, message_type, content, received_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'unread')",
            params![
                message_id,
                swarm_id,
                sender_id,
                recipient_id,
                message_type,
                content,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_by_id(conn: &Connection, message_id: &str) -> Result<Option<InboxMessageRecord>, StateError> {
        conn.query_row(
            "SELECT message_id, swarm_id, sender_id, recipient_id, message_type, content,
                    received_at, read_at, deleted_at, status
             FROM inbox WHERE message_id = ?1",
            params![message_id],
            row_to_record,
        )
        .optional()
        .map_err(StateError::from)
    }

    /// Fetch a message, auto-transitioning `unread -> read` first if needed.
    pub fn get_and_mark_read(
        conn: &Connection,
        message_id: &str,
    ) -> Result<Option<InboxMessageRecord>, StateError> {
        Self::mark_read(conn, message_id)?;
        Self::get_by_id(conn, message_id)
    }

    /// Idempotent mark_read: `unread -> read`, setting `read_at`. A
    /// message already `read` is untouched; other states are no-ops.
    pub fn mark_read(conn: &Connection, message_id: &str) -> Result<usize, StateError> {
        let already_read: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM inbox WHERE message_id = ?1 AND status = 'read')",
            params![message_id],
            |row| row.get(0),
        )?;
        if already_read {
            return Ok(0);
        }
        Ok(conn.execute(
            "UPDATE inbox SET status = 'read', read_at = ?2 WHERE message_id = ?1 AND status = 'unread'",
            params![message_id, chrono::Utc::now().to_rfc3339()],
        )?)
    }

    /// `unread | read -> archived`. Returns 0 if already archived or deleted.
    pub fn mark_archived(conn: &Connection, message_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "UPDATE inbox SET status = 'archived'
             WHERE message_id = ?1 AND status IN ('unread', 'read')",
            params![message_id],
        )?)
    }

    /// `* \ deleted -> deleted` (soft delete, terminal pending purge).
    pub fn mark_deleted(conn: &Connection, message_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "UPDATE inbox SET status = 'deleted', deleted_at = ?2
             WHERE message_id = ?1 AND status != 'deleted'",
            params![message_id, chrono::Utc::now().to_rfc3339()],
        )?)
    }

    /// List visible messages. `status = None` means `all`, i.e.
    /// `{unread, read, archived}` — `deleted` is never listed this way.
    pub fn list_visible(
        conn: &Connection,
        status: Option<&str>,
        swarm_id: Option<&str>,
        sender_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<InboxMessageRecord>, StateError> {
        if limit <= 0 {
            return Err(StateError::Validation("limit must be positive".into()));
        }
        let limit = limit.min(MAX_LIST_LIMIT);

        let mut sql = String::from(
            "SELECT message_id, swarm_id, sender_id, recipient_id, message_type, content,
                    received_at, read_at, deleted_at, status
             FROM inbox WHERE 1 = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        match status {
            None | Some("all") => sql.push_str(" AND status != 'deleted'"),
            Some(s) => {
                sql.push_str(" AND status = ?");
                args.push(Box::new(s.to_string()));
            }
        }
        if let Some(swarm_id) = swarm_id {
            sql.push_str(" AND swarm_id = ?");
            args.push(Box::new(swarm_id.to_string()));
        }
        if let Some(sender_id) = sender_id {
            sql.push_str(" AND sender_id = ?");
            args.push(Box::new(sender_id.to_string()));
        }
        sql.push_str(" ORDER BY received_at DESC LIMIT ?");
        args.push(Box::new(limit));

        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_by_status(conn: &Connection, swarm_id: Option<&str>) -> Result<InboxCounts, StateError> {
        let mut sql = String::from("SELECT status, COUNT(*) FROM inbox WHERE 1 = 1");
        if swarm_id.is_some() {
            sql.push_str(" AND swarm_id = ?1");
        }
        sql.push_str(" GROUP BY status");

        let mut stmt = conn.prepare(&sql)?;
        let mut counts = InboxCounts::default();
        let rows: Vec<(String, i64)> = if let Some(swarm_id) = swarm_id {
            stmt.query_map(params![swarm_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?
        };
        for (status, count) in rows {
            match status.as_str() {
                "unread" => counts.unread = count,
                "read" => counts.read = count,
                "archived" => counts.archived = count,
                "deleted" => counts.deleted = count,
                _ => {}
            }
            counts.total += count;
        }
        Ok(counts)
    }

    /// Apply `action` (`read`/`archive`/`delete`) to each id in `message_ids`,
    /// returning the number of rows actually updated.
    pub fn batch_update_status(
        conn: &Connection,
        message_ids: &[String],
        action: &str,
    ) -> Result<usize, StateError> {
        let mut updated = 0;
        for id in message_ids {
            updated += match action {
                "read" => Self::mark_read(conn, id)?,
                "archive" => Self::mark_archived(conn, id)?,
                "delete" => Self::mark_deleted(conn, id)?,
                other => {
                    return Err(StateError::Validation(format!("unknown batch action {other:?}")));
                }
            };
        }
        Ok(updated)
    }

    /// Permanently remove `deleted` rows, optionally only those deleted
    /// more than `older_than_hours` ago.
    pub fn purge_deleted(conn: &Connection, older_than_hours: Option<i64>) -> Result<usize, StateError> {
        match older_than_hours {
            Some(hours) => {
                let cutoff = (chrono::Utc::now() - chrono::Duration::hours(hours)).to_rfc3339();
                Ok(conn.execute(
                    "DELETE FROM inbox WHERE status = 'deleted' AND deleted_at < ?1",
                    params![cutoff],
                )?)
            }
            None => Ok(conn.execute("DELETE FROM inbox WHERE status = 'deleted'", [])?),
        }
    }

    pub fn purge_archived(conn: &Connection) -> Result<usize, StateError> {
        Ok(conn.execute("DELETE FROM inbox WHERE status = 'archived'", [])?)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<InboxMessageRecord> {
    Ok(InboxMessageRecord {
        message_id: row.get(0)?,
        swarm_id: row.get(1)?,
        sender_id: row.get(2)?,
        recipient_id: row.get(3)?,
        message_type: row.get(4)?,
        content: row.get(5)?,
        received_at: row.get(6)?,
        read_at: row.get(7)?,
        deleted_at: row.get(8)?,
        status: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;

    fn seed(conn: &Connection, id: &str) {
        InboxRepository::insert(conn, id, "s1", "sender", None, "message", "{}").unwrap();
    }

    #[test]
    fn insert_is_idempotent_on_duplicate_message_id() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        assert!(InboxRepository::insert(&conn, "m1", "s1", "a", None, "message", "{}").unwrap());
        assert!(!InboxRepository::insert(&conn, "m1", "s1", "a", None, "message", "{}").unwrap());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM inbox WHERE message_id = 'm1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn status_machine_enforces_guarded_transitions() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        seed(&conn, "m2");

        assert_eq!(InboxRepository::mark_archived(&conn, "m2").unwrap(), 1);
        // archived -> read is illegal: no rows updated.
        assert_eq!(InboxRepository::mark_read(&conn, "m2").unwrap(), 0);
        assert_eq!(InboxRepository::mark_deleted(&conn, "m2").unwrap(), 1);
        // second delete is a no-op.
        assert_eq!(InboxRepository::mark_deleted(&conn, "m2").unwrap(), 0);
    }

    #[test]
    fn get_and_mark_read_sets_read_at() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        seed(&conn, "m3");
        let record = InboxRepository::get_and_mark_read(&conn, "m3").unwrap().unwrap();
        assert_eq!(record.status, "read");
        assert!(record.read_at.is_some());
    }

    #[test]
    fn list_visible_all_excludes_only_deleted() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        seed(&conn, "m4");
        seed(&conn, "m5");
        seed(&conn, "m6");
        InboxRepository::mark_archived(&conn, "m5").unwrap();
        InboxRepository::mark_deleted(&conn, "m6").unwrap();

        let visible = InboxRepository::list_visible(&conn, Some("all"), None, None, 10).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|m| m.status != "deleted"));
    }

    #[test]
    fn list_visible_rejects_non_positive_limit() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        let err = InboxRepository::list_visible(&conn, None, None, None, 0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn batch_update_status_reports_total_updated() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        seed(&conn, "m7");
        seed(&conn, "m8");
        let updated =
            InboxRepository::batch_update_status(&conn, &["m7".into(), "m8".into(), "missing".into()], "read")
                .unwrap();
        assert_eq!(updated, 2);
    }

    #[test]
    fn purge_deleted_removes_only_deleted_rows() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        seed(&conn, "m9");
        seed(&conn, "m10");
        InboxRepository::mark_deleted(&conn, "m9").unwrap();
        let purged = InboxRepository::purge_deleted(&conn, None).unwrap();
        assert_eq!(purged, 1);
        assert!(InboxRepository::get_by_id(&conn, "m10").unwrap().is_some());
    }
}
