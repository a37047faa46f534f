use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StateError;

#[derive(Debug, Clone)]
pub struct SdkSessionRecord {
    pub swarm_id: String,
    pub peer_id: String,
    pub session_id: String,
    pub last_active: String,
    pub state: String,
}

pub struct SdkSessionRepository;

impl SdkSessionRepository {
    /// Upsert on successful invocation, keyed by `(swarm_id, peer_id)`.
    pub fn upsert(conn: &Connection, swarm_id: &str, peer_id: &str, session_id: &str) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR REPLACE INTO sdk_sessions (swarm_id, peer_id, session_id, last_active, state)
             VALUES (?1, ?2, ?3, ?4, 'active')",
            params![swarm_id, peer_id, session_id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, swarm_id: &str, peer_id: &str) -> Result<Option<SdkSessionRecord>, StateError> {
        conn.query_row(
            "SELECT swarm_id, peer_id, session_id, last_active, state
             FROM sdk_sessions WHERE swarm_id = ?1 AND peer_id = ?2",
            params![swarm_id, peer_id],
            |row| {
                Ok(SdkSessionRecord {
                    swarm_id: row.get(0)?,
                    peer_id: row.get(1)?,
                    session_id: row.get(2)?,
                    last_active: row.get(3)?,
                    state: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(StateError::from)
    }

    pub fn delete(conn: &Connection, swarm_id: &str, peer_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "DELETE FROM sdk_sessions WHERE swarm_id = ?1 AND peer_id = ?2",
            params![swarm_id, peer_id],
        )?)
    }

    /// Remove sessions whose `last_active` is older than `timeout_minutes`.
    pub fn purge_expired(conn: &Connection, timeout_minutes: i64) -> Result<usize, StateError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::minutes(timeout_minutes)).to_rfc3339();
        Ok(conn.execute("DELETE FROM sdk_sessions WHERE last_active < ?1", params![cutoff])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;

    #[test]
    fn upsert_then_get_roundtrips() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        SdkSessionRepository::upsert(&conn, "s1", "peer-a", "sess-1").unwrap();
        let record = SdkSessionRepository::get(&conn, "s1", "peer-a").unwrap().unwrap();
        assert_eq!(record.session_id, "sess-1");
        assert_eq!(record.state, "active");
    }

    #[test]
    fn purge_expired_removes_old_rows_only() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        SdkSessionRepository::upsert(&conn, "s1", "peer-a", "sess-1").unwrap();
        conn.execute(
            "UPDATE sdk_sessions SET last_active = ?1 WHERE peer_id = 'peer-a'",
            params![(chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339()],
        )
        .unwrap();
        let purged = SdkSessionRepository::purge_expired(&conn, 30).unwrap();
        assert_eq!(purged, 1);
    }
}
