use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StateError;

pub const DEFAULT_STALE_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct PublicKeyRecord {
    pub agent_id: String,
    pub public_key: String,
    pub fetched_at: String,
    pub endpoint: Option<String>,
}

pub struct PublicKeyRepository;

impl PublicKeyRepository {
    pub fn upsert(
        conn: &Connection,
        agent_id: &str,
        public_key: &str,
        endpoint: Option<&str>,
    ) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR REPLACE INTO public_keys (agent_id, public_key, fetched_at, endpoint)
             VALUES (?1, ?2, ?3, ?4)",
            params![agent_id, public_key, chrono::Utc::now().to_rfc3339(), endpoint],
        )?;
        Ok(())
    }

    pub fn get(conn: &Connection, agent_id: &str) -> Result<Option<PublicKeyRecord>, StateError> {
        conn.query_row(
            "SELECT agent_id, public_key, fetched_at, endpoint FROM public_keys WHERE agent_id = ?1",
            params![agent_id],
            |row| {
                Ok(PublicKeyRecord {
                    agent_id: row.get(0)?,
                    public_key: row.get(1)?,
                    fetched_at: row.get(2)?,
                    endpoint: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(StateError::from)
    }

    /// Remove cache entries whose `fetched_at` is older than `stale_hours`.
    pub fn evict_stale(conn: &Connection, stale_hours: i64) -> Result<usize, StateError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::hours(stale_hours)).to_rfc3339();
        Ok(conn.execute("DELETE FROM public_keys WHERE fetched_at < ?1", params![cutoff])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;

    #[test]
    fn upsert_replaces_existing_entry() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        PublicKeyRepository::upsert(&conn, "a1", "pk-old", None).unwrap();
        PublicKeyRepository::upsert(&conn, "a1", "pk-new", Some("https://a.example")).unwrap();
        let record = PublicKeyRepository::get(&conn, "a1").unwrap().unwrap();
        assert_eq!(record.public_key, "pk-new");
    }
}
