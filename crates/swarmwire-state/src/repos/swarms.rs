use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StateError;

#[derive(Debug, Clone)]
pub struct SwarmRecord {
    pub swarm_id: String,
    pub name: String,
    pub master: String,
    pub joined_at: String,
    pub allow_member_invite: bool,
    pub require_approval: bool,
}

#[derive(Debug, Clone)]
pub struct SwarmMemberRecord {
    pub agent_id: String,
    pub swarm_id: String,
    pub endpoint: String,
    pub public_key: String,
    pub joined_at: String,
}

pub struct SwarmRepository;

impl SwarmRepository {
    /// Create a swarm with the master as its sole initial member.
    #[allow(clippy::too_many_arguments)]
    pub fn create_swarm(
        conn: &Connection,
        swarm_id: &str,
        name: &str,
        master_id: &str,
        master_endpoint: &str,
        master_public_key: &str,
        allow_member_invite: bool,
        require_approval: bool,
    ) -> Result<SwarmRecord, StateError> {
        if name.is_empty() || name.chars().count() > 256 {
            return Err(StateError::Validation(
                "swarm name must be non-empty and at most 256 characters".into(),
            ));
        }
        let joined_at = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO swarms (swarm_id, name, master, joined_at, allow_member_invite, require_approval)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![swarm_id, name, master_id, joined_at, allow_member_invite, require_approval],
        )?;
        conn.execute(
            "INSERT INTO swarm_members (agent_id, swarm_id, endpoint, public_key, joined_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![master_id, swarm_id, master_endpoint, master_public_key, joined_at],
        )?;
        Ok(SwarmRecord {
            swarm_id: swarm_id.to_string(),
            name: name.to_string(),
            master: master_id.to_string(),
            joined_at,
            allow_member_invite,
            require_approval,
        })
    }

    pub fn get_swarm(conn: &Connection, swarm_id: &str) -> Result<Option<SwarmRecord>, StateError> {
        conn.query_row(
            "SELECT swarm_id, name, master, joined_at, allow_member_invite, require_approval
             FROM swarms WHERE swarm_id = ?1",
            params![swarm_id],
            |row| {
                Ok(SwarmRecord {
                    swarm_id: row.get(0)?,
                    name: row.get(1)?,
                    master: row.get(2)?,
                    joined_at: row.get(3)?,
                    allow_member_invite: row.get(4)?,
                    require_approval: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(StateError::from)
    }

    pub fn delete_swarm(conn: &Connection, swarm_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute("DELETE FROM swarms WHERE swarm_id = ?1", params![swarm_id])?)
    }

    /// Insert a member. Duplicate-safe: a repeat join is a no-op.
    pub fn add_member(
        conn: &Connection,
        swarm_id: &str,
        agent_id: &str,
        endpoint: &str,
        public_key: &str,
    ) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR IGNORE INTO swarm_members (agent_id, swarm_id, endpoint, public_key, joined_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![agent_id, swarm_id, endpoint, public_key, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove_member(conn: &Connection, swarm_id: &str, agent_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute(
            "DELETE FROM swarm_members WHERE swarm_id = ?1 AND agent_id = ?2",
            params![swarm_id, agent_id],
        )?)
    }

    pub fn is_member(conn: &Connection, swarm_id: &str, agent_id: &str) -> Result<bool, StateError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM swarm_members WHERE swarm_id = ?1 AND agent_id = ?2",
            params![swarm_id, agent_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_members(conn: &Connection, swarm_id: &str) -> Result<Vec<SwarmMemberRecord>, StateError> {
        let mut stmt = conn.prepare(
            "SELECT agent_id, swarm_id, endpoint, public_key, joined_at
             FROM swarm_members WHERE swarm_id = ?1 ORDER BY joined_at ASC",
        )?;
        let rows = stmt
            .query_map(params![swarm_id], |row| {
                Ok(SwarmMemberRecord {
                    agent_id: row.get(0)?,
                    swarm_id: row.get(1)?,
                    endpoint: row.get(2)?,
                    public_key: row.get(3)?,
                    joined_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_member(
        conn: &Connection,
        swarm_id: &str,
        agent_id: &str,
    ) -> Result<Option<SwarmMemberRecord>, StateError> {
        conn.query_row(
            "SELECT agent_id, swarm_id, endpoint, public_key, joined_at
             FROM swarm_members WHERE swarm_id = ?1 AND agent_id = ?2",
            params![swarm_id, agent_id],
            |row| {
                Ok(SwarmMemberRecord {
                    agent_id: row.get(0)?,
                    swarm_id: row.get(1)?,
                    endpoint: row.get(2)?,
                    public_key: row.get(3)?,
                    joined_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(StateError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;

    #[test]
    fn create_swarm_makes_master_a_member() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        SwarmRepository::create_swarm(&conn, "s1", "Test Swarm", "a1", "https://a.example", "pk-a", false, false)
            .unwrap();
        assert!(SwarmRepository::is_member(&conn, "s1", "a1").unwrap());
    }

    #[test]
    fn empty_name_is_rejected() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        let err =
            SwarmRepository::create_swarm(&conn, "s1", "", "a1", "https://a.example", "pk-a", false, false)
                .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn add_member_is_idempotent() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        SwarmRepository::create_swarm(&conn, "s1", "Test", "a1", "https://a.example", "pk-a", false, false)
            .unwrap();
        SwarmRepository::add_member(&conn, "s1", "b1", "https://b.example", "pk-b").unwrap();
        SwarmRepository::add_member(&conn, "s1", "b1", "https://b.example", "pk-b").unwrap();
        assert_eq!(SwarmRepository::list_members(&conn, "s1").unwrap().len(), 2);
    }

    #[test]
    fn delete_swarm_cascades_members() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let conn = db.connection();
        SwarmRepository::create_swarm(&conn, "s1", "Test", "a1", "https://a.example", "pk-a", false, false)
            .unwrap();
        SwarmRepository::delete_swarm(&conn, "s1").unwrap();
        assert_eq!(SwarmRepository::list_members(&conn, "s1").unwrap().len(), 0);
    }
}
