use rusqlite::{params, Connection};

use crate::error::StateError;

pub struct MuteRepository;

impl MuteRepository {
    pub fn mute_agent(conn: &Connection, agent_id: &str, reason: Option<&str>) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR REPLACE INTO muted_agents (agent_id, muted_at, reason) VALUES (?1, ?2, ?3)",
            params![agent_id, chrono::Utc::now().to_rfc3339(), reason],
        )?;
        Ok(())
    }

    pub fn unmute_agent(conn: &Connection, agent_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute("DELETE FROM muted_agents WHERE agent_id = ?1", params![agent_id])?)
    }

    pub fn is_agent_muted(conn: &Connection, agent_id: &str) -> Result<bool, StateError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM muted_agents WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mute_swarm(conn: &Connection, swarm_id: &str, reason: Option<&str>) -> Result<(), StateError> {
        conn.execute(
            "INSERT OR REPLACE INTO muted_swarms (swarm_id, muted_at, reason) VALUES (?1, ?2, ?3)",
            params![swarm_id, chrono::Utc::now().to_rfc3339(), reason],
        )?;
        Ok(())
    }

    pub fn unmute_swarm(conn: &Connection, swarm_id: &str) -> Result<usize, StateError> {
        Ok(conn.execute("DELETE FROM muted_swarms WHERE swarm_id = ?1", params![swarm_id])?)
    }

    pub fn is_swarm_muted(conn: &Connection, swarm_id: &str) -> Result<bool, StateError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM muted_swarms WHERE swarm_id = ?1",
            params![swarm_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_muted_agents(conn: &Connection) -> Result<Vec<String>, StateError> {
        let mut stmt = conn.prepare("SELECT agent_id FROM muted_agents ORDER BY muted_at DESC")?;
        let rows = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_muted_swarms(conn: &Connection) -> Result<Vec<String>, StateError> {
        let mut stmt = conn.prepare("SELECT swarm_id FROM muted_swarms ORDER BY muted_at DESC")?;
        let rows = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
