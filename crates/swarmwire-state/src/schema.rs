//! Schema v2 DDL and the one-time legacy `message_queue` projection.

use rusqlite::Connection;

use crate::error::StateError;

pub const CURRENT_SCHEMA_VERSION: &str = "2.0.0";

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_versions (
        version TEXT PRIMARY KEY,
        applied_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS swarms (
        swarm_id TEXT PRIMARY KEY,
        name TEXT NOT NULL CHECK (length(name) <= 256),
        master TEXT NOT NULL,
        joined_at TEXT NOT NULL,
        allow_member_invite INTEGER NOT NULL DEFAULT 0,
        require_approval INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS swarm_members (
        agent_id TEXT NOT NULL,
        swarm_id TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        public_key TEXT NOT NULL,
        joined_at TEXT NOT NULL,
        PRIMARY KEY (agent_id, swarm_id),
        FOREIGN KEY (swarm_id) REFERENCES swarms(swarm_id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_members_swarm ON swarm_members(swarm_id)",
    "CREATE TABLE IF NOT EXISTS inbox (
        message_id TEXT PRIMARY KEY,
        swarm_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        recipient_id TEXT,
        message_type TEXT NOT NULL,
        content TEXT NOT NULL,
        received_at TEXT NOT NULL,
        read_at TEXT,
        deleted_at TEXT,
        status TEXT NOT NULL DEFAULT 'unread'
            CHECK (status IN ('unread', 'read', 'archived', 'deleted'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_inbox_status ON inbox(status)",
    "CREATE INDEX IF NOT EXISTS idx_inbox_swarm ON inbox(swarm_id)",
    "CREATE INDEX IF NOT EXISTS idx_inbox_sender ON inbox(sender_id)",
    "CREATE TABLE IF NOT EXISTS outbox (
        message_id TEXT PRIMARY KEY,
        swarm_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        message_type TEXT NOT NULL,
        content TEXT NOT NULL,
        sent_at TEXT NOT NULL,
        delivered_at TEXT,
        status TEXT NOT NULL DEFAULT 'sent'
            CHECK (status IN ('sent', 'delivered', 'failed')),
        error TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_outbox_swarm ON outbox(swarm_id)",
    "CREATE INDEX IF NOT EXISTS idx_outbox_sent_at ON outbox(sent_at)",
    "CREATE TABLE IF NOT EXISTS muted_agents (
        agent_id TEXT PRIMARY KEY,
        muted_at TEXT NOT NULL,
        reason TEXT
    )",
    "CREATE TABLE IF NOT EXISTS muted_swarms (
        swarm_id TEXT PRIMARY KEY,
        muted_at TEXT NOT NULL,
        reason TEXT
    )",
    "CREATE TABLE IF NOT EXISTS public_keys (
        agent_id TEXT PRIMARY KEY,
        public_key TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        endpoint TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sdk_sessions (
        swarm_id TEXT NOT NULL,
        peer_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        last_active TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'active' CHECK (state IN ('active', 'expired')),
        PRIMARY KEY (swarm_id, peer_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_sessions_last_active ON sdk_sessions(last_active)",
];

/// Create any missing tables/indexes, record the current schema version,
/// and project a legacy `message_queue` table into `inbox` exactly once.
pub fn migrate(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    for stmt in SCHEMA_STATEMENTS {
        conn.execute(stmt, [])?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_versions (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![CURRENT_SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
    )?;

    if legacy_message_queue_exists(conn)? {
        project_legacy_message_queue(conn)?;
    }

    Ok(())
}

fn legacy_message_queue_exists(conn: &Connection) -> Result<bool, StateError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'message_queue')",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Project every legacy `message_queue` row into `inbox` exactly once,
/// tracked by a marker row in `schema_versions`. A pending legacy row
/// becomes `unread`; any other legacy status becomes `read`. The legacy
/// table is never dropped or mutated.
fn project_legacy_message_queue(conn: &Connection) -> Result<(), StateError> {
    const MARKER: &str = "legacy-message-queue-projected";
    let already_done: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_versions WHERE version = ?1)",
        rusqlite::params![MARKER],
        |row| row.get(0),
    )?;
    if already_done {
        return Ok(());
    }

    let mut stmt = conn.prepare(
        "SELECT message_id, swarm_id, sender_id, message_type, content, received_at, status
         FROM message_queue",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    for row in rows {
        let (message_id, swarm_id, sender_id, message_type, content, received_at, status) = row?;
        let mapped_status = if status == "pending" { "unread" } else { "read" };
        conn.execute(
            "INSERT OR IGNORE INTO inbox
                (message_id, swarm_id, sender_id, recipient_id, message_type, content, received_at, read_at, deleted_at, status)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, NULL, NULL, ?7)",
            rusqlite::params![message_id, swarm_id, sender_id, message_type, content, received_at, mapped_status],
        )?;
    }
    drop(stmt);

    conn.execute(
        "INSERT OR IGNORE INTO schema_versions (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![MARKER, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let version: String = conn
            .query_row(
                "SELECT version FROM schema_versions WHERE version = ?1",
                rusqlite::params![CURRENT_SCHEMA_VERSION],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn legacy_queue_projects_into_inbox_once() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE message_queue (
                message_id TEXT PRIMARY KEY, swarm_id TEXT, sender_id TEXT,
                message_type TEXT, content TEXT, received_at TEXT,
                processed_at TEXT, status TEXT, error TEXT
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO message_queue (message_id, swarm_id, sender_id, message_type, content, received_at, status)
             VALUES ('m1', 's1', 'a1', 'message', 'hi', '2024-01-01T00:00:00Z', 'pending')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM inbox WHERE message_id = 'm1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let status: String = conn
            .query_row("SELECT status FROM inbox WHERE message_id = 'm1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "unread");
    }
}
