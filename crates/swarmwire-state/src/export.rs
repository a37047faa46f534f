//! Export/import of the full local state as one JSON document, per
//! SPEC_FULL.md §6's persisted-state-layout contract.

use rusqlite::{params, Connection};
use serde_json::{json, Value};

use crate::error::StateError;
use crate::repos::inbox::InboxRepository;
use crate::repos::mutes::MuteRepository;
use crate::repos::outbox::OutboxRepository;
use crate::repos::swarms::SwarmRepository;
use crate::schema::CURRENT_SCHEMA_VERSION;

const SUPPORTED_IMPORT_VERSIONS: &[&str] = &["1.0.0", "2.0.0"];
const EXPORT_LIST_LIMIT: i64 = 100;

/// Build the full export document for `agent_id`.
pub fn export_state(conn: &Connection, agent_id: &str) -> Result<Value, StateError> {
    let mut swarms = serde_json::Map::new();
    {
        let mut stmt = conn.prepare("SELECT swarm_id FROM swarms")?;
        let swarm_ids: Vec<String> = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<_>, _>>()?;
        for swarm_id in swarm_ids {
            let swarm = SwarmRepository::get_swarm(conn, &swarm_id)?
                .expect("swarm_id came from swarms table scan");
            let members = SwarmRepository::list_members(conn, &swarm_id)?;
            swarms.insert(
                swarm_id.clone(),
                json!({
                    "name": swarm.name,
                    "master": swarm.master,
                    "joined_at": swarm.joined_at,
                    "allow_member_invite": swarm.allow_member_invite,
                    "require_approval": swarm.require_approval,
                    "members": members.into_iter().map(|m| json!({
                        "agent_id": m.agent_id,
                        "endpoint": m.endpoint,
                        "public_key": m.public_key,
                        "joined_at": m.joined_at,
                    })).collect::<Vec<_>>(),
                }),
            );
        }
    }

    let muted_swarms = MuteRepository::list_muted_swarms(conn)?;
    let muted_agents = MuteRepository::list_muted_agents(conn)?;

    let mut public_keys = serde_json::Map::new();
    {
        let mut stmt = conn.prepare("SELECT agent_id, public_key, fetched_at, endpoint FROM public_keys")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        for row in rows {
            let (agent_id, public_key, fetched_at, endpoint) = row?;
            public_keys.insert(agent_id, json!({"public_key": public_key, "fetched_at": fetched_at, "endpoint": endpoint}));
        }
    }

    let inbox = InboxRepository::list_visible(conn, Some("all"), None, None, EXPORT_LIST_LIMIT)?;
    let outbox = OutboxRepository::list_all(conn, EXPORT_LIST_LIMIT)?;

    Ok(json!({
        "schema_version": CURRENT_SCHEMA_VERSION,
        "agent_id": agent_id,
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "swarms": swarms,
        "muted_swarms": muted_swarms,
        "muted_agents": muted_agents,
        "public_keys": public_keys,
        "inbox": inbox.into_iter().map(inbox_to_json).collect::<Vec<_>>(),
        "outbox": outbox.into_iter().map(outbox_to_json).collect::<Vec<_>>(),
    }))
}

fn inbox_to_json(m: crate::repos::inbox::InboxMessageRecord) -> Value {
    json!({
        "message_id": m.message_id,
        "swarm_id": m.swarm_id,
        "sender_id": m.sender_id,
        "recipient_id": m.recipient_id,
        "message_type": m.message_type,
        "content": m.content,
        "received_at": m.received_at,
        "read_at": m.read_at,
        "deleted_at": m.deleted_at,
        "status": m.status,
    })
}

fn outbox_to_json(m: crate::repos::outbox::OutboxMessageRecord) -> Value {
    json!({
        "message_id": m.message_id,
        "swarm_id": m.swarm_id,
        "recipient_id": m.recipient_id,
        "message_type": m.message_type,
        "content": m.content,
        "sent_at": m.sent_at,
        "delivered_at": m.delivered_at,
        "status": m.status,
        "error": m.error,
    })
}

/// Import a previously exported document. When `merge` is false, the
/// swarms/members/mutes/keys/inbox/outbox tables are truncated first (in
/// FK-respecting order: members before swarms). All-or-nothing: any
/// error rolls the whole import back.
pub fn import_state(conn: &mut Connection, state: &Value, merge: bool) -> Result<(), StateError> {
    let version = state
        .get("schema_version")
        .and_then(Value::as_str)
        .ok_or_else(|| StateError::CorruptExport("missing schema_version".into()))?;
    if !SUPPORTED_IMPORT_VERSIONS.contains(&version) {
        return Err(StateError::UnsupportedSchemaVersion(version.to_string()));
    }

    let tx = conn.transaction()?;

    if !merge {
        tx.execute("DELETE FROM swarm_members", [])?;
        tx.execute("DELETE FROM swarms", [])?;
        tx.execute("DELETE FROM muted_agents", [])?;
        tx.execute("DELETE FROM muted_swarms", [])?;
        tx.execute("DELETE FROM public_keys", [])?;
        tx.execute("DELETE FROM inbox", [])?;
        tx.execute("DELETE FROM outbox", [])?;
    }

    if let Some(swarms) = state.get("swarms").and_then(Value::as_object) {
        for (swarm_id, swarm) in swarms {
            tx.execute(
                "INSERT OR IGNORE INTO swarms (swarm_id, name, master, joined_at, allow_member_invite, require_approval)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    swarm_id,
                    swarm.get("name").and_then(Value::as_str).unwrap_or_default(),
                    swarm.get("master").and_then(Value::as_str).unwrap_or_default(),
                    swarm.get("joined_at").and_then(Value::as_str).unwrap_or_default(),
                    swarm.get("allow_member_invite").and_then(Value::as_bool).unwrap_or(false),
                    swarm.get("require_approval").and_then(Value::as_bool).unwrap_or(false),
                ],
            )?;
            if let Some(members) = swarm.get("members").and_then(Value::as_array) {
                for member in members {
                    tx.execute(
                        "INSERT OR IGNORE INTO swarm_members (agent_id, swarm_id, endpoint, public_key, joined_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            member.get("agent_id").and_then(Value::as_str).unwrap_or_default(),
                            swarm_id,
                            member.get("endpoint").and_then(Value::as_str).unwrap_or_default(),
                            member.get("public_key").and_then(Value::as_str).unwrap_or_default(),
                            member.get("joined_at").and_then(Value::as_str).unwrap_or_default(),
                        ],
                    )?;
                }
            }
        }
    }

    if let Some(muted_swarms) = state.get("muted_swarms").and_then(Value::as_array) {
        for swarm_id in muted_swarms.iter().filter_map(Value::as_str) {
            tx.execute(
                "INSERT OR IGNORE INTO muted_swarms (swarm_id, muted_at) VALUES (?1, ?2)",
                params![swarm_id, chrono::Utc::now().to_rfc3339()],
            )?;
        }
    }
    if let Some(muted_agents) = state.get("muted_agents").and_then(Value::as_array) {
        for agent_id in muted_agents.iter().filter_map(Value::as_str) {
            tx.execute(
                "INSERT OR IGNORE INTO muted_agents (agent_id, muted_at) VALUES (?1, ?2)",
                params![agent_id, chrono::Utc::now().to_rfc3339()],
            )?;
        }
    }
    if let Some(public_keys) = state.get("public_keys").and_then(Value::as_object) {
        for (agent_id, entry) in public_keys {
            tx.execute(
                "INSERT OR REPLACE INTO public_keys (agent_id, public_key, fetched_at, endpoint)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    agent_id,
                    entry.get("public_key").and_then(Value::as_str).unwrap_or_default(),
                    entry.get("fetched_at").and_then(Value::as_str).unwrap_or_default(),
                    entry.get("endpoint").and_then(Value::as_str),
                ],
            )?;
        }
    }

    if version == "2.0.0" {
        if let Some(inbox) = state.get("inbox").and_then(Value::as_array) {
            for m in inbox {
                tx.execute(
                    "INSERT OR IGNORE INTO inbox
                        (message_id, swarm_id, sender_id, recipient_id, message_type, content, received_at, read_at, deleted_at, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        m.get("message_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("swarm_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("sender_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("recipient_id").and_then(Value::as_str),
                        m.get("message_type").and_then(Value::as_str).unwrap_or_default(),
                        m.get("content").and_then(Value::as_str).unwrap_or_default(),
                        m.get("received_at").and_then(Value::as_str).unwrap_or_default(),
                        m.get("read_at").and_then(Value::as_str),
                        m.get("deleted_at").and_then(Value::as_str),
                        m.get("status").and_then(Value::as_str).unwrap_or("unread"),
                    ],
                )?;
            }
        }
        if let Some(outbox) = state.get("outbox").and_then(Value::as_array) {
            for m in outbox {
                tx.execute(
                    "INSERT OR IGNORE INTO outbox
                        (message_id, swarm_id, recipient_id, message_type, content, sent_at, delivered_at, status, error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        m.get("message_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("swarm_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("recipient_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("message_type").and_then(Value::as_str).unwrap_or_default(),
                        m.get("content").and_then(Value::as_str).unwrap_or_default(),
                        m.get("sent_at").and_then(Value::as_str).unwrap_or_default(),
                        m.get("delivered_at").and_then(Value::as_str),
                        m.get("status").and_then(Value::as_str).unwrap_or("sent"),
                        m.get("error").and_then(Value::as_str),
                    ],
                )?;
            }
        }
    } else if version == "1.0.0" {
        // Legacy documents carry `message_queue` entries instead of `inbox`.
        if let Some(queue) = state.get("message_queue").and_then(Value::as_array) {
            for m in queue {
                let legacy_status = m.get("status").and_then(Value::as_str).unwrap_or("pending");
                let status = if matches!(legacy_status, "pending" | "processing") {
                    "unread"
                } else {
                    "read"
                };
                tx.execute(
                    "INSERT OR IGNORE INTO inbox
                        (message_id, swarm_id, sender_id, recipient_id, message_type, content, received_at, read_at, deleted_at, status)
                     VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, NULL, NULL, ?7)",
                    params![
                        m.get("message_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("swarm_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("sender_id").and_then(Value::as_str).unwrap_or_default(),
                        m.get("message_type").and_then(Value::as_str).unwrap_or_default(),
                        m.get("content").and_then(Value::as_str).unwrap_or_default(),
                        m.get("received_at").and_then(Value::as_str).unwrap_or_default(),
                        status,
                    ],
                )?;
            }
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseManager;

    #[test]
    fn export_then_import_merge_false_reproduces_row_sets() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        {
            let conn = db.connection();
            SwarmRepository::create_swarm(&conn, "s1", "Test", "a1", "https://a.example", "pk-a", false, false)
                .unwrap();
            InboxRepository::insert(&conn, "m1", "s1", "a1", None, "message", "{}").unwrap();
        }

        let exported = {
            let conn = db.connection();
            export_state(&conn, "a1").unwrap()
        };

        let db2 = DatabaseManager::initialize_in_memory().unwrap();
        {
            let mut conn = db2.connection();
            import_state(&mut *conn, &exported, false).unwrap();
        }
        let reexported = {
            let conn = db2.connection();
            export_state(&conn, "a1").unwrap()
        };

        assert_eq!(exported["schema_version"], reexported["schema_version"]);
        assert_eq!(exported["swarms"], reexported["swarms"]);
        assert_eq!(exported["inbox"], reexported["inbox"]);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let mut conn = db.connection();
        let doc = json!({"schema_version": "9.9.9"});
        let err = import_state(&mut *conn, &doc, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Import);
    }

    #[test]
    fn legacy_v1_message_queue_maps_status() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let mut conn = db.connection();
        let doc = json!({
            "schema_version": "1.0.0",
            "message_queue": [
                {"message_id": "m1", "swarm_id": "s1", "sender_id": "a1", "message_type": "message", "content": "hi", "received_at": "2024-01-01T00:00:00Z", "status": "pending"},
                {"message_id": "m2", "swarm_id": "s1", "sender_id": "a1", "message_type": "message", "content": "hi", "received_at": "2024-01-01T00:00:00Z", "status": "processed"},
            ],
        });
        import_state(&mut *conn, &doc, false).unwrap();
        let s1: String = conn
            .query_row("SELECT status FROM inbox WHERE message_id = 'm1'", [], |r| r.get(0))
            .unwrap();
        let s2: String = conn
            .query_row("SELECT status FROM inbox WHERE message_id = 'm2'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(s1, "unread");
        assert_eq!(s2, "read");
    }
}
