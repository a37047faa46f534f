//! Integration tests exercising the library crates the CLI wires
//! together: identity, swarm/invite lifecycle, outbox delivery
//! bookkeeping, and state export/import.

use swarmwire_membership::create_swarm;
use swarmwire_protocol::crypto::{generate_keypair, load_or_create_keypair, public_key_to_base64};
use swarmwire_protocol::{make_invite, verify_invite, Message, MessageSender, MessageType};
use swarmwire_state::{export_state, import_state, DatabaseManager, OutboxRepository};

#[test]
fn identity_persists_across_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("agent.key");

    let k1 = load_or_create_keypair(&key_path).unwrap();
    assert!(key_path.exists(), "key file must be created on first call");

    let k2 = load_or_create_keypair(&key_path).unwrap();
    assert_eq!(k1.verifying_key().as_bytes(), k2.verifying_key().as_bytes());
}

#[test]
fn create_swarm_then_invite_then_join_roundtrip() {
    let db = DatabaseManager::initialize_in_memory().unwrap();
    let master_key = generate_keypair();

    let record = create_swarm(
        &db,
        "swarm-1",
        "Test Swarm",
        "master-a",
        "https://master.example:8443",
        &public_key_to_base64(&master_key.verifying_key()),
        false,
        false,
    )
    .unwrap();
    assert_eq!(record.master, "master-a");

    let token = make_invite(&master_key, "swarm-1", "master-a", "https://master.example:8443", None, None).unwrap();
    assert!(token.starts_with("swarm://swarm-1@master.example:8443?token="));

    let claims = verify_invite(&token, &master_key.verifying_key(), Some("swarm-1")).unwrap();
    assert_eq!(claims.master, "master-a");
    assert_eq!(claims.endpoint, "https://master.example:8443");
}

#[test]
fn send_records_outbox_entry_and_delivery_transitions() {
    let db = DatabaseManager::initialize_in_memory().unwrap();
    let key = generate_keypair();
    let swarm_id = uuid::Uuid::new_v4();

    let mut message = Message::new(
        MessageSender { agent_id: "agent-a".to_string(), endpoint: "https://a.example:8443".to_string() },
        "agent-b",
        swarm_id,
        MessageType::Message,
        "hello",
    );
    message.sign(&key);
    let message_id = message.message_id.to_string();

    {
        let conn = db.connection();
        OutboxRepository::insert_sent(&conn, &message_id, &swarm_id.to_string(), "agent-b", "message", "hello")
            .unwrap();
    }

    let conn = db.connection();
    let updated = OutboxRepository::mark_delivered(&conn, &message_id).unwrap();
    assert_eq!(updated, 1, "first delivery transition must affect exactly one row");

    let sent = OutboxRepository::list_by_swarm(&conn, &swarm_id.to_string(), 10).unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, "delivered");

    let repeat = OutboxRepository::mark_delivered(&conn, &message_id).unwrap();
    assert_eq!(repeat, 0, "a message already delivered cannot transition again");
}

#[test]
fn export_then_import_into_fresh_database_preserves_swarm() {
    let db = DatabaseManager::initialize_in_memory().unwrap();
    let key = generate_keypair();
    create_swarm(
        &db,
        "swarm-1",
        "Test Swarm",
        "master-a",
        "https://master.example:8443",
        &public_key_to_base64(&key.verifying_key()),
        false,
        false,
    )
    .unwrap();

    let document = {
        let conn = db.connection();
        export_state(&conn, "master-a").unwrap()
    };
    assert!(document["swarms"]["swarm-1"].is_object());

    let fresh = DatabaseManager::initialize_in_memory().unwrap();
    {
        let mut conn = fresh.connection();
        import_state(&mut conn, &document, false).unwrap();
    }
    let conn = fresh.connection();
    let reimported = export_state(&conn, "master-a").unwrap();
    assert_eq!(reimported["swarms"]["swarm-1"]["master"], "master-a");
}
