//! Router-level integration tests exercising the full axum stack.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use swarmwire_ingress::config::{AgentConfig, RateLimitConfig, ServerConfig, WakeConfig, WakeEndpointConfig};
use swarmwire_ingress::{build_router, AppState, MessageQueue};
use swarmwire_membership::create_swarm;
use swarmwire_protocol::crypto::{generate_keypair, public_key_to_base64};
use swarmwire_protocol::{Message, MessageSender, MessageType};
use swarmwire_state::DatabaseManager;
use swarmwire_wake::{NoopInvoker, NotificationPreferences, WakeTrigger};

fn test_config() -> ServerConfig {
    ServerConfig {
        agent: AgentConfig {
            agent_id: "agent-a".to_string(),
            endpoint: "https://a.example:8443".to_string(),
            public_key: "pk-a".to_string(),
            protocol_version: "0.1.0".to_string(),
            capabilities: vec!["message".to_string()],
            name: None,
            description: None,
        },
        rate_limit: RateLimitConfig { messages_per_minute: 60, join_requests_per_hour: 10 },
        queue_max_size: 100,
        db_path: "unused.db".into(),
        wake: WakeConfig::default(),
        wake_endpoint: WakeEndpointConfig::default(),
        bind_addr: "0.0.0.0:0".to_string(),
    }
}

fn test_state() -> AppState {
    let db = DatabaseManager::initialize_in_memory().unwrap();
    let (queue, _rx) = MessageQueue::new(100);
    let wake_trigger = WakeTrigger::new(
        db.clone(),
        "http://127.0.0.1:1/api/wake",
        NotificationPreferences::default(),
        Duration::from_millis(20),
    )
    .unwrap();
    AppState::new(db, test_config(), queue, wake_trigger, Arc::new(NoopInvoker))
}

#[tokio::test]
async fn health_reports_healthy_when_queue_is_empty() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/swarm/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["agent_id"], "agent-a");
}

#[tokio::test]
async fn info_reports_public_identity() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/swarm/info").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["agent_id"], "agent-a");
    assert_eq!(json["endpoint"], "https://a.example:8443");
}

#[tokio::test]
async fn receiving_a_message_is_idempotent_and_queues_once() {
    let state = test_state();
    let key = generate_keypair();
    let swarm_id = uuid::Uuid::new_v4();
    let mut message = Message::new(
        MessageSender { agent_id: "agent-b".to_string(), endpoint: "https://b.example:8443".to_string() },
        "agent-a",
        swarm_id,
        MessageType::Message,
        "hello swarm",
    );
    message.sign(&key);
    let body = message.to_wire_dict().to_string();

    let app = build_router(state.clone());
    let first = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/swarm/message")
                .header("content-type", "application/json")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let app = build_router(state.clone());
    let second = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/swarm/message")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    let conn = state.db.connection();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM inbox WHERE message_id = ?1", [message.message_id.to_string()], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(count, 1, "duplicate delivery must not create a second row");
}

#[tokio::test]
async fn join_accepted_for_valid_invite_token() {
    let state = test_state();
    let master_key = generate_keypair();
    create_swarm(
        &state.db,
        "swarm-1",
        "Test Swarm",
        "master-a",
        "https://master.example:8443",
        &public_key_to_base64(&master_key.verifying_key()),
        false,
        false,
    )
    .unwrap();
    let token =
        swarmwire_protocol::make_invite(&master_key, "swarm-1", "master-a", "https://master.example:8443", None, None)
            .unwrap();

    let app = build_router(state);
    let body = serde_json::json!({
        "invite_token": token,
        "agent_id": "agent-b",
        "agent_endpoint": "https://b.example:8443",
        "agent_public_key": "pk-b",
    })
    .to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/swarm/join")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "accepted");
}

#[tokio::test]
async fn join_with_unknown_swarm_returns_404() {
    let state = test_state();
    let key = generate_keypair();
    let token =
        swarmwire_protocol::make_invite(&key, "missing-swarm", "master-a", "https://master.example", None, None)
            .unwrap();

    let app = build_router(state);
    let body = serde_json::json!({
        "invite_token": token,
        "agent_id": "agent-b",
        "agent_endpoint": "https://b.example:8443",
        "agent_public_key": "pk-b",
    })
    .to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/swarm/join")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wake_endpoint_rejects_wrong_secret() {
    let mut config = test_config();
    config.wake_endpoint.secret = "shh".to_string();
    let db = DatabaseManager::initialize_in_memory().unwrap();
    let (queue, _rx) = MessageQueue::new(100);
    let wake_trigger = WakeTrigger::new(
        db.clone(),
        "http://127.0.0.1:1/api/wake",
        NotificationPreferences::default(),
        Duration::from_millis(20),
    )
    .unwrap();
    let state = AppState::new(db, config, queue, wake_trigger, Arc::new(NoopInvoker));

    let app = build_router(state);
    let body = serde_json::json!({
        "message_id": "m1",
        "swarm_id": "s1",
        "sender_id": "a1",
        "notification_level": "normal",
    })
    .to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/wake")
                .header("content-type", "application/json")
                .header("x-wake-secret", "wrong")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn inbox_list_then_mark_read_transitions_status() {
    let state = test_state();
    {
        let conn = state.db.connection();
        swarmwire_state::InboxRepository::insert(&conn, "m1", "s1", "agent-b", None, "message", "{}").unwrap();
    }

    let app = build_router(state.clone());
    let response = app
        .oneshot(Request::builder().uri("/api/inbox?swarm_id=s1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["messages"].as_array().unwrap().len(), 1);

    let app = build_router(state);
    let response = app
        .oneshot(Request::builder().method("POST").uri("/api/inbox/m1/read").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
