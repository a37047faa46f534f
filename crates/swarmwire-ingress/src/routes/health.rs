//! `GET /swarm/health` and `GET /swarm/info`.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = if state.queue.is_degraded() { "degraded" } else { "healthy" };
    Json(serde_json::json!({
        "status": status,
        "agent_id": state.config.agent.agent_id,
        "protocol_version": state.config.agent.protocol_version,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut body = serde_json::json!({
        "agent_id": state.config.agent.agent_id,
        "endpoint": state.config.agent.endpoint,
        "public_key": state.config.agent.public_key,
        "protocol_version": state.config.agent.protocol_version,
        "capabilities": state.config.agent.capabilities,
    });
    if state.config.agent.name.is_some() || state.config.agent.description.is_some() {
        body["metadata"] = serde_json::json!({
            "name": state.config.agent.name,
            "description": state.config.agent.description,
        });
    }
    Json(body)
}
