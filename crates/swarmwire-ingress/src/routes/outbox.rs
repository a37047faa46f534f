//! `/api/outbox` HTTP surface — read-only.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use swarmwire_state::OutboxRepository;

use crate::error::IngressError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub swarm_id: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, IngressError> {
    let conn = state.db.connection();
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let records = match &query.swarm_id {
        Some(swarm_id) => OutboxRepository::list_by_swarm(&conn, swarm_id, limit)?,
        None => OutboxRepository::list_all(&conn, limit)?,
    };
    let messages: Vec<_> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "message_id": r.message_id,
                "swarm_id": r.swarm_id,
                "recipient_id": r.recipient_id,
                "message_type": r.message_type,
                "sent_at": r.sent_at,
                "delivered_at": r.delivered_at,
                "status": r.status,
                "error": r.error,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "messages": messages })))
}

pub async fn count(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, IngressError> {
    let conn = state.db.connection();
    let total = match &query.swarm_id {
        Some(swarm_id) => OutboxRepository::count_by_swarm(&conn, swarm_id)?,
        None => OutboxRepository::list_all(&conn, swarmwire_state::MAX_LIST_LIMIT)?.len() as i64,
    };
    Ok(Json(serde_json::json!({ "total": total })))
}
