//! `/api/inbox` HTTP surface.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use swarmwire_state::{InboxCounts, InboxMessageRecord, InboxRepository};

use crate::error::IngressError;
use crate::state::AppState;

const CONTENT_PREVIEW_LEN: usize = 200;
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub swarm_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

fn preview(record: &InboxMessageRecord) -> serde_json::Value {
    let preview: String = record.content.chars().take(CONTENT_PREVIEW_LEN).collect();
    serde_json::json!({
        "message_id": record.message_id,
        "swarm_id": record.swarm_id,
        "sender_id": record.sender_id,
        "recipient_id": record.recipient_id,
        "message_type": record.message_type,
        "content_preview": preview,
        "received_at": record.received_at,
        "read_at": record.read_at,
        "status": record.status,
    })
}

fn counts_json(counts: InboxCounts) -> serde_json::Value {
    serde_json::json!({
        "unread": counts.unread,
        "read": counts.read,
        "archived": counts.archived,
        "deleted": counts.deleted,
        "total": counts.total,
    })
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, IngressError> {
    let conn = state.db.connection();
    let records = InboxRepository::list_visible(
        &conn,
        query.status.as_deref(),
        query.swarm_id.as_deref(),
        None,
        query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    )?;
    Ok(Json(serde_json::json!({ "messages": records.iter().map(preview).collect::<Vec<_>>() })))
}

pub async fn count(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, IngressError> {
    let conn = state.db.connection();
    let counts = InboxRepository::count_by_status(&conn, query.swarm_id.as_deref())?;
    Ok(Json(counts_json(counts)))
}

pub async fn get_one(State(state): State<AppState>, Path(message_id): Path<String>) -> Response {
    let conn = state.db.connection();
    match InboxRepository::get_and_mark_read(&conn, &message_id) {
        Ok(Some(record)) => Json(preview(&record)).into_response(),
        Ok(None) => IngressError::NotFound(message_id).into_response(),
        Err(e) => IngressError::from(e).into_response(),
    }
}

pub async fn mark_read(State(state): State<AppState>, Path(message_id): Path<String>) -> Response {
    transition(&state, &message_id, InboxRepository::mark_read)
}

pub async fn archive(State(state): State<AppState>, Path(message_id): Path<String>) -> Response {
    let conn = state.db.connection();
    match InboxRepository::get_by_id(&conn, &message_id) {
        Ok(Some(record)) if record.status == "deleted" => {
            IngressError::Validation("cannot archive a deleted message".to_string()).into_response()
        }
        Ok(Some(_)) => match InboxRepository::mark_archived(&conn, &message_id) {
            Ok(updated) => Json(serde_json::json!({ "updated": updated > 0 })).into_response(),
            Err(e) => IngressError::from(e).into_response(),
        },
        Ok(None) => IngressError::NotFound(message_id).into_response(),
        Err(e) => IngressError::from(e).into_response(),
    }
}

pub async fn delete(State(state): State<AppState>, Path(message_id): Path<String>) -> Response {
    transition(&state, &message_id, InboxRepository::mark_deleted)
}

fn transition(
    state: &AppState,
    message_id: &str,
    op: fn(&rusqlite::Connection, &str) -> Result<usize, swarmwire_state::StateError>,
) -> Response {
    let conn = state.db.connection();
    match InboxRepository::get_by_id(&conn, message_id) {
        Ok(Some(_)) => match op(&conn, message_id) {
            Ok(updated) => Json(serde_json::json!({ "updated": updated > 0 })).into_response(),
            Err(e) => IngressError::from(e).into_response(),
        },
        Ok(None) => IngressError::NotFound(message_id.to_string()).into_response(),
        Err(e) => IngressError::from(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub message_ids: Vec<String>,
    pub action: String,
}

pub async fn batch(State(state): State<AppState>, Json(req): Json<BatchRequest>) -> Response {
    if req.message_ids.len() > MAX_BATCH_SIZE {
        return IngressError::Validation(format!("batch exceeds {MAX_BATCH_SIZE} message ids")).into_response();
    }
    if !matches!(req.action.as_str(), "read" | "archive" | "delete") {
        return IngressError::Validation(format!("unknown batch action {:?}", req.action)).into_response();
    }
    let conn = state.db.connection();
    match InboxRepository::batch_update_status(&conn, &req.message_ids, &req.action) {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({ "action": req.action, "updated": updated, "total": req.message_ids.len() })),
        )
            .into_response(),
        Err(e) => IngressError::from(e).into_response(),
    }
}
