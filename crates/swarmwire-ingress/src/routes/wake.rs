//! `POST /api/wake` — the in-process wake endpoint. Initiates at most
//! one conversation turn with the local agent runtime per invocation.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use swarmwire_state::SdkSessionRepository;
use swarmwire_wake::{SessionState, WakePayload};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WakeRequest {
    pub message_id: String,
    pub swarm_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub notification_level: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": { "message": message.into() } }))).into_response()
}

pub async fn wake(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<WakeRequest>) -> Response {
    let configured_secret = &state.config.wake_endpoint.secret;
    if !configured_secret.is_empty() {
        let provided = headers.get("x-wake-secret").and_then(|v| v.to_str().ok()).unwrap_or("");
        if provided != configured_secret {
            return error(StatusCode::FORBIDDEN, "wake secret mismatch");
        }
    }

    {
        let mut sessions = state.sessions.lock().await;
        let active = sessions
            .current_session()
            .ok()
            .flatten()
            .map(|s| s.state == SessionState::Active)
            .unwrap_or(false);
        if active && sessions.should_resume().unwrap_or(false) {
            return (StatusCode::OK, Json(serde_json::json!({ "status": "already_active" }))).into_response();
        }
    }

    let resume = {
        let conn = state.db.connection();
        match SdkSessionRepository::get(&conn, &req.swarm_id, &req.sender_id) {
            Ok(Some(record)) => {
                let last_active = record.last_active.parse::<chrono::DateTime<chrono::Utc>>().ok();
                let expired = last_active
                    .map(|ts| {
                        chrono::Utc::now() - ts
                            > chrono::Duration::minutes(state.config.wake_endpoint.session_timeout_minutes)
                    })
                    .unwrap_or(true);
                if expired {
                    drop(conn);
                    let conn = state.db.connection();
                    let _ = SdkSessionRepository::delete(&conn, &req.swarm_id, &req.sender_id);
                    None
                } else {
                    Some(record.session_id)
                }
            }
            _ => None,
        }
    };

    let Some(guard) = state.invocation_lock.try_acquire() else {
        tracing::info!(message_id = %req.message_id, "invocation lock held, skipping wake");
        return (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "invoked" }))).into_response();
    };

    let payload = WakePayload {
        message_id: req.message_id.clone(),
        swarm_id: req.swarm_id.clone(),
        sender_id: req.sender_id.clone(),
        notification_level: req.notification_level.clone(),
    };

    let invoker = state.invoker.clone();
    let db = state.db.clone();
    let swarm_id = req.swarm_id.clone();
    let sender_id = req.sender_id.clone();
    tokio::spawn(async move {
        // `guard` is held for the lifetime of this task, releasing the
        // invocation lock only once the invoker call completes.
        let _guard = guard;
        match invoker.invoke(&payload, resume.as_deref()).await {
            Ok(Some(session_id)) => {
                let conn = db.connection();
                if let Err(e) = SdkSessionRepository::upsert(&conn, &swarm_id, &sender_id, &session_id) {
                    tracing::warn!(error = %e, "failed to persist session after invocation");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "invocation failed after wake response was sent"),
        }
    });

    (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "invoked" }))).into_response()
}
