//! `POST /swarm/join` — runs the membership join state machine and maps
//! its outcome onto the exact status/code table.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use swarmwire_membership::{join, JoinOutcome, MembershipError};
use swarmwire_protocol::ProtocolError;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub invite_token: String,
    pub agent_id: String,
    pub agent_endpoint: String,
    pub agent_public_key: String,
}

pub async fn join_swarm(State(state): State<AppState>, Json(req): Json<JoinRequest>) -> Response {
    let outcome = join::process_join(
        &state.db,
        &req.invite_token,
        &req.agent_id,
        &req.agent_endpoint,
        &req.agent_public_key,
    );

    match outcome {
        Ok(JoinOutcome::Accepted { swarm_id, swarm_name, members }) => {
            let members: Vec<_> = members
                .iter()
                .map(|m| serde_json::json!({"agent_id": m.agent_id, "endpoint": m.endpoint}))
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "accepted",
                    "swarm_id": swarm_id,
                    "swarm_name": swarm_name,
                    "members": members,
                })),
            )
                .into_response()
        }
        Ok(JoinOutcome::Pending { swarm_id, message }) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "pending", "swarm_id": swarm_id, "message": message })),
        )
            .into_response(),
        Err(e) => join_error_response(&e),
    }
}

/// Maps a `MembershipError` to the join endpoint's status/code table.
/// Inspects the underlying `ProtocolError` directly rather than going
/// through `MembershipError::kind()`, since that collapses malformed and
/// expired tokens into the same bucket the join contract distinguishes.
fn join_error_response(err: &MembershipError) -> Response {
    let (status, code) = match err {
        MembershipError::SwarmNotFound(_) => (StatusCode::NOT_FOUND, "SWARM_NOT_FOUND"),
        MembershipError::Signature(_) | MembershipError::Expired => {
            (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE")
        }
        MembershipError::NotMaster(_) => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED"),
        MembershipError::Protocol(p) => match p {
            ProtocolError::InvalidSignature(_) => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
            ProtocolError::Expired => (StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE"),
            ProtocolError::Payload(_) | ProtocolError::Format(_) | ProtocolError::Crypto(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_TOKEN")
            }
        },
        MembershipError::AlreadyMember(_) | MembershipError::ApprovalRequired(_) | MembershipError::Validation(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_FORMAT")
        }
        MembershipError::State(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (status, Json(serde_json::json!({ "error": { "code": code, "message": err.to_string() } }))).into_response()
}
