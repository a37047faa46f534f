use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Validation,
    Token,
    Signature,
    Expired,
    NotAuthorized,
    SwarmNotFound,
    Storage,
    Internal,
}

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("invalid request format: {0}")]
    Format(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("not authorized")]
    NotAuthorized,

    #[error("swarm not found: {0}")]
    SwarmNotFound(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Protocol(#[from] swarmwire_protocol::ProtocolError),

    #[error(transparent)]
    Membership(#[from] swarmwire_membership::MembershipError),

    #[error(transparent)]
    State(#[from] swarmwire_state::StateError),

    #[error(transparent)]
    Wake(#[from] swarmwire_wake::WakeError),
}

impl IngressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngressError::Format(_) => ErrorKind::Format,
            IngressError::Validation(_) => ErrorKind::Validation,
            IngressError::InvalidToken => ErrorKind::Token,
            IngressError::InvalidSignature => ErrorKind::Signature,
            IngressError::NotAuthorized => ErrorKind::NotAuthorized,
            IngressError::SwarmNotFound(_) => ErrorKind::SwarmNotFound,
            IngressError::NotFound(_) => ErrorKind::SwarmNotFound,
            IngressError::Protocol(e) => match e.kind() {
                swarmwire_protocol::ErrorKind::Format => ErrorKind::Format,
                swarmwire_protocol::ErrorKind::Signature => ErrorKind::Signature,
                swarmwire_protocol::ErrorKind::Expired => ErrorKind::Expired,
                _ => ErrorKind::Validation,
            },
            IngressError::Membership(e) => match e.kind() {
                swarmwire_membership::ErrorKind::SwarmNotFound => ErrorKind::SwarmNotFound,
                swarmwire_membership::ErrorKind::Signature => ErrorKind::Signature,
                swarmwire_membership::ErrorKind::Expired => ErrorKind::Expired,
                swarmwire_membership::ErrorKind::NotMaster => ErrorKind::NotAuthorized,
                swarmwire_membership::ErrorKind::Storage => ErrorKind::Storage,
                _ => ErrorKind::Validation,
            },
            IngressError::State(_) => ErrorKind::Storage,
            IngressError::Wake(_) => ErrorKind::Internal,
        }
    }

    fn http_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Format => "INVALID_FORMAT",
            ErrorKind::Validation => "INVALID_FORMAT",
            ErrorKind::Token => "INVALID_TOKEN",
            ErrorKind::Signature => "INVALID_SIGNATURE",
            ErrorKind::Expired => "INVALID_SIGNATURE",
            ErrorKind::NotAuthorized => "NOT_AUTHORIZED",
            ErrorKind::SwarmNotFound => "SWARM_NOT_FOUND",
            ErrorKind::Storage | ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Format | ErrorKind::Validation | ErrorKind::Token => StatusCode::BAD_REQUEST,
            ErrorKind::Signature | ErrorKind::Expired => StatusCode::UNAUTHORIZED,
            ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
            ErrorKind::SwarmNotFound => StatusCode::NOT_FOUND,
            ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": { "code": self.http_code(), "message": self.to_string() }
        });
        (status, Json(body)).into_response()
    }
}
