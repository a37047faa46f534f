//! `POST /swarm/message` — receive a wire message from a peer agent.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use swarmwire_protocol::Message;
use swarmwire_state::InboxRepository;

use crate::error::IngressError;
use crate::queue::QueuedMessage;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MessageAccepted {
    pub status: &'static str,
    pub message_id: String,
}

/// Parses, persists (idempotently), enqueues, and hands the message off
/// to the wake subsystem. Signature verification is deferred to inbox
/// consumers — this endpoint never rejects on a bad signature, so a
/// forensic record of the attempt is always kept.
pub async fn receive_message(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<Json<MessageAccepted>, IngressError> {
    let message = Message::parse(&body).map_err(|e| IngressError::Format(e.to_string()))?;

    let message_id = message.message_id.to_string();
    let swarm_id = message.swarm_id.to_string();
    let wire = message.to_wire_dict().to_string();

    {
        let conn = state.db.connection();
        InboxRepository::insert(
            &conn,
            &message_id,
            &swarm_id,
            &message.sender.agent_id,
            Some(message.recipient.as_str()),
            message_type_str(message.message_type),
            &wire,
        )?;
    }

    state.queue.put(QueuedMessage { message_id: message_id.clone(), swarm_id: swarm_id.clone() });

    let record = {
        let conn = state.db.connection();
        InboxRepository::get_by_id(&conn, &message_id)?
    };
    if let Some(record) = record {
        let wake_trigger = state.wake_trigger.clone();
        tokio::spawn(async move {
            if let Err(e) = wake_trigger.process_message(&record).await {
                tracing::warn!(error = %e, "wake dispatch failed");
            }
        });
    }

    Ok(Json(MessageAccepted { status: "queued", message_id }))
}

fn message_type_str(t: swarmwire_protocol::MessageType) -> &'static str {
    match t {
        swarmwire_protocol::MessageType::Message => "message",
        swarmwire_protocol::MessageType::System => "system",
        swarmwire_protocol::MessageType::Notification => "notification",
    }
}
