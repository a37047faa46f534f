//! Lifecycle event notifications: join/leave/kick/mute/unmute are recorded
//! as `system` inbox messages. Persisting a notification never fails the
//! originating membership operation — callers log and move on.

use ed25519_dalek::SigningKey;
use serde_json::json;
use swarmwire_protocol::{Message, MessageSender, MessageType};
use swarmwire_state::{DatabaseManager, InboxRepository, OutboxRepository, SwarmMemberRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    MemberJoined,
    MemberLeft,
    MemberKicked,
    MemberMuted,
    MemberUnmuted,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::MemberJoined => "member_joined",
            LifecycleAction::MemberLeft => "member_left",
            LifecycleAction::MemberKicked => "member_kicked",
            LifecycleAction::MemberMuted => "member_muted",
            LifecycleAction::MemberUnmuted => "member_unmuted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub action: LifecycleAction,
    pub swarm_id: String,
    pub agent_id: String,
    pub initiated_by: Option<String>,
    pub reason: Option<String>,
}

impl LifecycleEvent {
    pub fn new(action: LifecycleAction, swarm_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            action,
            swarm_id: swarm_id.into(),
            agent_id: agent_id.into(),
            initiated_by: None,
            reason: None,
        }
    }

    pub fn initiated_by(mut self, initiator: impl Into<String>) -> Self {
        self.initiated_by = Some(initiator.into());
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Insert the lifecycle event into the local inbox as a `system` message.
/// Logs and swallows any storage error rather than propagating it — per
/// the fire-and-forget contract on lifecycle notifications.
pub fn persist_notification(db: &DatabaseManager, event: &LifecycleEvent) {
    let sender_id = event.initiated_by.clone().unwrap_or_else(|| event.agent_id.clone());
    let content = json!({
        "type": "system",
        "action": event.action.as_str(),
        "swarm_id": event.swarm_id,
        "agent_id": event.agent_id,
        "initiated_by": event.initiated_by,
        "reason": event.reason,
    })
    .to_string();

    let message_id = uuid::Uuid::new_v4().to_string();
    let conn = db.connection();
    if let Err(err) = InboxRepository::insert(&conn, &message_id, &event.swarm_id, &sender_id, None, "system", &content)
    {
        tracing::warn!(
            action = event.action.as_str(),
            swarm_id = %event.swarm_id,
            agent_id = %event.agent_id,
            error = %err,
            "failed to persist lifecycle notification"
        );
        return;
    }
    tracing::info!(
        action = event.action.as_str(),
        swarm_id = %event.swarm_id,
        agent_id = %event.agent_id,
        "persisted lifecycle notification"
    );
}

pub fn notify_member_joined(db: &DatabaseManager, swarm_id: &str, agent_id: &str) {
    persist_notification(db, &LifecycleEvent::new(LifecycleAction::MemberJoined, swarm_id, agent_id));
}

pub fn notify_member_left(db: &DatabaseManager, swarm_id: &str, agent_id: &str) {
    persist_notification(db, &LifecycleEvent::new(LifecycleAction::MemberLeft, swarm_id, agent_id));
}

pub fn notify_member_kicked(db: &DatabaseManager, swarm_id: &str, agent_id: &str, initiated_by: &str, reason: Option<&str>) {
    let mut event = LifecycleEvent::new(LifecycleAction::MemberKicked, swarm_id, agent_id).initiated_by(initiated_by);
    if let Some(reason) = reason {
        event = event.reason(reason);
    }
    persist_notification(db, &event);
}

pub fn notify_member_muted(db: &DatabaseManager, swarm_id: &str, agent_id: &str, initiated_by: &str, reason: Option<&str>) {
    let mut event = LifecycleEvent::new(LifecycleAction::MemberMuted, swarm_id, agent_id).initiated_by(initiated_by);
    if let Some(reason) = reason {
        event = event.reason(reason);
    }
    persist_notification(db, &event);
}

pub fn notify_member_unmuted(db: &DatabaseManager, swarm_id: &str, agent_id: &str, initiated_by: &str) {
    persist_notification(
        db,
        &LifecycleEvent::new(LifecycleAction::MemberUnmuted, swarm_id, agent_id).initiated_by(initiated_by),
    );
}

/// Sign and deliver a `system` message to each of `recipients`' `/swarm/message`
/// endpoints, recording an outbox row per attempt. A recipient that fails to
/// receive the message is logged and skipped — the caller's own membership
/// change has already committed by the time this runs.
#[allow(clippy::too_many_arguments)]
pub async fn fan_out_system_message(
    db: &DatabaseManager,
    swarm_id: &str,
    sender_id: &str,
    sender_endpoint: &str,
    signing_key: &SigningKey,
    action: LifecycleAction,
    target_agent_id: &str,
    reason: Option<&str>,
    recipients: &[SwarmMemberRecord],
) {
    if recipients.is_empty() {
        return;
    }
    let Ok(swarm_uuid) = uuid::Uuid::parse_str(swarm_id) else {
        tracing::warn!(swarm_id, action = action.as_str(), "swarm_id is not a UUID, skipping wire broadcast");
        return;
    };
    let content = json!({ "action": action.as_str(), "agent_id": target_agent_id, "reason": reason }).to_string();
    let client = reqwest::Client::new();

    for member in recipients {
        let mut message = Message::new(
            MessageSender { agent_id: sender_id.to_string(), endpoint: sender_endpoint.to_string() },
            member.agent_id.clone(),
            swarm_uuid,
            MessageType::System,
            content.clone(),
        );
        message.sign(signing_key);
        let message_id = message.message_id.to_string();
        let wire = message.to_wire_dict().to_string();

        {
            let conn = db.connection();
            if let Err(err) =
                OutboxRepository::insert_sent(&conn, &message_id, swarm_id, &member.agent_id, "system", &content)
            {
                tracing::warn!(recipient = %member.agent_id, error = %err, "failed to record outbox entry");
            }
        }

        let sent = client
            .post(format!("{}/swarm/message", member.endpoint.trim_end_matches('/')))
            .header("content-type", "application/json")
            .body(wire)
            .send()
            .await;

        let conn = db.connection();
        match sent {
            Ok(response) if response.status().is_success() => {
                let _ = OutboxRepository::mark_delivered(&conn, &message_id);
            }
            Ok(response) => {
                let status = response.status();
                let _ = OutboxRepository::mark_failed(&conn, &message_id, &status.to_string());
                tracing::warn!(recipient = %member.agent_id, %status, action = action.as_str(), "lifecycle broadcast rejected");
            }
            Err(err) => {
                let _ = OutboxRepository::mark_failed(&conn, &message_id, &err.to_string());
                tracing::warn!(recipient = %member.agent_id, error = %err, action = action.as_str(), "lifecycle broadcast failed");
            }
        }
    }
}
