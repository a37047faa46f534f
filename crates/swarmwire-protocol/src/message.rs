//! Canonical wire message: the signed envelope agents exchange over
//! `POST /swarm/message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::crypto;
use crate::ProtocolError;

pub const MAX_CONTENT_LEN: usize = 65_536;
pub const DEFAULT_PROTOCOL_VERSION: &str = "0.1.0";
pub const BROADCAST_RECIPIENT: &str = "broadcast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Message,
    System,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSender {
    pub agent_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub name: String,
    pub content_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageReference {
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The canonical wire message. Field order here is for Rust ergonomics
/// only; `to_wire_dict` controls the actual JSON shape on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub protocol_version: String,
    pub message_id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub sender: MessageSender,
    pub recipient: String,
    pub swarm_id: Uuid,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
    #[serde(default)]
    pub references: Vec<MessageReference>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Message {
    /// Build a new unsigned message with generated id and current timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sender: MessageSender,
        recipient: impl Into<String>,
        swarm_id: Uuid,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            message_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            sender,
            recipient: recipient.into(),
            swarm_id,
            message_type,
            content: content.into(),
            signature: String::new(),
            in_reply_to: None,
            thread_id: None,
            priority: Priority::Normal,
            expires_at: None,
            attachments: Vec::new(),
            references: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// The canonical six-field signing payload: SHA-256 of the UTF-8
    /// concatenation `message_id || ts_millis_z || swarm_id || recipient ||
    /// type || content`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let ts = format_millis_z(&self.timestamp);
        let type_str = message_type_str(self.message_type);
        let concat = format!(
            "{}{}{}{}{}{}",
            self.message_id, ts, self.swarm_id, self.recipient, type_str, self.content
        );
        crypto::sha256(concat.as_bytes()).to_vec()
    }

    /// Sign this message in place with `signing_key`.
    pub fn sign(&mut self, signing_key: &ed25519_dalek::SigningKey) {
        let payload = self.signing_payload();
        self.signature = crypto::sign(signing_key, &payload);
    }

    /// Verify this message's signature against `verifying_key`.
    pub fn verify(&self, verifying_key: &ed25519_dalek::VerifyingKey) -> bool {
        crypto::verify(verifying_key, &self.signing_payload(), &self.signature)
    }

    /// Produce the wire JSON, omitting optional fields that equal their
    /// defaults (priority == normal, empty attachments/references/metadata,
    /// absent in_reply_to/thread_id/expires_at).
    pub fn to_wire_dict(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("protocol_version".into(), Value::String(self.protocol_version.clone()));
        map.insert("message_id".into(), Value::String(self.message_id.to_string()));
        map.insert("timestamp".into(), Value::String(format_millis_z(&self.timestamp)));
        map.insert(
            "sender".into(),
            serde_json::json!({"agent_id": self.sender.agent_id, "endpoint": self.sender.endpoint}),
        );
        map.insert("recipient".into(), Value::String(self.recipient.clone()));
        map.insert("swarm_id".into(), Value::String(self.swarm_id.to_string()));
        map.insert("type".into(), Value::String(message_type_str(self.message_type).to_string()));
        map.insert("content".into(), Value::String(self.content.clone()));
        map.insert("signature".into(), Value::String(self.signature.clone()));

        if let Some(v) = self.in_reply_to {
            map.insert("in_reply_to".into(), Value::String(v.to_string()));
        }
        if let Some(v) = self.thread_id {
            map.insert("thread_id".into(), Value::String(v.to_string()));
        }
        if self.priority != Priority::Normal {
            map.insert("priority".into(), serde_json::to_value(self.priority).unwrap());
        }
        if let Some(v) = self.expires_at {
            map.insert("expires_at".into(), Value::String(format_millis_z(&v)));
        }
        if !self.attachments.is_empty() {
            map.insert("attachments".into(), serde_json::to_value(&self.attachments).unwrap());
        }
        if !self.references.is_empty() {
            map.insert("references".into(), serde_json::to_value(&self.references).unwrap());
        }
        if !self.metadata.is_empty() {
            map.insert("metadata".into(), Value::Object(self.metadata.clone()));
        }
        Value::Object(map)
    }

    /// Parse and validate a wire message from raw JSON bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let msg: Message =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Format(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }

    /// Apply the parse-time validation rules from SPEC_FULL.md §4.3.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !is_semver(&self.protocol_version) {
            return Err(ProtocolError::Format(format!(
                "protocol_version {:?} is not X.Y.Z",
                self.protocol_version
            )));
        }
        if !self.sender.endpoint.starts_with("https://") {
            return Err(ProtocolError::Format("sender.endpoint must start with https://".into()));
        }
        if self.content.chars().count() > MAX_CONTENT_LEN {
            return Err(ProtocolError::Format(format!(
                "content exceeds {} characters",
                MAX_CONTENT_LEN
            )));
        }
        Ok(())
    }
}

fn message_type_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Message => "message",
        MessageType::System => "system",
        MessageType::Notification => "notification",
    }
}

/// Format a timestamp as UTC millisecond precision with a trailing `Z`.
pub fn format_millis_z(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn is_semver(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
