//! Decides wake vs queue vs skip for an incoming message and, on wake,
//! POSTs to the configured wake endpoint.

use std::time::Duration;

use swarmwire_state::{DatabaseManager, InboxMessageRecord, MuteRepository};

use crate::error::WakeError;
use crate::preferences::{MessageContext, NotificationLevel, NotificationPreferences};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeDecision {
    Wake,
    Queue,
    Skip,
}

#[derive(Debug, Clone)]
pub struct WakeEvent {
    pub message_id: String,
    pub swarm_id: String,
    pub sender_id: String,
    pub decision: WakeDecision,
    pub notification_level: NotificationLevel,
}

pub type WakeCallback = Box<dyn Fn(&WakeEvent) + Send + Sync>;

pub struct WakeTrigger {
    db: DatabaseManager,
    wake_endpoint: String,
    preferences: NotificationPreferences,
    wake_timeout: Duration,
    client: reqwest::Client,
    callbacks: Vec<WakeCallback>,
}

impl WakeTrigger {
    pub fn new(
        db: DatabaseManager,
        wake_endpoint: impl Into<String>,
        preferences: NotificationPreferences,
        wake_timeout: Duration,
    ) -> Result<Self, WakeError> {
        let wake_endpoint = wake_endpoint.into();
        if wake_endpoint.is_empty() {
            return Err(WakeError::Validation("wake endpoint required".to_string()));
        }
        preferences.validate()?;
        let client = reqwest::Client::builder()
            .timeout(wake_timeout)
            .build()
            .map_err(|e| WakeError::Validation(format!("build http client: {e}")))?;
        Ok(Self { db, wake_endpoint, preferences, wake_timeout, client, callbacks: Vec::new() })
    }

    pub fn add_callback(&mut self, callback: WakeCallback) {
        self.callbacks.push(callback);
    }

    /// Evaluate and, if warranted, dispatch the wake POST for a freshly
    /// persisted inbox message. Callbacks fire regardless of decision.
    pub async fn process_message(&self, message: &InboxMessageRecord) -> Result<WakeEvent, WakeError> {
        let conn = self.db.connection();
        let sender_muted = MuteRepository::is_agent_muted(&conn, &message.sender_id)?;
        let swarm_muted = MuteRepository::is_swarm_muted(&conn, &message.swarm_id)?;
        drop(conn);

        let decision = if sender_muted || swarm_muted {
            WakeDecision::Skip
        } else {
            let level = self.notification_level(message);
            if level == NotificationLevel::Silent {
                WakeDecision::Queue
            } else {
                WakeDecision::Wake
            }
        };
        let notification_level = self.notification_level(message);

        let event = WakeEvent {
            message_id: message.message_id.clone(),
            swarm_id: message.swarm_id.clone(),
            sender_id: message.sender_id.clone(),
            decision,
            notification_level,
        };

        if decision == WakeDecision::Wake {
            self.dispatch_wake(&event).await?;
        }
        for callback in &self.callbacks {
            callback(&event);
        }
        Ok(event)
    }

    fn notification_level(&self, message: &InboxMessageRecord) -> NotificationLevel {
        let current_hour = chrono::Utc::now().format("%H").to_string().parse().unwrap_or(0);
        let ctx = MessageContext {
            sender_id: &message.sender_id,
            swarm_id: &message.swarm_id,
            content: &message.content,
            is_direct_mention: message.message_type == "notification",
            is_high_priority: message.message_type == "high_priority",
            is_system_message: message.message_type == "system",
            current_hour,
        };
        self.preferences.should_wake(&ctx)
    }

    /// POST the wake payload once, bounded by `wake_timeout` (set on the
    /// client in `new`). Not retried: a slow or failing wake endpoint
    /// must not hold up message delivery.
    async fn dispatch_wake(&self, event: &WakeEvent) -> Result<(), WakeError> {
        let payload = serde_json::json!({
            "message_id": event.message_id,
            "swarm_id": event.swarm_id,
            "sender_id": event.sender_id,
            "notification_level": event.notification_level.as_str(),
        });

        let response = self
            .client
            .post(&self.wake_endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WakeError::WakeEndpoint(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(WakeError::WakeEndpoint(response.status().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message_type: &str) -> InboxMessageRecord {
        InboxMessageRecord {
            message_id: "m1".to_string(),
            swarm_id: "s1".to_string(),
            sender_id: "a1".to_string(),
            recipient_id: None,
            message_type: message_type.to_string(),
            content: "hi".to_string(),
            received_at: chrono::Utc::now().to_rfc3339(),
            read_at: None,
            deleted_at: None,
            status: "unread".to_string(),
        }
    }

    #[tokio::test]
    async fn muted_sender_yields_skip_without_dispatch() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        {
            let conn = db.connection();
            MuteRepository::mute_agent(&conn, "a1", None).unwrap();
        }
        let trigger =
            WakeTrigger::new(db, "http://127.0.0.1:1/api/wake", NotificationPreferences::default(), Duration::from_millis(50))
                .unwrap();
        let event = trigger.process_message(&record("message")).await.unwrap();
        assert_eq!(event.decision, WakeDecision::Skip);
    }

    #[tokio::test]
    async fn silent_preferences_yield_queue() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let mut prefs = NotificationPreferences::default();
        prefs.enabled = false;
        let trigger = WakeTrigger::new(db, "http://127.0.0.1:1/api/wake", prefs, Duration::from_millis(50)).unwrap();
        let event = trigger.process_message(&record("message")).await.unwrap();
        assert_eq!(event.decision, WakeDecision::Queue);
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let err =
            WakeTrigger::new(db, "", NotificationPreferences::default(), Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
