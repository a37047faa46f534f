//! Invoker strategies: the pluggable last step of a wake that activates
//! the local agent runtime. An invoker yields either no session id (a
//! fresh context each time) or an opaque one the caller persists for
//! conversation continuity.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::WakeError;

/// Payload handed to an invoker, mirroring the wake POST body.
#[derive(Debug, Clone)]
pub struct WakePayload {
    pub message_id: String,
    pub swarm_id: String,
    pub sender_id: String,
    pub notification_level: String,
}

#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, payload: &WakePayload, resume: Option<&str>) -> Result<Option<String>, WakeError>;
}

/// Logs and returns; used in tests and for local no-op configurations.
pub struct NoopInvoker;

#[async_trait]
impl Invoker for NoopInvoker {
    async fn invoke(&self, payload: &WakePayload, resume: Option<&str>) -> Result<Option<String>, WakeError> {
        tracing::info!(
            message_id = %payload.message_id,
            sender_id = %payload.sender_id,
            resume = resume.unwrap_or("none"),
            "noop invoker: wake acknowledged"
        );
        Ok(None)
    }
}

/// Sends a notification string into a running tmux pane via two
/// `send-keys` calls: the text, a brief pause, then Enter. A single
/// combined call does not reliably deliver the Enter key.
pub struct TmuxInvoker {
    pub target: String,
}

#[async_trait]
impl Invoker for TmuxInvoker {
    async fn invoke(&self, payload: &WakePayload, _resume: Option<&str>) -> Result<Option<String>, WakeError> {
        let notification = format!("Wake: new message from {}. Read and process.", payload.sender_id);
        tracing::info!(target = %self.target, "sending tmux notification");

        let status = tokio::process::Command::new("tmux")
            .args(["send-keys", "-t", &self.target, &notification])
            .status()
            .await?;
        if !status.success() {
            return Err(WakeError::Invocation(format!("tmux send-keys failed: {status}")));
        }

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let status = tokio::process::Command::new("tmux")
            .args(["send-keys", "-t", &self.target, "C-m"])
            .status()
            .await?;
        if !status.success() {
            return Err(WakeError::Invocation(format!("tmux send-keys (Enter) failed: {status}")));
        }
        Ok(None)
    }
}

/// A process-wide lock guaranteeing at most one concurrent invocation.
/// A second wake call arriving while the lock is held skips invocation
/// entirely rather than queueing behind it.
#[derive(Clone, Default)]
pub struct InvocationLock {
    inner: Arc<Mutex<()>>,
}

impl InvocationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(guard)` if the lock was free, `None` if it was
    /// already held — the caller should skip invocation in that case.
    pub fn try_acquire(&self) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        self.inner.clone().try_lock_owned().ok()
    }
}
