//! Shared application state threaded through every handler via axum's
//! `State` extractor.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use swarmwire_state::DatabaseManager;
use swarmwire_wake::{InvocationLock, Invoker, SessionManager, WakeTrigger};

use crate::config::ServerConfig;
use crate::queue::MessageQueue;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub config: Arc<ServerConfig>,
    pub queue: MessageQueue,
    pub message_limiter: Arc<RateLimiter>,
    pub join_limiter: Arc<RateLimiter>,
    pub wake_trigger: Arc<WakeTrigger>,
    pub invocation_lock: InvocationLock,
    pub sessions: Arc<AsyncMutex<SessionManager>>,
    pub invoker: Arc<dyn Invoker>,
}

impl AppState {
    pub fn new(
        db: DatabaseManager,
        config: ServerConfig,
        queue: MessageQueue,
        wake_trigger: WakeTrigger,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        let message_limiter = Arc::new(RateLimiter::per_minute(config.rate_limit.messages_per_minute));
        let join_limiter = Arc::new(RateLimiter::per_hour(config.rate_limit.join_requests_per_hour));
        let sessions = Arc::new(AsyncMutex::new(SessionManager::new(
            config.wake_endpoint.session_file.clone(),
            config.wake_endpoint.session_timeout_minutes,
        )));
        Self {
            db,
            config: Arc::new(config),
            queue,
            message_limiter,
            join_limiter,
            wake_trigger: Arc::new(wake_trigger),
            invocation_lock: InvocationLock::new(),
            sessions,
            invoker,
        }
    }
}
