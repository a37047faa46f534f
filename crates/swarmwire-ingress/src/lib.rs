//! HTTP ingress: message/join/wake endpoints, inbox/outbox surface,
//! rate limiting, and request logging.

pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{load_config_from_env, AgentConfig, RateLimitConfig, ServerConfig, WakeConfig, WakeEndpointConfig};
pub use error::{ErrorKind, IngressError};
pub use queue::{MessageQueue, QueuedMessage};
pub use rate_limit::RateLimiter;
pub use server::build_router;
pub use state::AppState;
