//! Environment-sourced server configuration.

use std::path::PathBuf;

const RECOGNISED_BOOL_VALUES: &[&str] = &["1", "true", "yes", "0", "false", "no"];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    pub endpoint: String,
    pub public_key: String,
    pub protocol_version: String,
    pub capabilities: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub messages_per_minute: u32,
    pub join_requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { messages_per_minute: 60, join_requests_per_hour: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct WakeConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: f64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self { enabled: true, endpoint: "http://localhost:8080/api/wake".to_string(), timeout_secs: 5.0 }
    }
}

#[derive(Debug, Clone)]
pub struct WakeEndpointConfig {
    pub enabled: bool,
    pub invoke_method: String,
    pub invoke_target: String,
    pub secret: String,
    pub session_file: PathBuf,
    pub session_timeout_minutes: i64,
    pub sdk_cwd: String,
    pub sdk_permission_mode: String,
    pub sdk_max_turns: Option<u32>,
    pub sdk_model: Option<String>,
    pub tmux_target: String,
}

impl Default for WakeEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            invoke_method: "noop".to_string(),
            invoke_target: String::new(),
            secret: String::new(),
            session_file: PathBuf::from("/root/.swarm/session.json"),
            session_timeout_minutes: 30,
            sdk_cwd: "/root/nexus".to_string(),
            sdk_permission_mode: "acceptEdits".to_string(),
            sdk_max_turns: None,
            sdk_model: None,
            tmux_target: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub agent: AgentConfig,
    pub rate_limit: RateLimitConfig,
    pub queue_max_size: usize,
    pub db_path: PathBuf,
    pub wake: WakeConfig,
    pub wake_endpoint: WakeEndpointConfig,
    pub bind_addr: String,
}

/// Parse a boolean environment variable, falling back to `default` on an
/// empty or unrecognised value (logging a warning for the latter).
fn parse_bool(value: &str, default: bool) -> bool {
    if value.is_empty() {
        return default;
    }
    let normalised = value.to_lowercase();
    if !RECOGNISED_BOOL_VALUES.contains(&normalised.as_str()) {
        tracing::warn!(
            value,
            default,
            "unrecognised boolean value, using default. expected one of: true/1/yes or false/0/no"
        );
        return default;
    }
    matches!(normalised.as_str(), "1" | "true" | "yes")
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Load `ServerConfig` from the environment. Mirrors the effects table in
/// SPEC_FULL.md §6.
pub fn load_config_from_env() -> Result<ServerConfig, String> {
    let agent_id = env("AGENT_ID");
    let endpoint = env("AGENT_ENDPOINT");
    let public_key = env("AGENT_PUBLIC_KEY");
    let mut missing = Vec::new();
    if agent_id.is_none() {
        missing.push("AGENT_ID");
    }
    if endpoint.is_none() {
        missing.push("AGENT_ENDPOINT");
    }
    if public_key.is_none() {
        missing.push("AGENT_PUBLIC_KEY");
    }
    if !missing.is_empty() {
        return Err(format!("Missing: {}", missing.join(", ")));
    }

    let wake_enabled = parse_bool(&std::env::var("WAKE_ENABLED").unwrap_or_default(), true);
    let wake_endpoint_url =
        std::env::var("WAKE_ENDPOINT").unwrap_or_else(|_| "http://localhost:8080/api/wake".to_string());
    if wake_enabled && wake_endpoint_url.is_empty() {
        return Err("WAKE_ENDPOINT required when WAKE_ENABLED is set".to_string());
    }

    let wake_ep_enabled = parse_bool(&std::env::var("WAKE_EP_ENABLED").unwrap_or_default(), true);
    let wake_ep_secret = std::env::var("WAKE_EP_SECRET").unwrap_or_default();
    if wake_ep_enabled && wake_ep_secret.is_empty() {
        tracing::warn!(
            "wake endpoint enabled with no WAKE_EP_SECRET -- unauthenticated access. \
             set WAKE_EP_SECRET or WAKE_EP_ENABLED=false to silence this warning"
        );
    }

    let invoke_method = std::env::var("WAKE_EP_INVOKE_METHOD").unwrap_or_else(|_| "noop".to_string());
    let invoke_target = std::env::var("WAKE_EP_INVOKE_TARGET").unwrap_or_default();
    if wake_ep_enabled
        && matches!(invoke_method.as_str(), "subprocess" | "webhook")
        && invoke_target.is_empty()
    {
        return Err(format!(
            "WAKE_EP_INVOKE_TARGET required when WAKE_EP_ENABLED is set and method is '{invoke_method}'"
        ));
    }

    let tmux_target = std::env::var("WAKE_EP_TMUX_TARGET").unwrap_or_default();
    if wake_ep_enabled && invoke_method == "tmux" && tmux_target.is_empty() {
        return Err(
            "WAKE_EP_TMUX_TARGET required when WAKE_EP_INVOKE_METHOD is 'tmux'. \
             set it to a tmux session target (e.g. 'main:0')."
                .to_string(),
        );
    }

    let sdk_max_turns = std::env::var("WAKE_EP_SDK_MAX_TURNS").ok().and_then(|v| v.parse().ok());

    Ok(ServerConfig {
        agent: AgentConfig {
            agent_id: agent_id.unwrap(),
            endpoint: endpoint.unwrap(),
            public_key: public_key.unwrap(),
            protocol_version: swarmwire_protocol::message::DEFAULT_PROTOCOL_VERSION.to_string(),
            capabilities: vec!["message".to_string(), "system".to_string(), "notification".to_string()],
            name: env("AGENT_NAME"),
            description: env("AGENT_DESCRIPTION"),
        },
        rate_limit: RateLimitConfig {
            messages_per_minute: std::env::var("RATE_LIMIT_MESSAGES_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            join_requests_per_hour: std::env::var("RATE_LIMIT_JOIN_REQUESTS_PER_HOUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        },
        queue_max_size: std::env::var("QUEUE_MAX_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(10_000),
        db_path: std::env::var("DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data/swarm.db")),
        wake: WakeConfig {
            enabled: wake_enabled,
            endpoint: wake_endpoint_url,
            timeout_secs: std::env::var("WAKE_TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(5.0),
        },
        wake_endpoint: WakeEndpointConfig {
            enabled: wake_ep_enabled,
            invoke_method,
            invoke_target,
            secret: wake_ep_secret,
            session_file: std::env::var("WAKE_EP_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/root/.swarm/session.json")),
            session_timeout_minutes: std::env::var("WAKE_EP_SESSION_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            sdk_cwd: std::env::var("WAKE_EP_SDK_CWD").unwrap_or_else(|_| "/root/nexus".to_string()),
            sdk_permission_mode: std::env::var("WAKE_EP_SDK_PERMISSION_MODE")
                .unwrap_or_else(|_| "acceptEdits".to_string()),
            sdk_max_turns,
            sdk_model: env("WAKE_EP_SDK_MODEL"),
            tmux_target,
        },
        bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8443".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_bool_falls_back_to_default() {
        assert!(parse_bool("ture", true));
        assert!(!parse_bool("ture", false));
    }

    #[test]
    fn recognised_bool_values_parse_case_insensitively() {
        assert!(parse_bool("TRUE", false));
        assert!(parse_bool("Yes", false));
        assert!(!parse_bool("No", true));
        assert!(!parse_bool("0", true));
    }

    #[test]
    fn empty_value_uses_default() {
        assert!(parse_bool("", true));
        assert!(!parse_bool("", false));
    }
}
