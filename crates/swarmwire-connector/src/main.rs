//! Entry point: dispatches CLI subcommands against the local state store
//! and membership operations, or runs the HTTP ingress server.

mod cli;
mod exit;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;

use cli::{Cli, Command};
use swarmwire_ingress::{build_router, load_config_from_env, AppState, MessageQueue};
use swarmwire_membership::{create_swarm, invite, kick_member, leave_swarm};
use swarmwire_protocol::crypto::{load_or_create_keypair, public_key_to_base64};
use swarmwire_protocol::{Message, MessageSender, MessageType};
use swarmwire_state::{export_state, import_state, DatabaseManager, InboxRepository, MuteRepository, OutboxRepository};
use swarmwire_wake::{NoopInvoker, NotificationPreferences, TmuxInvoker, WakeTrigger};

fn default_db_path() -> PathBuf {
    std::env::var("DB_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data/swarm.db"))
}

fn default_key_path() -> PathBuf {
    std::env::var("AGENT_KEY_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data/agent.key"))
}

/// Extract the informational host segment from a `swarm://<id>@<host>?token=...` URL.
fn host_from_invite_url(raw: &str) -> Result<String> {
    let after_at = raw.split_once('@').ok_or_else(|| anyhow!("invite token is missing the @host segment"))?.1;
    let host = after_at.split('?').next().unwrap_or(after_at);
    if host.is_empty() {
        return Err(anyhow!("invite token has an empty host segment"));
    }
    Ok(host.to_string())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;
    match run(cli).await {
        Ok(value) => {
            print_output(&value, json_output);
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            let code = exit::code_for(&e);
            if json_output {
                println!("{}", json!({ "error": { "message": e.to_string() } }));
            } else {
                eprintln!("error: {e:#}");
            }
            std::process::ExitCode::from(code as u8)
        }
    }
}

fn print_output(value: &serde_json::Value, json_output: bool) {
    if json_output {
        println!("{value}");
    } else if let Some(text) = value.get("__text").and_then(|v| v.as_str()) {
        println!("{text}");
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value> {
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let key_path = cli.key.clone().unwrap_or_else(default_key_path);

    match cli.command {
        Command::Init { agent_id } => {
            let key = load_or_create_keypair(&key_path).context("provision identity")?;
            DatabaseManager::initialize(&db_path).context("initialize state database")?;
            let public_key = public_key_to_base64(&key.verifying_key());
            Ok(json!({
                "agent_id": agent_id,
                "public_key": public_key,
                "key_path": key_path,
                "db_path": db_path,
                "__text": format!("identity ready: {agent_id}\npublic key: {public_key}"),
            }))
        }

        Command::Serve => {
            let config = load_config_from_env().map_err(|e| anyhow!(e)).context("load server configuration")?;
            let bind_addr: SocketAddr = config.bind_addr.parse().context("parse BIND_ADDR")?;
            let db = DatabaseManager::initialize(&config.db_path).context("initialize state database")?;
            let (queue, _receiver) = MessageQueue::new(config.queue_max_size);
            let wake_trigger = WakeTrigger::new(
                db.clone(),
                config.wake.endpoint.clone(),
                NotificationPreferences::default(),
                std::time::Duration::from_secs_f64(config.wake.timeout_secs),
            )
            .map_err(|e| anyhow!(e))
            .context("construct wake trigger")?;
            let invoker: Arc<dyn swarmwire_wake::Invoker> = match config.wake_endpoint.invoke_method.as_str() {
                "tmux" => Arc::new(TmuxInvoker { target: config.wake_endpoint.tmux_target.clone() }),
                other => {
                    if other != "noop" {
                        tracing::warn!(invoke_method = other, "unsupported invoke method, falling back to noop");
                    }
                    Arc::new(NoopInvoker)
                }
            };
            let state = AppState::new(db, config, queue, wake_trigger, invoker);
            let app = build_router(state);

            let listener = tokio::net::TcpListener::bind(bind_addr).await.context("bind ingress listener")?;
            tracing::info!(%bind_addr, "swarmwire ingress listening");
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .context("serve ingress")?;
            Ok(json!({ "__text": "server stopped" }))
        }

        Command::CreateSwarm { swarm_id, name, agent_id, endpoint, allow_member_invite, require_approval } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            let record = create_swarm(
                &db,
                &swarm_id,
                &name,
                &agent_id,
                &endpoint,
                &public_key_to_base64(&key.verifying_key()),
                allow_member_invite,
                require_approval,
            )?;
            Ok(json!({
                "swarm_id": record.swarm_id,
                "name": record.name,
                "master": record.master,
                "__text": format!("swarm {} created, mastered by {}", record.swarm_id, record.master),
            }))
        }

        Command::Invite { swarm_id, inviter_id, expires_in_hours, max_uses } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            let expires_at = expires_in_hours.map(|hours| chrono::Utc::now() + chrono::Duration::hours(hours));
            let token = invite(&db, &swarm_id, &key, &inviter_id, expires_at, max_uses)?;
            Ok(json!({ "invite_token": token, "__text": token }))
        }

        Command::Join { invite_token, agent_id, agent_endpoint } => {
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            let host = host_from_invite_url(&invite_token)?;
            let public_key = public_key_to_base64(&key.verifying_key());
            let client = reqwest::Client::new();
            let response = client
                .post(format!("https://{host}/swarm/join"))
                .json(&json!({
                    "invite_token": invite_token,
                    "agent_id": agent_id,
                    "agent_endpoint": agent_endpoint,
                    "agent_public_key": public_key,
                }))
                .send()
                .await
                .context("send join request")?;
            let status = response.status();
            let body: serde_json::Value = response.json().await.unwrap_or(json!({}));
            if !status.is_success() {
                return Err(anyhow!("join rejected ({status}): {body}"));
            }
            Ok(body)
        }

        Command::Leave { swarm_id, agent_id } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            leave_swarm(&db, &swarm_id, &agent_id, &key).await?;
            Ok(json!({ "__text": format!("{agent_id} left {swarm_id}") }))
        }

        Command::Kick { swarm_id, initiator_id, target_id, reason } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            kick_member(&db, &swarm_id, &initiator_id, &target_id, &key, reason.as_deref()).await?;
            Ok(json!({ "__text": format!("{target_id} removed from {swarm_id}") }))
        }

        Command::Send { swarm_id, sender_id, sender_endpoint, recipient_id, recipient_endpoint, content } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let key = load_or_create_keypair(&key_path).context("load identity")?;
            let swarm_uuid = uuid::Uuid::parse_str(&swarm_id).with_context(|| format!("swarm_id {swarm_id:?} must be a UUID on the wire"))?;
            let mut message = Message::new(
                MessageSender { agent_id: sender_id, endpoint: sender_endpoint },
                recipient_id.clone(),
                swarm_uuid,
                MessageType::Message,
                content.clone(),
            );
            message.sign(&key);
            let message_id = message.message_id.to_string();
            let wire = message.to_wire_dict().to_string();

            {
                let conn = db.connection();
                OutboxRepository::insert_sent(&conn, &message_id, &swarm_id, &recipient_id, "message", &content)?;
            }

            let client = reqwest::Client::new();
            let result = client
                .post(format!("{recipient_endpoint}/swarm/message"))
                .header("content-type", "application/json")
                .body(wire)
                .send()
                .await;

            let conn = db.connection();
            match result {
                Ok(response) if response.status().is_success() => {
                    OutboxRepository::mark_delivered(&conn, &message_id)?;
                    Ok(json!({ "status": "delivered", "message_id": message_id }))
                }
                Ok(response) => {
                    let status = response.status();
                    OutboxRepository::mark_failed(&conn, &message_id, &status.to_string())?;
                    Err(anyhow!("delivery failed with status {status}"))
                }
                Err(e) => {
                    OutboxRepository::mark_failed(&conn, &message_id, &e.to_string())?;
                    Err(anyhow::Error::new(e).context("deliver message"))
                }
            }
        }

        Command::Messages { swarm_id, status, limit } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            let status_filter = if status == "all" { None } else { Some(status.as_str()) };
            let messages = InboxRepository::list_visible(&conn, status_filter, swarm_id.as_deref(), None, limit)?;
            Ok(json!({ "messages": messages.iter().map(inbox_to_json).collect::<Vec<_>>() }))
        }

        Command::Sent { swarm_id, limit } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            let messages = match swarm_id {
                Some(swarm_id) => OutboxRepository::list_by_swarm(&conn, &swarm_id, limit)?,
                None => OutboxRepository::list_all(&conn, limit)?,
            };
            Ok(json!({ "messages": messages.iter().map(outbox_to_json).collect::<Vec<_>>() }))
        }

        Command::Mute { agent_id, swarm_id, reason } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            match (agent_id, swarm_id) {
                (Some(agent_id), None) => {
                    MuteRepository::mute_agent(&conn, &agent_id, reason.as_deref())?;
                    Ok(json!({ "__text": format!("muted agent {agent_id}") }))
                }
                (None, Some(swarm_id)) => {
                    MuteRepository::mute_swarm(&conn, &swarm_id, reason.as_deref())?;
                    Ok(json!({ "__text": format!("muted swarm {swarm_id}") }))
                }
                _ => Err(anyhow!("specify exactly one of --agent-id or --swarm-id")),
            }
        }

        Command::Unmute { agent_id, swarm_id } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            match (agent_id, swarm_id) {
                (Some(agent_id), None) => {
                    MuteRepository::unmute_agent(&conn, &agent_id)?;
                    Ok(json!({ "__text": format!("unmuted agent {agent_id}") }))
                }
                (None, Some(swarm_id)) => {
                    MuteRepository::unmute_swarm(&conn, &swarm_id)?;
                    Ok(json!({ "__text": format!("unmuted swarm {swarm_id}") }))
                }
                _ => Err(anyhow!("specify exactly one of --agent-id or --swarm-id")),
            }
        }

        Command::Purge { older_than_hours, archived } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            let purged = if archived {
                InboxRepository::purge_archived(&conn)?
            } else {
                InboxRepository::purge_deleted(&conn, older_than_hours)?
            };
            Ok(json!({ "purged": purged, "__text": format!("purged {purged} rows") }))
        }

        Command::Status => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            let counts = InboxRepository::count_by_status(&conn, None)?;
            let key_present = key_path.exists();
            Ok(json!({
                "status": "healthy",
                "db_path": db_path,
                "key_path": key_path,
                "identity_provisioned": key_present,
                "inbox": {
                    "unread": counts.unread,
                    "read": counts.read,
                    "archived": counts.archived,
                    "deleted": counts.deleted,
                    "total": counts.total,
                },
            }))
        }

        Command::ExportState { agent_id, out } => {
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let conn = db.connection();
            let document = export_state(&conn, &agent_id)?;
            write_json(&out, &document)?;
            Ok(json!({ "__text": format!("exported state to {}", out.display()) }))
        }

        Command::ImportState { file, merge } => {
            let document = read_json(&file)?;
            let db = DatabaseManager::initialize(&db_path).context("open state database")?;
            let mut conn = db.connection();
            import_state(&mut conn, &document, merge)?;
            Ok(json!({ "__text": format!("imported state from {}", file.display()) }))
        }
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?).with_context(|| format!("write {}", path.display()))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {} as json", path.display()))
}

fn inbox_to_json(m: &swarmwire_state::InboxMessageRecord) -> serde_json::Value {
    json!({
        "message_id": m.message_id,
        "swarm_id": m.swarm_id,
        "sender_id": m.sender_id,
        "message_type": m.message_type,
        "content": m.content,
        "received_at": m.received_at,
        "status": m.status,
    })
}

fn outbox_to_json(m: &swarmwire_state::OutboxMessageRecord) -> serde_json::Value {
    json!({
        "message_id": m.message_id,
        "swarm_id": m.swarm_id,
        "recipient_id": m.recipient_id,
        "sent_at": m.sent_at,
        "delivered_at": m.delivered_at,
        "status": m.status,
    })
}
