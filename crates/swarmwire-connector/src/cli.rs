//! Command-line surface: a single multi-subcommand tool over the local
//! state store, membership operations, and the ingress server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "swarmwire-connector", about = "Local agent endpoint for the swarmwire messaging substrate")]
pub struct Cli {
    /// Path to the local state database (defaults to $DB_PATH or data/swarm.db).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the Ed25519 identity seed file (defaults to data/agent.key).
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// Emit machine-readable JSON instead of plain text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision a local identity (keypair) and initialize the state database.
    Init {
        #[arg(long)]
        agent_id: String,
    },

    /// Run the HTTP ingress server, listening for peer traffic.
    Serve,

    /// Create a new swarm with this agent as master.
    CreateSwarm {
        #[arg(long)]
        swarm_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        agent_id: String,
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        allow_member_invite: bool,
        #[arg(long)]
        require_approval: bool,
    },

    /// Mint an invite token for a swarm this agent belongs to.
    Invite {
        #[arg(long)]
        swarm_id: String,
        #[arg(long)]
        inviter_id: String,
        #[arg(long)]
        expires_in_hours: Option<i64>,
        #[arg(long)]
        max_uses: Option<u32>,
    },

    /// Redeem an invite token against the issuing swarm's master endpoint.
    Join {
        #[arg(long)]
        invite_token: String,
        #[arg(long)]
        agent_id: String,
        #[arg(long)]
        agent_endpoint: String,
    },

    /// Leave a swarm this agent is a member of.
    Leave {
        #[arg(long)]
        swarm_id: String,
        #[arg(long)]
        agent_id: String,
    },

    /// Remove another member from a swarm this agent masters.
    Kick {
        #[arg(long)]
        swarm_id: String,
        #[arg(long)]
        initiator_id: String,
        #[arg(long)]
        target_id: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Sign and deliver a message to another swarm member over HTTP.
    Send {
        #[arg(long)]
        swarm_id: String,
        #[arg(long)]
        sender_id: String,
        #[arg(long)]
        sender_endpoint: String,
        #[arg(long)]
        recipient_id: String,
        #[arg(long)]
        recipient_endpoint: String,
        #[arg(long)]
        content: String,
    },

    /// List received messages in the local inbox.
    Messages {
        #[arg(long)]
        swarm_id: Option<String>,
        #[arg(long, default_value = "all")]
        status: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// List messages previously sent from this agent.
    Sent {
        #[arg(long)]
        swarm_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Mute an agent or swarm so wake notifications are suppressed.
    Mute {
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        swarm_id: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Reverse a previous mute.
    Unmute {
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long)]
        swarm_id: Option<String>,
    },

    /// Permanently remove deleted/archived inbox rows.
    Purge {
        #[arg(long)]
        older_than_hours: Option<i64>,
        #[arg(long)]
        archived: bool,
    },

    /// Report local health and identity information.
    Status,

    /// Write the full local state as a JSON document.
    ExportState {
        #[arg(long)]
        agent_id: String,
        #[arg(long)]
        out: PathBuf,
    },

    /// Load a previously exported state document.
    ImportState {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        merge: bool,
    },
}
