//! Local persisted state: swarm membership, inbox/outbox message stores,
//! mute lists, the public-key cache, and SDK session bookkeeping.

pub mod db;
pub mod error;
pub mod export;
pub mod repos;
pub mod schema;

pub use db::DatabaseManager;
pub use error::{ErrorKind, StateError};
pub use export::{export_state, import_state};
pub use schema::CURRENT_SCHEMA_VERSION;

pub use repos::inbox::{InboxCounts, InboxMessageRecord, InboxRepository, InboxStatus, MAX_LIST_LIMIT};
pub use repos::keys::{PublicKeyRecord, PublicKeyRepository, DEFAULT_STALE_HOURS};
pub use repos::mutes::MuteRepository;
pub use repos::outbox::{OutboxMessageRecord, OutboxRepository};
pub use repos::sessions::{SdkSessionRecord, SdkSessionRepository};
pub use repos::swarms::{SwarmMemberRecord, SwarmRecord, SwarmRepository};
