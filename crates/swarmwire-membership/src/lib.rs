//! Swarm membership: create/invite/join/leave/kick and the lifecycle
//! notifications that accompany them (C4).

pub mod error;
pub mod join;
pub mod notifications;

pub use error::{ErrorKind, MembershipError};
pub use join::{create_swarm, invite, kick_member, leave_swarm, process_join, JoinOutcome};
pub use notifications::{
    notify_member_joined, notify_member_kicked, notify_member_left, notify_member_muted, notify_member_unmuted,
    LifecycleAction, LifecycleEvent,
};
