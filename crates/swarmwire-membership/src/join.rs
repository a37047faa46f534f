//! Swarm create/invite/join/leave/kick: the membership state machine.

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use swarmwire_protocol::{make_invite, peek_swarm_id, verify_invite};
use swarmwire_state::{DatabaseManager, SwarmMemberRecord, SwarmRecord, SwarmRepository};

use crate::error::MembershipError;
use crate::notifications;

/// Outcome of a join attempt, returned rather than raised so the ingress
/// layer can map it to the right HTTP status without inspecting an error.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Accepted { swarm_id: String, swarm_name: String, members: Vec<SwarmMemberRecord> },
    Pending { swarm_id: String, message: String },
}

/// Create a swarm with `master_id` as its sole initial member.
#[allow(clippy::too_many_arguments)]
pub fn create_swarm(
    db: &DatabaseManager,
    swarm_id: &str,
    name: &str,
    master_id: &str,
    master_endpoint: &str,
    master_public_key: &str,
    allow_member_invite: bool,
    require_approval: bool,
) -> Result<SwarmRecord, MembershipError> {
    let conn = db.connection();
    let record = SwarmRepository::create_swarm(
        &conn,
        swarm_id,
        name,
        master_id,
        master_endpoint,
        master_public_key,
        allow_member_invite,
        require_approval,
    )?;
    Ok(record)
}

/// Issue an invite token for `swarm_id`, signed with `signing_key`.
///
/// Only the master may invite unless `allow_member_invite` is set, in
/// which case any member's key may sign the token — but `verify_invite`
/// is always checked against the swarm's *master* key at join time, so a
/// member-signed token is only accepted if that member is the master.
pub fn invite(
    db: &DatabaseManager,
    swarm_id: &str,
    signing_key: &SigningKey,
    inviter_id: &str,
    expires_at: Option<DateTime<Utc>>,
    max_uses: Option<u32>,
) -> Result<String, MembershipError> {
    let conn = db.connection();
    let swarm = SwarmRepository::get_swarm(&conn, swarm_id)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.to_string()))?;

    let is_master = inviter_id == swarm.master;
    if !is_master && !swarm.allow_member_invite {
        return Err(MembershipError::NotMaster(inviter_id.to_string()));
    }
    let master = SwarmRepository::get_member(&conn, swarm_id, &swarm.master)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.to_string()))?;

    Ok(make_invite(signing_key, swarm_id, &swarm.master, &master.endpoint, expires_at, max_uses)?)
}

/// Run the join state machine for a received `invite_token`.
///
/// 1. Extract `swarm_id` from the token without verifying its signature.
/// 2. Look up the swarm; absent is `swarm-not-found`.
/// 3. Resolve the master's public key from swarm state and verify the
///    token against it.
/// 4. Already a member is idempotent success — no notification.
/// 5. `require_approval` transitions to pending without persisting the
///    candidate.
/// 6. Otherwise insert the member, notify, and return the updated list.
pub fn process_join(
    db: &DatabaseManager,
    invite_token: &str,
    agent_id: &str,
    agent_endpoint: &str,
    agent_public_key: &str,
) -> Result<JoinOutcome, MembershipError> {
    let swarm_id = peek_swarm_id(invite_token)?;

    let conn = db.connection();
    let swarm = SwarmRepository::get_swarm(&conn, &swarm_id)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.clone()))?;

    let master = SwarmRepository::get_member(&conn, &swarm_id, &swarm.master)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.clone()))?;
    let master_key = swarmwire_protocol::crypto::public_key_from_base64(&master.public_key)?;
    verify_invite(invite_token, &master_key, Some(&swarm_id))?;

    if SwarmRepository::is_member(&conn, &swarm_id, agent_id)? {
        let members = SwarmRepository::list_members(&conn, &swarm_id)?;
        return Ok(JoinOutcome::Accepted { swarm_id, swarm_name: swarm.name, members });
    }

    if swarm.require_approval {
        return Ok(JoinOutcome::Pending {
            swarm_id,
            message: "swarm requires master approval before joining".to_string(),
        });
    }

    SwarmRepository::add_member(&conn, &swarm_id, agent_id, agent_endpoint, agent_public_key)?;
    drop(conn);
    notifications::notify_member_joined(db, &swarm_id, agent_id);

    let conn = db.connection();
    let members = SwarmRepository::list_members(&conn, &swarm_id)?;
    Ok(JoinOutcome::Accepted { swarm_id, swarm_name: swarm.name, members })
}

/// The master cannot leave without first transferring ownership. Fans out
/// a `member_left` broadcast to the remaining members; per-recipient
/// delivery failures are logged, not raised (see `notifications::
/// fan_out_system_message`).
pub async fn leave_swarm(
    db: &DatabaseManager,
    swarm_id: &str,
    agent_id: &str,
    signing_key: &SigningKey,
) -> Result<(), MembershipError> {
    let conn = db.connection();
    let swarm = SwarmRepository::get_swarm(&conn, swarm_id)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.to_string()))?;
    if agent_id == swarm.master {
        return Err(MembershipError::Validation(
            "master must transfer ownership before leaving the swarm".to_string(),
        ));
    }
    let leaver = SwarmRepository::get_member(&conn, swarm_id, agent_id)?;
    let remaining: Vec<_> =
        SwarmRepository::list_members(&conn, swarm_id)?.into_iter().filter(|m| m.agent_id != agent_id).collect();
    SwarmRepository::remove_member(&conn, swarm_id, agent_id)?;
    drop(conn);
    notifications::notify_member_left(db, swarm_id, agent_id);

    if let Some(leaver) = leaver {
        notifications::fan_out_system_message(
            db,
            swarm_id,
            agent_id,
            &leaver.endpoint,
            signing_key,
            notifications::LifecycleAction::MemberLeft,
            agent_id,
            None,
            &remaining,
        )
        .await;
    }
    Ok(())
}

/// Only the master may kick. Sends a direct `kicked` message to the
/// target, then a `member_kicked` broadcast to the remaining members,
/// then removes the row. Per-recipient delivery failures are logged, not
/// raised (see `notifications::fan_out_system_message`).
pub async fn kick_member(
    db: &DatabaseManager,
    swarm_id: &str,
    initiator_id: &str,
    target_id: &str,
    signing_key: &SigningKey,
    reason: Option<&str>,
) -> Result<(), MembershipError> {
    let conn = db.connection();
    let swarm = SwarmRepository::get_swarm(&conn, swarm_id)?
        .ok_or_else(|| MembershipError::SwarmNotFound(swarm_id.to_string()))?;
    if initiator_id != swarm.master {
        return Err(MembershipError::NotMaster(initiator_id.to_string()));
    }
    let target = SwarmRepository::get_member(&conn, swarm_id, target_id)?
        .ok_or_else(|| MembershipError::Validation(format!("{target_id} is not a member of {swarm_id}")))?;
    let master = SwarmRepository::get_member(&conn, swarm_id, initiator_id)?;
    let remaining: Vec<_> = SwarmRepository::list_members(&conn, swarm_id)?
        .into_iter()
        .filter(|m| m.agent_id != initiator_id && m.agent_id != target_id)
        .collect();
    drop(conn);

    notifications::notify_member_kicked(db, swarm_id, target_id, initiator_id, reason);

    if let Some(master) = master {
        notifications::fan_out_system_message(
            db,
            swarm_id,
            initiator_id,
            &master.endpoint,
            signing_key,
            notifications::LifecycleAction::MemberKicked,
            target_id,
            reason,
            std::slice::from_ref(&target),
        )
        .await;
        notifications::fan_out_system_message(
            db,
            swarm_id,
            initiator_id,
            &master.endpoint,
            signing_key,
            notifications::LifecycleAction::MemberKicked,
            target_id,
            reason,
            &remaining,
        )
        .await;
    }

    let conn = db.connection();
    SwarmRepository::remove_member(&conn, swarm_id, target_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmwire_protocol::crypto::{generate_keypair, public_key_to_base64};

    fn seed_swarm(db: &DatabaseManager, master_key: &SigningKey) -> String {
        let swarm_id = "swarm-1".to_string();
        create_swarm(
            db,
            &swarm_id,
            "Test Swarm",
            "master-a",
            "https://master.example",
            &public_key_to_base64(&master_key.verifying_key()),
            false,
            false,
        )
        .unwrap();
        swarm_id
    }

    #[test]
    fn happy_path_join_then_idempotent_rejoin() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let master_key = generate_keypair();
        let swarm_id = seed_swarm(&db, &master_key);

        let token = invite(&db, &swarm_id, &master_key, "master-a", None, None).unwrap();

        let outcome = process_join(&db, &token, "agent-b", "https://b.example", "pk-b").unwrap();
        match outcome {
            JoinOutcome::Accepted { members, .. } => assert_eq!(members.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }

        let conn = db.connection();
        let notes = swarmwire_state::InboxRepository::list_visible(&conn, Some("all"), Some(&swarm_id), None, 10)
            .unwrap();
        assert_eq!(notes.len(), 1);
        drop(conn);

        let outcome2 = process_join(&db, &token, "agent-b", "https://b.example", "pk-b").unwrap();
        match outcome2 {
            JoinOutcome::Accepted { members, .. } => assert_eq!(members.len(), 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let conn = db.connection();
        let notes = swarmwire_state::InboxRepository::list_visible(&conn, Some("all"), Some(&swarm_id), None, 10)
            .unwrap();
        assert_eq!(notes.len(), 1, "re-join must not duplicate the notification");
    }

    #[test]
    fn wrong_key_signed_token_fails_signature() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let master_key = generate_keypair();
        let swarm_id = seed_swarm(&db, &master_key);

        let stranger = generate_keypair();
        let token = swarmwire_protocol::make_invite(&stranger, &swarm_id, "master-a", "https://master.example", None, None)
            .unwrap();

        let err = process_join(&db, &token, "agent-b", "https://b.example", "pk-b").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Signature);
    }

    #[test]
    fn require_approval_yields_pending_without_persisting_member() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let master_key = generate_keypair();
        let swarm_id = "swarm-2".to_string();
        create_swarm(
            &db,
            &swarm_id,
            "Approval Swarm",
            "master-a",
            "https://master.example",
            &public_key_to_base64(&master_key.verifying_key()),
            false,
            true,
        )
        .unwrap();
        let token = invite(&db, &swarm_id, &master_key, "master-a", None, None).unwrap();

        let outcome = process_join(&db, &token, "agent-b", "https://b.example", "pk-b").unwrap();
        assert!(matches!(outcome, JoinOutcome::Pending { .. }));

        let conn = db.connection();
        assert!(!SwarmRepository::is_member(&conn, &swarm_id, "agent-b").unwrap());
    }

    #[tokio::test]
    async fn master_cannot_leave() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let master_key = generate_keypair();
        let swarm_id = seed_swarm(&db, &master_key);
        let err = leave_swarm(&db, &swarm_id, "master-a", &master_key).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn kick_requires_master_and_removes_target() {
        let db = DatabaseManager::initialize_in_memory().unwrap();
        let master_key = generate_keypair();
        let swarm_id = seed_swarm(&db, &master_key);
        {
            let conn = db.connection();
            SwarmRepository::add_member(&conn, &swarm_id, "agent-b", "https://b.example", "pk-b").unwrap();
        }

        let err = kick_member(&db, &swarm_id, "agent-b", "agent-b", &master_key, None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotMaster);

        kick_member(&db, &swarm_id, "master-a", "agent-b", &master_key, Some("spam")).await.unwrap();
        let conn = db.connection();
        assert!(!SwarmRepository::is_member(&conn, &swarm_id, "agent-b").unwrap());
    }
}
