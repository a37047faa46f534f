//! Maps the workspace's per-crate error kinds onto the CLI's exit codes
//! (SPEC_FULL.md §6/§7): 0 success, 1 generic, 2 validation, 3
//! transport, 4 authorization, 5 not-found/business-rule.

pub fn code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<swarmwire_membership::MembershipError>() {
        return match e.kind() {
            swarmwire_membership::ErrorKind::Validation => 2,
            swarmwire_membership::ErrorKind::Signature | swarmwire_membership::ErrorKind::Expired => 4,
            swarmwire_membership::ErrorKind::NotMaster => 4,
            swarmwire_membership::ErrorKind::SwarmNotFound
            | swarmwire_membership::ErrorKind::AlreadyMember
            | swarmwire_membership::ErrorKind::ApprovalRequired => 5,
            swarmwire_membership::ErrorKind::Storage => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<swarmwire_state::StateError>() {
        return match e.kind() {
            swarmwire_state::ErrorKind::Validation | swarmwire_state::ErrorKind::Import => 2,
            swarmwire_state::ErrorKind::Storage => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<swarmwire_wake::WakeError>() {
        return match e.kind() {
            swarmwire_wake::ErrorKind::Validation => 2,
            swarmwire_wake::ErrorKind::WakeEndpoint => 3,
            swarmwire_wake::ErrorKind::Session | swarmwire_wake::ErrorKind::Invocation | swarmwire_wake::ErrorKind::Storage => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<swarmwire_protocol::ProtocolError>() {
        return match e.kind() {
            swarmwire_protocol::ErrorKind::Format | swarmwire_protocol::ErrorKind::Validation | swarmwire_protocol::ErrorKind::Payload => 2,
            swarmwire_protocol::ErrorKind::Signature | swarmwire_protocol::ErrorKind::Expired => 4,
        };
    }
    if err.downcast_ref::<reqwest::Error>().is_some() {
        return 3;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swarm_not_found_maps_to_business_rule_code() {
        let err = anyhow::Error::new(swarmwire_membership::MembershipError::SwarmNotFound("s1".into()));
        assert_eq!(code_for(&err), 5);
    }

    #[test]
    fn signature_error_maps_to_authorization_code() {
        let err = anyhow::Error::new(swarmwire_protocol::ProtocolError::InvalidSignature("bad".into()));
        assert_eq!(code_for(&err), 4);
    }

    #[test]
    fn unrecognised_error_maps_to_generic_code() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(code_for(&err), 1);
    }
}
