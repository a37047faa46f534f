use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotMaster,
    SwarmNotFound,
    AlreadyMember,
    ApprovalRequired,
    Signature,
    Expired,
    Storage,
}

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("agent {0} is not the swarm master")]
    NotMaster(String),

    #[error("swarm {0} not found")]
    SwarmNotFound(String),

    #[error("agent {0} is already a member")]
    AlreadyMember(String),

    #[error("swarm {0} requires master approval")]
    ApprovalRequired(String),

    #[error("invite signature verification failed: {0}")]
    Signature(String),

    #[error("invite token expired")]
    Expired,

    #[error(transparent)]
    Protocol(#[from] swarmwire_protocol::ProtocolError),

    #[error(transparent)]
    State(#[from] swarmwire_state::StateError),
}

impl MembershipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MembershipError::Validation(_) => ErrorKind::Validation,
            MembershipError::NotMaster(_) => ErrorKind::NotMaster,
            MembershipError::SwarmNotFound(_) => ErrorKind::SwarmNotFound,
            MembershipError::AlreadyMember(_) => ErrorKind::AlreadyMember,
            MembershipError::ApprovalRequired(_) => ErrorKind::ApprovalRequired,
            MembershipError::Signature(_) => ErrorKind::Signature,
            MembershipError::Expired => ErrorKind::Expired,
            MembershipError::Protocol(e) => match e.kind() {
                swarmwire_protocol::ErrorKind::Signature => ErrorKind::Signature,
                swarmwire_protocol::ErrorKind::Expired => ErrorKind::Expired,
                swarmwire_protocol::ErrorKind::Validation => ErrorKind::Validation,
                _ => ErrorKind::Validation,
            },
            MembershipError::State(e) => match e.kind() {
                swarmwire_state::ErrorKind::Validation => ErrorKind::Validation,
                _ => ErrorKind::Storage,
            },
        }
    }
}
