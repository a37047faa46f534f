use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    WakeEndpoint,
    Session,
    Invocation,
    Storage,
}

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("wake endpoint returned {0}")]
    WakeEndpoint(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error(transparent)]
    State(#[from] swarmwire_state::StateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WakeError::Validation(_) => ErrorKind::Validation,
            WakeError::WakeEndpoint(_) => ErrorKind::WakeEndpoint,
            WakeError::Session(_) => ErrorKind::Session,
            WakeError::Invocation(_) => ErrorKind::Invocation,
            WakeError::State(_) => ErrorKind::Storage,
            WakeError::Io(_) => ErrorKind::Session,
        }
    }
}
