use thiserror::Error;

/// Abstract error kinds shared across the workspace (see SPEC_FULL.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Validation,
    Signature,
    Expired,
    Payload,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("token expired")]
    Expired,

    #[error("malformed token payload: {0}")]
    Payload(String),

    #[error("invalid message: {0}")]
    Format(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Crypto(_) => ErrorKind::Validation,
            ProtocolError::InvalidSignature(_) => ErrorKind::Signature,
            ProtocolError::Expired => ErrorKind::Expired,
            ProtocolError::Payload(_) => ErrorKind::Payload,
            ProtocolError::Format(_) => ErrorKind::Format,
        }
    }
}
