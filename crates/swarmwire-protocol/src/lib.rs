//! Crypto primitives, invite tokens, and the canonical wire message.
//!
//! This crate covers C1 (Crypto & Token) and C3 (Message Model): the
//! pieces every other crate in the workspace signs, verifies, or parses
//! against, with no dependency on storage or transport.

pub mod crypto;
pub mod error;
pub mod message;
pub mod token;

pub use error::{ErrorKind, ProtocolError};
pub use message::{
    Message, MessageAttachment, MessageReference, MessageSender, MessageType, Priority,
    BROADCAST_RECIPIENT, MAX_CONTENT_LEN,
};
pub use token::{make_invite, peek_swarm_id, verify_invite, InviteClaims};
