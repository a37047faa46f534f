pub mod inbox;
pub mod keys;
pub mod mutes;
pub mod outbox;
pub mod sessions;
pub mod swarms;
