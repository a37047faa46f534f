pub mod health;
pub mod inbox;
pub mod join;
pub mod message;
pub mod outbox;
pub mod wake;
