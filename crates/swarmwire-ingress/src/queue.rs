//! Bounded in-process delivery queue.
//!
//! Full queues drop the incoming item rather than block or error the
//! caller; `dropped_count` tracks how many were discarded so the health
//! endpoint and operators can see backlog pressure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Fraction of capacity in use at which the health endpoint reports
/// `degraded` instead of `healthy`.
pub const BACKLOG_DEGRADED_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message_id: String,
    pub swarm_id: String,
}

struct Inner {
    tx: mpsc::Sender<QueuedMessage>,
    max_size: usize,
    dropped: AtomicU64,
}

#[derive(Clone)]
pub struct MessageQueue {
    inner: Arc<Inner>,
}

impl MessageQueue {
    pub fn new(max_size: usize) -> (Self, mpsc::Receiver<QueuedMessage>) {
        let (tx, rx) = mpsc::channel(max_size.max(1));
        (Self { inner: Arc::new(Inner { tx, max_size, dropped: AtomicU64::new(0) }) }, rx)
    }

    /// Enqueue a message. Returns `true` if it was accepted, `false` if
    /// the queue was full (in which case the dropped counter advances).
    pub fn put(&self, item: QueuedMessage) -> bool {
        match self.inner.tx.try_send(item) {
            Ok(()) => true,
            Err(_) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Approximate current occupancy (messages currently buffered).
    pub fn size(&self) -> usize {
        self.inner.max_size.saturating_sub(self.inner.tx.capacity())
    }

    /// Fraction of capacity in use, in `[0.0, 1.0]`.
    pub fn occupancy(&self) -> f64 {
        if self.inner.max_size == 0 {
            return 0.0;
        }
        self.size() as f64 / self.inner.max_size as f64
    }

    pub fn is_degraded(&self) -> bool {
        self.occupancy() >= BACKLOG_DEGRADED_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str) -> QueuedMessage {
        QueuedMessage { message_id: id.to_string(), swarm_id: "s1".to_string() }
    }

    #[test]
    fn accepts_until_full_then_drops() {
        let (queue, _rx) = MessageQueue::new(2);
        assert!(queue.put(msg("1")));
        assert!(queue.put(msg("2")));
        assert!(!queue.put(msg("3")));
        assert_eq!(queue.dropped_count(), 1);
    }

    #[test]
    fn degraded_threshold_is_crossed_at_80_percent() {
        let (queue, _rx) = MessageQueue::new(10);
        for i in 0..7 {
            assert!(queue.put(msg(&i.to_string())));
        }
        assert!(!queue.is_degraded());
        assert!(queue.put(msg("8")));
        assert!(queue.is_degraded());
    }
}
