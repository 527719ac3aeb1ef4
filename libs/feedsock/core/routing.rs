//! Typed message routing.
//!
//! One unbounded FIFO queue per message kind. The decoder pushes from the
//! session's receive loop; each queue has exactly one consumer task that
//! suspends on an empty queue. Queues are created once per feed and reused
//! across reconnects, so downstream consumers never have to resubscribe.
//!
//! Ordering: FIFO within a kind equals arrival order. Nothing is guaranteed
//! across kinds.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;
use tracing::warn;

/// Per-kind queue map for one feed.
pub struct RouteTable<K, M> {
    senders: HashMap<K, mpsc::UnboundedSender<M>>,
}

impl<K, M> RouteTable<K, M>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            senders: HashMap::new(),
        }
    }

    /// Create the queue for `key` and hand back its single consumer end.
    ///
    /// Registering the same key twice replaces the producer side; the old
    /// receiver goes dead. Feeds register every kind once at construction.
    pub fn register(&mut self, key: K) -> mpsc::UnboundedReceiver<M> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(key, tx);
        rx
    }

    /// Push one message into the queue for `key`. O(1), never blocks.
    ///
    /// An unknown key or a dropped consumer logs a warning and drops the
    /// message; routing problems must not disturb the receive loop.
    pub fn route(&self, key: &K, message: M) {
        match self.senders.get(key) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    warn!("consumer for {:?} is gone, dropping message", key);
                }
            }
            None => {
                warn!("no queue registered for {:?}, dropping message", key);
            }
        }
    }

    pub fn routes(&self) -> usize {
        self.senders.len()
    }
}

impl<K, M> Default for RouteTable<K, M>
where
    K: Hash + Eq + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
