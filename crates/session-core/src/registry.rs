//! Subscription registry.
//!
//! Tracks logical subscriptions (destination → handler) independently of
//! the connection going up and down. Each entry may carry a *live*
//! transport-level subscription id; the id is dropped whenever the
//! connection goes away and replaced by [`SubscriptionRegistry::reactivate_all`]
//! after every successful (re)connect. Entries themselves persist until
//! explicitly removed.
//!
//! Duplicate registrations (same destination, same handler) are kept as
//! independent entries: each gets its own live subscription and its own
//! copy of every message.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::messages::{Headers, InboundFrame, Message};
use crate::transport::Transport;

/// Handler invoked for every message on a subscription.
pub type Handler = Rc<RefCell<dyn FnMut(&Message)>>;

/// Registry key: destination plus a per-registry sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub destination: String,
    pub seq: u64,
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.destination, self.seq)
    }
}

struct Entry {
    destination: String,
    headers: Headers,
    handler: Handler,
    /// Transport-level subscription id while the connection is up.
    live: Option<String>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: IndexMap<SubscriptionKey, Entry>,
    next_seq: u64,
    next_live_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a registration without touching the transport.
    pub fn insert(&mut self, destination: &str, headers: Headers, handler: Handler) -> SubscriptionKey {
        let key = SubscriptionKey {
            destination: destination.to_string(),
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.entries.insert(
            key.clone(),
            Entry {
                destination: destination.to_string(),
                headers,
                handler,
                live: None,
            },
        );
        debug!(key = %key, "registered subscription");
        key
    }

    /// Create a transport-level subscription for one entry.
    ///
    /// An entry that is still live is unsubscribed first, so each entry
    /// holds at most one open subscription on the transport. Returns
    /// `false` if the key is unknown.
    pub fn activate(&mut self, key: &SubscriptionKey, transport: &mut dyn Transport) -> bool {
        let live_id = format!("sub-{}", self.next_live_id);
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        self.next_live_id += 1;

        if let Some(old) = entry.live.take() {
            trace!(key = %key, id = %old, "replacing live subscription");
            transport.unsubscribe(&old);
        }
        transport.subscribe(&live_id, &entry.destination, &entry.headers);
        trace!(key = %key, id = %live_id, "activated subscription");
        entry.live = Some(live_id);
        true
    }

    /// Give every registered entry a fresh transport-level subscription.
    ///
    /// Mutates entries in place; never adds or removes entries. Walks a
    /// snapshot of the keys so the registry may change underneath.
    pub fn reactivate_all(&mut self, transport: &mut dyn Transport) -> usize {
        let keys: Vec<SubscriptionKey> = self.entries.keys().cloned().collect();
        let mut count = 0;
        for key in keys {
            if self.activate(&key, transport) {
                count += 1;
            }
        }
        debug!(count, "reactivated subscriptions");
        count
    }

    /// Remove an entry. Returns its live id (if it had one) so the caller
    /// can tear down the transport-level subscription.
    ///
    /// `None` both for unknown keys and for entries that were not live;
    /// use [`SubscriptionRegistry::contains`] to tell them apart.
    pub fn remove(&mut self, key: &SubscriptionKey) -> Option<String> {
        let entry = self.entries.shift_remove(key)?;
        debug!(key = %key, "removed subscription");
        entry.live
    }

    /// Forget all live ids; the connection they belonged to is gone.
    pub fn clear_live(&mut self) {
        for entry in self.entries.values_mut() {
            entry.live = None;
        }
    }

    /// Handlers that should see `frame`.
    ///
    /// A frame carrying a subscription id goes to the single entry holding
    /// that live id. Without one, every entry whose destination matches
    /// exactly receives it.
    pub fn route(&self, frame: &InboundFrame) -> Vec<Handler> {
        match &frame.subscription {
            Some(id) => self
                .entries
                .values()
                .find(|e| e.live.as_deref() == Some(id.as_str()))
                .map(|e| vec![e.handler.clone()])
                .unwrap_or_default(),
            None => self
                .entries
                .values()
                .filter(|e| e.destination == frame.destination)
                .map(|e| e.handler.clone())
                .collect(),
        }
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_live(&self, key: &SubscriptionKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.live.is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that currently hold a transport-level subscription.
    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| e.live.is_some()).count()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.entries.values().map(|e| e.destination.clone()).collect()
    }
}
