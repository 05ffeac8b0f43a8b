use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use courier_common::{ChatId, MessageId};

/// Identity of a source message, the correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl EventKey {
    #[must_use]
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

/// Default retention, matching the bound the live engine has always used.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Bounded map from a source message to the destination message it produced
/// in each destination chat.
///
/// Retention is insertion-order FIFO: inserting beyond capacity evicts the
/// oldest-recorded key. Lookups of evicted keys simply miss, which the
/// engines handle per configured policy.
#[derive(Debug)]
pub struct CorrelationStore {
    capacity: usize,
    entries: HashMap<EventKey, HashMap<ChatId, MessageId>>,
    order: VecDeque<EventKey>,
}

impl CorrelationStore {
    /// Create a store retaining at most `capacity` source messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record that `key` produced `dest_message` in `dest_chat`. Recording
    /// more destinations for an already known key does not refresh its
    /// position in the eviction order.
    pub fn record(&mut self, key: EventKey, dest_chat: ChatId, dest_message: MessageId) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key);
        }
        self.entries
            .entry(key)
            .or_default()
            .insert(dest_chat, dest_message);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Destination copies of `key`, if it was forwarded and not yet evicted.
    #[must_use]
    pub fn lookup(&self, key: &EventKey) -> Option<&HashMap<ChatId, MessageId>> {
        self.entries.get(key)
    }

    /// Remove and return the destination copies of `key`. Removing an
    /// absent key is a no-op.
    pub fn remove(&mut self, key: &EventKey) -> Option<HashMap<ChatId, MessageId>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Handle shared between the engines of one process.
///
/// A `std::sync::Mutex` is enough: every access is a short map operation
/// and the lock is never held across an await point.
pub type SharedCorrelationStore = Arc<Mutex<CorrelationStore>>;

/// Create a shared store with the given capacity.
#[must_use]
pub fn shared(capacity: usize) -> SharedCorrelationStore {
    Arc::new(Mutex::new(CorrelationStore::new(capacity)))
}
