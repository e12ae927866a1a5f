pub mod error;
pub mod ops;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

pub use error::StoreError;
use horizon_types::models::Message;

/// The authoritative in-memory message store for the single shared room.
///
/// One instance lives for the whole server process and is never persisted.
/// All mutations run under one mutex, so a mutation and the broadcast built
/// from its result are atomic relative to every other inbound event.
pub struct MessageStore {
    messages: Mutex<HashMap<String, Message>>,
    rejections: RejectionCounters,
}

#[derive(Default)]
struct RejectionCounters {
    not_found: AtomicU64,
    unauthorized: AtomicU64,
    malformed: AtomicU64,
}

/// Snapshot of how many mutations the store has rejected, by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionCounts {
    pub not_found: u64,
    pub unauthorized: u64,
    pub malformed: u64,
}

impl RejectionCounts {
    pub fn total(&self) -> u64 {
        self.not_found + self.unauthorized + self.malformed
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            rejections: RejectionCounters::default(),
        }
    }

    /// Look up a message by id.
    pub fn get(&self, id: &str) -> Option<Message> {
        self.lock().get(id).cloned()
    }

    /// Rejection totals since server start.
    pub fn rejection_counts(&self) -> RejectionCounts {
        RejectionCounts {
            not_found: self.rejections.not_found.load(Ordering::Relaxed),
            unauthorized: self.rejections.unauthorized.load(Ordering::Relaxed),
            malformed: self.rejections.malformed.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Message>> {
        self.messages.lock().expect("message store lock poisoned")
    }

    /// Count a rejection and hand the error back to the caller.
    fn reject(&self, err: StoreError) -> StoreError {
        let counter = match err {
            StoreError::NotFound => &self.rejections.not_found,
            StoreError::Unauthorized => &self.rejections.unauthorized,
            StoreError::Malformed(_) => &self.rejections.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        err
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}
