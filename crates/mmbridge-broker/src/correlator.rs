//! Maps correlation ids of forwarded requests back to their callers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mmbridge_core::ids::CorrelationId;
use mmbridge_core::protocol::RequestOrigin;

use crate::peer::PeerHandle;

/// What is needed to answer one forwarded request.
pub struct CorrelationEntry {
    /// Envelope of the original request.
    pub origin: RequestOrigin,
    /// The caller to answer.
    pub client: PeerHandle,
    /// When the request was forwarded.
    pub forwarded_at: Instant,
}

/// Outstanding requests keyed by correlation id.
///
/// Entries are single-use: [`take_and_remove`] is the only read path. Nothing
/// expires unless [`expire_older_than`] is called.
///
/// [`take_and_remove`]: RequestCorrelator::take_and_remove
/// [`expire_older_than`]: RequestCorrelator::expire_older_than
#[derive(Default)]
pub struct RequestCorrelator {
    entries: HashMap<CorrelationId, CorrelationEntry>,
}

impl RequestCorrelator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a forwarded request.
    pub fn put(&mut self, id: CorrelationId, origin: RequestOrigin, client: PeerHandle) {
        let _ = self.entries.insert(
            id,
            CorrelationEntry {
                origin,
                client,
                forwarded_at: Instant::now(),
            },
        );
    }

    /// Remove and return the entry for `id`.
    pub fn take_and_remove(&mut self, id: &CorrelationId) -> Option<CorrelationEntry> {
        self.entries.remove(id)
    }

    /// Remove entries forwarded at least `ttl` before `now`.
    pub fn expire_older_than(
        &mut self,
        ttl: Duration,
        now: Instant,
    ) -> Vec<(CorrelationId, CorrelationEntry)> {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.forwarded_at) >= ttl)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|entry| (id, entry)))
            .collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
