//! In-memory, sequence-numbered store of probed link batches.
//!
//! [`VolatileIndex`] is the single source of truth for report lookups while the
//! process runs. It is rebuilt from the completed ledger at startup and mutated
//! only through its own methods, each of which holds one mutex for the duration
//! of a map operation and never awaits while holding it.

use crate::{Error, LinkResult, Result, StatusMap};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Sequence-numbered arena of status maps behind a single lock
#[derive(Debug, Default)]
pub struct VolatileIndex {
    inner: Mutex<Arena>,
}

#[derive(Debug, Default)]
struct Arena {
    entries: BTreeMap<u64, StatusMap>,
    last: u64,
}

impl VolatileIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single map operation, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Arena> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole index with a replayed batch.
    ///
    /// The next assigned number becomes one past the highest number in `batch`,
    /// regardless of gaps or ordering.
    pub fn replace(&self, batch: Vec<LinkResult>) {
        let mut arena = self.lock();
        arena.entries.clear();
        arena.last = 0;
        for result in batch {
            arena.last = arena.last.max(result.number);
            arena.entries.insert(result.number, result.links);
        }
        debug!(
            entries = arena.entries.len(),
            last = arena.last,
            "volatile index replaced"
        );
    }

    /// Raise the last assigned number to at least `number`.
    ///
    /// Replay calls this with the persisted counter so numbers handed out
    /// before a crash are never reassigned, even if their records were lost.
    pub fn advance_to(&self, number: u64) {
        let mut arena = self.lock();
        arena.last = arena.last.max(number);
    }

    /// Store `links` under the next sequence number and return that number.
    pub fn append(&self, links: StatusMap) -> u64 {
        let mut arena = self.lock();
        arena.last += 1;
        let number = arena.last;
        arena.entries.insert(number, links);
        number
    }

    /// Fetch the status maps for `numbers`, in request order.
    ///
    /// Fails with [`Error::NotFound`] naming the first missing number.
    pub fn lookup(&self, numbers: &[u64]) -> Result<Vec<StatusMap>> {
        let arena = self.lock();
        numbers
            .iter()
            .map(|number| {
                arena
                    .entries
                    .get(number)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("key {number} does not exist")))
            })
            .collect()
    }

    /// Highest number assigned so far, 0 when nothing has been stored
    pub fn max_assigned(&self) -> u64 {
        self.lock().last
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
