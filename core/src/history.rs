//! Committed ledger entries, shared between snapshots.
//!
//! Snapshots of one engine share a single append-only log. Each snapshot
//! sees the first `len` entries; entries below any published length are
//! never rewritten, so a commit only pushes its new entries.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use af_ledger::{GENESIS_HASH, LedgerEntry};

#[derive(Debug, Clone, Default)]
pub struct History {
    log: Arc<RwLock<Vec<LedgerEntry>>>,
    len: usize,
}

impl History {
    pub(crate) fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let len = entries.len();
        Self {
            log: Arc::new(RwLock::new(entries)),
            len,
        }
    }

    /// This history followed by `entries`.
    ///
    /// Appends in place when `self` is the newest view of its log. Any other
    /// view gets a fresh log so the views already handed out stay intact.
    pub(crate) fn extended(&self, entries: &[LedgerEntry]) -> Self {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        if log.len() == self.len {
            log.extend_from_slice(entries);
            return Self {
                log: Arc::clone(&self.log),
                len: log.len(),
            };
        }
        let mut copy = Vec::with_capacity(self.len + entries.len());
        copy.extend_from_slice(&log[..self.len]);
        copy.extend_from_slice(entries);
        Self::from_entries(copy)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn last(&self) -> Option<LedgerEntry> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<LedgerEntry> {
        if index >= self.len {
            return None;
        }
        self.read().get(index).cloned()
    }

    /// Hash of the newest entry, or the genesis hash when empty.
    #[must_use]
    pub fn head_hash(&self) -> String {
        self.last()
            .map_or_else(|| GENESIS_HASH.to_owned(), |entry| entry.hash)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<LedgerEntry> {
        self.read()[..self.len].to_vec()
    }

    /// Copies of the entries matching `keep`, in sequence order.
    pub fn matching(&self, mut keep: impl FnMut(&LedgerEntry) -> bool) -> Vec<LedgerEntry> {
        self.read()[..self.len]
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LedgerEntry>> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }
}
