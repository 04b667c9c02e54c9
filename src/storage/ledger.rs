//! Commit ledger: the set of identifiers already written to the output

use crate::Identifier;
use std::collections::HashSet;
use std::sync::RwLock;

/// Identifiers durably present in the output file
///
/// Built from the output's `id` column when the sink is opened, then grown
/// by [`mark_committed`](Self::mark_committed) after each successful
/// append. Reads vastly outnumber writes, hence the `RwLock`.
#[derive(Debug, Default)]
pub struct CommitLedger {
    ids: RwLock<HashSet<Identifier>>,
}

impl CommitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I: IntoIterator<Item = Identifier>>(ids: I) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().collect()),
        }
    }

    pub fn is_committed(&self, id: Identifier) -> bool {
        match self.ids.read() {
            Ok(ids) => ids.contains(&id),
            Err(poisoned) => poisoned.into_inner().contains(&id),
        }
    }

    /// Records `id` as committed; calling it twice is harmless
    ///
    /// Must only be called once the row for `id` is durably appended.
    pub fn mark_committed(&self, id: Identifier) {
        match self.ids.write() {
            Ok(mut ids) => {
                ids.insert(id);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.ids.read() {
            Ok(ids) => ids.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest committed identifier, used as the default resume point
    pub fn max_id(&self) -> Option<Identifier> {
        match self.ids.read() {
            Ok(ids) => ids.iter().max().copied(),
            Err(poisoned) => poisoned.into_inner().iter().max().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mark_is_idempotent() {
        let ledger = CommitLedger::new();
        assert!(!ledger.is_committed(5));

        ledger.mark_committed(5);
        ledger.mark_committed(5);

        assert!(ledger.is_committed(5));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_max_id() {
        assert_eq!(CommitLedger::new().max_id(), None);

        let ledger = CommitLedger::from_ids([3, 17, 9]);
        assert_eq!(ledger.max_id(), Some(17));
        assert!(!ledger.is_empty());
    }

    #[test]
    fn test_concurrent_marks() {
        let ledger = Arc::new(CommitLedger::new());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        ledger.mark_committed(t * 100 + i);
                        assert!(ledger.is_committed(t * 100 + i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.len(), 400);
    }
}
