use std::collections::{BTreeMap, BTreeSet};
use crate::*;
use crate::opstore::OpStore;

/// What happened when a batch of remote changes was folded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    /// Hashes of the changes applied, in application order. This includes previously buffered
    /// changes which became ready.
    pub applied: Vec<ChangeHash>,
    /// Changes we already had (applied or buffered).
    pub duplicates: usize,
    /// How many changes are still waiting on dependencies.
    pub pending: usize,
    /// Dependencies of buffered changes which we have never seen.
    pub missing_deps: Vec<ChangeHash>,
    /// Whether any materialized view was discarded.
    pub invalidated: bool,
    /// Changes which failed validation, with the reason. These are dropped, not buffered.
    pub rejected: Vec<(ChangeHash, Error)>,
}

/// Remote changes which can't be applied yet, because a dependency (or the author's previous
/// change) hasn't arrived.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingChanges {
    changes: BTreeMap<ChangeHash, Change>,
}

impl PendingChanges {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn contains(&self, hash: &ChangeHash) -> bool {
        self.changes.contains_key(hash)
    }

    pub fn insert(&mut self, change: Change) {
        self.changes.insert(change.hash, change);
    }

    pub fn iter(&self) -> impl Iterator<Item=&Change> {
        self.changes.values()
    }

    fn is_ready(store: &OpStore, change: &Change) -> bool {
        change.deps.iter().all(|d| store.cg.contains_hash(d))
            && change.seq <= store.cg.agent_assignment.next_seq_for(&change.actor)
    }

    /// Remove and return every ready change, in hash order.
    fn take_ready(&mut self, store: &OpStore) -> Vec<Change> {
        let ready: Vec<ChangeHash> = self.changes.values()
            .filter(|c| Self::is_ready(store, c))
            .map(|c| c.hash)
            .collect();
        ready.iter().filter_map(|h| self.changes.remove(h)).collect()
    }

    pub fn missing_deps(&self, store: &OpStore) -> Vec<ChangeHash> {
        let missing: BTreeSet<ChangeHash> = self.changes.values()
            .flat_map(|c| c.deps.iter())
            .filter(|d| !store.cg.contains_hash(d) && !self.changes.contains_key(d))
            .copied()
            .collect();
        missing.into_iter().collect()
    }
}

impl Document {
    /// Fold in a batch of remote changes, in any order.
    ///
    /// Changes we already have are ignored. Changes whose dependencies haven't arrived are
    /// buffered until they do. Each change is validated and applied atomically. A change which
    /// fails validation is dropped and listed in [`MergeResult::rejected`]; the rest of the batch
    /// is still applied.
    pub fn apply_changes<I: IntoIterator<Item=Change>>(&mut self, changes: I) -> Result<MergeResult, Error> {
        let mut result = MergeResult::default();

        for change in changes {
            if self.store.cg.contains_hash(&change.hash) || self.pending.contains(&change.hash) {
                result.duplicates += 1;
            } else {
                self.pending.insert(change);
            }
        }

        self.drain_pending(&mut result);
        if !result.applied.is_empty() {
            self.views.invalidate_all();
            result.invalidated = true;
        }

        for (hash, err) in &result.rejected {
            log::warn!("rejected change {}: {}", hash, err);
        }
        result.pending = self.pending.len();
        if result.pending > 0 {
            result.missing_deps = self.pending.missing_deps(&self.store);
            log::warn!("{} changes pending, missing {} dependencies", result.pending, result.missing_deps.len());
        }
        log::debug!("merge applied {} changes ({} duplicates, {} rejected)",
            result.applied.len(), result.duplicates, result.rejected.len());
        Ok(result)
    }

    /// Apply buffered changes in rounds until nothing more is ready. A change which fails
    /// validation doesn't stop the round.
    fn drain_pending(&mut self, result: &mut MergeResult) {
        loop {
            let ready = self.pending.take_ready(&self.store);
            if ready.is_empty() { return; }

            for change in ready {
                let hash = change.hash;
                match self.store.apply_change(change) {
                    Ok(_) => result.applied.push(hash),
                    Err(e) => result.rejected.push((hash, e)),
                }
            }
        }
    }

    /// Apply every change `other` has which we don't.
    pub fn merge(&mut self, other: &Document) -> Result<MergeResult, Error> {
        let mine = self.heads();
        let missing: Vec<Change> = other.get_changes(&mine).into_iter().cloned().collect();
        self.apply_changes(missing)
    }
}
