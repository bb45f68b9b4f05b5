use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeMap};
use smallvec::SmallVec;
use crate::{ActorId, ChangeHash, Frontier, LV};
use crate::causalgraph::agent_assignment::{AgentAssignment, AgentIdx};

pub mod agent_assignment;
#[cfg(feature = "dot_export")]
mod dot;

/// Per-actor highest sequence number contained in a version, indexed by [`AgentIdx`]. Missing
/// trailing entries are zero.
pub(crate) type VersionVector = SmallVec<[u64; 4]>;

#[derive(Clone, Debug)]
pub(crate) struct ChangeEntry {
    pub(crate) hash: ChangeHash,
    pub(crate) agent: AgentIdx,
    pub(crate) seq: u64,
    pub(crate) parents: Frontier,

    /// Everything in this change's causal past, including itself. This makes ancestry checks a
    /// single lookup.
    pub(crate) clock: VersionVector,
}

/// The DAG of changes a replica has applied.
///
/// Changes are numbered with local versions (LVs) in the order they were applied here. Parents
/// are always applied before their children, so LV order is a valid topological order. It is not
/// the same on every replica though. Anything which needs to be deterministic across replicas
/// should use [`CausalGraph::topo_sorted`].
#[derive(Clone, Debug, Default)]
pub struct CausalGraph {
    pub agent_assignment: AgentAssignment,

    pub(crate) entries: Vec<ChangeEntry>,

    by_hash: BTreeMap<ChangeHash, LV>,

    /// The current heads.
    pub version: Frontier,
}

fn clock_get(clock: &[u64], agent: AgentIdx) -> u64 {
    clock.get(agent).copied().unwrap_or(0)
}

fn clock_merge(into: &mut VersionVector, other: &[u64]) {
    if into.len() < other.len() {
        into.resize(other.len(), 0);
    }
    for (a, b) in into.iter_mut().zip(other.iter()) {
        *a = (*a).max(*b);
    }
}

impl CausalGraph {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lv_for_hash(&self, hash: &ChangeHash) -> Option<LV> {
        self.by_hash.get(hash).copied()
    }

    pub fn contains_hash(&self, hash: &ChangeHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn hash_of(&self, lv: LV) -> ChangeHash {
        self.entries[lv].hash
    }

    pub fn actor_of(&self, lv: LV) -> ActorId {
        self.agent_assignment.get_actor(self.entries[lv].agent)
    }

    pub fn parents_of(&self, lv: LV) -> &[LV] {
        self.entries[lv].parents.as_ref()
    }

    /// The current heads as change hashes, sorted.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.frontier_to_hashes(self.version.as_ref())
    }

    pub fn frontier_to_hashes(&self, frontier: &[LV]) -> Vec<ChangeHash> {
        let mut hashes: Vec<ChangeHash> = frontier.iter().map(|&lv| self.hash_of(lv)).collect();
        hashes.sort_unstable();
        hashes
    }

    /// Convert hashes to local versions. Unknown hashes are skipped.
    pub fn hashes_to_frontier(&self, hashes: &[ChangeHash]) -> Frontier {
        hashes.iter().filter_map(|h| self.lv_for_hash(h)).collect()
    }

    /// Add a change to the graph. The caller has already checked that every parent is present and
    /// that `seq` is the next sequence number for this actor.
    pub(crate) fn push(&mut self, hash: ChangeHash, actor: ActorId, seq: u64, parents: Frontier) -> LV {
        let lv = self.entries.len();
        let agent = self.agent_assignment.get_or_create_agent_idx(actor);
        debug_assert_eq!(self.agent_assignment.client_data[agent].get_next_seq(), seq);

        let mut clock = VersionVector::new();
        for &p in parents.iter() {
            clock_merge(&mut clock, &self.entries[p].clock);
        }
        if clock.len() <= agent {
            clock.resize(agent + 1, 0);
        }
        clock[agent] = seq;

        self.version.advance_by_known_run(parents.as_ref(), lv);
        self.entries.push(ChangeEntry { hash, agent, seq, parents, clock });
        self.by_hash.insert(hash, lv);
        self.agent_assignment.client_data[agent].changes.push(lv);
        lv
    }

    /// Is `target` contained in (an ancestor of, or equal to) change `lv`?
    pub fn lv_contains(&self, lv: LV, target: LV) -> bool {
        if lv == target { return true; }
        let t = &self.entries[target];
        clock_get(&self.entries[lv].clock, t.agent) >= t.seq
    }

    pub fn version_contains(&self, frontier: &[LV], target: LV) -> bool {
        frontier.iter().any(|&lv| self.lv_contains(lv, target))
    }

    /// The version vector describing everything contained in a frontier.
    pub(crate) fn version_vector(&self, frontier: &[LV]) -> VersionVector {
        let mut clock = VersionVector::new();
        for &lv in frontier {
            clock_merge(&mut clock, &self.entries[lv].clock);
        }
        clock
    }

    /// Every change not contained in `have`, in local (causal) order.
    pub fn changes_since(&self, have: &[LV]) -> Vec<LV> {
        let clock = self.version_vector(have);
        self.entries.iter().enumerate()
            .filter(|(_, e)| clock_get(&clock, e.agent) < e.seq)
            .map(|(lv, _)| lv)
            .collect()
    }

    /// Topologically sort the given changes (which must be closed under "is a parent of", within
    /// the set). Ties between concurrent changes are broken by hash, so two replicas holding the
    /// same changes produce the same order.
    pub fn topo_sorted(&self, lvs: &[LV]) -> Vec<LV> {
        let included: BTreeMap<LV, usize> = lvs.iter().enumerate().map(|(i, &lv)| (lv, i)).collect();
        let mut waiting_on: Vec<usize> = vec![0; lvs.len()];
        let mut children: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); lvs.len()];

        for (i, &lv) in lvs.iter().enumerate() {
            for p in self.parents_of(lv) {
                if let Some(&pi) = included.get(p) {
                    waiting_on[i] += 1;
                    children[pi].push(i);
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<(ChangeHash, usize)>> = waiting_on.iter().enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(i, _)| Reverse((self.hash_of(lvs[i]), i)))
            .collect();

        let mut result = Vec::with_capacity(lvs.len());
        while let Some(Reverse((_, i))) = ready.pop() {
            result.push(lvs[i]);
            for &c in &children[i] {
                waiting_on[c] -= 1;
                if waiting_on[c] == 0 {
                    ready.push(Reverse((self.hash_of(lvs[c]), c)));
                }
            }
        }
        debug_assert_eq!(result.len(), lvs.len());
        result
    }

    /// Walk the graph from the start and recompute the heads. Only used for consistency checks.
    pub(crate) fn compute_version_inefficiently(&self) -> Frontier {
        let mut f = Frontier::root();
        for (lv, e) in self.entries.iter().enumerate() {
            f.advance_by_known_run(e.parents.as_ref(), lv);
        }
        f
    }

    pub(crate) fn dbg_check(&self, deep: bool) {
        assert_eq!(self.version, self.compute_version_inefficiently());
        assert_eq!(self.by_hash.len(), self.entries.len());

        for (lv, e) in self.entries.iter().enumerate() {
            assert_eq!(self.by_hash.get(&e.hash), Some(&lv));
            assert!(e.parents.iter().all(|&p| p < lv));
            assert_eq!(self.agent_assignment.client_data[e.agent].try_seq_to_lv(e.seq), Some(lv));

            if deep {
                let mut expect = self.version_vector(e.parents.as_ref());
                if expect.len() <= e.agent { expect.resize(e.agent + 1, 0); }
                expect[e.agent] = e.seq;
                let trim = |v: &[u64]| -> Vec<u64> {
                    let mut v = v.to_vec();
                    while v.last() == Some(&0) { v.pop(); }
                    v
                };
                assert_eq!(trim(&expect), trim(&e.clock));

                // An actor's previous change must be in the causal past of its next one.
                if e.seq > 1 {
                    let prev = self.agent_assignment.client_data[e.agent].try_seq_to_lv(e.seq - 1);
                    let prev = prev.expect("actor chain has a gap");
                    assert!(self.version_contains(e.parents.as_ref(), prev));
                }
            }
        }
    }
}
