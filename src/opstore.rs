use std::collections::{BTreeMap, BTreeSet};
use std::mem::take;
use smallvec::SmallVec;
use crate::*;
use crate::clock::Clock;

/// Points at a stored op: the op at `idx` within change `change`.
///
/// Ops belonging to the open local transaction use `change == changes.len()`, which is exactly
/// the local version that change will get when it commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct OpRef {
    pub change: LV,
    pub idx: usize,
}

/// Every op touching one object, grouped the way the materializer reads them.
#[derive(Debug, Clone)]
pub(crate) struct ObjInfo {
    pub kind: ObjType,

    /// All ops writing to each register, in the order they were applied here. For sequences the
    /// registers are the elements (`Key::Seq(ElemId::Id(insert id))`).
    pub props: BTreeMap<Key, SmallVec<[OpRef; 2]>>,

    /// For sequences, the insert ops anchored after each element.
    pub children: BTreeMap<ElemId, SmallVec<[OpRef; 2]>>,
}

impl ObjInfo {
    fn new(kind: ObjType) -> Self {
        Self { kind, props: BTreeMap::new(), children: BTreeMap::new() }
    }
}

/// The append-only store of every change (and therefore every op) this replica has seen.
///
/// Nothing is ever removed from here except the ops of a local transaction which is rolled back.
#[derive(Debug, Clone)]
pub(crate) struct OpStore {
    pub(crate) cg: CausalGraph,

    /// Indexed by local version. Always the same length as `cg.entries`.
    pub(crate) changes: Vec<Change>,

    pub(crate) objects: BTreeMap<ObjId, ObjInfo>,

    pub(crate) clock: Clock,

    /// Ops from the open local transaction.
    pub(crate) uncommitted: Vec<Op>,
}

impl Default for OpStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OpStore {
    pub fn new() -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(ObjId::Root, ObjInfo::new(ObjType::Map));
        Self {
            cg: CausalGraph::new(),
            changes: Vec::new(),
            objects,
            clock: Clock::new(),
            uncommitted: Vec::new(),
        }
    }

    pub fn num_ops(&self) -> usize {
        self.changes.iter().map(|c| c.ops.len()).sum::<usize>() + self.uncommitted.len()
    }

    fn pending_lv(&self) -> LV {
        self.changes.len()
    }

    pub fn op(&self, r: OpRef) -> &Op {
        if r.change == self.pending_lv() {
            &self.uncommitted[r.idx]
        } else {
            &self.changes[r.change].ops[r.idx]
        }
    }

    pub fn object_type(&self, obj: &ObjId) -> Option<ObjType> {
        self.objects.get(obj).map(|info| info.kind)
    }

    /// Does op `a` happen strictly before op `b`?
    pub fn happens_before(&self, a: OpRef, b: OpRef) -> bool {
        if a.change == b.change {
            a.idx < b.idx
        } else if b.change == self.pending_lv() {
            // The local transaction depends on every change applied so far.
            true
        } else if a.change == self.pending_lv() {
            false
        } else {
            self.cg.lv_contains(b.change, a.change)
        }
    }

    /// Find the change containing the op with this id.
    pub fn lv_for_op(&self, id: &OpId) -> Option<LV> {
        let agent = self.cg.agent_assignment.get_agent_idx(&id.actor)?;
        let lvs = &self.cg.agent_assignment.client_data[agent].changes;
        // An actor's changes have strictly increasing counters.
        let pos = lvs.partition_point(|&lv| self.changes[lv].start_op <= id.counter);
        let lv = *lvs.get(pos.checked_sub(1)?)?;
        let c = &self.changes[lv];
        (id.counter <= c.max_op()).then_some(lv)
    }

    fn index_op(&mut self, r: OpRef, op: &Op) {
        if let Some((child, kind)) = op.child_obj() {
            self.objects.entry(child).or_insert_with(|| ObjInfo::new(kind));
        }

        if let Some(info) = self.objects.get_mut(&op.obj) {
            info.props.entry(op.register_key()).or_default().push(r);
            if op.insert {
                if let Key::Seq(pred) = &op.key {
                    info.children.entry(*pred).or_default().push(r);
                }
            }
        }
    }

    fn unindex_op(&mut self, r: OpRef, op: &Op) {
        fn pop_ref<K: Ord>(map: &mut BTreeMap<K, SmallVec<[OpRef; 2]>>, key: &K, r: OpRef) {
            if let Some(refs) = map.get_mut(key) {
                debug_assert_eq!(refs.last(), Some(&r));
                refs.pop();
                if refs.is_empty() { map.remove(key); }
            }
        }

        if let Some(info) = self.objects.get_mut(&op.obj) {
            pop_ref(&mut info.props, &op.register_key(), r);
            if op.insert {
                if let Key::Seq(pred) = &op.key {
                    pop_ref(&mut info.children, pred, r);
                }
            }
        }

        if let Some((child, _)) = op.child_obj() {
            self.objects.remove(&child);
        }
    }

    /// The id the next local op will get.
    pub fn next_local_op_id(&self, actor: ActorId) -> Result<OpId, Error> {
        let counter = self.clock.next_op()?
            .checked_add(self.uncommitted.len() as u64)
            .ok_or(Error::ActorExhausted)?;
        Ok(OpId::new(counter, actor))
    }

    /// Append an op to the local transaction. Its target has already been validated.
    pub fn push_local_op(&mut self, op: Op) -> OpRef {
        let r = OpRef { change: self.pending_lv(), idx: self.uncommitted.len() };
        self.index_op(r, &op);
        self.uncommitted.push(op);
        r
    }

    /// Discard the ops of the local transaction. Returns how many were discarded.
    pub fn rollback_local(&mut self) -> usize {
        let ops = take(&mut self.uncommitted);
        let lv = self.pending_lv();
        for (idx, op) in ops.iter().enumerate().rev() {
            self.unindex_op(OpRef { change: lv, idx }, op);
        }
        ops.len()
    }

    /// Seal the local transaction's ops into a change. Does nothing if there are no ops.
    pub fn commit_local(&mut self, actor: ActorId, opts: CommitOptions) -> Result<Option<ChangeHash>, Error> {
        if self.uncommitted.is_empty() { return Ok(None); }

        let seq = match self.clock.next_seq(&actor) {
            Ok(seq) => seq,
            Err(e) => {
                self.rollback_local();
                return Err(e);
            }
        };
        debug_assert_eq!(seq, self.cg.agent_assignment.next_seq_for(&actor));

        let ops = take(&mut self.uncommitted);
        let start_op = ops[0].id.counter;
        let parents = self.cg.version.clone();
        let deps = self.cg.heads();
        let change = Change::new(actor, seq, start_op, opts.time, opts.message, deps, ops);
        let hash = change.hash;

        log::debug!("commit {} (seq {}) with {} ops", hash, seq, change.ops.len());
        self.record_change(change, parents);
        Ok(Some(hash))
    }

    fn record_change(&mut self, change: Change, parents: Frontier) -> LV {
        let lv = self.cg.push(change.hash, change.actor, change.seq, parents);
        debug_assert_eq!(lv, self.changes.len());
        self.clock.observe(change.actor, change.seq, change.max_op());
        self.changes.push(change);
        lv
    }

    /// Is the op `id` visible to a change with the given parents? Ops created earlier in the
    /// change itself count too.
    fn op_in_past(&self, id: &OpId, parents: &[LV], local: &BTreeSet<OpId>) -> bool {
        local.contains(id) || self.lv_for_op(id)
            .map_or(false, |lv| self.cg.version_contains(parents, lv))
    }

    /// Check a remote change can be applied. Nothing is modified.
    fn validate_change(&self, change: &Change) -> Result<Frontier, Error> {
        let invalid = |reason| Error::InvalidChange { hash: change.hash, reason };

        if change.ops.is_empty() { return Err(invalid("change has no ops")); }

        let mut parents = SmallVec::<[LV; 2]>::new();
        for dep in &change.deps {
            parents.push(self.cg.lv_for_hash(dep).ok_or(invalid("missing dependency"))?);
        }
        let parents: Frontier = parents.into_iter().collect();

        let next_seq = self.cg.agent_assignment.next_seq_for(&change.actor);
        if change.seq < next_seq {
            let existing = self.cg.agent_assignment.seq_to_lv(&change.actor, change.seq)
                .map(|lv| self.cg.hash_of(lv))
                .ok_or(invalid("sequence number out of range"))?;
            return Err(Error::ConflictingChange { existing, incoming: change.hash });
        } else if change.seq > next_seq {
            return Err(invalid("sequence number skips ahead"));
        }

        if change.seq > 1 {
            let prev = self.cg.agent_assignment.seq_to_lv(&change.actor, change.seq - 1)
                .ok_or(invalid("sequence number skips ahead"))?;
            if !self.cg.version_contains(parents.as_ref(), prev) {
                return Err(invalid("actor's previous change is not a dependency"));
            }
        }

        // Lamport rule: every op is newer than everything it could have seen.
        let past_max_op = parents.iter().map(|&lv| self.changes[lv].max_op()).max().unwrap_or(0);
        if change.start_op <= past_max_op {
            return Err(invalid("op counter is not ahead of dependencies"));
        }

        let mut local_ops = BTreeSet::new();
        let mut local_objs = BTreeSet::new();
        for (i, op) in change.ops.iter().enumerate() {
            let expect_id = OpId::new(change.start_op + i as u64, change.actor);
            if op.id != expect_id { return Err(invalid("op ids are not contiguous")); }

            match &op.obj {
                ObjId::Root => {}
                ObjId::Id(id) => {
                    let known = local_objs.contains(id)
                        || (self.objects.contains_key(&op.obj) && self.op_in_past(id, parents.as_ref(), &local_ops));
                    if !known {
                        return Err(Error::DanglingReference { op: op.id, target: format!("object {}", id) });
                    }
                }
            }

            if let Key::Seq(ElemId::Id(elem)) = &op.key {
                let elem_known = self.op_in_past(elem, parents.as_ref(), &local_ops) && {
                    let key = Key::Seq(ElemId::Id(*elem));
                    let in_store = self.objects.get(&op.obj).map_or(false, |info| info.props.contains_key(&key));
                    let in_change = change.ops[..i].iter()
                        .any(|o| o.insert && o.id == *elem && o.obj == op.obj);
                    in_store || in_change
                };
                if !elem_known {
                    return Err(Error::DanglingReference { op: op.id, target: format!("element {}", elem) });
                }
            }

            local_ops.insert(op.id);
            if op.child_obj().is_some() { local_objs.insert(op.id); }
        }

        Ok(parents)
    }

    /// Validate and apply a causally ready remote change. Either the whole change is applied or
    /// nothing is.
    pub fn apply_change(&mut self, change: Change) -> Result<LV, Error> {
        let parents = self.validate_change(&change)?;
        debug_assert!(self.uncommitted.is_empty());

        let lv = self.pending_lv();
        for (idx, op) in change.ops.iter().enumerate() {
            self.index_op(OpRef { change: lv, idx }, op);
        }
        log::trace!("applied {} from {} seq {} ({} ops)", change.hash, change.actor, change.seq, change.ops.len());
        Ok(self.record_change(change, parents))
    }

    pub(crate) fn dbg_check(&self, deep: bool) {
        assert_eq!(self.changes.len(), self.cg.len());
        self.cg.dbg_check(deep);

        for (lv, c) in self.changes.iter().enumerate() {
            assert_eq!(self.cg.hash_of(lv), c.hash);
            assert_eq!(self.cg.actor_of(lv), c.actor);
            assert!(self.clock.seq_of(&c.actor) >= c.seq);
            assert!(self.clock.max_op() >= c.max_op());
            if deep {
                assert_eq!(c.compute_hash(), c.hash);
                assert_eq!(self.cg.frontier_to_hashes(self.cg.parents_of(lv)), c.deps);
            }
        }

        // Every op is indexed exactly where it should be.
        let mut count = 0;
        for (obj, info) in self.objects.iter() {
            for (key, refs) in info.props.iter() {
                for &r in refs.iter() {
                    let op = self.op(r);
                    assert_eq!(&op.obj, obj);
                    assert_eq!(&op.register_key(), key);
                    count += 1;
                }
            }
            for refs in info.children.values() {
                for &r in refs.iter() {
                    assert!(self.op(r).insert);
                }
            }
            if let ObjId::Id(id) = obj {
                if deep {
                    // Objects are created by a make op which is somewhere in the store.
                    let creator = self.lv_for_op(id)
                        .map(|lv| &self.changes[lv].ops[(id.counter - self.changes[lv].start_op) as usize])
                        .or_else(|| self.uncommitted.iter().find(|op| op.id == *id));
                    assert_eq!(creator.and_then(|op| op.child_obj()), Some((*obj, info.kind)));
                }
            }
        }
        assert_eq!(count, self.num_ops());
    }
}
