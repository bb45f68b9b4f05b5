use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use crate::*;
use crate::opstore::{ObjInfo, OpRef, OpStore};

/// The surviving values of one register, sorted by op id. The last entry is the visible winner.
pub(crate) type Register = Vec<(OpId, Value)>;

#[derive(Debug, Clone)]
pub(crate) struct SeqElem {
    pub elem: OpId,
    pub values: Register,
}

/// The visible projection of a single object.
#[derive(Debug, Clone)]
pub(crate) enum ObjView {
    /// Only keys with at least one surviving value are present.
    Map(BTreeMap<SmartString, Register>),
    /// Visible elements in document order. Tombstones are skipped.
    Seq(Vec<SeqElem>),
}

impl ObjView {
    pub fn len(&self) -> usize {
        match self {
            ObjView::Map(m) => m.len(),
            ObjView::Seq(s) => s.len(),
        }
    }
}

/// Resolve a register. An op survives unless an overwriting op (set / make / delete) on the same
/// register causally succeeds it. Deletes and increments never survive themselves.
///
/// `refs` is in application order, so anything causally after an op comes later in the slice.
/// Walking backwards, we only need to test each op against the overwrites which haven't been
/// overwritten themselves. That set is as wide as the concurrency on this register.
fn resolve_register(store: &OpStore, refs: &[OpRef]) -> Register {
    let mut values: Register = Vec::new();
    let mut frontier: SmallVec<[OpRef; 2]> = SmallVec::new();

    for (i, &r) in refs.iter().enumerate().rev() {
        let op = store.op(r);
        if !op.action.overwrites() { continue; }
        if frontier.iter().any(|&f| store.happens_before(r, f)) { continue; }
        frontier.push(r);

        let later = &refs[i + 1..];
        let value = match &op.action {
            OpAction::Set(ScalarValue::Int(base)) => {
                // Counters: add every increment which saw this value.
                let sum = later.iter()
                    .filter_map(|&other| match store.op(other).action {
                        OpAction::Increment(by) if store.happens_before(r, other) => Some(by),
                        _ => None,
                    })
                    .fold(*base, |acc, by| acc.wrapping_add(by));
                Value::Scalar(ScalarValue::Int(sum))
            }
            OpAction::Set(val) => {
                if log::log_enabled!(log::Level::Trace) {
                    let ignored = later.iter().filter(|&&other| {
                        matches!(store.op(other).action, OpAction::Increment(_)) && store.happens_before(r, other)
                    }).count();
                    if ignored > 0 {
                        log::trace!("ignoring {} increments of non-counter {:?}", ignored, op.id);
                    }
                }
                Value::Scalar(val.clone())
            }
            OpAction::Make(kind) => Value::Object(*kind, ObjId::Id(op.id)),
            OpAction::Delete | OpAction::Increment(_) => continue,
        };
        values.push((op.id, value));
    }

    values.sort_by_key(|(id, _)| *id);
    values
}

/// Element order for a sequence: each insert is a child of its predecessor, siblings are visited
/// in descending id order, and the result is the pre-order traversal of that tree.
fn seq_order(store: &OpStore, info: &ObjInfo) -> Vec<OpRef> {
    let sorted_children = |pred: &ElemId| -> Vec<OpRef> {
        let mut children: Vec<OpRef> = info.children.get(pred)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();
        // Ascending, so popping from the stack yields the largest id first.
        children.sort_by_key(|&r| store.op(r).id);
        children
    };

    let mut result = Vec::new();
    let mut stack = sorted_children(&ElemId::Head);
    while let Some(r) = stack.pop() {
        result.push(r);
        stack.extend(sorted_children(&ElemId::Id(store.op(r).id)));
    }
    result
}

pub(crate) fn materialize_obj(store: &OpStore, obj: &ObjId) -> Result<ObjView, Error> {
    let info = store.objects.get(obj).ok_or(Error::InvalidObject(*obj))?;

    Ok(match info.kind {
        ObjType::Map => {
            let mut map = BTreeMap::new();
            for (key, refs) in info.props.iter() {
                // Sequence keys on a map are stored, but meaningless.
                let Key::Map(name) = key else { continue };
                let values = resolve_register(store, refs);
                if !values.is_empty() {
                    map.insert(name.clone(), values);
                }
            }
            ObjView::Map(map)
        }
        ObjType::List | ObjType::Text => {
            let mut elems = Vec::new();
            for r in seq_order(store, info) {
                let elem = store.op(r).id;
                let Some(refs) = info.props.get(&Key::Seq(ElemId::Id(elem))) else { continue };
                let values = resolve_register(store, refs);
                if !values.is_empty() {
                    elems.push(SeqElem { elem, values });
                }
            }
            ObjView::Seq(elems)
        }
    })
}

/// Caches object views until the ops they were built from change.
///
/// This uses a RefCell, so a document with a materializer is `Send` but not `Sync`.
#[derive(Debug, Default)]
pub(crate) struct Materializer {
    cache: RefCell<BTreeMap<ObjId, Arc<ObjView>>>,
}

impl Clone for Materializer {
    fn clone(&self) -> Self {
        // Views are cheap to rebuild.
        Self::default()
    }
}

impl Materializer {
    pub fn view(&self, store: &OpStore, obj: &ObjId) -> Result<Arc<ObjView>, Error> {
        if let Some(view) = self.cache.borrow().get(obj) {
            return Ok(view.clone());
        }
        let view = Arc::new(materialize_obj(store, obj)?);
        self.cache.borrow_mut().insert(*obj, view.clone());
        Ok(view)
    }

    pub fn invalidate(&mut self, obj: &ObjId) {
        self.cache.get_mut().remove(obj);
    }

    pub fn invalidate_all(&mut self) {
        self.cache.get_mut().clear();
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn actor(n: u8) -> ActorId { ActorId::from_bytes([n; 16]) }

    fn set(id: OpId, key: &str, val: ScalarValue) -> Op {
        Op { id, obj: ROOT, key: Key::Map(key.into()), insert: false, action: OpAction::Set(val) }
    }

    #[test]
    fn concurrent_sets_form_a_conflict_set() {
        let (a, b) = (actor(1), actor(2));
        let mut store = OpStore::new();
        let c1 = Change::new(a, 1, 1, 0, None, vec![], vec![set(OpId::new(1, a), "k", "from a".into())]);
        let c2 = Change::new(b, 1, 1, 0, None, vec![], vec![set(OpId::new(1, b), "k", "from b".into())]);
        store.apply_change(c2).unwrap();
        store.apply_change(c1).unwrap();

        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        let reg = &m["k"];
        assert_eq!(reg.len(), 2);
        assert_eq!(reg[0].0, OpId::new(1, a));
        // b's actor id is larger, so it wins the tie.
        assert_eq!(reg[1], (OpId::new(1, b), Value::from("from b")));
    }

    #[test]
    fn later_set_overwrites() {
        let a = actor(1);
        let mut store = OpStore::new();
        let c1 = Change::new(a, 1, 1, 0, None, vec![], vec![set(OpId::new(1, a), "k", 1.into())]);
        let c2 = Change::new(a, 2, 2, 0, None, vec![c1.hash()], vec![set(OpId::new(2, a), "k", 2.into())]);
        store.apply_change(c1).unwrap();
        store.apply_change(c2).unwrap();
        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        assert_eq!(m["k"], vec![(OpId::new(2, a), Value::from(2))]);
    }

    #[test]
    fn long_overwrite_history_keeps_concurrent_survivors() {
        let (a, b) = (actor(1), actor(2));
        let mut store = OpStore::new();
        let mut deps = vec![];
        for i in 1..=500u64 {
            let c = Change::new(a, i, i, 0, None, deps, vec![set(OpId::new(i, a), "k", (i as i64).into())]);
            deps = vec![c.hash()];
            store.apply_change(c).unwrap();
        }
        // b only saw a's 10th change, then wrote once. Nothing after that has seen b's write.
        let base = store.changes[9].hash();
        store.apply_change(Change::new(b, 1, 11, 0, None, vec![base], vec![set(OpId::new(11, b), "k", "b".into())])).unwrap();
        let c = Change::new(a, 501, 501, 0, None, deps, vec![set(OpId::new(501, a), "k", 501.into())]);
        store.apply_change(c).unwrap();

        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        assert_eq!(m["k"], vec![
            (OpId::new(11, b), Value::from("b")),
            (OpId::new(501, a), Value::from(501)),
        ]);

        // A delete which saw everything clears the register.
        let heads = vec![store.changes[500].hash(), store.changes[501].hash()];
        let del = Op { id: OpId::new(502, b), obj: ROOT, key: Key::Map("k".into()), insert: false, action: OpAction::Delete };
        store.apply_change(Change::new(b, 2, 502, 0, None, heads, vec![del])).unwrap();
        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        assert!(!m.contains_key("k"));
        store.dbg_check(true);
    }

    #[test]
    fn counters_sum_increments() {
        let (a, b) = (actor(1), actor(2));
        let mut store = OpStore::new();
        let c1 = Change::new(a, 1, 1, 0, None, vec![], vec![set(OpId::new(1, a), "n", 10.into())]);
        let inc = |id: OpId, by| Op { id, obj: ROOT, key: Key::Map("n".into()), insert: false, action: OpAction::Increment(by) };
        let c2 = Change::new(a, 2, 2, 0, None, vec![c1.hash()], vec![inc(OpId::new(2, a), 5)]);
        let c3 = Change::new(b, 1, 2, 0, None, vec![c1.hash()], vec![inc(OpId::new(2, b), -3)]);
        store.apply_change(c1).unwrap();
        store.apply_change(c3).unwrap();
        store.apply_change(c2).unwrap();
        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        assert_eq!(m["n"], vec![(OpId::new(1, a), Value::from(12))]);

        // Increments on strings are stored but ignored.
        let c4 = Change::new(b, 2, 3, 0, None, vec![store.changes[1].hash(), store.changes[2].hash()],
            vec![set(OpId::new(3, b), "s", "x".into())]);
        let c5 = Change::new(b, 3, 4, 0, None, vec![c4.hash()],
            vec![Op { id: OpId::new(4, b), obj: ROOT, key: Key::Map("s".into()), insert: false, action: OpAction::Increment(1) }]);
        store.apply_change(c4).unwrap();
        store.apply_change(c5).unwrap();
        let ObjView::Map(m) = materialize_obj(&store, &ROOT).unwrap() else { panic!() };
        assert_eq!(m["s"], vec![(OpId::new(3, b), Value::from("x"))]);
    }

    #[test]
    fn rga_orders_siblings_descending() {
        let (a, b) = (actor(1), actor(2));
        let mut store = OpStore::new();
        let list = OpId::new(1, a);
        let make = Change::new(a, 1, 1, 0, None, vec![], vec![
            Op { id: list, obj: ROOT, key: Key::Map("l".into()), insert: false, action: OpAction::Make(ObjType::List) },
            Op { id: OpId::new(2, a), obj: ObjId::Id(list), key: Key::Seq(ElemId::Head), insert: true, action: OpAction::Set("x".into()) },
        ]);
        let ins = |id: OpId, pred: ElemId, v: &str| Op {
            id, obj: ObjId::Id(list), key: Key::Seq(pred), insert: true, action: OpAction::Set(v.into())
        };
        let h = make.hash();
        store.apply_change(make).unwrap();
        // Both replicas insert at the front concurrently.
        store.apply_change(Change::new(a, 2, 3, 0, None, vec![h], vec![
            ins(OpId::new(3, a), ElemId::Head, "a1"),
            ins(OpId::new(4, a), ElemId::Id(OpId::new(3, a)), "a2"),
        ])).unwrap();
        store.apply_change(Change::new(b, 1, 3, 0, None, vec![h], vec![
            ins(OpId::new(3, b), ElemId::Head, "b1"),
        ])).unwrap();

        let ObjView::Seq(elems) = materialize_obj(&store, &ObjId::Id(list)).unwrap() else { panic!() };
        let vals: Vec<&str> = elems.iter().map(|e| e.values.last().unwrap().1.to_str().unwrap()).collect();
        // 3@b > 3@a, so b's run goes first. a's run stays contiguous.
        assert_eq!(vals, vec!["b1", "a1", "a2", "x"]);
    }

    #[test]
    fn cache_invalidation() {
        let a = actor(1);
        let mut store = OpStore::new();
        let mut m = Materializer::default();
        assert_eq!(m.view(&store, &ROOT).unwrap().len(), 0);
        assert_eq!(m.cached(), 1);

        store.apply_change(Change::new(a, 1, 1, 0, None, vec![], vec![set(OpId::new(1, a), "k", 1.into())])).unwrap();
        // Still stale until invalidated.
        assert_eq!(m.view(&store, &ROOT).unwrap().len(), 0);
        m.invalidate(&ROOT);
        assert_eq!(m.view(&store, &ROOT).unwrap().len(), 1);
        m.invalidate_all();
        assert_eq!(m.cached(), 0);

        assert!(matches!(m.view(&store, &ObjId::Id(OpId::new(9, a))), Err(Error::InvalidObject(_))));
    }
}
