use std::sync::Arc;
use crate::*;
use crate::materialize::{Materializer, ObjView};
use crate::merge::PendingChanges;
use crate::opstore::OpStore;

/// A replica of a document.
///
/// A document owns every change it has seen (its op store), the id of the local actor, a buffer of
/// remote changes which are waiting on missing dependencies and a cache of materialized objects.
/// Editing happens through a [`Transaction`], reading through [`ReadDoc`].
///
/// ```
/// use replidoc::*;
///
/// let mut doc = Document::new();
/// doc.change(|tx| tx.put(&ROOT, "title", "hello")).unwrap();
///
/// let mut other = doc.fork();
/// other.change(|tx| tx.put(&ROOT, "done", true)).unwrap();
/// doc.merge(&other).unwrap();
/// assert_eq!(doc.get(&ROOT, "done").unwrap().unwrap().0, Value::from(true));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) actor: ActorId,
    pub(crate) store: OpStore,
    pub(crate) pending: PendingChanges,
    pub(crate) views: Materializer,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a fresh random actor.
    pub fn new() -> Self {
        Self::with_actor(ActorId::random())
    }

    pub fn with_actor(actor: ActorId) -> Self {
        Self {
            actor,
            store: OpStore::new(),
            pending: PendingChanges::default(),
            views: Materializer::default(),
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Change the actor used for future local edits. This is how editing continues after
    /// [`Error::ActorExhausted`].
    pub fn set_actor(&mut self, actor: ActorId) {
        self.actor = actor;
    }

    /// Copy this document under a new random actor id.
    pub fn fork(&self) -> Self {
        let mut doc = self.clone();
        doc.actor = ActorId::random();
        doc
    }

    /// Open a transaction. Only one can be open at a time, since it borrows the document.
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `f` in a transaction. The transaction commits if `f` succeeds and rolls back if it
    /// fails.
    pub fn change<O, F>(&mut self, f: F) -> Result<O, Error>
        where F: FnOnce(&mut Transaction) -> Result<O, Error>
    {
        self.change_with(CommitOptions::default(), f)
    }

    pub fn change_with<O, F>(&mut self, opts: CommitOptions, f: F) -> Result<O, Error>
        where F: FnOnce(&mut Transaction) -> Result<O, Error>
    {
        let mut tx = self.transaction();
        match f(&mut tx) {
            Ok(result) => {
                tx.commit_with(opts)?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// The hashes of the changes with no children, sorted.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.store.cg.heads()
    }

    /// Every change not in the causal past of `have_heads`, parents before children. Unknown
    /// hashes in `have_heads` are ignored.
    pub fn get_changes(&self, have_heads: &[ChangeHash]) -> Vec<&Change> {
        let have = self.store.cg.hashes_to_frontier(have_heads);
        self.store.cg.changes_since(have.as_ref())
            .into_iter()
            .map(|lv| &self.store.changes[lv])
            .collect()
    }

    pub fn get_change(&self, hash: &ChangeHash) -> Option<&Change> {
        self.store.cg.lv_for_hash(hash).map(|lv| &self.store.changes[lv])
    }

    /// Every applied change, in the order this replica applied them.
    pub fn changes(&self) -> &[Change] {
        &self.store.changes
    }

    /// Dependencies of buffered changes which this document has never seen.
    pub fn get_missing_deps(&self) -> Vec<ChangeHash> {
        self.pending.missing_deps(&self.store)
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn causal_graph(&self) -> &CausalGraph {
        &self.store.cg
    }

    pub fn num_changes(&self) -> usize {
        self.store.changes.len()
    }

    pub fn num_ops(&self) -> usize {
        self.store.num_ops()
    }

    pub(crate) fn view(&self, obj: &ObjId) -> Result<Arc<ObjView>, Error> {
        self.views.view(&self.store, obj)
    }
}
