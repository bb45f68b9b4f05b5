use crate::*;

impl Document {
    /// Check the internal state of the document. This is only exported for integration testing
    /// and fuzzing. You shouldn't have any reason to call this method.
    ///
    /// This panics if anything is inconsistent. A deep check also recomputes every change hash and
    /// every version vector, so it is slow.
    #[allow(unused)]
    pub fn dbg_check(&self, deep: bool) {
        assert!(self.store.uncommitted.is_empty(), "dbg_check called with an open transaction");
        self.store.dbg_check(deep);

        // Buffered changes are never also applied.
        for change in self.pending.iter() {
            assert!(!self.store.cg.contains_hash(&change.hash));
            if deep {
                assert_eq!(change.compute_hash(), change.hash);
            }
        }

        if deep {
            // Cached views must match a fresh materialization.
            for obj in self.store.objects.keys() {
                let view = self.view(obj).expect("object in store must materialize");
                let fresh = crate::materialize::materialize_obj(&self.store, obj)
                    .expect("object in store must materialize");
                assert_eq!(view.len(), fresh.len());
            }
        }
    }
}
