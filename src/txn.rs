use smartstring::alias::String as SmartString;
use crate::*;
use crate::materialize::ObjView;

/// An open local edit. Every intent is turned into stamped ops straight away, so reads through the
/// transaction see its own writes.
///
/// Dropping a transaction without committing rolls it back.
#[derive(Debug)]
pub struct Transaction<'a> {
    pub(crate) doc: &'a mut Document,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(doc: &'a mut Document) -> Self {
        debug_assert!(doc.store.uncommitted.is_empty());
        Self { doc, finished: false }
    }

    /// The number of ops recorded so far.
    pub fn pending_ops(&self) -> usize {
        self.doc.store.uncommitted.len()
    }

    fn obj_type_of(&self, obj: &ObjId) -> Result<ObjType, Error> {
        self.doc.store.object_type(obj).ok_or(Error::InvalidObject(*obj))
    }

    fn seq_view(&self, obj: &ObjId) -> Result<std::sync::Arc<ObjView>, Error> {
        let kind = self.obj_type_of(obj)?;
        if !kind.is_sequence() {
            return Err(Error::WrongObjectType { obj: *obj, actual: kind.name() });
        }
        self.doc.views.view(&self.doc.store, obj)
    }

    /// The id of the visible element at `index`.
    fn elem_at(&self, obj: &ObjId, index: usize) -> Result<OpId, Error> {
        let view = self.seq_view(obj)?;
        match view.as_ref() {
            ObjView::Seq(elems) => elems.get(index)
                .map(|e| e.elem)
                .ok_or(Error::IndexOutOfBounds { index, len: elems.len() }),
            ObjView::Map(_) => unreachable!(),
        }
    }

    /// The element an insert at `index` should be anchored after.
    fn insert_anchor(&self, obj: &ObjId, index: usize) -> Result<ElemId, Error> {
        let view = self.seq_view(obj)?;
        let len = view.len();
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        Ok(if index == 0 {
            ElemId::Head
        } else {
            ElemId::Id(self.elem_at(obj, index - 1)?)
        })
    }

    fn resolve_key(&self, obj: &ObjId, prop: Prop) -> Result<(ObjType, Key), Error> {
        let kind = self.obj_type_of(obj)?;
        let key = match (kind, prop) {
            (ObjType::Map, Prop::Map(name)) => Key::Map(name),
            (ObjType::List | ObjType::Text, Prop::Seq(index)) => Key::Seq(ElemId::Id(self.elem_at(obj, index)?)),
            (kind, _) => return Err(Error::WrongObjectType { obj: *obj, actual: kind.name() }),
        };
        Ok((kind, key))
    }

    fn push_op(&mut self, obj: ObjId, key: Key, insert: bool, action: OpAction) -> Result<OpId, Error> {
        let id = self.doc.store.next_local_op_id(self.doc.actor)?;
        self.doc.store.push_local_op(Op { id, obj, key, insert, action });
        self.doc.views.invalidate(&obj);
        Ok(id)
    }

    /// Text elements each hold exactly one character.
    fn check_text_value(kind: ObjType, value: &ScalarValue) -> Result<(), Error> {
        if kind != ObjType::Text { return Ok(()); }
        match value.as_str() {
            None => Err(Error::TypeMismatch { expected: "char", found: value.type_name().into() }),
            Some(s) if s.chars().count() != 1 => {
                Err(Error::TypeMismatch { expected: "char", found: format!("str of length {}", s.chars().count()) })
            }
            Some(_) => Ok(()),
        }
    }

    /// Set a map key, or overwrite the list element at an index.
    pub fn put<P: Into<Prop>, V: Into<ScalarValue>>(&mut self, obj: &ObjId, prop: P, value: V) -> Result<(), Error> {
        let value = value.into();
        let (kind, key) = self.resolve_key(obj, prop.into())?;
        Self::check_text_value(kind, &value)?;
        self.push_op(*obj, key, false, OpAction::Set(value))?;
        Ok(())
    }

    /// Create a new empty container at a map key or list index.
    pub fn put_object<P: Into<Prop>>(&mut self, obj: &ObjId, prop: P, kind: ObjType) -> Result<ObjId, Error> {
        let (parent_kind, key) = self.resolve_key(obj, prop.into())?;
        if parent_kind == ObjType::Text {
            return Err(Error::WrongObjectType { obj: *obj, actual: parent_kind.name() });
        }
        let id = self.push_op(*obj, key, false, OpAction::Make(kind))?;
        Ok(ObjId::Id(id))
    }

    pub fn insert<V: Into<ScalarValue>>(&mut self, obj: &ObjId, index: usize, value: V) -> Result<(), Error> {
        let value = value.into();
        let pred = self.insert_anchor(obj, index)?;
        Self::check_text_value(self.obj_type_of(obj)?, &value)?;
        self.push_op(*obj, Key::Seq(pred), true, OpAction::Set(value))?;
        Ok(())
    }

    pub fn insert_object(&mut self, obj: &ObjId, index: usize, kind: ObjType) -> Result<ObjId, Error> {
        let pred = self.insert_anchor(obj, index)?;
        let parent_kind = self.obj_type_of(obj)?;
        if parent_kind == ObjType::Text {
            return Err(Error::WrongObjectType { obj: *obj, actual: parent_kind.name() });
        }
        let id = self.push_op(*obj, Key::Seq(pred), true, OpAction::Make(kind))?;
        Ok(ObjId::Id(id))
    }

    /// Append to the end of a list.
    pub fn push<V: Into<ScalarValue>>(&mut self, obj: &ObjId, value: V) -> Result<(), Error> {
        let len = self.seq_view(obj)?.len();
        self.insert(obj, len, value)
    }

    pub fn push_object(&mut self, obj: &ObjId, kind: ObjType) -> Result<ObjId, Error> {
        let len = self.seq_view(obj)?.len();
        self.insert_object(obj, len, kind)
    }

    /// Delete a map key or list element. Deleting a map key which has no value does nothing.
    pub fn delete<P: Into<Prop>>(&mut self, obj: &ObjId, prop: P) -> Result<(), Error> {
        let prop = prop.into();
        if let Prop::Map(name) = &prop {
            if self.obj_type_of(obj)? == ObjType::Map && self.get(obj, name.as_str())?.is_none() {
                return Ok(());
            }
        }
        let (_, key) = self.resolve_key(obj, prop)?;
        self.push_op(*obj, key, false, OpAction::Delete)?;
        Ok(())
    }

    /// Add `by` to a counter. The current value must be an integer.
    pub fn increment<P: Into<Prop>>(&mut self, obj: &ObjId, prop: P, by: i64) -> Result<(), Error> {
        let prop = prop.into();
        let (_, key) = self.resolve_key(obj, prop.clone())?;
        match self.get(obj, prop)? {
            Some((Value::Scalar(ScalarValue::Int(_)), _)) => {}
            Some((other, _)) => return Err(Error::TypeMismatch { expected: "int", found: other.type_name() }),
            None => return Err(Error::TypeMismatch { expected: "int", found: "nothing".into() }),
        }
        self.push_op(*obj, key, false, OpAction::Increment(by))?;
        Ok(())
    }

    /// Replace `del` characters at `pos` in a text object with `text`.
    pub fn splice_text(&mut self, obj: &ObjId, pos: usize, del: usize, text: &str) -> Result<(), Error> {
        let kind = self.obj_type_of(obj)?;
        if kind != ObjType::Text {
            return Err(Error::WrongObjectType { obj: *obj, actual: kind.name() });
        }

        let view = self.doc.views.view(&self.doc.store, obj)?;
        let ObjView::Seq(elems) = view.as_ref() else { unreachable!() };
        let end = pos.checked_add(del).ok_or(Error::IndexOutOfBounds { index: usize::MAX, len: elems.len() })?;
        if end > elems.len() {
            return Err(Error::IndexOutOfBounds { index: end, len: elems.len() });
        }

        let mut pred = if pos == 0 { ElemId::Head } else { ElemId::Id(elems[pos - 1].elem) };
        let deleted: Vec<OpId> = elems[pos..end].iter().map(|e| e.elem).collect();
        drop(view);

        for elem in deleted {
            self.push_op(*obj, Key::Seq(ElemId::Id(elem)), false, OpAction::Delete)?;
        }
        for c in text.chars() {
            let mut s = SmartString::new();
            s.push(c);
            let id = self.push_op(*obj, Key::Seq(pred), true, OpAction::Set(ScalarValue::Str(s)))?;
            pred = ElemId::Id(id);
        }
        Ok(())
    }

    pub fn insert_text(&mut self, obj: &ObjId, pos: usize, text: &str) -> Result<(), Error> {
        self.splice_text(obj, pos, 0, text)
    }

    pub fn delete_text(&mut self, obj: &ObjId, pos: usize, len: usize) -> Result<(), Error> {
        self.splice_text(obj, pos, len, "")
    }

    /// Seal the recorded ops into a change. Returns `None` if nothing was recorded.
    pub fn commit(self) -> Result<Option<ChangeHash>, Error> {
        self.commit_with(CommitOptions::default())
    }

    pub fn commit_with(mut self, opts: CommitOptions) -> Result<Option<ChangeHash>, Error> {
        self.finished = true;
        let result = self.doc.store.commit_local(self.doc.actor, opts);
        if result.is_err() {
            // The store rolled the ops back.
            self.doc.views.invalidate_all();
        }
        result
    }

    /// Discard every recorded op. Returns how many there were.
    pub fn rollback(mut self) -> usize {
        self.finished = true;
        self.discard()
    }

    fn discard(&mut self) -> usize {
        let n = self.doc.store.rollback_local();
        if n > 0 {
            self.doc.views.invalidate_all();
        }
        n
    }
}

impl<'a> Drop for Transaction<'a> {
    fn drop(&mut self) {
        if !self.finished {
            self.discard();
        }
    }
}

impl<'a> ReadDoc for Transaction<'a> {
    fn get<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Option<(Value, OpId)>, Error> {
        self.doc.get(obj, prop)
    }

    fn get_conflicts<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Vec<(Value, OpId)>, Error> {
        self.doc.get_conflicts(obj, prop)
    }

    fn keys(&self, obj: &ObjId) -> Result<Vec<SmartString>, Error> {
        self.doc.keys(obj)
    }

    fn length(&self, obj: &ObjId) -> Result<usize, Error> {
        self.doc.length(obj)
    }

    fn values(&self, obj: &ObjId) -> Result<Vec<Value>, Error> {
        self.doc.values(obj)
    }

    fn text(&self, obj: &ObjId) -> Result<String, Error> {
        self.doc.text(obj)
    }

    fn object_type(&self, obj: &ObjId) -> Option<ObjType> {
        self.doc.object_type(obj)
    }

    fn hydrate_obj(&self, obj: &ObjId) -> Result<DocValue, Error> {
        self.doc.hydrate_obj(obj)
    }

    fn heads(&self) -> Vec<ChangeHash> {
        self.doc.heads()
    }
}
