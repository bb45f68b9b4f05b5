use std::collections::BTreeMap;
use smartstring::alias::String as SmartString;
use crate::*;
use crate::materialize::{ObjView, Register};

/// Placeholder character for non-string elements when reading a sequence as text.
pub const OBJECT_REPLACEMENT: char = '\u{fffc}';

/// Read access to a document. Implemented by [`Document`] and by an open [`Transaction`], which
/// also sees its own uncommitted writes.
pub trait ReadDoc {
    /// The visible value at a map key or list index, and the id of the op which wrote it.
    fn get<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Option<(Value, OpId)>, Error>;

    /// Every concurrently written value at a map key or list index, ascending by op id. The last
    /// one is what [`ReadDoc::get`] returns.
    fn get_conflicts<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Vec<(Value, OpId)>, Error>;

    /// The keys of a map which currently have a value, sorted.
    fn keys(&self, obj: &ObjId) -> Result<Vec<SmartString>, Error>;

    /// Number of visible keys or elements.
    fn length(&self, obj: &ObjId) -> Result<usize, Error>;

    /// The visible values of an object, in key order for maps and element order for sequences.
    fn values(&self, obj: &ObjId) -> Result<Vec<Value>, Error>;

    /// Read a list or text object as a string. Elements which aren't strings show up as U+FFFC.
    fn text(&self, obj: &ObjId) -> Result<String, Error>;

    fn object_type(&self, obj: &ObjId) -> Option<ObjType>;

    /// Recursively copy an object out of the document.
    fn hydrate_obj(&self, obj: &ObjId) -> Result<DocValue, Error>;

    fn heads(&self) -> Vec<ChangeHash>;

    /// Hydrate the whole document.
    fn hydrate(&self) -> DocValue {
        // The root always exists.
        self.hydrate_obj(&ROOT).unwrap_or_else(|_| DocValue::map())
    }

    /// Follow a path of props from the root. Returns `None` if any step is missing or steps into a
    /// scalar.
    fn get_path(&self, path: &[Prop]) -> Result<Option<Value>, Error> {
        let mut obj = ROOT;
        let mut result = None;
        for (i, prop) in path.iter().enumerate() {
            let Some((value, _)) = self.get(&obj, prop.clone())? else { return Ok(None) };
            if i + 1 < path.len() {
                match value.obj_id() {
                    Some(id) => obj = id,
                    None => return Ok(None),
                }
            }
            result = Some(value);
        }
        Ok(result.or(Some(Value::Object(ObjType::Map, ROOT))))
    }
}

fn register_for<'v>(view: &'v ObjView, prop: &Prop) -> Option<&'v Register> {
    match (view, prop) {
        (ObjView::Map(m), Prop::Map(key)) => m.get(key),
        (ObjView::Seq(elems), Prop::Seq(index)) => elems.get(*index).map(|e| &e.values),
        _ => None,
    }
}

fn winner(reg: &Register) -> Option<&Value> {
    reg.last().map(|(_, v)| v)
}

impl Document {
    fn hydrate_value(&self, value: &Value) -> Result<DocValue, Error> {
        match value {
            Value::Scalar(s) => Ok(DocValue::Scalar(s.clone())),
            Value::Object(_, id) => self.hydrate_obj(id),
        }
    }
}

impl ReadDoc for Document {
    fn get<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Option<(Value, OpId)>, Error> {
        let view = self.view(obj)?;
        Ok(register_for(&view, &prop.into())
            .and_then(|reg| reg.last())
            .map(|(id, v)| (v.clone(), *id)))
    }

    fn get_conflicts<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Vec<(Value, OpId)>, Error> {
        let view = self.view(obj)?;
        Ok(register_for(&view, &prop.into())
            .map(|reg| reg.iter().map(|(id, v)| (v.clone(), *id)).collect())
            .unwrap_or_default())
    }

    fn keys(&self, obj: &ObjId) -> Result<Vec<SmartString>, Error> {
        match self.view(obj)?.as_ref() {
            ObjView::Map(m) => Ok(m.keys().cloned().collect()),
            ObjView::Seq(_) => Err(Error::WrongObjectType {
                obj: *obj,
                actual: self.object_type(obj).map_or("sequence", |k| k.name()),
            }),
        }
    }

    fn length(&self, obj: &ObjId) -> Result<usize, Error> {
        Ok(self.view(obj)?.len())
    }

    fn values(&self, obj: &ObjId) -> Result<Vec<Value>, Error> {
        let view = self.view(obj)?;
        Ok(match view.as_ref() {
            ObjView::Map(m) => m.values().filter_map(winner).cloned().collect(),
            ObjView::Seq(elems) => elems.iter().filter_map(|e| winner(&e.values)).cloned().collect(),
        })
    }

    fn text(&self, obj: &ObjId) -> Result<String, Error> {
        let view = self.view(obj)?;
        let ObjView::Seq(elems) = view.as_ref() else {
            return Err(Error::WrongObjectType { obj: *obj, actual: ObjType::Map.name() });
        };
        let mut result = String::new();
        for v in elems.iter().filter_map(|e| winner(&e.values)) {
            match v.to_str() {
                Some(s) => result.push_str(s),
                None => result.push(OBJECT_REPLACEMENT),
            }
        }
        Ok(result)
    }

    fn object_type(&self, obj: &ObjId) -> Option<ObjType> {
        self.store.object_type(obj)
    }

    fn hydrate_obj(&self, obj: &ObjId) -> Result<DocValue, Error> {
        let view = self.view(obj)?;
        Ok(match view.as_ref() {
            ObjView::Map(m) => {
                let mut result = BTreeMap::new();
                for (key, reg) in m.iter() {
                    if let Some(v) = winner(reg) {
                        result.insert(key.clone(), self.hydrate_value(v)?);
                    }
                }
                DocValue::Map(result)
            }
            ObjView::Seq(_) if self.object_type(obj) == Some(ObjType::Text) => {
                DocValue::Text(self.text(obj)?)
            }
            ObjView::Seq(elems) => {
                DocValue::List(elems.iter()
                    .filter_map(|e| winner(&e.values))
                    .map(|v| self.hydrate_value(v))
                    .collect::<Result<Vec<_>, _>>()?)
            }
        })
    }

    fn heads(&self) -> Vec<ChangeHash> {
        Document::heads(self)
    }
}

#[cfg(test)]
mod test {
    use crate::*;

    #[test]
    fn path_lookup() {
        let mut d = Document::with_actor(ActorId::from_bytes([3; 16]));
        d.change(|tx| {
            let config = tx.put_object(&ROOT, "config", ObjType::Map)?;
            let list = tx.put_object(&config, "items", ObjType::List)?;
            tx.push(&list, "first")?;
            tx.put(&ROOT, "flag", true)
        }).unwrap();

        let path = |p: &[Prop]| d.get_path(p).unwrap();
        assert_eq!(path(&["config".into(), "items".into(), 0.into()]), Some("first".into()));
        assert_eq!(path(&["config".into(), "missing".into()]), None);
        assert_eq!(path(&["flag".into(), "x".into()]), None);
        assert_eq!(path(&[]), Some(Value::Object(ObjType::Map, ROOT)));
        assert!(path(&["config".into()]).unwrap().is_object());
    }

    #[test]
    fn hydrate_nested() {
        let mut d = Document::with_actor(ActorId::from_bytes([3; 16]));
        d.change(|tx| {
            let t = tx.put_object(&ROOT, "title", ObjType::Text)?;
            tx.insert_text(&t, 0, "hi")?;
            let l = tx.put_object(&ROOT, "nums", ObjType::List)?;
            tx.push(&l, 1)?;
            let inner = tx.push_object(&l, ObjType::Map)?;
            tx.put(&inner, "x", 2.5)
        }).unwrap();

        let v = d.hydrate();
        assert_eq!(v.get("title").and_then(|t| t.as_text()), Some("hi"));
        let nums = v.get("nums").and_then(|n| n.as_list()).unwrap();
        assert_eq!(nums[0], DocValue::from(1));
        assert_eq!(nums[1].get("x"), Some(&DocValue::from(2.5)));
        assert_eq!(d.keys(&ROOT).unwrap().iter().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["nums", "title"]);
        assert_eq!(d.length(&ROOT).unwrap(), 2);
    }

    #[test]
    fn list_text_uses_replacement_char() {
        let mut d = Document::with_actor(ActorId::from_bytes([3; 16]));
        let l = d.change(|tx| {
            let l = tx.put_object(&ROOT, "l", ObjType::List)?;
            tx.push(&l, "a")?;
            tx.push(&l, 5)?;
            tx.push(&l, "b")?;
            Ok(l)
        }).unwrap();
        assert_eq!(d.text(&l).unwrap(), "a\u{fffc}b");
        assert!(matches!(d.keys(&l), Err(Error::WrongObjectType { .. })));
        assert!(matches!(d.text(&ROOT), Err(Error::WrongObjectType { .. })));
        // Mismatched props read as missing.
        assert_eq!(d.get(&l, "key").unwrap(), None);
        assert_eq!(d.get(&l, 10).unwrap(), None);
    }
}
