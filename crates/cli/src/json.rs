use anyhow::{anyhow, bail};
use serde_json::Value as Json;
use replidoc::{DocValue, Document, ObjId, ObjType, Prop, ReadDoc, ROOT, ScalarValue, Transaction, Value};

/// Where a value is written inside its parent object.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Put(Prop),
    Insert(usize),
}

/// Split a path like `cards.0.title` into its segments. The empty path names the root.
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() || path == "." { vec![] } else { path.split('.').collect() }
}

/// Map and sequence segments look the same in a path. Which one we mean depends on the object.
fn prop_for<R: ReadDoc>(doc: &R, obj: &ObjId, seg: &str) -> Result<Prop, anyhow::Error> {
    match doc.object_type(obj) {
        Some(kind) if kind.is_sequence() => {
            let idx = seg.parse::<usize>()
                .map_err(|_| anyhow!("'{seg}' is not a valid index into {kind} {obj}"))?;
            Ok(Prop::Seq(idx))
        }
        Some(_) => Ok(Prop::Map(seg.into())),
        None => bail!("no such object {obj}"),
    }
}

/// Walk down `path` from the root, returning the object it names.
pub fn resolve_obj<R: ReadDoc>(doc: &R, path: &[&str]) -> Result<ObjId, anyhow::Error> {
    let mut obj = ROOT;
    for (i, seg) in path.iter().enumerate() {
        let prop = prop_for(doc, &obj, seg)?;
        obj = match doc.get(&obj, prop)? {
            Some((Value::Object(_, id), _)) => id,
            Some(_) => bail!("'{}' is not an object", path[..=i].join(".")),
            None => bail!("'{}' does not exist", path[..=i].join(".")),
        };
    }
    Ok(obj)
}

/// Read the value at `path`, which may be a scalar or a whole object.
pub fn read_path<R: ReadDoc>(doc: &R, path: &str) -> Result<DocValue, anyhow::Error> {
    let segs = split_path(path);
    let Some((last, parents)) = segs.split_last() else {
        return Ok(doc.hydrate());
    };
    let parent = resolve_obj(doc, parents)?;
    let prop = prop_for(doc, &parent, last)?;
    match doc.get(&parent, prop)? {
        Some((Value::Object(_, id), _)) => Ok(doc.hydrate_obj(&id)?),
        Some((Value::Scalar(s), _)) => Ok(DocValue::Scalar(s)),
        None => bail!("'{path}' does not exist"),
    }
}

/// Figure out the slot for the last path segment. Writing one past the end of a list appends.
pub fn slot_for<R: ReadDoc>(doc: &R, obj: &ObjId, seg: &str, insert: bool) -> Result<Slot, anyhow::Error> {
    let len = doc.length(obj)?;
    Ok(match prop_for(doc, obj, seg)? {
        Prop::Seq(idx) if insert || idx == len => Slot::Insert(idx),
        Prop::Map(_) if insert => bail!("--insert only makes sense inside a list"),
        prop => Slot::Put(prop),
    })
}

pub fn json_to_scalar(value: &Json) -> Option<ScalarValue> {
    Some(match value {
        Json::Null => ScalarValue::Null,
        Json::Bool(b) => ScalarValue::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => ScalarValue::Int(i),
            None => ScalarValue::F64(n.as_f64()?),
        },
        Json::String(s) => ScalarValue::Str(s.as_str().into()),
        Json::Array(_) | Json::Object(_) => return None,
    })
}

fn make_obj(tx: &mut Transaction, obj: &ObjId, slot: Slot, kind: ObjType) -> Result<ObjId, replidoc::Error> {
    match slot {
        Slot::Put(prop) => tx.put_object(obj, prop, kind),
        Slot::Insert(idx) => tx.insert_object(obj, idx, kind),
    }
}

/// Write a JSON value into the document. Objects become maps and arrays become lists. With
/// `text` set, strings become text objects instead of string scalars.
pub fn write_json(tx: &mut Transaction, obj: &ObjId, slot: Slot, value: &Json, text: bool) -> Result<(), replidoc::Error> {
    match value {
        Json::Object(fields) => {
            let child = make_obj(tx, obj, slot, ObjType::Map)?;
            for (k, v) in fields {
                write_json(tx, &child, Slot::Put(Prop::Map(k.as_str().into())), v, text)?;
            }
        }
        Json::Array(items) => {
            let child = make_obj(tx, obj, slot, ObjType::List)?;
            for (i, v) in items.iter().enumerate() {
                write_json(tx, &child, Slot::Insert(i), v, text)?;
            }
        }
        Json::String(s) if text => {
            let child = make_obj(tx, obj, slot, ObjType::Text)?;
            tx.insert_text(&child, 0, s)?;
        }
        scalar => {
            // Everything left is a scalar.
            let v = json_to_scalar(scalar).unwrap_or(ScalarValue::Null);
            match slot {
                Slot::Put(prop) => tx.put(obj, prop, v)?,
                Slot::Insert(idx) => tx.insert(obj, idx, v)?,
            }
        }
    }
    Ok(())
}

/// Set the value at `path` to some JSON, in one change.
pub fn set_path(doc: &mut Document, path: &str, value: &Json, insert: bool, text: bool, message: Option<String>) -> Result<(), anyhow::Error> {
    let segs = split_path(path);
    let Some((last, parents)) = segs.split_last() else {
        bail!("cannot replace the root of the document");
    };
    let parent = resolve_obj(&*doc, parents)?;
    let slot = slot_for(&*doc, &parent, last, insert)?;

    let opts = match message {
        Some(m) => replidoc::CommitOptions::default().with_message(m),
        None => replidoc::CommitOptions::default(),
    };
    doc.change_with(opts, |tx| write_json(tx, &parent, slot, value, text))?;
    Ok(())
}

pub fn delete_path(doc: &mut Document, path: &str) -> Result<(), anyhow::Error> {
    let segs = split_path(path);
    let Some((last, parents)) = segs.split_last() else {
        bail!("cannot delete the root of the document");
    };
    let parent = resolve_obj(&*doc, parents)?;
    let prop = prop_for(&*doc, &parent, last)?;
    doc.change(|tx| tx.delete(&parent, prop))?;
    Ok(())
}
