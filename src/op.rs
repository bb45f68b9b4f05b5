use std::fmt::{Display, Formatter};
use smartstring::alias::String as SmartString;
use crate::{ObjType, OpId, ScalarValue};

/// Names a container in the document. The root map always exists; every other object is named by
/// the id of the op which created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjId {
    Root,
    Id(OpId),
}

/// The root map of every document.
pub const ROOT: ObjId = ObjId::Root;

impl Display for ObjId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjId::Root => f.write_str("_root"),
            ObjId::Id(id) => write!(f, "{}", id),
        }
    }
}

/// A position in a sequence. Elements are named by the id of the op which inserted them. `Head` is
/// the virtual element before the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemId {
    Head,
    Id(OpId),
}

/// The register an op writes to within its object.
///
/// For inserts, the key names the *predecessor* element instead. The register of an inserted
/// element is `Seq(Id(insert op id))`, which is where later sets and deletes of that element land.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Map(SmartString),
    Seq(ElemId),
}

/// How a caller addresses a value within an object: by key in a map, or by (visible) index in a
/// list or text object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    Map(SmartString),
    Seq(usize),
}

impl From<&str> for Prop {
    fn from(s: &str) -> Self { Prop::Map(s.into()) }
}
impl From<String> for Prop {
    fn from(s: String) -> Self { Prop::Map(s.into()) }
}
impl From<&String> for Prop {
    fn from(s: &String) -> Self { Prop::Map(s.as_str().into()) }
}
impl From<SmartString> for Prop {
    fn from(s: SmartString) -> Self { Prop::Map(s) }
}
impl From<usize> for Prop {
    fn from(i: usize) -> Self { Prop::Seq(i) }
}

impl Display for Prop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Prop::Map(k) => f.write_str(k),
            Prop::Seq(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpAction {
    Set(ScalarValue),
    /// Create a new (empty) child object. The object is named by this op's id.
    Make(ObjType),
    Delete,
    Increment(i64),
}

impl OpAction {
    /// Sets, makes and deletes replace whatever was in the register before them. Increments only
    /// add to it.
    pub(crate) fn overwrites(&self) -> bool {
        !matches!(self, OpAction::Increment(_))
    }
}

/// A single atomic edit. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub id: OpId,
    pub obj: ObjId,
    pub key: Key,
    pub insert: bool,
    pub action: OpAction,
}

impl Op {
    /// The register this op writes to.
    pub(crate) fn register_key(&self) -> Key {
        if self.insert {
            Key::Seq(ElemId::Id(self.id))
        } else {
            self.key.clone()
        }
    }

    /// The object created by this op, if any.
    pub(crate) fn child_obj(&self) -> Option<(ObjId, ObjType)> {
        if let OpAction::Make(kind) = self.action {
            Some((ObjId::Id(self.id), kind))
        } else { None }
    }
}
