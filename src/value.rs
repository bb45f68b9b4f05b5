use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use num_enum::TryFromPrimitive;
use smartstring::alias::String as SmartString;
#[cfg(feature = "serde")]
use serde::Serialize;
use crate::ObjId;

/// The kinds of container a document can hold. Every document has a map at its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum ObjType {
    Map = 0,
    List = 1,
    /// A list of characters. Concurrent inserts interleave per character.
    Text = 2,
}

impl ObjType {
    pub fn is_sequence(&self) -> bool {
        !matches!(self, ObjType::Map)
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            ObjType::Map => "map",
            ObjType::List => "list",
            ObjType::Text => "text",
        }
    }
}

impl Display for ObjType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A leaf value stored in a register.
///
/// Integers and floats are kept apart: only `Int` values can act as counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(untagged))]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int(i64),
    F64(f64),
    Str(SmartString),
    Bytes(Vec<u8>),
}

impl ScalarValue {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Boolean(_) => "boolean",
            ScalarValue::Int(_) => "int",
            ScalarValue::F64(_) => "f64",
            ScalarValue::Str(_) => "str",
            ScalarValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let ScalarValue::Int(n) = self { Some(*n) } else { None }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let ScalarValue::Str(s) = self { Some(s.as_str()) } else { None }
    }
}

impl From<()> for ScalarValue {
    fn from(_: ()) -> Self { ScalarValue::Null }
}
impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self { ScalarValue::Boolean(b) }
}
impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self { ScalarValue::Int(n) }
}
impl From<i32> for ScalarValue {
    fn from(n: i32) -> Self { ScalarValue::Int(n as i64) }
}
impl From<u32> for ScalarValue {
    fn from(n: u32) -> Self { ScalarValue::Int(n as i64) }
}
impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self { ScalarValue::F64(n) }
}
impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self { ScalarValue::Str(s.into()) }
}
impl From<String> for ScalarValue {
    fn from(s: String) -> Self { ScalarValue::Str(s.into()) }
}
impl From<SmartString> for ScalarValue {
    fn from(s: SmartString) -> Self { ScalarValue::Str(s) }
}
impl From<char> for ScalarValue {
    fn from(c: char) -> Self {
        let mut s = SmartString::new();
        s.push(c);
        ScalarValue::Str(s)
    }
}
impl From<Vec<u8>> for ScalarValue {
    fn from(b: Vec<u8>) -> Self { ScalarValue::Bytes(b) }
}

/// A value as seen through a register. Containers are references: their contents live in the op
/// store and are read through the object id.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Object(ObjType, ObjId),
}

impl Value {
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(..))
    }

    pub fn obj_id(&self) -> Option<ObjId> {
        if let Value::Object(_, id) = self { Some(*id) } else { None }
    }

    pub fn obj_type(&self) -> Option<ObjType> {
        if let Value::Object(kind, _) = self { Some(*kind) } else { None }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        if let Value::Scalar(s) = self { Some(s) } else { None }
    }

    pub fn to_str(&self) -> Option<&str> {
        self.as_scalar().and_then(|s| s.as_str())
    }

    pub fn to_int(&self) -> Option<i64> {
        self.as_scalar().and_then(|s| s.as_int())
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            Value::Scalar(s) => s.type_name().into(),
            Value::Object(kind, _) => kind.name().into(),
        }
    }
}


/// A fully hydrated copy of (part of) a document.
///
/// This is what you get from [`ReadDoc::hydrate`](crate::ReadDoc::hydrate). Its useful for
/// comparing whole documents and for exporting them. With the `serde` feature this serializes to
/// plain JSON-like structures.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(untagged))]
pub enum DocValue {
    Scalar(ScalarValue),
    Map(BTreeMap<SmartString, DocValue>),
    List(Vec<DocValue>),
    Text(String),
}

impl DocValue {
    pub fn map() -> Self { DocValue::Map(BTreeMap::new()) }

    pub fn as_map(&self) -> Option<&BTreeMap<SmartString, DocValue>> {
        if let DocValue::Map(m) = self { Some(m) } else { None }
    }

    pub fn as_list(&self) -> Option<&[DocValue]> {
        if let DocValue::List(l) = self { Some(l.as_slice()) } else { None }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let DocValue::Text(s) = self { Some(s.as_str()) } else { None }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        if let DocValue::Scalar(s) = self { Some(s) } else { None }
    }

    /// Look up a key in a map value. Returns None for anything else.
    pub fn get(&self, key: &str) -> Option<&DocValue> {
        self.as_map().and_then(|m| m.get(key))
    }
}

macro_rules! impl_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self { Value::Scalar(v.into()) }
            }
            impl From<$t> for DocValue {
                fn from(v: $t) -> Self { DocValue::Scalar(v.into()) }
            }
        )*
    }
}

impl_from_scalar!(ScalarValue, (), bool, i64, i32, u32, f64, &str, String, SmartString, char, Vec<u8>);
