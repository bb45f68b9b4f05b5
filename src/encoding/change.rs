//! Binary layout of a single change record. The same writer produces the hash input (with actor
//! ids written in full) and the saved form (with actor ids replaced by actor table indexes).

use std::collections::BTreeMap;
use num_enum::TryFromPrimitive;
use crate::*;
use crate::encoding::bufparser::BufParser;
use crate::encoding::parseerror::ParseError;
use crate::encoding::tools::*;

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
enum ActionTag {
    Set = 0,
    Make = 1,
    Delete = 2,
    Increment = 3,
}

const INSERT_BIT: u8 = 0x08;

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
enum KeyTag {
    Map = 0,
    Head = 1,
    Elem = 2,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
enum ScalarTag {
    Null = 0,
    False = 1,
    True = 2,
    Int = 3,
    F64 = 4,
    Str = 5,
    Bytes = 6,
}

pub(crate) trait ActorWriter {
    fn write_actor(&self, into: &mut Vec<u8>, actor: &ActorId);
}

/// Writes the full 16 byte actor id. Used for hashing, so hashes don't depend on any table.
pub(crate) struct InlineActors;

impl ActorWriter for InlineActors {
    fn write_actor(&self, into: &mut Vec<u8>, actor: &ActorId) {
        into.extend_from_slice(actor.as_bytes());
    }
}

/// A sorted, deduplicated table of every actor referenced by a set of changes.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActorIndex {
    pub(crate) ids: Vec<ActorId>,
    index: BTreeMap<ActorId, usize>,
}

impl ActorIndex {
    pub(crate) fn from_changes<'a, I: Iterator<Item=&'a Change>>(changes: I) -> Self {
        let mut index = BTreeMap::new();
        for c in changes {
            index.insert(c.actor, 0);
            for op in &c.ops {
                // Ops may reference objects and elements created by actors who authored none of
                // the changes being saved (in an incremental bundle).
                if let ObjId::Id(id) = op.obj { index.insert(id.actor, 0); }
                if let Key::Seq(ElemId::Id(id)) = op.key { index.insert(id.actor, 0); }
            }
        }
        let ids: Vec<ActorId> = index.keys().copied().collect();
        for (i, v) in index.values_mut().enumerate() { *v = i; }
        Self { ids, index }
    }
}

impl ActorWriter for ActorIndex {
    fn write_actor(&self, into: &mut Vec<u8>, actor: &ActorId) {
        // Every actor was collected up front in from_changes.
        let idx = self.index.get(actor).copied().unwrap_or(usize::MAX);
        debug_assert_ne!(idx, usize::MAX);
        push_usize(into, idx);
    }
}

fn read_actor(r: &mut BufParser, actors: &[ActorId]) -> Result<ActorId, ParseError> {
    let idx = r.next_usize()?;
    actors.get(idx).copied().ok_or(ParseError::InvalidActorIndex)
}

fn write_op_id<W: ActorWriter>(into: &mut Vec<u8>, id: &OpId, actors: &W) {
    push_u64(into, id.counter);
    actors.write_actor(into, &id.actor);
}

fn read_op_id(r: &mut BufParser, actors: &[ActorId]) -> Result<OpId, ParseError> {
    let counter = r.next_u64()?;
    if counter == 0 { return Err(ParseError::InvalidContent); }
    Ok(OpId::new(counter, read_actor(r, actors)?))
}

fn write_scalar(into: &mut Vec<u8>, val: &ScalarValue) {
    match val {
        ScalarValue::Null => into.push(ScalarTag::Null as u8),
        ScalarValue::Boolean(false) => into.push(ScalarTag::False as u8),
        ScalarValue::Boolean(true) => into.push(ScalarTag::True as u8),
        ScalarValue::Int(n) => {
            into.push(ScalarTag::Int as u8);
            push_zigzag_i64(into, *n);
        }
        ScalarValue::F64(n) => {
            into.push(ScalarTag::F64 as u8);
            into.extend_from_slice(&n.to_le_bytes());
        }
        ScalarValue::Str(s) => {
            into.push(ScalarTag::Str as u8);
            push_str(into, s);
        }
        ScalarValue::Bytes(b) => {
            into.push(ScalarTag::Bytes as u8);
            push_bytes(into, b);
        }
    }
}

fn read_scalar(r: &mut BufParser) -> Result<ScalarValue, ParseError> {
    let tag = ScalarTag::try_from(r.next_u8()?).map_err(|_| ParseError::InvalidContent)?;
    Ok(match tag {
        ScalarTag::Null => ScalarValue::Null,
        ScalarTag::False => ScalarValue::Boolean(false),
        ScalarTag::True => ScalarValue::Boolean(true),
        ScalarTag::Int => ScalarValue::Int(r.next_zigzag_i64()?),
        ScalarTag::F64 => ScalarValue::F64(f64::from_le_bytes(r.next_array::<8>()?)),
        ScalarTag::Str => ScalarValue::Str(r.next_str()?.into()),
        ScalarTag::Bytes => ScalarValue::Bytes(r.next_bytes()?.to_vec()),
    })
}

fn write_op<W: ActorWriter>(into: &mut Vec<u8>, op: &Op, actors: &W) {
    let tag = match op.action {
        OpAction::Set(_) => ActionTag::Set,
        OpAction::Make(_) => ActionTag::Make,
        OpAction::Delete => ActionTag::Delete,
        OpAction::Increment(_) => ActionTag::Increment,
    };
    into.push(tag as u8 | if op.insert { INSERT_BIT } else { 0 });

    match &op.obj {
        // Counters start at 1, so 0 is free to name the root.
        ObjId::Root => push_u64(into, 0),
        ObjId::Id(id) => write_op_id(into, id, actors),
    }

    match &op.key {
        Key::Map(k) => {
            into.push(KeyTag::Map as u8);
            push_str(into, k);
        }
        Key::Seq(ElemId::Head) => into.push(KeyTag::Head as u8),
        Key::Seq(ElemId::Id(id)) => {
            into.push(KeyTag::Elem as u8);
            write_op_id(into, id, actors);
        }
    }

    match &op.action {
        OpAction::Set(val) => write_scalar(into, val),
        OpAction::Make(kind) => into.push(*kind as u8),
        OpAction::Delete => {}
        OpAction::Increment(by) => push_zigzag_i64(into, *by),
    }
}

fn read_op(r: &mut BufParser, id: OpId, actors: &[ActorId]) -> Result<Op, ParseError> {
    let tag_byte = r.next_u8()?;
    let insert = tag_byte & INSERT_BIT != 0;
    let tag = ActionTag::try_from(tag_byte & !INSERT_BIT).map_err(|_| ParseError::InvalidContent)?;

    let obj = match r.next_u64()? {
        0 => ObjId::Root,
        counter => ObjId::Id(OpId::new(counter, read_actor(r, actors)?)),
    };

    let key_tag = KeyTag::try_from(r.next_u8()?).map_err(|_| ParseError::InvalidContent)?;
    let key = match key_tag {
        KeyTag::Map => Key::Map(r.next_str()?.into()),
        KeyTag::Head => Key::Seq(ElemId::Head),
        KeyTag::Elem => Key::Seq(ElemId::Id(read_op_id(r, actors)?)),
    };

    let action = match tag {
        ActionTag::Set => OpAction::Set(read_scalar(r)?),
        ActionTag::Make => OpAction::Make(
            ObjType::try_from(r.next_u8()?).map_err(|_| ParseError::InvalidContent)?
        ),
        ActionTag::Delete => OpAction::Delete,
        ActionTag::Increment => OpAction::Increment(r.next_zigzag_i64()?),
    };

    Ok(Op { id, obj, key, insert, action })
}

pub(crate) fn write_change_record<W: ActorWriter>(into: &mut Vec<u8>, change: &Change, actors: &W) {
    actors.write_actor(into, &change.actor);
    push_u64(into, change.seq);
    push_u64(into, change.start_op);
    push_zigzag_i64(into, change.time);
    push_bool(into, change.message.is_some());
    if let Some(msg) = &change.message {
        push_str(into, msg);
    }

    push_usize(into, change.deps.len());
    for dep in &change.deps {
        into.extend_from_slice(dep.as_bytes());
    }

    push_usize(into, change.ops.len());
    for op in &change.ops {
        write_op(into, op, actors);
    }
}

/// Read a change record back. The change hash is recomputed from the decoded content.
pub(crate) fn read_change_record(r: &mut BufParser, actors: &[ActorId]) -> Result<Change, ParseError> {
    let actor = read_actor(r, actors)?;
    let seq = r.next_u64()?;
    let start_op = r.next_u64()?;
    let time = r.next_zigzag_i64()?;
    let message = if r.next_bool()? {
        Some(r.next_str()?.to_string())
    } else { None };

    let num_deps = r.next_usize()?;
    // Each dep is 32 bytes. Check before allocating so a corrupt length can't make us allocate
    // a huge vec.
    r.check_has_bytes(num_deps.saturating_mul(32))?;
    let mut deps = Vec::with_capacity(num_deps);
    for _ in 0..num_deps {
        deps.push(ChangeHash(r.next_array::<32>()?));
    }
    if !deps.windows(2).all(|w| w[0] < w[1]) {
        return Err(ParseError::InvalidContent);
    }

    let num_ops = r.next_usize()?;
    if seq == 0 || start_op == 0 || num_ops == 0 {
        return Err(ParseError::InvalidContent);
    }
    // Every op is at least 3 bytes.
    r.check_has_bytes(num_ops.saturating_mul(3))?;
    let last_op = start_op.checked_add(num_ops as u64 - 1).ok_or(ParseError::InvalidContent)?;

    let mut ops = Vec::with_capacity(num_ops);
    for counter in start_op..=last_op {
        ops.push(read_op(r, OpId::new(counter, actor), actors)?);
    }

    Ok(Change::new(actor, seq, start_op, time, message, deps, ops))
}
