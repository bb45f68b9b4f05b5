use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use crate::{ActorId, Op};
use crate::encoding::change::{InlineActors, write_change_record};

/// Domain separation prefix for change hashes.
const TYPE_CHANGE: u8 = 0x01;

/// The content hash of a [`Change`]. Changes are named by their hash everywhere outside of a
/// single replica.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHash(pub [u8; 32]);

impl ChangeHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for ChangeHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Debug for ChangeHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangeHash({})", &hex::encode(&self.0[..6]))
    }
}

impl FromStr for ChangeHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Extra information attached to a change when it is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub message: Option<String>,
    /// Caller supplied timestamp. The engine never reads the system clock, so this defaults to 0.
    pub time: i64,
}

impl CommitOptions {
    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }
}

/// An immutable batch of ops authored by one actor in one transaction.
///
/// The ops carry contiguous counters starting at `start_op`. A change's parents (`deps`) are the
/// heads of its author's document when the transaction began. They are sorted, and the change
/// hash covers every field.
#[derive(Clone, PartialEq)]
pub struct Change {
    pub(crate) actor: ActorId,
    pub(crate) seq: u64,
    pub(crate) start_op: u64,
    pub(crate) time: i64,
    pub(crate) message: Option<String>,
    pub(crate) deps: Vec<ChangeHash>,
    pub(crate) ops: Vec<Op>,
    pub(crate) hash: ChangeHash,
}

impl Change {
    /// Assemble a change and compute its hash. `ops` must already be stamped with ids
    /// `start_op..start_op + ops.len()` from `actor`.
    pub(crate) fn new(actor: ActorId, seq: u64, start_op: u64, time: i64, message: Option<String>,
                      mut deps: Vec<ChangeHash>, ops: Vec<Op>) -> Self {
        deps.sort_unstable();
        deps.dedup();
        let mut change = Change {
            actor, seq, start_op, time, message, deps, ops,
            hash: ChangeHash([0; 32]),
        };
        change.hash = change.compute_hash();
        change
    }

    pub(crate) fn compute_hash(&self) -> ChangeHash {
        let mut buf = Vec::with_capacity(64 + self.ops.len() * 24);
        write_change_record(&mut buf, self, &InlineActors);

        let mut hasher = blake3::Hasher::new();
        hasher.update(&[TYPE_CHANGE]);
        hasher.update(&buf);
        ChangeHash(*hasher.finalize().as_bytes())
    }

    pub fn hash(&self) -> ChangeHash { self.hash }
    pub fn actor(&self) -> &ActorId { &self.actor }
    pub fn seq(&self) -> u64 { self.seq }
    pub fn start_op(&self) -> u64 { self.start_op }
    pub fn time(&self) -> i64 { self.time }
    pub fn message(&self) -> Option<&str> { self.message.as_deref() }
    pub fn deps(&self) -> &[ChangeHash] { &self.deps }
    pub fn ops(&self) -> &[Op] { &self.ops }
    pub fn len(&self) -> usize { self.ops.len() }
    pub fn is_empty(&self) -> bool { self.ops.is_empty() }

    /// The counter of the last op in this change.
    pub fn max_op(&self) -> u64 {
        (self.start_op + self.ops.len() as u64).saturating_sub(1)
    }
}

impl Debug for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Change")
            .field("hash", &self.hash)
            .field("actor", &self.actor)
            .field("seq", &self.seq)
            .field("start_op", &self.start_op)
            .field("deps", &self.deps)
            .field("ops", &self.ops.len())
            .finish()
    }
}
