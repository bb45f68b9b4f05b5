use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use rand::RngCore;
use crate::Error;

/// Identifies one replica (writer). 16 random bytes, displayed as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ActorId([u8; 16]);

impl ActorId {
    /// Mint a fresh random actor id. Collisions are astronomically unlikely.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex_string(&self) -> String {
        hex::encode(self.0)
    }
}

/// Shorthand for [`ActorId::random`].
pub fn new_actor() -> ActorId {
    ActorId::random()
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl Debug for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The full id is noisy in test output. 8 hex chars is plenty to tell actors apart.
        write!(f, "ActorId({})", &self.to_hex_string()[..8])
    }
}

impl FromStr for ActorId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 16]> for ActorId {
    fn from(bytes: [u8; 16]) -> Self { Self(bytes) }
}

/// The globally unique id of an operation.
///
/// Ids are totally ordered by `(counter, actor)`. Counters are Lamport timestamps: a new op always
/// gets a counter larger than every op its author has seen, so an op's id is greater than the id
/// of everything in its causal past. This order is the tie-break for concurrent edits everywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId {
    pub counter: u64,
    pub actor: ActorId,
}

impl OpId {
    pub fn new(counter: u64, actor: ActorId) -> Self {
        Self { counter, actor }
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter.cmp(&other.counter)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for OpId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.counter, self.actor)
    }
}

impl Debug for OpId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.counter, &self.actor.to_hex_string()[..8])
    }
}

/// Tracks the highest sequence number seen from each actor, and the highest op counter seen from
/// anyone.
#[derive(Debug, Clone, Default)]
pub(crate) struct Clock {
    max_op: u64,
    seqs: BTreeMap<ActorId, u64>,
}

impl Clock {
    pub fn new() -> Self { Self::default() }

    pub fn max_op(&self) -> u64 {
        self.max_op
    }

    /// The last sequence number used by this actor, or 0 if we haven't seen it.
    pub fn seq_of(&self, actor: &ActorId) -> u64 {
        self.seqs.get(actor).copied().unwrap_or(0)
    }

    /// The sequence number the next change from `actor` must carry. The clock advances when that
    /// change is recorded with [`Clock::observe`].
    pub fn next_seq(&self, actor: &ActorId) -> Result<u64, Error> {
        self.seq_of(actor).checked_add(1).ok_or(Error::ActorExhausted)
    }

    /// The counter for the next locally created op.
    pub fn next_op(&self) -> Result<u64, Error> {
        self.max_op.checked_add(1).ok_or(Error::ActorExhausted)
    }

    pub fn observe(&mut self, actor: ActorId, seq: u64, max_op: u64) {
        let entry = self.seqs.entry(actor).or_default();
        *entry = (*entry).max(seq);
        self.max_op = self.max_op.max(max_op);
    }

    #[cfg(test)]
    pub(crate) fn force_exhausted(&mut self, actor: ActorId) {
        self.seqs.insert(actor, u64::MAX);
    }
}
