use thiserror::Error;
use crate::{ChangeHash, ObjId, OpId};
use crate::encoding::parseerror::ParseError;

/// Errors returned by document operations.
///
/// Loading only ever produces [`Error::CorruptDocument`]. The remaining variants come from local
/// edits and from folding in remote changes.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The sequence number or op counter of the local actor would overflow. The document must be
    /// re-keyed with [`Document::set_actor`](crate::Document::set_actor) to keep editing.
    #[error("actor counter exhausted")]
    ActorExhausted,

    #[error("corrupt document: {0}")]
    CorruptDocument(#[from] ParseError),

    /// An op in a change references an object or list element which has never been observed.
    #[error("op {op} references unknown {target}")]
    DanglingReference { op: OpId, target: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("no such object: {0}")]
    InvalidObject(ObjId),

    #[error("object {obj} is a {actual}, which does not support this operation")]
    WrongObjectType { obj: ObjId, actual: &'static str },

    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Two different changes claim the same (actor, seq) pair.
    #[error("change {incoming} conflicts with {existing} (same actor and seq)")]
    ConflictingChange { existing: ChangeHash, incoming: ChangeHash },

    #[error("invalid change {hash}: {reason}")]
    InvalidChange { hash: ChangeHash, reason: &'static str },
}
