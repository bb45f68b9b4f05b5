//! Replidoc is a conflict-free replicated document engine. A document is a tree of maps, lists and
//! text objects which any number of replicas can edit independently, offline, and later merge
//! without coordination. Every replica which has seen the same set of changes shows the same
//! document.
//!
//! Replidoc is built on top of a few core ideas:
//!
//! 1. Every edit is stored as an *operation* (op) with a globally unique id. Ops are grouped into
//! immutable, content hashed [`Change`]s, one per transaction.
//! 2. Changes name the changes they were made on top of (their *deps*). Together they form a DAG,
//! the [causal graph](CausalGraph). The changes with no children are the document's *heads*.
//! 3. The document state is never stored directly. It is *materialized* from the ops on demand and
//! cached until something changes.
//!
//! ## Example
//!
//! ```
//! use replidoc::*;
//!
//! let mut doc = Document::new();
//! let cards = doc.change(|tx| {
//!     let cards = tx.put_object(&ROOT, "cards", ObjType::List)?;
//!     tx.push(&cards, "card1")?;
//!     Ok(cards)
//! }).unwrap();
//!
//! // Replicas can be saved and loaded...
//! let mut other = Document::load(&doc.save()).unwrap();
//! other.set_actor(new_actor());
//! other.change(|tx| tx.push(&cards, "card2")).unwrap();
//!
//! // ... and merged in any order.
//! doc.merge(&other).unwrap();
//! assert_eq!(doc.length(&cards).unwrap(), 2);
//! assert_eq!(doc.hydrate(), other.hydrate());
//! ```
//!
//! ## Concurrent edits
//!
//! When two replicas write the same map key (or list element) concurrently, both values are kept.
//! [`ReadDoc::get`] returns the value written by the op with the greatest [`OpId`], and
//! [`ReadDoc::get_conflicts`] returns all of them. A later write which has seen both replaces
//! them.
//!
//! Concurrent inserts into a list never conflict. Deleted elements are kept as invisible
//! *tombstones* so that inserts made next to them still land in the right place.
//!
//! Integer values can also be used as counters: concurrent [`Transaction::increment`]s add up.
//!
//! ### Warning: Do not reuse actor IDs!
//!
//! Every replica must edit with its own [`ActorId`]. Two replicas editing with the same actor id
//! will produce different changes with the same (actor, sequence number), and other peers will
//! refuse to merge the second one. When the same saved file may be opened in more than one place,
//! load it with [`ActorPolicy::Fresh`] or call [`Document::set_actor`].

#![allow(clippy::module_inception)]

pub use crate::causalgraph::CausalGraph;
pub use crate::change::{Change, ChangeHash, CommitOptions};
pub use crate::clock::{ActorId, new_actor, OpId};
pub use crate::document::Document;
pub use crate::encoding::{ActorPolicy, EncodeOptions, LoadOptions};
pub use crate::encoding::parseerror::ParseError;
pub use crate::error::Error;
pub use crate::frontier::Frontier;
pub use crate::merge::MergeResult;
pub use crate::op::{ElemId, Key, ObjId, Op, OpAction, Prop, ROOT};
pub use crate::read::ReadDoc;
pub use crate::txn::Transaction;
pub use crate::value::{DocValue, ObjType, ScalarValue, Value};

mod error;
mod value;
mod clock;
mod op;
mod frontier;
mod change;
pub mod causalgraph;
mod opstore;
mod materialize;
mod txn;
mod read;
mod document;
mod merge;
pub mod encoding;
mod check;

#[cfg(test)]
mod fuzzer_tools;
#[cfg(test)]
mod merge_fuzzer;

/// A local version: the index of a change in the order this replica applied it. These are never
/// shared between replicas.
pub type LV = usize;
