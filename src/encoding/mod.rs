//! The encoding module converts documents, bundles of changes and single changes to and from a
//! compact, self describing binary format.
//!
//! Every file has the same shape:
//!
//! ```text
//! MAGIC | protocol version | FileInfo chunk | Actors chunk | Changes chunk | Crc chunk
//! ```
//!
//! Chunks are a LEB128 type, a LEB128 byte length and the payload. Change records (see
//! [`change`]) refer to actors by their index into the Actors chunk. The Crc chunk is always last
//! and covers every byte before it.

use std::collections::BTreeSet;
use num_enum::TryFromPrimitive;
use crate::*;
use crate::encoding::bufparser::BufParser;
use crate::encoding::change::{ActorIndex, read_change_record, write_change_record};
use crate::encoding::tools::*;

pub mod parseerror;
pub(crate) mod varint;
pub(crate) mod bufparser;
pub(crate) mod tools;
pub(crate) mod change;
mod options;

pub use options::{ActorPolicy, EncodeOptions, LoadOptions, ENCODE_FULL};
use parseerror::ParseError;

pub const MAGIC_BYTES: [u8; 8] = *b"REPLIDOC";

/// Bump this whenever the format changes incompatibly.
pub const PROTOCOL_VERSION: usize = 1;

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u32)]
pub(crate) enum ChunkType {
    /// What kind of file this is, and optionally the actor which saved it.
    FileInfo = 1,
    Actors = 2,
    Changes = 3,
    /// Same as Changes, but lz4 compressed and prefixed with the uncompressed length.
    ChangesCompressed = 4,

    Crc = 100,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub(crate) enum FileKind {
    /// A full document. Every change's dependencies appear before it.
    Document = 0,
    /// Some changes, which may depend on changes not in the file.
    Bundle = 1,
}

/// Type (1 byte) + length (1 byte) + u32.
const CRC_CHUNK_LEN: usize = 6;

/// lz4 can't expand data by more than this factor. Used to reject absurd length prefixes before
/// allocating.
#[cfg(feature = "lz4")]
const MAX_LZ4_RATIO: usize = 255;

#[derive(Debug)]
pub(crate) struct DecodedFile {
    pub kind: FileKind,
    pub actor: Option<ActorId>,
    pub changes: Vec<Change>,
}

#[cfg(feature = "lz4")]
fn compress(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    // Storing the uncompressed length is technically redundant, but lz4_flex needs it to size
    // the output.
    push_usize(&mut result, data.len());
    result.extend_from_slice(&lz4_flex::block::compress(data));
    result
}

fn push_changes_chunk(into: &mut Vec<u8>, data: &[u8], opts: &EncodeOptions) {
    #[cfg(feature = "lz4")] {
        if opts.compress_content {
            let compressed = compress(data);
            if compressed.len() < data.len() {
                push_chunk(into, ChunkType::ChangesCompressed, &compressed);
                return;
            }
        }
    }
    #[cfg(not(feature = "lz4"))] {
        let _ = opts;
    }
    push_chunk(into, ChunkType::Changes, data);
}

pub(crate) fn encode_file(kind: FileKind, actor: Option<ActorId>, changes: &[&Change], opts: &EncodeOptions) -> Vec<u8> {
    let mut result = Vec::new();
    result.extend_from_slice(&MAGIC_BYTES);
    push_usize(&mut result, PROTOCOL_VERSION);

    let mut info = vec![kind as u8];
    let actor = actor.filter(|_| opts.store_actor);
    push_bool(&mut info, actor.is_some());
    if let Some(actor) = actor {
        info.extend_from_slice(actor.as_bytes());
    }
    push_chunk(&mut result, ChunkType::FileInfo, &info);

    let actors = ActorIndex::from_changes(changes.iter().copied());
    let mut buf = Vec::with_capacity(1 + actors.ids.len() * 16);
    push_usize(&mut buf, actors.ids.len());
    for id in &actors.ids {
        buf.extend_from_slice(id.as_bytes());
    }
    push_chunk(&mut result, ChunkType::Actors, &buf);

    buf.clear();
    push_usize(&mut buf, changes.len());
    for change in changes {
        write_change_record(&mut buf, change, &actors);
    }
    push_changes_chunk(&mut result, &buf, opts);

    let checksum = calc_checksum(&result);
    push_chunk_header(&mut result, ChunkType::Crc, 4);
    push_u32_le(&mut result, checksum);
    result
}

fn next_chunk<'a>(r: &mut BufParser<'a>) -> Result<(ChunkType, BufParser<'a>), ParseError> {
    let chunk_type = ChunkType::try_from(r.next_u32()?)
        .map_err(|_| ParseError::UnknownChunk)?;
    let len = r.next_usize()?;
    Ok((chunk_type, r.split_off(len)?))
}

fn expect_chunk<'a>(r: &mut BufParser<'a>, expect: ChunkType) -> Result<BufParser<'a>, ParseError> {
    let (chunk_type, chunk) = next_chunk(r)?;
    if chunk_type != expect {
        return Err(ParseError::MissingChunk(expect as u32));
    }
    Ok(chunk)
}

fn read_actors(mut r: BufParser) -> Result<Vec<ActorId>, ParseError> {
    let count = r.next_usize()?;
    r.check_has_bytes(count.saturating_mul(16))?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(ActorId::from_bytes(r.next_array::<16>()?));
    }
    r.expect_empty()?;
    if !ids.windows(2).all(|w| w[0] < w[1]) {
        return Err(ParseError::InvalidContent);
    }
    Ok(ids)
}

fn read_changes(mut r: BufParser, actors: &[ActorId]) -> Result<Vec<Change>, ParseError> {
    let count = r.next_usize()?;
    // Change records are at least a few bytes each.
    r.check_has_bytes(count)?;
    let mut changes = Vec::with_capacity(count);
    for _ in 0..count {
        changes.push(read_change_record(&mut r, actors)?);
    }
    r.expect_empty()?;
    Ok(changes)
}

pub(crate) fn decode_file(data: &[u8], verify_checksum: bool) -> Result<DecodedFile, ParseError> {
    if data.len() < MAGIC_BYTES.len() || data[..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(ParseError::InvalidMagic);
    }
    if data.len() < MAGIC_BYTES.len() + CRC_CHUNK_LEN {
        return Err(ParseError::UnexpectedEOF);
    }

    // The checksum is checked before anything else is parsed.
    let (body, trailer) = data.split_at(data.len() - CRC_CHUNK_LEN);
    let mut trailer = BufParser(trailer);
    if trailer.next_u32()? != ChunkType::Crc as u32 || trailer.next_usize()? != 4 {
        return Err(ParseError::MissingChunk(ChunkType::Crc as u32));
    }
    let expected_crc = trailer.next_u32_le()?;
    if verify_checksum && calc_checksum(body) != expected_crc {
        return Err(ParseError::ChecksumFailed);
    }

    let mut r = BufParser(&body[MAGIC_BYTES.len()..]);
    if r.next_usize()? != PROTOCOL_VERSION {
        return Err(ParseError::UnsupportedProtocolVersion);
    }

    let mut info = expect_chunk(&mut r, ChunkType::FileInfo)?;
    let kind = FileKind::try_from(info.next_u8()?).map_err(|_| ParseError::InvalidContent)?;
    let actor = if info.next_bool()? {
        Some(ActorId::from_bytes(info.next_array::<16>()?))
    } else { None };
    info.expect_empty()?;

    let actors = read_actors(expect_chunk(&mut r, ChunkType::Actors)?)?;

    let changes = match next_chunk(&mut r)? {
        (ChunkType::Changes, chunk) => read_changes(chunk, &actors)?,
        #[cfg(feature = "lz4")]
        (ChunkType::ChangesCompressed, mut chunk) => {
            let uncompressed_len = chunk.next_usize()?;
            if uncompressed_len > chunk.len().saturating_mul(MAX_LZ4_RATIO).saturating_add(16) {
                return Err(ParseError::InvalidLength);
            }
            let data = lz4_flex::block::decompress(chunk.0, uncompressed_len)
                .map_err(|_| ParseError::LZ4DecompressionError)?;
            if data.len() != uncompressed_len {
                return Err(ParseError::LZ4DecompressionError);
            }
            read_changes(BufParser(&data), &actors)?
        }
        #[cfg(not(feature = "lz4"))]
        (ChunkType::ChangesCompressed, _) => return Err(ParseError::LZ4DecoderNeeded),
        _ => return Err(ParseError::MissingChunk(ChunkType::Changes as u32)),
    };

    if !r.is_empty() {
        // Only the trailer may follow, and that was split off above.
        next_chunk(&mut r)?;
        return Err(ParseError::UnknownChunk);
    }

    Ok(DecodedFile { kind, actor, changes })
}

impl Document {
    /// Save the whole document.
    pub fn save(&self) -> Vec<u8> {
        self.save_with(&EncodeOptions::default())
    }

    pub fn save_with(&self, opts: &EncodeOptions) -> Vec<u8> {
        let all: Vec<LV> = (0..self.store.changes.len()).collect();
        let changes: Vec<&Change> = self.store.cg.topo_sorted(&all)
            .into_iter()
            .map(|lv| &self.store.changes[lv])
            .collect();
        let result = encode_file(FileKind::Document, Some(self.actor), &changes, opts);
        log::debug!("saved {} changes in {} bytes", changes.len(), result.len());
        result
    }

    /// Save the changes which aren't in the causal past of `heads`, for
    /// [`load_incremental`](Document::load_incremental) on another replica.
    pub fn save_since(&self, heads: &[ChangeHash]) -> Vec<u8> {
        let since = self.store.cg.changes_since(self.store.cg.hashes_to_frontier(heads).as_ref());
        let changes: Vec<&Change> = self.store.cg.topo_sorted(&since)
            .into_iter()
            .map(|lv| &self.store.changes[lv])
            .collect();
        encode_file(FileKind::Bundle, None, &changes, &EncodeOptions::default())
    }

    pub fn load(data: &[u8]) -> Result<Self, Error> {
        Self::load_with(data, LoadOptions::default())
    }

    /// Load a saved document. The buffer must be complete: every change's dependencies have to
    /// appear before it.
    pub fn load_with(data: &[u8], opts: LoadOptions) -> Result<Self, Error> {
        let file = decode_file(data, opts.verify_checksum)?;
        let mut doc = Document::with_actor(opts.resolve_actor(file.actor));

        let mut seen = BTreeSet::new();
        let num_changes = file.changes.len();
        for change in file.changes {
            if change.deps.iter().any(|d| !seen.contains(d)) {
                return Err(ParseError::MissingDependency.into());
            }
            seen.insert(change.hash);
            doc.store.apply_change(change).map_err(|e| {
                log::debug!("rejecting document: {}", e);
                Error::CorruptDocument(ParseError::InvalidContent)
            })?;
        }

        log::debug!("loaded {} changes ({:?})", num_changes, file.kind);
        Ok(doc)
    }

    /// Merge a bundle (or a whole saved document) into this one. Changes can arrive in any
    /// order, ones with missing dependencies are buffered.
    pub fn load_incremental(&mut self, data: &[u8]) -> Result<MergeResult, Error> {
        let file = decode_file(data, true)?;
        self.apply_changes(file.changes)
    }
}

impl Change {
    /// Encode this change on its own.
    pub fn encode(&self) -> Vec<u8> {
        encode_file(FileKind::Bundle, None, &[self], &EncodeOptions::default())
    }

    pub fn decode(data: &[u8]) -> Result<Change, Error> {
        let file = decode_file(data, true)?;
        let mut changes = file.changes;
        if changes.len() != 1 {
            return Err(ParseError::InvalidContent.into());
        }
        Ok(changes.remove(0))
    }
}
