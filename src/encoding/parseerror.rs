use std::error::Error;
use std::fmt::{Display, Formatter};

/// Everything that can go wrong while decoding a saved document, a change bundle or a single
/// change. These are surfaced to callers wrapped in [`crate::Error::CorruptDocument`].
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[non_exhaustive]
pub enum ParseError {
    InvalidMagic,
    UnsupportedProtocolVersion,
    UnknownChunk,
    LZ4DecoderNeeded,
    LZ4DecompressionError, // I'd wrap it but lz4_flex errors don't implement any traits
    InvalidChunkHeader,
    MissingChunk(u32),
    InvalidLength,
    UnexpectedEOF,
    InvalidUTF8,
    InvalidVarInt,
    InvalidContent,

    /// An actor index points past the end of the actor table.
    InvalidActorIndex,

    /// A change depends on a change which isn't in the buffer (or, when loading, earlier in it).
    MissingDependency,

    ChecksumFailed,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParseError {:?}", self)
    }
}

impl Error for ParseError {}
