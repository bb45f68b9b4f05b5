use crc::{Crc, CRC_32_ISCSI};
use crate::encoding::ChunkType;
use crate::encoding::varint::{encode_leb_u64, MAX_LEB_LEN, num_encode_zigzag_i64};

pub(crate) fn push_u64(into: &mut Vec<u8>, val: u64) {
    let mut buf = [0u8; MAX_LEB_LEN];
    let pos = encode_leb_u64(val, &mut buf);
    into.extend_from_slice(&buf[..pos]);
}

pub(crate) fn push_u32(into: &mut Vec<u8>, val: u32) {
    push_u64(into, val as u64);
}

pub(crate) fn push_usize(into: &mut Vec<u8>, val: usize) {
    push_u64(into, val as u64);
}

pub(crate) fn push_zigzag_i64(into: &mut Vec<u8>, val: i64) {
    push_u64(into, num_encode_zigzag_i64(val));
}

pub(crate) fn push_u32_le(into: &mut Vec<u8>, val: u32) {
    into.extend_from_slice(&val.to_le_bytes());
}

pub(crate) fn push_bool(into: &mut Vec<u8>, val: bool) {
    into.push(val as u8);
}

pub(crate) fn push_bytes(into: &mut Vec<u8>, val: &[u8]) {
    push_usize(into, val.len());
    into.extend_from_slice(val);
}

pub(crate) fn push_str(into: &mut Vec<u8>, val: &str) {
    push_bytes(into, val.as_bytes());
}

pub(crate) fn push_chunk_header(into: &mut Vec<u8>, chunk_type: ChunkType, len: usize) {
    push_u32(into, chunk_type as u32);
    push_usize(into, len);
}

pub(crate) fn push_chunk(into: &mut Vec<u8>, chunk_type: ChunkType, data: &[u8]) {
    push_chunk_header(into, chunk_type, data.len());
    into.extend_from_slice(data);
}

pub(crate) fn calc_checksum(data: &[u8]) -> u32 {
    // This is crc32c. Using the crc library because the resulting binary size is much smaller.
    Crc::<u32>::new(&CRC_32_ISCSI).checksum(data)
}
