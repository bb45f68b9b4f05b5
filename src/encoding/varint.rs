use crate::encoding::parseerror::ParseError;

/// We're using protobuf's encoding system for variable sized integers. Most numbers we store
/// (actor indexes, sequence numbers, counters, lengths) are small, so this ends up being a big
/// space savings overall.
///
/// The encoding format is described in much more detail
/// [in google's protobuf documentation](https://developers.google.com/protocol-buffers/docs/encoding)
pub const MAX_LEB_LEN: usize = 10;

/// Encode u64 as varint. Returns the number of bytes written.
pub fn encode_leb_u64(mut value: u64, buf: &mut [u8; MAX_LEB_LEN]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = ((value & 0x7f) | 0x80) as u8;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

/// Returns (varint, number of bytes read).
pub fn decode_leb_u64(buf: &[u8]) -> Result<(u64, usize), ParseError> {
    if buf.is_empty() {
        return Err(ParseError::UnexpectedEOF);
    } else if buf[0] < 0x80 {
        // The most common case.
        return Ok((buf[0] as u64, 1));
    }

    let mut r: u64 = 0;
    for (i, &b) in buf.iter().enumerate().take(MAX_LEB_LEN) {
        // The 10th byte can only hold the top bit of a u64.
        if i == 9 && (b & 0x7f) > 1 {
            return Err(ParseError::InvalidVarInt);
        }
        r |= ((b & 0x7f) as u64) << (i * 7);
        if b < 0x80 {
            return Ok((r, i + 1));
        }
    }

    if buf.len() < MAX_LEB_LEN { Err(ParseError::UnexpectedEOF) }
    else { Err(ParseError::InvalidVarInt) }
}

pub fn decode_leb_u32(buf: &[u8]) -> Result<(u32, usize), ParseError> {
    let (val, bytes_consumed) = decode_leb_u64(buf)?;
    let val = u32::try_from(val).map_err(|_| ParseError::InvalidVarInt)?;
    Ok((val, bytes_consumed))
}

pub fn decode_leb_usize(buf: &[u8]) -> Result<(usize, usize), ParseError> {
    let (val, bytes_consumed) = decode_leb_u64(buf)?;
    let val = usize::try_from(val).map_err(|_| ParseError::InvalidVarInt)?;
    Ok((val, bytes_consumed))
}

pub fn num_encode_zigzag_i64(val: i64) -> u64 {
    ((val << 1) ^ (val >> 63)) as u64
}

pub fn num_decode_zigzag_i64(val: u64) -> i64 {
    ((val >> 1) as i64) ^ -((val & 1) as i64)
}
