use std::mem::size_of;
use crate::encoding::parseerror::ParseError;
use crate::encoding::varint::*;

#[derive(Debug, Clone)]
pub struct BufParser<'a>(pub(crate) &'a [u8]);

impl<'a> BufParser<'a> {
    #[inline]
    pub(crate) fn check_has_bytes(&self, num: usize) -> Result<(), ParseError> {
        if self.0.len() < num { Err(ParseError::UnexpectedEOF) } else { Ok(()) }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expect_empty(&self) -> Result<(), ParseError> {
        if self.is_empty() { Ok(()) } else { Err(ParseError::InvalidLength) }
    }

    #[allow(unused)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    fn consume(&mut self, num: usize) {
        self.0 = &self.0[num..];
    }

    pub(crate) fn next_u8(&mut self) -> Result<u8, ParseError> {
        let (&b, rest) = self.0.split_first().ok_or(ParseError::UnexpectedEOF)?;
        self.0 = rest;
        Ok(b)
    }

    pub(crate) fn next_u32(&mut self) -> Result<u32, ParseError> {
        let (val, count) = decode_leb_u32(self.0)?;
        self.consume(count);
        Ok(val)
    }

    pub(crate) fn next_u32_le(&mut self) -> Result<u32, ParseError> {
        self.check_has_bytes(size_of::<u32>())?;
        let val = u32::from_le_bytes(self.next_array::<4>()?);
        Ok(val)
    }

    pub(crate) fn next_u64(&mut self) -> Result<u64, ParseError> {
        let (val, count) = decode_leb_u64(self.0)?;
        self.consume(count);
        Ok(val)
    }

    pub(crate) fn next_usize(&mut self) -> Result<usize, ParseError> {
        let (val, count) = decode_leb_usize(self.0)?;
        self.consume(count);
        Ok(val)
    }

    pub(crate) fn next_zigzag_i64(&mut self) -> Result<i64, ParseError> {
        let n = self.next_u64()?;
        Ok(num_decode_zigzag_i64(n))
    }

    pub(crate) fn next_bool(&mut self) -> Result<bool, ParseError> {
        match self.next_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ParseError::InvalidContent),
        }
    }

    pub(crate) fn next_n_bytes(&mut self, num_bytes: usize) -> Result<&'a [u8], ParseError> {
        if num_bytes > self.0.len() { return Err(ParseError::UnexpectedEOF); }

        let (data, remainder) = self.0.split_at(num_bytes);
        self.0 = remainder;
        Ok(data)
    }

    pub(crate) fn next_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let bytes = self.next_n_bytes(N)?;
        bytes.try_into().map_err(|_| ParseError::UnexpectedEOF)
    }

    /// Read a length-prefixed byte string.
    pub(crate) fn next_bytes(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.next_usize()?;
        if len > self.0.len() { return Err(ParseError::InvalidLength); }
        self.next_n_bytes(len)
    }

    // Note the result is attached to the lifetime 'a, not the lifetime of self.
    pub(crate) fn next_str(&mut self) -> Result<&'a str, ParseError> {
        let bytes = self.next_bytes()?;
        std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUTF8)
    }

    /// Split off the next `len` bytes into their own parser.
    pub(crate) fn split_off(&mut self, len: usize) -> Result<BufParser<'a>, ParseError> {
        if len > self.0.len() { return Err(ParseError::InvalidLength); }
        Ok(BufParser(self.next_n_bytes(len)?))
    }
}
