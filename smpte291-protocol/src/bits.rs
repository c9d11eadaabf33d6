//! MSB-first bit reader and writer.
//!
//! ANC words are 10 bits wide, so almost every field in the payload starts
//! at a position that is not byte aligned. Reads are limited to 32 bits.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Widest field a single read may return.
pub const MAX_FIELD_BITS: u32 = 32;

/// Read `n` bits starting at bit `cursor` of `data`, most significant bit first.
///
/// Only the first `bit_len` bits of `data` are considered readable.
/// Returns the value and the advanced cursor.
pub fn read_bits(
    data: &[u8],
    bit_len: usize,
    cursor: usize,
    n: u32,
) -> Result<(u32, usize), ProtocolError> {
    if n == 0 || n > MAX_FIELD_BITS {
        return Err(ProtocolError::InvalidFieldWidth(n));
    }

    let bit_len = bit_len.min(data.len() * 8);
    let remaining = bit_len.saturating_sub(cursor);
    if n as usize > remaining {
        return Err(ProtocolError::BitstreamExhausted {
            requested: n,
            remaining,
        });
    }

    let mut value: u64 = 0;
    let mut pos = cursor;
    let mut left = n as usize;
    while left > 0 {
        let byte = data[pos / 8];
        let available = 8 - (pos % 8);
        let take = available.min(left);
        let bits = (byte >> (available - take)) & (((1u16 << take) - 1) as u8);
        value = (value << take) | bits as u64;
        pos += take;
        left -= take;
    }

    Ok((value as u32, pos))
}

/// Cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a reader over every bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_len: data.len() * 8,
            pos: 0,
        }
    }

    /// Create a reader over the first `bit_len` bits of `data`.
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            bit_len: bit_len.min(data.len() * 8),
            pos: 0,
        }
    }

    /// Read the next `n` bits (1..=32) as an unsigned integer.
    pub fn read_bits(&mut self, n: u32) -> Result<u32, ProtocolError> {
        let (value, pos) = read_bits(self.data, self.bit_len, self.pos, n)?;
        self.pos = pos;
        Ok(value)
    }

    /// Advance the cursor by `n` bits without decoding them.
    pub fn skip_bits(&mut self, n: usize) -> Result<(), ProtocolError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ProtocolError::BitstreamExhausted {
                requested: n.min(u32::MAX as usize) as u32,
                remaining,
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Current cursor position in bits.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of readable bits left.
    pub fn remaining(&self) -> usize {
        self.bit_len - self.pos
    }

    /// Total readable length in bits.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }
}

/// MSB-first bit writer backed by `BytesMut`.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: BytesMut,
    /// Bits not yet flushed to `buf`, right aligned.
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `n` bits (1..=32) of `value`.
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<(), ProtocolError> {
        if n == 0 || n > MAX_FIELD_BITS {
            return Err(ProtocolError::InvalidFieldWidth(n));
        }

        let mask = if n == 32 { u32::MAX } else { (1u32 << n) - 1 };
        self.acc = (self.acc << n) | (value & mask) as u64;
        self.acc_bits += n;

        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.buf.put_u8((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
        Ok(())
    }

    /// Append whole bytes, bit aligned to the current position.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        for &b in bytes {
            self.write_bits(b as u32, 8)?;
        }
        Ok(())
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8 + self.acc_bits as usize
    }

    /// Zero-pad to the next byte boundary and return the buffer.
    pub fn finish(mut self) -> BytesMut {
        if self.acc_bits > 0 {
            let pad = 8 - self.acc_bits;
            self.buf.put_u8((self.acc << pad) as u8);
        }
        self.buf
    }
}
