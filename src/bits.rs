//! Big-endian bit-field extraction.
//!
//! Collar frames pack fields at arbitrary bit positions with no byte
//! alignment: a field may start mid-byte and span several byte
//! boundaries. Bits are consumed most-significant-first within each byte.

use rust_decimal::Decimal;
use thiserror::Error;

/// A field read would run past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{need} bits requested with {have} remaining")]
pub struct OutOfBounds {
    pub need: usize,
    pub have: usize,
}

/// Forward-only cursor over a byte buffer, yielding big-endian bit fields.
///
/// The offset advances by each field's width and is never rewound.
#[derive(Debug)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bits left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    /// Read an unsigned integer spanning `bits` bits (at most 64).
    pub fn read_uint(&mut self, bits: u32) -> Result<u64, OutOfBounds> {
        debug_assert!(bits <= 64);
        if self.remaining() < bits as usize {
            return Err(OutOfBounds {
                need: bits as usize,
                have: self.remaining(),
            });
        }
        let mut value = 0u64;
        for _ in 0..bits {
            let bit = (self.data[self.pos / 8] >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | u64::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }

    /// Read a two's-complement signed integer spanning `bits` bits,
    /// sign-extended to i64.
    pub fn read_int(&mut self, bits: u32) -> Result<i64, OutOfBounds> {
        debug_assert!(bits >= 1);
        let raw = self.read_uint(bits)?;
        let shift = 64 - bits;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Read a single bit as a boolean.
    pub fn read_flag(&mut self) -> Result<bool, OutOfBounds> {
        Ok(self.read_uint(1)? != 0)
    }

    /// Read an integer field and divide by `scale`, yielding an exact
    /// decimal. Quantized sensor fields are compared digit-for-digit
    /// against firmware output, so binary floating point is not usable
    /// here.
    pub fn read_scaled_decimal(
        &mut self,
        bits: u32,
        scale: u32,
        signed: bool,
    ) -> Result<Decimal, OutOfBounds> {
        let raw = if signed {
            Decimal::from(self.read_int(bits)?)
        } else {
            Decimal::from(self.read_uint(bits)?)
        };
        Ok(raw / Decimal::from(scale))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
