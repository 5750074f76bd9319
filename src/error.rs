use thiserror::Error;

use crate::bits::OutOfBounds;

/// Errors arising from telemetry frame decoding.
///
/// Integrity mismatches are deliberately absent: a frame whose CRC-16 or
/// BCH-32 fails still decodes, with the outcome recorded on the result.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input rejected before any field extraction: wrong buffer length,
    /// or a transport hex string that does not decode to bytes.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] InputError),

    /// The payload discriminator names a packet format this crate does
    /// not decode. No partial result is returned.
    #[error("unsupported packet type {value}")]
    UnsupportedPacketType { value: u8 },

    /// A mandatory payload field ran past the end of the buffer.
    #[error("truncated payload reading {field}: need {need} bits, {have} remaining")]
    TruncatedPayload {
        field: &'static str,
        need: usize,
        have: usize,
    },
}

impl DecodeError {
    /// Convert a cursor overrun into a `TruncatedPayload` naming the field.
    pub(crate) fn truncated(field: &'static str, cause: OutOfBounds) -> Self {
        Self::TruncatedPayload {
            field,
            need: cause.need,
            have: cause.have,
        }
    }
}

/// Why an input buffer was rejected up front.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
