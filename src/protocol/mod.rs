//! Packet formats and decode dispatch.
//!
//! A frame's payload region opens with a 5-bit discriminator. The collars
//! transmit three formats (tracking, second-generation tracking, and a
//! status/diagnostic packet); this crate decodes the first. The formats
//! share no layout beyond the discriminator, so anything else is rejected
//! whole rather than half-read.

pub mod tracking;

pub use tracking::{TrackPoint, TrackingPayload};

use serde::{Serialize, Serializer};

use crate::bits::BitCursor;
use crate::error::{DecodeError, Result};

/// Width of the packet discriminator field.
pub const PACKET_TYPE_BITS: u32 = 5;
/// Discriminator value of the tracking packet.
pub const PACKET_TRACKING: u8 = 0;

/// Payload format discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Tracking,
}

impl PacketType {
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            PACKET_TRACKING => Ok(Self::Tracking),
            other => Err(DecodeError::UnsupportedPacketType { value: other }),
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Tracking => PACKET_TRACKING,
        }
    }
}

// Serialized as the wire value; consumers match on the integer.
impl Serialize for PacketType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_wire())
    }
}

/// Decoded payload, keyed by packet type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Tracking(TrackingPayload),
}

/// Read the discriminator and decode the rest of the payload region.
pub fn decode_payload(cur: &mut BitCursor) -> Result<(PacketType, Payload)> {
    let value = cur
        .read_uint(PACKET_TYPE_BITS)
        .map_err(|e| DecodeError::truncated("packet_type", e))? as u8;
    let packet_type = PacketType::from_wire(value)?;
    let payload = match packet_type {
        PacketType::Tracking => Payload::Tracking(TrackingPayload::decode(cur)?),
    };
    Ok((packet_type, payload))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
