pub mod bits;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod geo;
pub mod protocol;

pub use bits::{BitCursor, OutOfBounds};
pub use error::{DecodeError, InputError, Result};
pub use frame::{
    DecodeType, Frame, decode_processed, decode_processed_hex, decode_raw, decode_raw_hex,
};
pub use protocol::{PacketType, Payload, TrackPoint, TrackingPayload};
