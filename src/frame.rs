//! Frame parsing: header extraction, integrity verification, payload
//! dispatch, and result assembly.
//!
//! Over-the-air format (31 bytes, 248 bits, fields bit-packed big-endian):
//!
//! ```text
//! | id:4 | crc16:16 | service_flag:4 | message_counter:8 | payload:184 | bch32:32 |
//! ```
//!
//! The CRC-16 covers bytes 1..27 with the stored checksum bits cleared;
//! the BCH-32 covers bytes 0..27 exactly as transmitted. A *processed*
//! frame is the 23-byte payload region alone: the upstream ingestion
//! pipeline has already stripped the header and footer and run both
//! integrity checks, so their results arrive as caller-supplied flags.

use serde::Serialize;

use crate::bits::BitCursor;
use crate::checksum;
use crate::error::{DecodeError, InputError, Result};
use crate::protocol::{self, PacketType, Payload};

/// Over-the-air frame length in bytes.
pub const FRAME_LEN: usize = 31;
/// Payload-region length in bytes (processed input).
pub const PAYLOAD_LEN: usize = 23;

const ID_BITS: u32 = 4;
const CRC16_BITS: u32 = 16;
const SERVICE_FLAG_BITS: u32 = 4;
const COUNTER_BITS: u32 = 8;

/// First payload byte; the bit-packed header ends here.
const PAYLOAD_START: usize = 4;
/// First footer byte; both integrity codes cover everything before it.
const FOOTER_START: usize = 27;

/// Where a frame's header and integrity metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeType {
    Raw,
    Processed,
}

/// One decoded telemetry frame.
///
/// Field order is a compatibility contract: serialization keeps exactly
/// this key order, and downstream golden-file consumers rely on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub id: u32,
    /// Transmitted checksum; 0 on the processed path (stripped upstream).
    pub crc16: u16,
    pub service_flag: u8,
    pub message_counter: u8,
    pub packet_type: PacketType,
    pub payload: Payload,
    /// Transmitted BCH value; 0 on the processed path.
    pub bch32: u32,
    pub crc16_verified: bool,
    pub bch32_verified: bool,
    pub decode_type: DecodeType,
}

/// Decode a complete over-the-air frame, verifying both integrity codes.
///
/// An integrity mismatch never aborts the decode; it lands in
/// `crc16_verified` / `bch32_verified` for the caller to judge.
pub fn decode_raw(frame: &[u8]) -> Result<Frame> {
    if frame.len() != FRAME_LEN {
        return Err(InputError::Length {
            expected: FRAME_LEN,
            got: frame.len(),
        }
        .into());
    }

    let mut header = BitCursor::new(frame);
    let id = take(&mut header, ID_BITS, "id")? as u32;
    let crc16 = take(&mut header, CRC16_BITS, "crc16")? as u16;
    let service_flag = take(&mut header, SERVICE_FLAG_BITS, "service_flag")? as u8;
    let message_counter = take(&mut header, COUNTER_BITS, "message_counter")? as u8;
    let bch32 = u32::from_be_bytes([frame[27], frame[28], frame[29], frame[30]]);

    let crc16_verified = checksum::verify_crc16(&crc_region(frame), crc16);
    let bch32_verified = checksum::verify_bch32(&frame[..FOOTER_START], bch32);

    let mut payload_cur = BitCursor::new(&frame[PAYLOAD_START..FOOTER_START]);
    let (packet_type, payload) = protocol::decode_payload(&mut payload_cur)?;

    Ok(Frame {
        id,
        crc16,
        service_flag,
        message_counter,
        packet_type,
        payload,
        bch32,
        crc16_verified,
        bch32_verified,
        decode_type: DecodeType::Raw,
    })
}

/// Decode a payload-only frame split out by the upstream pipeline.
///
/// Header fields and integrity verdicts come from the caller; the codes
/// themselves are gone with the stripped header and report as 0.
pub fn decode_processed(
    payload: &[u8],
    id: u32,
    service_flag: u8,
    message_counter: u8,
    crc16_ok: bool,
    bch32_ok: bool,
) -> Result<Frame> {
    if payload.len() != PAYLOAD_LEN {
        return Err(InputError::Length {
            expected: PAYLOAD_LEN,
            got: payload.len(),
        }
        .into());
    }

    let mut cur = BitCursor::new(payload);
    let (packet_type, payload) = protocol::decode_payload(&mut cur)?;

    Ok(Frame {
        id,
        crc16: 0,
        service_flag,
        message_counter,
        packet_type,
        payload,
        bch32: 0,
        crc16_verified: crc16_ok,
        bch32_verified: bch32_ok,
        decode_type: DecodeType::Processed,
    })
}

/// Decode a raw frame from its transport hex string.
pub fn decode_raw_hex(hex_str: &str) -> Result<Frame> {
    let bytes = hex::decode(hex_str).map_err(InputError::Hex)?;
    decode_raw(&bytes)
}

/// Decode a processed frame from its transport hex string.
pub fn decode_processed_hex(
    hex_str: &str,
    id: u32,
    service_flag: u8,
    message_counter: u8,
    crc16_ok: bool,
    bch32_ok: bool,
) -> Result<Frame> {
    let bytes = hex::decode(hex_str).map_err(InputError::Hex)?;
    decode_processed(&bytes, id, service_flag, message_counter, crc16_ok, bch32_ok)
}

/// CRC-16 input: bytes 1..27 with the stored checksum bits cleared.
/// The 16-bit field straddles bytes 0..3; byte 0 (device id nibble plus
/// the checksum's top bits) is excluded from the region entirely.
fn crc_region(frame: &[u8]) -> [u8; 26] {
    let mut region = [0u8; 26];
    region.copy_from_slice(&frame[1..FOOTER_START]);
    region[0] = 0;
    region[1] &= 0x0F;
    region
}

fn take(cur: &mut BitCursor, bits: u32, field: &'static str) -> Result<u64> {
    cur.read_uint(bits)
        .map_err(|e| DecodeError::truncated(field, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackingPayload;
    use rust_decimal_macros::dec;

    /// Captured frame, Townsville deployment, counter 73.
    const CAPTURE_A: &str = "013a4049000045fb1fdb210000000007840000041e2000032f2400002e2930";
    /// Payload region of CAPTURE_A as relayed by the ingestion pipeline.
    const CAPTURE_A_PAYLOAD: &str = "000045FB1FDB210000000007840000041E2000032F2400";
    /// Second captured frame from the same deployment, counter 3.
    const CAPTURE_B: &str = "0EBAA003003845FA9FDB24001ACCC0123CF80006BD700002CDEA00F3BFF5B9";

    fn tracking(frame: &Frame) -> &TrackingPayload {
        match &frame.payload {
            Payload::Tracking(t) => t,
        }
    }

    #[test]
    fn raw_worked_example() {
        let frame = decode_raw_hex(CAPTURE_A).unwrap();
        assert_eq!(frame.id, 0);
        assert_eq!(frame.crc16, 5028);
        assert_eq!(frame.service_flag, 0);
        assert_eq!(frame.message_counter, 73);
        assert_eq!(frame.packet_type, PacketType::Tracking);
        assert_eq!(frame.bch32, 3_025_200);
        assert!(frame.crc16_verified);
        assert!(frame.bch32_verified);
        assert_eq!(frame.decode_type, DecodeType::Raw);

        let t = tracking(&frame);
        assert_eq!(t.longitude, dec!(146.75968));
        assert_eq!(t.latitude, dec!(-19.331072));
        assert_eq!(t.points.len(), 3);
        assert_eq!(t.points[0].delta_m, dec!(234.3750));
        assert_eq!(t.points[0].total_delta_m, dec!(234.3750));
        assert_eq!(t.points[0].delta_angle, dec!(22.50000000));
    }

    #[test]
    fn raw_second_capture() {
        let frame = decode_raw_hex(CAPTURE_B).unwrap();
        assert_eq!(frame.id, 0);
        assert_eq!(frame.crc16, 60330);
        assert_eq!(frame.service_flag, 0);
        assert_eq!(frame.message_counter, 3);
        assert_eq!(frame.bch32, 0xF3BF_F5B9);
        assert!(frame.crc16_verified);
        assert!(frame.bch32_verified);

        let t = tracking(&frame);
        assert_eq!(t.timeslot, 14);
        assert_eq!(t.longitude.to_string(), "146.755584");
        assert_eq!(t.latitude.to_string(), "-19.324928");
        assert_eq!(t.battery.to_string(), "3.02");
        assert_eq!(t.temp_min.to_string(), "17.2");
        assert_eq!(t.temp_max.to_string(), "40.4");

        let deltas: Vec<_> = t
            .points
            .iter()
            .map(|p| (p.delta_m.to_string(), p.delta_angle.to_string()))
            .collect();
        assert_eq!(
            deltas,
            [
                ("562.5000".to_string(), "342.94921875".to_string()),
                ("414.0625".to_string(), "331.17187500".to_string()),
                ("343.7500".to_string(), "313.06640625".to_string()),
            ]
        );
    }

    #[test]
    fn processed_matches_raw_payload() {
        let raw = decode_raw_hex(CAPTURE_A).unwrap();
        let processed = decode_processed_hex(CAPTURE_A_PAYLOAD, 0, 0, 73, true, true).unwrap();

        assert_eq!(processed.payload, raw.payload);
        assert_eq!(processed.id, raw.id);
        assert_eq!(processed.service_flag, raw.service_flag);
        assert_eq!(processed.message_counter, raw.message_counter);
        assert_eq!(processed.crc16, 0);
        assert_eq!(processed.bch32, 0);
        assert!(processed.crc16_verified);
        assert!(processed.bch32_verified);
        assert_eq!(processed.decode_type, DecodeType::Processed);
    }

    #[test]
    fn processed_counter_is_caller_supplied() {
        // The counter lives in the stripped header, so the payload bytes
        // cannot contradict whatever the pipeline hands over.
        let frame = decode_processed_hex(CAPTURE_A_PAYLOAD, 0, 0, 60, true, true).unwrap();
        assert_eq!(frame.message_counter, 60);
        assert_eq!(
            tracking(&frame).points,
            tracking(&decode_raw_hex(CAPTURE_A).unwrap()).points
        );
    }

    #[test]
    fn corrupted_checksum_still_yields_payload() {
        let mut bytes = hex::decode(CAPTURE_A).unwrap();
        bytes[1] ^= 0xFF; // middle of the stored crc16 field
        let frame = decode_raw(&bytes).unwrap();
        assert!(!frame.crc16_verified);

        let clean = decode_raw_hex(CAPTURE_A).unwrap();
        assert_eq!(frame.payload, clean.payload);
    }

    #[test]
    fn corrupted_footer_flags_bch_only() {
        let mut bytes = hex::decode(CAPTURE_A).unwrap();
        bytes[30] ^= 0x01;
        let frame = decode_raw(&bytes).unwrap();
        assert!(frame.crc16_verified); // footer is outside the crc region
        assert!(!frame.bch32_verified);
        assert_eq!(tracking(&frame).points.len(), 3);
    }

    #[test]
    fn unknown_packet_type_is_fatal() {
        let mut bytes = hex::decode(CAPTURE_A).unwrap();
        bytes[4] = 0b0000_1000; // discriminator 1, gen-2 tracking
        assert!(matches!(
            decode_raw(&bytes),
            Err(DecodeError::UnsupportedPacketType { value: 1 })
        ));
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(
            decode_raw(&[]),
            Err(DecodeError::MalformedInput(InputError::Length {
                expected: FRAME_LEN,
                got: 0,
            }))
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        let bytes = hex::decode(CAPTURE_A).unwrap();
        assert!(decode_raw(&bytes[..30]).is_err());
        assert!(decode_processed(&bytes[..22], 0, 0, 0, true, true).is_err());
    }

    #[test]
    fn odd_length_hex_rejected() {
        assert!(matches!(
            decode_raw_hex("013a4"),
            Err(DecodeError::MalformedInput(InputError::Hex(_)))
        ));
    }

    #[test]
    fn non_hex_input_rejected() {
        let garbage = "zz".repeat(FRAME_LEN);
        assert!(matches!(
            decode_raw_hex(&garbage),
            Err(DecodeError::MalformedInput(InputError::Hex(_)))
        ));
    }

    #[test]
    fn decode_is_deterministic() {
        assert_eq!(
            decode_raw_hex(CAPTURE_A).unwrap(),
            decode_raw_hex(CAPTURE_A).unwrap()
        );
        assert_eq!(
            decode_raw_hex(CAPTURE_B).unwrap(),
            decode_raw_hex(CAPTURE_B).unwrap()
        );
    }

    #[test]
    fn bearings_within_range_on_all_captures() {
        for capture in [CAPTURE_A, CAPTURE_B] {
            for p in &tracking(&decode_raw_hex(capture).unwrap()).points {
                assert!(p.delta_angle >= dec!(0) && p.delta_angle < dec!(360));
            }
        }
    }

    #[test]
    fn anchor_distance_decomposition_holds() {
        for capture in [CAPTURE_A, CAPTURE_B] {
            for p in &tracking(&decode_raw_hex(capture).unwrap()).points {
                assert_eq!(
                    p.total_delta_m,
                    rust_decimal::Decimal::from(p.delta_km) * dec!(1000) + p.delta_m
                );
            }
        }
    }

    #[test]
    fn serialized_key_order_is_stable() {
        let json = serde_json::to_string(&decode_raw_hex(CAPTURE_A).unwrap()).unwrap();

        // Downstream consumers diff this output against golden files;
        // key order is part of the contract.
        let keys = [
            "\"id\":",
            "\"crc16\":",
            "\"service_flag\":",
            "\"message_counter\":",
            "\"packet_type\":",
            "\"payload\":",
            "\"flags\":",
            "\"timeslot\":",
            "\"longitude\":",
            "\"latitude\":",
            "\"orientation\":",
            "\"activity\":",
            "\"battery\":",
            "\"temp_min\":",
            "\"temp_max\":",
            "\"temp_alert\":",
            "\"points\":",
            "\"delta_km\":",
            "\"delta_m\":",
            "\"total_delta_m\":",
            "\"delta_angle\":",
            "\"bch32\":",
            "\"crc16_verified\":",
            "\"bch32_verified\":",
            "\"decode_type\":",
        ];
        let mut pos = 0;
        for key in keys {
            match json[pos..].find(key) {
                Some(at) => pos += at,
                None => panic!("{key} missing or out of order in {json}"),
            }
        }
    }

    #[test]
    fn serialized_values_match_reference() {
        let json = serde_json::to_string(&decode_raw_hex(CAPTURE_A).unwrap()).unwrap();
        assert!(json.contains("\"payload\":{\"tracking\":{"));
        assert!(json.contains("\"packet_type\":0"));
        assert!(json.contains("\"longitude\":\"146.75968\""));
        assert!(json.contains("\"latitude\":\"-19.331072\""));
        assert!(json.contains("\"battery\":\"3.00\""));
        assert!(json.contains("\"temp_min\":\"0.0\""));
        assert!(json.contains("\"temp_max\":\"20.0\""));
        assert!(json.contains("\"delta_m\":\"234.3750\""));
        assert!(json.contains("\"delta_angle\":\"22.50000000\""));
        assert!(json.contains("\"decode_type\":\"raw\""));
    }
}
