//! Tracking packet payload: one absolute anchor fix plus a dead-reckoned
//! movement trail.
//!
//! Payload layout after the packet-type field (bit widths in brackets):
//!
//! ```text
//! flags[4] timeslot[4] longitude[22] latitude[21] orientation[3]
//! activity[3] battery[6] temp_min[8] temp_max[8] temp_alert[1]
//! ( delta_km[6] delta_m[7] delta_angle[11] activity[8] temp_alert[1] )*
//! ```
//!
//! Trail records repeat until fewer than 33 bits of payload remain.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::bits::{BitCursor, OutOfBounds};
use crate::error::{DecodeError, Result};
use crate::geo;

const FLAGS_BITS: u32 = 4;
const TIMESLOT_BITS: u32 = 4;
const LONGITUDE_BITS: u32 = 22;
const LATITUDE_BITS: u32 = 21;
const ORIENTATION_BITS: u32 = 3;
const ACTIVITY_BITS: u32 = 3;
const BATTERY_BITS: u32 = 6;
const TEMP_BITS: u32 = 8;

const POINT_DELTA_KM_BITS: u32 = 6;
const POINT_DELTA_M_BITS: u32 = 7;
const POINT_BEARING_BITS: u32 = 11;
const POINT_ACTIVITY_BITS: u32 = 8;
/// Width of one trail record: 6 + 7 + 11 + 8 + 1.
const POINT_BITS: usize = 33;

/// Coordinates travel as degrees × 10⁶ packed into the top bits of a
/// 32-bit word; the collar drops the low bits to fit the field.
const GPS_SCALE: u32 = 1_000_000;

/// Degrees per count of the bearing field: 360 / 2¹¹.
fn bearing_step() -> Decimal {
    Decimal::new(17_578_125, 8)
}

/// Metres per count of the sub-kilometre distance field: 1000 / 2⁷.
fn metre_step() -> Decimal {
    Decimal::new(78_125, 4)
}

/// Battery is a 6-bit offset from 3.00 V in 20 mV steps.
fn battery_volts(raw: u64) -> Decimal {
    Decimal::from(raw) * Decimal::new(2, 2) + Decimal::new(300, 2)
}

/// Daily minimum temperature: 0.1 °C steps upward from 0 °C.
fn temp_min_celsius(raw: u64) -> Decimal {
    Decimal::from(raw) * Decimal::new(1, 1) + Decimal::new(0, 1)
}

/// Daily maximum temperature: 0.1 °C steps upward from 20 °C.
fn temp_max_celsius(raw: u64) -> Decimal {
    Decimal::from(raw) * Decimal::new(1, 1) + Decimal::new(200, 1)
}

/// Unpack a coordinate field into exact decimal degrees.
fn gps_degrees(stored: i64, bits: u32) -> Decimal {
    let unpacked = stored << (32 - bits);
    (Decimal::from(unpacked) / Decimal::from(GPS_SCALE)).normalize()
}

fn take(cur: &mut BitCursor, bits: u32, field: &'static str) -> Result<u64> {
    cur.read_uint(bits)
        .map_err(|e: OutOfBounds| DecodeError::truncated(field, e))
}

/// Device status at the anchor fix plus the movement trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingPayload {
    pub flags: u8,
    /// Hour of day the transmission slot opened (collars report in
    /// two-hour slots; the wire carries the slot index).
    pub timeslot: u8,
    /// Anchor fix, exact decimal degrees.
    pub longitude: Decimal,
    pub latitude: Decimal,
    pub orientation: u8,
    /// Activity class at the anchor fix.
    pub activity: u8,
    /// Battery voltage (V).
    pub battery: Decimal,
    /// Daily temperature extremes (°C).
    pub temp_min: Decimal,
    pub temp_max: Decimal,
    pub temp_alert: bool,
    /// Movement trail, oldest first, in transmission order.
    pub points: Vec<TrackPoint>,
}

/// One trail record. Distance and bearing are measured from the anchor
/// fix, not from the preceding point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    /// Whole kilometres of the distance from the anchor.
    pub delta_km: u32,
    /// Sub-kilometre remainder (m).
    pub delta_m: Decimal,
    /// Distance from the anchor fix (m): `delta_km` × 1000 + `delta_m`.
    pub total_delta_m: Decimal,
    /// Bearing of travel, degrees clockwise from true north, in
    /// 360/2¹¹-degree steps.
    pub delta_angle: Decimal,
    /// Activity class at this point.
    pub activity: u8,
    pub temp_alert: bool,
    /// Recovered absolute position. Derived, never transmitted.
    pub latitude: f64,
    pub longitude: f64,
}

impl TrackingPayload {
    /// Decode from a cursor positioned just past the packet-type field.
    ///
    /// Reads the fixed status fields, then trail records until fewer
    /// than one record's worth of payload remains.
    pub fn decode(cur: &mut BitCursor) -> Result<Self> {
        let flags = take(cur, FLAGS_BITS, "flags")? as u8;
        let timeslot = take(cur, TIMESLOT_BITS, "timeslot")? as u8 * 2;
        let longitude = gps_degrees(
            cur.read_int(LONGITUDE_BITS)
                .map_err(|e| DecodeError::truncated("longitude", e))?,
            LONGITUDE_BITS,
        );
        let latitude = gps_degrees(
            cur.read_int(LATITUDE_BITS)
                .map_err(|e| DecodeError::truncated("latitude", e))?,
            LATITUDE_BITS,
        );
        let orientation = take(cur, ORIENTATION_BITS, "orientation")? as u8;
        let activity = take(cur, ACTIVITY_BITS, "activity")? as u8;
        let battery = battery_volts(take(cur, BATTERY_BITS, "battery")?);
        let temp_min = temp_min_celsius(take(cur, TEMP_BITS, "temp_min")?);
        let temp_max = temp_max_celsius(take(cur, TEMP_BITS, "temp_max")?);
        let temp_alert = cur
            .read_flag()
            .map_err(|e| DecodeError::truncated("temp_alert", e))?;

        let anchor_lat = latitude.to_f64().unwrap_or_default();
        let anchor_lon = longitude.to_f64().unwrap_or_default();
        let mut points = Vec::new();
        while cur.remaining() >= POINT_BITS {
            points.push(TrackPoint::decode(cur, anchor_lat, anchor_lon)?);
        }

        Ok(Self {
            flags,
            timeslot,
            longitude,
            latitude,
            orientation,
            activity,
            battery,
            temp_min,
            temp_max,
            temp_alert,
            points,
        })
    }
}

impl TrackPoint {
    fn decode(cur: &mut BitCursor, anchor_lat: f64, anchor_lon: f64) -> Result<Self> {
        let delta_km = take(cur, POINT_DELTA_KM_BITS, "delta_km")? as u32;
        let delta_m = Decimal::from(take(cur, POINT_DELTA_M_BITS, "delta_m")?) * metre_step();
        let delta_angle =
            Decimal::from(take(cur, POINT_BEARING_BITS, "delta_angle")?) * bearing_step();
        let activity = take(cur, POINT_ACTIVITY_BITS, "activity")? as u8;
        let temp_alert = cur
            .read_flag()
            .map_err(|e| DecodeError::truncated("temp_alert", e))?;

        let total_delta_m = Decimal::from(delta_km) * Decimal::from(1000u32) + delta_m;
        let (latitude, longitude) = geo::destination(
            anchor_lat,
            anchor_lon,
            delta_angle.to_f64().unwrap_or_default(),
            total_delta_m.to_f64().unwrap_or_default(),
        );

        Ok(Self {
            delta_km,
            delta_m,
            total_delta_m,
            delta_angle,
            activity,
            temp_alert,
            latitude,
            longitude,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
