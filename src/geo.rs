//! Dead-reckoning position recovery.
//!
//! A collar transmits one absolute fix per frame; every trail point
//! carries only a distance and a bearing measured from that fix. Absolute
//! positions are recovered with the great-circle direct formula on a
//! spherical earth, the same computation the collar firmware's
//! TinyGPS-derived library performs. The printed precision exceeds what
//! the quantized inputs justify; positions are reproducible, not
//! surveyed.

/// Mean earth radius in metres (IUGG R1).
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Solve the direct problem on a sphere: from `(lat_deg, lon_deg)`,
/// travel `distance_m` along `bearing_deg` (clockwise from true north).
/// Returns the destination as `(latitude, longitude)` in degrees.
pub fn destination(lat_deg: f64, lon_deg: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let d = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = lat_deg.to_radians();
    let lon1 = lon_deg.to_radians();

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
