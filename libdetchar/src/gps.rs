use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::constants::GPS_EPOCH_UNIX;

/// GPS times at which a leap second was inserted into UTC
const LEAP_SECONDS: [i64; 18] = [
    46828800, 78364801, 109900802, 173059203, 252028804, 315187205, 346723206, 393984007,
    425520008, 457056009, 504489610, 551750411, 599184012, 820108813, 914803214, 1025136015,
    1119744016, 1167264017,
];

/// Number of leap seconds between the GPS epoch and the given GPS second
pub fn leap_seconds(gps: i64) -> i64 {
    LEAP_SECONDS.iter().filter(|leap| **leap <= gps).count() as i64
}

/// Convert whole GPS seconds to UTC; None if outside the representable range
pub fn gps_to_utc(gps: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(gps + GPS_EPOCH_UNIX - leap_seconds(gps)).ok()
}

/// RFC 3339 UTC label for a GPS time, e.g. `2015-09-14T09:50:45Z`
pub fn format_gps(gps: f64) -> String {
    gps_to_utc(gps.floor() as i64)
        .and_then(|utc| utc.format(&Rfc3339).ok())
        .unwrap_or_else(|| format!("GPS {gps}"))
}
