//! Small helpers shared by the container and record writers.

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between 1904-01-01 (the Palm epoch) and 1970-01-01.
const PALM_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Number of zero bytes needed to bring `length` up to a multiple of
/// `divisor`. Already aligned lengths need none.
pub fn pad_to(length: usize, divisor: usize) -> usize {
    (divisor - length % divisor) % divisor
}

/// Convert a timestamp to seconds since the Palm epoch, saturating at
/// the bounds of the on-disk `u32` field.
pub fn to_palm_time(date: &DateTime<Utc>) -> u32 {
    let secs = date.timestamp() + PALM_EPOCH_OFFSET;
    secs.clamp(0, u32::MAX as i64) as u32
}

/// Inverse of [`to_palm_time`].
pub fn from_palm_time(secs: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64 - PALM_EPOCH_OFFSET, 0)
        .single()
        .unwrap_or_default()
}

/// Reduce a title to the characters allowed in a database name.
pub fn sanitize_name(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect::<String>()
        .replace(' ', "_")
}
