//! Time-related utilities

use chrono::{DateTime, Utc};

/// Format a collection timestamp (nanoseconds since the UNIX epoch) for the
/// report legend, e.g. `Mar 4, 2024 at 3:07pm (UTC)`.
///
/// Returns `None` for a zero or out-of-range timestamp.
pub fn format_profile_time(time_nanos: i64) -> Option<String> {
    if time_nanos <= 0 {
        return None;
    }
    let secs = time_nanos.div_euclid(1_000_000_000);
    let nsecs = time_nanos.rem_euclid(1_000_000_000) as u32;
    let time: DateTime<Utc> = DateTime::from_timestamp(secs, nsecs)?;
    Some(time.format("%b %-d, %Y at %-I:%M%P (UTC)").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_profile_time() {
        // 2024-03-04T15:07:00Z
        let nanos = 1_709_564_820i64 * 1_000_000_000;
        assert_eq!(
            format_profile_time(nanos).as_deref(),
            Some("Mar 4, 2024 at 3:07pm (UTC)")
        );
    }

    #[test]
    fn test_zero_time_is_omitted() {
        assert!(format_profile_time(0).is_none());
    }
}
