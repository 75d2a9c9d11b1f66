//! Conversion between the store's native ticks and absolute UTC time.
//!
//! The Messages store records `message.date` as signed nanoseconds since
//! 2001-01-01T00:00:00Z. Ticks are converted here and nowhere else; nothing
//! past the query layer sees a raw tick value.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Unix timestamp of 2001-01-01T00:00:00Z.
pub const STORE_EPOCH_UNIX_SECS: i64 = 978_307_200;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;
const NANOS_PER_HOUR: i64 = NANOS_PER_SEC * SECS_PER_HOUR;
const NANOS_PER_DAY: i64 = NANOS_PER_SEC * SECS_PER_DAY;

/// Weekday names indexed by [`weekday_index`].
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// The reference epoch as a UTC instant.
#[must_use]
pub fn store_epoch() -> DateTime<Utc> {
    // 978307200 is always a valid, unambiguous UTC instant.
    Utc.timestamp_opt(STORE_EPOCH_UNIX_SECS, 0)
        .single()
        .unwrap_or_default()
}

/// Convert native ticks into an absolute time.
///
/// A tick value of zero means "never set" in the store and maps to `None`.
#[must_use]
pub fn ticks_to_time(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks == 0 {
        return None;
    }
    store_epoch().checked_add_signed(Duration::nanoseconds(ticks))
}

/// Convert an absolute time into native ticks.
///
/// Returns `None` for instants more than ~292 years away from the epoch,
/// which do not fit in an `i64` nanosecond count.
#[must_use]
pub fn time_to_ticks(time: DateTime<Utc>) -> Option<i64> {
    time.signed_duration_since(store_epoch()).num_nanoseconds()
}

/// Tick value for `now - days`, used as the lower bound of window filters.
///
/// Saturates at the representable range instead of overflowing.
#[must_use]
pub fn days_ago_to_tick_cutoff(days: u32, now: DateTime<Utc>) -> i64 {
    let cutoff = now
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    time_to_ticks(cutoff).unwrap_or_else(|| {
        if cutoff < store_epoch() {
            i64::MIN
        } else {
            i64::MAX
        }
    })
}

/// Hour of day (0-23) by plain modulo arithmetic on the tick value.
///
/// No timezone conversion is applied; the result is the UTC hour. Floors
/// toward negative infinity so pre-epoch ticks land in the previous hour.
/// Must agree with [`crate::schema::HOUR_BUCKET_SQL`].
#[must_use]
pub const fn hour_of_day(ticks: i64) -> u32 {
    ticks.div_euclid(NANOS_PER_HOUR).rem_euclid(24) as u32
}

/// Day of week (0 = Sunday) by plain modulo arithmetic on the tick value.
///
/// Anchored on 2001-01-01 having been a Monday. Must agree with
/// [`crate::schema::WEEKDAY_BUCKET_SQL`].
#[must_use]
pub const fn weekday_index(ticks: i64) -> u32 {
    (ticks.div_euclid(NANOS_PER_DAY) + 1).rem_euclid(7) as u32
}

/// Name for a [`weekday_index`] value.
#[must_use]
pub fn weekday_name(index: u32) -> Option<&'static str> {
    WEEKDAY_NAMES.get(index as usize).copied()
}

/// Render a boundary timestamp as RFC 3339 in UTC.
#[must_use]
pub fn format_iso8601(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ticks_is_absent() {
        assert!(ticks_to_time(0).is_none());
    }

    #[test]
    fn test_epoch_offset() {
        let t = ticks_to_time(NANOS_PER_SEC).unwrap();
        assert_eq!(format_iso8601(&t), "2001-01-01T00:00:01Z");
    }

    #[test]
    fn test_negative_ticks_before_epoch() {
        let t = ticks_to_time(-SECS_PER_DAY * NANOS_PER_SEC).unwrap();
        assert_eq!(format_iso8601(&t), "2000-12-31T00:00:00Z");
    }

    #[test]
    fn test_cutoff_matches_manual_arithmetic() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let cutoff = days_ago_to_tick_cutoff(7, now);
        let expected = Utc.with_ymd_and_hms(2024, 5, 25, 12, 0, 0).unwrap();
        assert_eq!(ticks_to_time(cutoff), Some(expected));
    }

    #[test]
    fn test_epoch_was_a_monday() {
        assert_eq!(weekday_name(weekday_index(1)), Some("Monday"));
        let sunday = 6 * SECS_PER_DAY * NANOS_PER_SEC;
        assert_eq!(weekday_name(weekday_index(sunday)), Some("Sunday"));
    }

    #[test]
    fn test_hour_of_day() {
        let ticks = (5 * SECS_PER_HOUR + 59) * NANOS_PER_SEC;
        assert_eq!(hour_of_day(ticks), 5);
    }

    #[test]
    fn test_pre_epoch_second_is_sunday_evening() {
        assert_eq!(hour_of_day(-NANOS_PER_SEC), 23);
        assert_eq!(weekday_name(weekday_index(-NANOS_PER_SEC)), Some("Sunday"));
        assert_eq!(hour_of_day(-NANOS_PER_HOUR), 23);
        assert_eq!(hour_of_day(-NANOS_PER_HOUR - 1), 22);
    }

    #[test]
    fn test_out_of_range_time_has_no_ticks() {
        let far = Utc.with_ymd_and_hms(2400, 1, 1, 0, 0, 0).unwrap();
        assert!(time_to_ticks(far).is_none());
    }
}
