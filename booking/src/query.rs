//! Booking query validation.
//!
//! Turns raw, user-entered strings into a [`BookingQuery`]. Everything here
//! is pure: "now" is always passed in as local wall-clock time.

use crate::error::ValidationError;
use crate::types::BookingQuery;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Slot granularity in minutes
pub const QUARTER_MINUTES: u32 = 15;

/// Longest bookable duration in minutes; longer requests are capped
pub const MAX_DURATION_MINUTES: u32 = 120;

/// Smallest accepted head count
pub const MIN_CAPACITY: u32 = 1;

/// Largest accepted head count; larger requests are clamped
pub const MAX_CAPACITY: u32 = 2;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const START_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Raw query fields as typed by the user
///
/// `date` and `time` are optional and default independently to the next
/// quarter hour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryInput {
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `HH:MM`
    pub time: Option<String>,
    /// Minutes
    pub duration: String,
    /// Number of people
    pub capacity: String,
}

/// Round `now` to the nearest quarter hour, seconds dropped.
///
/// Minutes 53 to 59 round up into the next hour; 8 to 22 go to :15, and so on.
#[must_use]
pub fn round_to_next_quarter(now: NaiveDateTime) -> NaiveDateTime {
    let minute = now.minute();
    let rounded = (minute + QUARTER_MINUTES / 2) / QUARTER_MINUTES * QUARTER_MINUTES;
    let hour_start = now
        - Duration::minutes(i64::from(minute))
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    hour_start + Duration::minutes(i64::from(rounded))
}

/// Implicit start used when the user gives no date or time.
///
/// Rounding can land at or before `now` (10:05 rounds to 10:00); the start is
/// then pushed one quarter later so the result is always strictly future.
#[must_use]
pub fn default_start(now: NaiveDateTime) -> NaiveDateTime {
    let rounded = round_to_next_quarter(now);
    if rounded > now {
        rounded
    } else {
        rounded + Duration::minutes(i64::from(QUARTER_MINUTES))
    }
}

/// Validate raw strings into a [`BookingQuery`].
///
/// Checks run in order: date/time format, past start, quarter alignment,
/// duration, capacity.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn parse_query(input: &QueryInput, now: NaiveDateTime) -> Result<BookingQuery, ValidationError> {
    let fallback = default_start(now);

    let date = match non_empty(input.date.as_deref()) {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
            ValidationError::InvalidFormat {
                field: "date",
                value: raw.to_string(),
            }
        })?,
        None => fallback.date(),
    };
    let time = match non_empty(input.time.as_deref()) {
        Some(raw) => parse_time(raw)?,
        None => fallback.time(),
    };

    let start = date.and_time(time);
    validate_start(start, now)?;

    let duration_minutes = parse_duration(&input.duration)?;
    let capacity = parse_capacity(&input.capacity)?;

    Ok(BookingQuery {
        start,
        duration_minutes,
        capacity,
    })
}

/// Build a query from already-typed values (CLI fast path).
///
/// # Errors
///
/// Returns [`ValidationError`] for a past or misaligned start or an invalid
/// duration.
pub fn build_query(
    start: NaiveDateTime,
    duration_minutes: i64,
    capacity: i64,
    now: NaiveDateTime,
) -> Result<BookingQuery, ValidationError> {
    validate_start(start, now)?;
    Ok(BookingQuery {
        start,
        duration_minutes: check_duration(duration_minutes)?,
        capacity: clamp_capacity(capacity),
    })
}

/// Parse a `yyyy-MM-ddTHH:mm` start time.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidFormat`] when the value does not match.
pub fn parse_start(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    NaiveDateTime::parse_from_str(raw.trim(), START_FORMAT).map_err(|_| ValidationError::InvalidFormat {
        field: "start time",
        value: raw.to_string(),
    })
}

/// Reject starts that are not strictly future or not on a quarter hour.
///
/// # Errors
///
/// Returns [`ValidationError::PastDate`] or [`ValidationError::NotQuarterAligned`].
pub fn validate_start(start: NaiveDateTime, now: NaiveDateTime) -> Result<(), ValidationError> {
    if start <= now {
        return Err(ValidationError::PastDate(start));
    }
    if start.minute() % QUARTER_MINUTES != 0 || start.second() != 0 {
        return Err(ValidationError::NotQuarterAligned);
    }
    Ok(())
}

/// Parse a duration in minutes.
///
/// # Errors
///
/// Empty → `MissingField`, not a number → `InvalidFormat`, non-positive or
/// not a multiple of 15 → `InvalidDuration`.
pub fn parse_duration(raw: &str) -> Result<u32, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field: "duration" });
    }
    let minutes: i64 = raw.parse().map_err(|_| ValidationError::InvalidFormat {
        field: "duration",
        value: raw.to_string(),
    })?;
    check_duration(minutes)
}

/// Parse and clamp a head count.
///
/// # Errors
///
/// Empty → `MissingField`, not a number → `InvalidFormat`.
pub fn parse_capacity(raw: &str) -> Result<u32, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field: "capacity" });
    }
    let requested: i64 = raw.parse().map_err(|_| ValidationError::InvalidFormat {
        field: "capacity",
        value: raw.to_string(),
    })?;
    Ok(clamp_capacity(requested))
}

/// Clamp a head count into `[MIN_CAPACITY, MAX_CAPACITY]`
#[must_use]
pub fn clamp_capacity(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MIN_CAPACITY), i64::from(MAX_CAPACITY));
    if clamped != requested {
        tracing::warn!(requested, clamped, "Capacity out of range, clamping");
    }
    u32::try_from(clamped).unwrap_or(MIN_CAPACITY)
}

fn check_duration(minutes: i64) -> Result<u32, ValidationError> {
    if minutes <= 0 || minutes % i64::from(QUARTER_MINUTES) != 0 {
        return Err(ValidationError::InvalidDuration(minutes));
    }
    let capped = minutes.min(i64::from(MAX_DURATION_MINUTES));
    Ok(u32::try_from(capped).unwrap_or(MAX_DURATION_MINUTES))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidFormat {
            field: "time",
            value: raw.to_string(),
        })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn input(date: Option<&str>, time: Option<&str>, duration: &str, capacity: &str) -> QueryInput {
        QueryInput {
            date: date.map(str::to_string),
            time: time.map(str::to_string),
            duration: duration.to_string(),
            capacity: capacity.to_string(),
        }
    }

    #[test]
    fn rounds_to_nearest_quarter() {
        assert_eq!(round_to_next_quarter(at("2025-03-10 10:07:59")), at("2025-03-10 10:00:00"));
        assert_eq!(round_to_next_quarter(at("2025-03-10 10:08:00")), at("2025-03-10 10:15:00"));
        assert_eq!(round_to_next_quarter(at("2025-03-10 10:52:00")), at("2025-03-10 10:45:00"));
        assert_eq!(round_to_next_quarter(at("2025-03-10 10:53:00")), at("2025-03-10 11:00:00"));
        assert_eq!(round_to_next_quarter(at("2025-03-10 23:58:00")), at("2025-03-11 00:00:00"));
    }

    #[test]
    fn default_start_is_strictly_future() {
        assert_eq!(default_start(at("2025-03-10 10:05:00")), at("2025-03-10 10:15:00"));
        assert_eq!(default_start(at("2025-03-10 10:15:00")), at("2025-03-10 10:30:00"));
        assert_eq!(default_start(at("2025-03-10 10:10:00")), at("2025-03-10 10:15:00"));
    }

    #[test]
    fn parses_explicit_date_and_time() {
        let now = at("2025-03-10 09:00:00");
        let query = parse_query(&input(Some("2025-03-11"), Some("09:15"), "30", "1"), now).unwrap();

        assert_eq!(query.start, at("2025-03-11 09:15:00"));
        assert_eq!(query.duration_minutes, 30);
        assert_eq!(query.capacity, 1);
    }

    #[test]
    fn defaults_date_and_time_independently() {
        let now = at("2025-03-10 09:05:00");

        let only_time = parse_query(&input(None, Some("17:30"), "15", "1"), now).unwrap();
        assert_eq!(only_time.start, at("2025-03-10 17:30:00"));

        let only_date = parse_query(&input(Some("2025-03-12"), None, "15", "1"), now).unwrap();
        assert_eq!(only_date.start, at("2025-03-12 09:15:00"));

        let neither = parse_query(&input(None, Some(" "), "15", "1"), now).unwrap();
        assert_eq!(neither.start, at("2025-03-10 09:15:00"));
    }

    #[test]
    fn rejects_unparsable_date_and_time() {
        let now = at("2025-03-10 09:00:00");

        assert!(matches!(
            parse_query(&input(Some("10/03/2025"), None, "30", "1"), now),
            Err(ValidationError::InvalidFormat { field: "date", .. })
        ));
        assert!(matches!(
            parse_query(&input(None, Some("nine"), "30", "1"), now),
            Err(ValidationError::InvalidFormat { field: "time", .. })
        ));
    }

    #[test]
    fn rejects_past_and_present_starts() {
        let now = at("2025-03-10 09:15:00");

        assert_eq!(
            parse_query(&input(Some("2025-03-10"), Some("09:00"), "30", "1"), now),
            Err(ValidationError::PastDate(at("2025-03-10 09:00:00")))
        );
        assert_eq!(
            parse_query(&input(Some("2025-03-10"), Some("09:15"), "30", "1"), now),
            Err(ValidationError::PastDate(at("2025-03-10 09:15:00")))
        );
    }

    #[test]
    fn rejects_misaligned_start() {
        let now = at("2025-03-10 09:00:00");
        assert_eq!(
            parse_query(&input(Some("2025-03-10"), Some("10:20"), "30", "1"), now),
            Err(ValidationError::NotQuarterAligned)
        );
    }

    #[test]
    fn validates_duration() {
        let now = at("2025-03-10 09:00:00");
        let with = |duration: &str| parse_query(&input(None, None, duration, "1"), now);

        assert_eq!(with("20"), Err(ValidationError::InvalidDuration(20)));
        assert_eq!(with("0"), Err(ValidationError::InvalidDuration(0)));
        assert_eq!(with("-15"), Err(ValidationError::InvalidDuration(-15)));
        assert_eq!(with(""), Err(ValidationError::MissingField { field: "duration" }));
        assert!(matches!(with("half"), Err(ValidationError::InvalidFormat { field: "duration", .. })));
        assert_eq!(with("180").unwrap().duration_minutes, MAX_DURATION_MINUTES);
        assert_eq!(with("120").unwrap().duration_minutes, 120);
    }

    #[test]
    fn clamps_capacity() {
        let now = at("2025-03-10 09:00:00");
        let with = |capacity: &str| parse_query(&input(None, None, "30", capacity), now);

        assert_eq!(with("7").unwrap().capacity, 2);
        assert_eq!(with("0").unwrap().capacity, 1);
        assert_eq!(with("-3").unwrap().capacity, 1);
        assert_eq!(with("2").unwrap().capacity, 2);
        assert_eq!(with(""), Err(ValidationError::MissingField { field: "capacity" }));
    }

    #[test]
    fn parses_fast_path_start() {
        assert_eq!(parse_start("2025-03-11T14:45").unwrap(), at("2025-03-11 14:45:00"));
        assert!(parse_start("2025-03-11 14:45").is_err());
        assert!(parse_start("14:45").is_err());
    }

    #[test]
    fn build_query_applies_fast_path_clamps() {
        let now = at("2025-03-10 09:00:00");
        let query = build_query(at("2025-03-10 10:00:00"), 240, 9, now).unwrap();

        assert_eq!(query.duration_minutes, 120);
        assert_eq!(query.capacity, 2);
        assert_eq!(
            build_query(at("2025-03-10 10:00:00"), 25, 1, now),
            Err(ValidationError::InvalidDuration(25))
        );
    }

    proptest! {
        #[test]
        fn rounding_lands_on_a_quarter(minute in 0u32..60, second in 0u32..60) {
            let now = NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(10, minute, second)
                .unwrap();
            let rounded = round_to_next_quarter(now);

            prop_assert!([0, 15, 30, 45].contains(&rounded.minute()));
            prop_assert_eq!(rounded.second(), 0);
            if minute > 52 {
                prop_assert_eq!(rounded.hour(), 11);
            } else {
                prop_assert_eq!(rounded.hour(), 10);
            }
        }

        #[test]
        fn defaulted_start_is_never_past(minute in 0u32..60, second in 0u32..60) {
            let now = NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(16, minute, second)
                .unwrap();
            let query = parse_query(&input(None, None, "30", "1"), now).unwrap();

            prop_assert!(query.start > now);
            prop_assert_eq!(query.start.minute() % QUARTER_MINUTES, 0);
        }

        #[test]
        fn only_positive_quarter_multiples_are_accepted(minutes in -300i64..300) {
            let result = parse_duration(&minutes.to_string());
            if minutes > 0 && minutes % 15 == 0 {
                prop_assert_eq!(result, Ok(u32::try_from(minutes.min(120)).unwrap()));
            } else {
                prop_assert_eq!(result, Err(ValidationError::InvalidDuration(minutes)));
            }
        }
    }
}
