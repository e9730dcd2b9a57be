//! Domain types for meeting-room booking.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a bookable room, as assigned by the booking service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a service-assigned identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a confirmed reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Wrap a UUID
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a random identifier
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for ReservationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Rooms and reservations
// ============================================================================

/// A bookable meeting room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Service identifier
    pub id: RoomId,
    /// Display name, unique within the coworking space
    pub name: String,
    /// Maximum number of people
    pub capacity: u32,
    /// Credits charged for one booking
    pub price: f64,
}

/// A confirmed booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Name of the booked room
    pub room_name: String,
    /// Local start time
    pub start: NaiveDateTime,
    /// Local end time
    pub end: NaiveDateTime,
    /// Credits charged
    pub cost: f64,
}

impl Reservation {
    /// Whether the reservation has begun at `now` (a reservation starting
    /// exactly now counts as started)
    #[must_use]
    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        self.start <= now
    }

    /// The reservation's time span
    #[must_use]
    pub const fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }
}

/// Half-open time interval `[start, end)` in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive start
    pub start: NaiveDateTime,
    /// Exclusive end
    pub end: NaiveDateTime,
}

impl Interval {
    /// Create an interval
    #[must_use]
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Whether `[start, end)` overlaps this interval
    #[must_use]
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }

    /// Whether any part of the interval falls on `date`
    #[must_use]
    pub fn touches(&self, date: NaiveDate) -> bool {
        let day_start = date.and_time(chrono::NaiveTime::MIN);
        self.overlaps(day_start, day_start + Duration::days(1))
    }
}

// ============================================================================
// Queries
// ============================================================================

/// A validated booking request
///
/// Only built by [`crate::query`]; the start is quarter-aligned and strictly
/// future at validation time, the duration a positive multiple of 15 minutes
/// capped at the maximum, and the capacity clamped to the allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingQuery {
    /// Local start time
    pub start: NaiveDateTime,
    /// Duration in minutes
    pub duration_minutes: u32,
    /// Number of people
    pub capacity: u32,
}

impl BookingQuery {
    /// Local end time
    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(i64::from(self.duration_minutes))
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Login credentials; the password never appears in debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session tokens issued by the booking service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// Access token (`w_auth` cookie)
    pub access: String,
    /// Refresh token (`w_auth_refresh` cookie)
    pub refresh: String,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthTokens(<redacted>)")
    }
}

/// An authenticated user of the booking service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Tokens for service calls
    pub tokens: AuthTokens,
    /// Remaining credits
    pub credit_balance: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn interval_overlap_is_half_open() {
        let busy = Interval::new(at("2025-03-10 10:00"), at("2025-03-10 10:30"));

        assert!(busy.overlaps(at("2025-03-10 10:15"), at("2025-03-10 10:30")));
        assert!(!busy.overlaps(at("2025-03-10 10:30"), at("2025-03-10 10:45")));
        assert!(!busy.overlaps(at("2025-03-10 09:45"), at("2025-03-10 10:00")));
    }

    #[test]
    fn interval_touches_its_days_only() {
        let late = Interval::new(at("2025-03-10 23:30"), at("2025-03-11 00:30"));

        assert!(late.touches(at("2025-03-10 00:00").date()));
        assert!(late.touches(at("2025-03-11 00:00").date()));
        assert!(!late.touches(at("2025-03-12 00:00").date()));
    }

    #[test]
    fn reservation_started_includes_exact_start() {
        let reservation = Reservation {
            id: ReservationId::random(),
            room_name: "Atlas".to_string(),
            start: at("2025-03-10 10:00"),
            end: at("2025-03-10 11:00"),
            cost: 4.0,
        };

        assert!(!reservation.has_started(at("2025-03-10 09:59")));
        assert!(reservation.has_started(at("2025-03-10 10:00")));
    }

    #[test]
    fn query_end_adds_duration() {
        let query = BookingQuery {
            start: at("2025-03-10 23:45"),
            duration_minutes: 30,
            capacity: 1,
        };
        assert_eq!(query.end(), at("2025-03-11 00:15"));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let credentials = Credentials {
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let tokens = AuthTokens {
            access: "jwt".to_string(),
            refresh: "refresh".to_string(),
        };

        assert!(!format!("{credentials:?}").contains("hunter2"));
        assert!(!format!("{tokens:?}").contains("jwt"));
    }

    #[test]
    fn reservation_id_parses_uuid_strings() {
        let id: ReservationId = "6f1c2a3e-2b1d-4c5e-9f00-1a2b3c4d5e6f".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c2a3e-2b1d-4c5e-9f00-1a2b3c4d5e6f");
        assert!("not-a-uuid".parse::<ReservationId>().is_err());
    }
}
