//! Non-interactive booking.
//!
//! `roombook book` skips the state machine entirely but runs the same
//! validation, selection and credit checks before it books.

use crate::error::{BookingError, ServiceError, ValidationError};
use crate::query::{build_query, default_start, parse_start};
use crate::selection::{balance_after_booking, ensure_affordable, select_room};
use crate::service::BookingService;
use crate::types::{Reservation, UserAccount};
use chrono::NaiveDateTime;
use roombook_runtime::metrics::BookingMetrics;
use std::fmt;
use thiserror::Error;

/// Default booking length in minutes
pub const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Arguments of a one-shot booking, as typed on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRequest {
    /// Head count, clamped into the allowed range
    pub capacity: i64,
    /// Exact room name; first fitting room when `None`
    pub room_name: Option<String>,
    /// `yyyy-MM-ddTHH:mm`; next quarter hour when `None`
    pub start: Option<String>,
    /// Minutes, a positive multiple of 15
    pub duration_minutes: i64,
}

impl Default for BookRequest {
    fn default() -> Self {
        Self {
            capacity: 1,
            room_name: None,
            start: None,
            duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

/// What was booked
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSummary {
    /// Room name
    pub room: String,
    /// Local start
    pub start: NaiveDateTime,
    /// Local end
    pub end: NaiveDateTime,
    /// Cost reported by the service
    pub cost: f64,
    /// Balance once the room price is charged
    pub credits_left: f64,
}

impl BookingSummary {
    fn new(reservation: &Reservation, credits_left: f64) -> Self {
        Self {
            room: reservation.room_name.clone(),
            start: reservation.start,
            end: reservation.end,
            cost: reservation.cost,
            credits_left,
        }
    }
}

impl fmt::Display for BookingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {} -> {}  {:.2} credits",
            self.room,
            self.start.format("%d/%m/%Y %H:%M"),
            self.end.format("%d/%m/%Y %H:%M"),
            self.cost
        )
    }
}

/// Why a one-shot booking did not happen
#[derive(Error, Debug)]
pub enum FastPathError {
    /// Bad arguments
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Refused by a booking rule
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// The service call failed
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Validate `request`, pick a room and book it for `account`.
///
/// The balance is fetched fresh before the credit check; `now` is local
/// wall-clock time.
///
/// # Errors
///
/// Returns [`FastPathError`] on the first failing step; nothing is booked
/// unless every check passed.
pub async fn book(
    service: &dyn BookingService,
    account: &UserAccount,
    request: &BookRequest,
    now: NaiveDateTime,
) -> Result<BookingSummary, FastPathError> {
    let start = match request.start.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_start(raw)?,
        None => default_start(now),
    };
    let query = build_query(start, request.duration_minutes, request.capacity, now)?;

    let rooms = service.get_available_rooms(&account.tokens, &query).await?;
    let room = select_room(&rooms, query.capacity, request.room_name.as_deref())?;

    let balance = service.get_credits(&account.tokens).await?;
    if let Err(error) = ensure_affordable(balance, room) {
        BookingMetrics::record_rejected("insufficient_credits");
        return Err(error.into());
    }

    tracing::info!(room = %room.name, start = %query.start, minutes = query.duration_minutes, "Booking");
    let reservation = service
        .book(&account.tokens, &query, room, balance)
        .await
        .inspect_err(|_| BookingMetrics::record_rejected("service"))?;
    BookingMetrics::record_confirmed();

    Ok(BookingSummary::new(&reservation, balance_after_booking(balance, room)))
}
