//! Error types for the booking engine.
//!
//! - [`ValidationError`]: user-correctable input problems, shown inline
//! - [`BookingError`]: domain refusals (no room, not enough credits, ...)
//! - [`ServiceError`]: failures talking to the booking service

use chrono::NaiveDateTime;
use thiserror::Error;

/// Raw user input could not be turned into a booking query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was left empty
    #[error("{field} is required")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// A field could not be parsed
    #[error("invalid {field}: {value:?}")]
    InvalidFormat {
        /// Field name
        field: &'static str,
        /// Offending input
        value: String,
    },

    /// The requested start is not strictly in the future
    #[error("{0} is in the past, pick a future date and time")]
    PastDate(NaiveDateTime),

    /// The requested start is not on a quarter hour
    #[error("start time must be on a quarter hour (:00, :15, :30 or :45)")]
    NotQuarterAligned,

    /// The duration is not a positive multiple of 15 minutes
    #[error("duration must be a positive multiple of 15 minutes, got {0}")]
    InvalidDuration(i64),
}

/// A booking or cancellation was refused by a domain rule
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    /// No candidate room can host the request
    #[error("no room available")]
    NoRoomAvailable,

    /// The explicitly requested room is not among the candidates
    #[error("room {0:?} is not available")]
    RoomNotFound(String),

    /// The room costs more than the remaining credits
    #[error("not enough credits: the room costs {price} and {balance} remain")]
    InsufficientCredits {
        /// Room price
        price: f64,
        /// Account balance
        balance: f64,
    },

    /// The reservation has already started and cannot be cancelled
    #[error("this reservation has already started and cannot be cancelled")]
    BookingStarted,
}

/// A call to the booking service failed
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Email/password pair rejected
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Tokens were rejected; the user must log in again
    #[error("session expired, please log in again")]
    Unauthorized,

    /// Network-level failure
    #[error("booking service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("booking service returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response excerpt
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("unexpected booking service response: {0}")]
    Decode(String),

    /// The service accepted the call but the operation did not happen
    #[error("{0}")]
    Rejected(String),

    /// The service could not be reached or is not configured
    #[error("booking service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// Whether retrying the same call may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Unavailable(_) => true,
            Self::InvalidCredentials | Self::Unauthorized | Self::Decode(_) | Self::Rejected(_) => {
                false
            },
        }
    }

    /// Whether the user has to authenticate again
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
