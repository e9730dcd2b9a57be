//! Booking service contract.
//!
//! The engine only depends on this trait; [`crate::client::HttpBookingService`]
//! implements it against the coworking space's REST API and
//! [`crate::mocks::MockBookingService`] in memory.

use crate::error::ServiceError;
use crate::types::{AuthTokens, BookingQuery, Interval, Reservation, ReservationId, Room, RoomId, UserAccount};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Operations offered by the external booking service
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Authenticate and return the account with its current balance
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidCredentials`] for a wrong email/password pair.
    async fn login(&self, email: &str, password: &str) -> Result<UserAccount, ServiceError>;

    /// Current credit balance
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn get_credits(&self, tokens: &AuthTokens) -> Result<f64, ServiceError>;

    /// Every room of the meeting-room category, regardless of availability
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn list_rooms(&self, tokens: &AuthTokens) -> Result<Vec<Room>, ServiceError>;

    /// Rooms free for the whole query window, in service order
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn get_available_rooms(
        &self,
        tokens: &AuthTokens,
        query: &BookingQuery,
    ) -> Result<Vec<Room>, ServiceError>;

    /// Book `room` for the query window
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`]; [`ServiceError::Rejected`] if the service did not
    /// record the booking.
    async fn book(
        &self,
        tokens: &AuthTokens,
        query: &BookingQuery,
        room: &Room,
        credits_at_booking: f64,
    ) -> Result<Reservation, ServiceError>;

    /// Cancel a reservation
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn cancel_booking(&self, tokens: &AuthTokens, id: &ReservationId) -> Result<(), ServiceError>;

    /// Current and upcoming reservations of the user
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn list_future_reservations(&self, tokens: &AuthTokens) -> Result<Vec<Reservation>, ServiceError>;

    /// Busy intervals of one room on `date`
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn get_room_busy_time(
        &self,
        tokens: &AuthTokens,
        room_id: &RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Interval>, ServiceError>;

    /// Invalidate the tokens
    ///
    /// # Errors
    ///
    /// Any [`ServiceError`].
    async fn logout(&self, tokens: &AuthTokens) -> Result<(), ServiceError>;
}
