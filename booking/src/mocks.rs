//! In-memory booking service for tests and demos.

use crate::error::ServiceError;
use crate::service::BookingService;
use crate::types::{AuthTokens, BookingQuery, Interval, Reservation, ReservationId, Room, RoomId, UserAccount};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

/// Scriptable [`BookingService`] that records every call
///
/// # Example
///
/// ```
/// use roombook::mocks::MockBookingService;
///
/// let service = MockBookingService::new()
///     .with_credits(10.0)
///     .failing("book");
/// ```
#[derive(Debug, Default)]
pub struct MockBookingService {
    credentials: Option<(String, String)>,
    credits: Mutex<f64>,
    catalogue: Vec<Room>,
    available: Vec<Room>,
    busy: HashMap<RoomId, Vec<Interval>>,
    failing_busy: HashSet<RoomId>,
    busy_delay: HashMap<RoomId, Duration>,
    reservations: Mutex<Vec<Reservation>>,
    failing: HashSet<&'static str>,
    unauthorized: bool,
    hourly_cost: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl MockBookingService {
    /// Empty service: no rooms, zero credits, any login accepted
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept this email/password pair
    #[must_use]
    pub fn with_credentials(mut self, email: &str, password: &str) -> Self {
        self.credentials = Some((email.to_string(), password.to_string()));
        self
    }

    /// Set the account balance
    #[must_use]
    pub fn with_credits(mut self, credits: f64) -> Self {
        *self.credits.get_mut() = credits;
        self
    }

    /// Set the full room catalogue
    #[must_use]
    pub fn with_catalogue(mut self, rooms: Vec<Room>) -> Self {
        self.catalogue = rooms;
        self
    }

    /// Set the rooms returned by availability searches
    #[must_use]
    pub fn with_available_rooms(mut self, rooms: Vec<Room>) -> Self {
        self.available = rooms;
        self
    }

    /// Busy intervals reported for a room
    #[must_use]
    pub fn with_busy_time(mut self, room: &RoomId, intervals: Vec<Interval>) -> Self {
        self.busy.insert(room.clone(), intervals);
        self
    }

    /// Make busy-time fetches for a room fail
    #[must_use]
    pub fn with_failing_busy_time(mut self, room: &RoomId) -> Self {
        self.failing_busy.insert(room.clone());
        self
    }

    /// Delay busy-time fetches for a room
    #[must_use]
    pub fn with_busy_time_delay(mut self, room: &RoomId, delay: Duration) -> Self {
        self.busy_delay.insert(room.clone(), delay);
        self
    }

    /// Seed existing reservations
    #[must_use]
    pub fn with_reservations(mut self, reservations: Vec<Reservation>) -> Self {
        *self.reservations.get_mut() = reservations;
        self
    }

    /// Make an operation (by method name) fail with a service error
    #[must_use]
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Reject every authenticated call as if the tokens had expired
    #[must_use]
    pub fn expired(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    /// Report reservation costs as the room price per hour, like the live service
    #[must_use]
    pub fn with_hourly_cost(mut self) -> Self {
        self.hourly_cost = true;
        self
    }

    /// Method names called so far, in order
    pub async fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().await.clone()
    }

    /// How many times `operation` was called
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| **c == operation).count()
    }

    /// Reservations currently held
    pub async fn reservations(&self) -> Vec<Reservation> {
        self.reservations.lock().await.clone()
    }

    /// Current balance
    pub async fn credits(&self) -> f64 {
        *self.credits.lock().await
    }

    async fn enter(&self, operation: &'static str) -> Result<(), ServiceError> {
        self.calls.lock().await.push(operation);
        if self.unauthorized && operation != "login" {
            return Err(ServiceError::Unauthorized);
        }
        if self.failing.contains(operation) {
            return Err(ServiceError::Unavailable(format!("{operation} failed")));
        }
        Ok(())
    }

    fn tokens() -> AuthTokens {
        AuthTokens {
            access: "mock-access".to_string(),
            refresh: "mock-refresh".to_string(),
        }
    }
}

#[async_trait]
impl BookingService for MockBookingService {
    async fn login(&self, email: &str, password: &str) -> Result<UserAccount, ServiceError> {
        self.enter("login").await?;
        if let Some((expected_email, expected_password)) = &self.credentials {
            if email != expected_email || password != expected_password {
                return Err(ServiceError::InvalidCredentials);
            }
        }
        Ok(UserAccount {
            tokens: Self::tokens(),
            credit_balance: *self.credits.lock().await,
        })
    }

    async fn get_credits(&self, _tokens: &AuthTokens) -> Result<f64, ServiceError> {
        self.enter("get_credits").await?;
        Ok(*self.credits.lock().await)
    }

    async fn list_rooms(&self, _tokens: &AuthTokens) -> Result<Vec<Room>, ServiceError> {
        self.enter("list_rooms").await?;
        Ok(self.catalogue.clone())
    }

    async fn get_available_rooms(
        &self,
        _tokens: &AuthTokens,
        _query: &BookingQuery,
    ) -> Result<Vec<Room>, ServiceError> {
        self.enter("get_available_rooms").await?;
        Ok(self.available.clone())
    }

    async fn book(
        &self,
        _tokens: &AuthTokens,
        query: &BookingQuery,
        room: &Room,
        _credits_at_booking: f64,
    ) -> Result<Reservation, ServiceError> {
        self.enter("book").await?;
        let reservation = Reservation {
            id: ReservationId::random(),
            room_name: room.name.clone(),
            start: query.start,
            end: query.end(),
            cost: if self.hourly_cost {
                room.price * f64::from(query.duration_minutes) / 60.0
            } else {
                room.price
            },
        };
        *self.credits.lock().await -= room.price;
        self.reservations.lock().await.push(reservation.clone());
        Ok(reservation)
    }

    async fn cancel_booking(&self, _tokens: &AuthTokens, id: &ReservationId) -> Result<(), ServiceError> {
        self.enter("cancel_booking").await?;
        let mut reservations = self.reservations.lock().await;
        let before = reservations.len();
        reservations.retain(|r| r.id != *id);
        if reservations.len() == before {
            return Err(ServiceError::Rejected(format!("reservation {id} not found")));
        }
        Ok(())
    }

    async fn list_future_reservations(&self, _tokens: &AuthTokens) -> Result<Vec<Reservation>, ServiceError> {
        self.enter("list_future_reservations").await?;
        Ok(self.reservations.lock().await.clone())
    }

    async fn get_room_busy_time(
        &self,
        _tokens: &AuthTokens,
        room_id: &RoomId,
        date: NaiveDate,
    ) -> Result<Vec<Interval>, ServiceError> {
        self.enter("get_room_busy_time").await?;
        if let Some(delay) = self.busy_delay.get(room_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_busy.contains(room_id) {
            return Err(ServiceError::Unavailable(format!("busy time for {room_id}")));
        }
        Ok(self
            .busy
            .get(room_id)
            .map(|intervals| intervals.iter().copied().filter(|i| i.touches(date)).collect())
            .unwrap_or_default())
    }

    async fn logout(&self, _tokens: &AuthTokens) -> Result<(), ServiceError> {
        self.enter("logout").await
    }
}
