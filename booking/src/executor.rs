//! Command execution.
//!
//! [`BookingEffects`] is the imperative half of the engine: it runs the
//! commands emitted by [`InteractionReducer`](crate::interaction::InteractionReducer)
//! against the booking service and the session repository, and turns every
//! result (including failures) into an outcome [`Action`].

use crate::calendar::build_calendar;
use crate::interaction::{Action, Command, CommandKind};
use crate::repository::SessionRepository;
use crate::selection::{balance_after_booking, check_credits};
use crate::service::BookingService;
use crate::types::{BookingQuery, Credentials, Room, UserAccount};
use async_trait::async_trait;
use chrono::NaiveDate;
use roombook_runtime::CommandHandler;
use roombook_runtime::metrics::BookingMetrics;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const NOT_LOGGED_IN: &str = "please log in";
const INTERNAL_ERROR: &str = "internal error, please log in again";

/// Runs interaction commands
#[derive(Clone)]
pub struct BookingEffects {
    service: Arc<dyn BookingService>,
    repository: Arc<dyn SessionRepository>,
    fetch_timeout: Duration,
}

impl BookingEffects {
    /// Creates a new `BookingEffects`
    #[must_use]
    pub fn new(service: Arc<dyn BookingService>, repository: Arc<dyn SessionRepository>, fetch_timeout: Duration) -> Self {
        Self {
            service,
            repository,
            fetch_timeout,
        }
    }

    /// Booking service
    #[must_use]
    pub fn service(&self) -> &Arc<dyn BookingService> {
        &self.service
    }

    /// Session repository
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    /// Room catalogue, from the cache or fetched and cached
    ///
    /// # Errors
    ///
    /// Returns [`Failure`] if the service or the cache fails.
    pub async fn rooms(&self, account: &UserAccount) -> Result<Vec<Room>, Failure> {
        match self.repository.rooms().await {
            Ok(Some(rooms)) if !rooms.is_empty() => return Ok(rooms),
            Ok(_) => {},
            Err(error) => tracing::warn!(%error, "Room cache unreadable, fetching catalogue"),
        }
        let rooms = self.service.list_rooms(&account.tokens).await?;
        if let Err(error) = self.repository.save_rooms(&rooms).await {
            tracing::warn!(%error, "Could not cache room catalogue");
        }
        Ok(rooms)
    }

    async fn account(&self, session_key: &str) -> Result<UserAccount, Failure> {
        match self.repository.get_account(session_key).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(Failure::Expired(NOT_LOGGED_IN.to_string())),
            Err(error) => {
                tracing::error!(session = session_key, %error, "Account unreadable");
                Err(Failure::Expired(INTERNAL_ERROR.to_string()))
            },
        }
    }

    async fn store_balance(&self, session_key: &str, account: &mut UserAccount, credits: f64) {
        account.credit_balance = credits;
        if let Err(error) = self.repository.save_account(session_key, account).await {
            tracing::warn!(session = session_key, %error, "Could not store refreshed balance");
        }
    }

    async fn login(&self, session_key: &str, credentials: Credentials) -> Result<Action, Failure> {
        let account = self.service.login(&credentials.email, &credentials.password).await?;
        self.repository
            .save_account(session_key, &account)
            .await
            .map_err(|error| Failure::Message(error.to_string()))?;
        tracing::info!(session = session_key, email = %credentials.email, "Logged in");
        Ok(Action::LoggedIn {
            credits: account.credit_balance,
        })
    }

    async fn show_landing(&self, session_key: &str) -> Result<Action, Failure> {
        let mut account = self.account(session_key).await?;
        let credits = self.service.get_credits(&account.tokens).await?;
        self.store_balance(session_key, &mut account, credits).await;
        Ok(Action::AccountRefreshed { credits })
    }

    async fn search(&self, session_key: &str, query: BookingQuery) -> Result<Action, Failure> {
        let mut account = self.account(session_key).await?;
        let rooms = self.service.get_available_rooms(&account.tokens, &query).await?;
        let credits = self.service.get_credits(&account.tokens).await?;
        self.store_balance(session_key, &mut account, credits).await;
        tracing::info!(session = session_key, start = %query.start, rooms = rooms.len(), "Availability searched");
        Ok(Action::RoomsFound { rooms, account })
    }

    // The balance may have changed since the reducer checked it, so the
    // credit check runs again on a fresh balance right before booking.
    async fn confirm(&self, session_key: &str, query: BookingQuery, room: Room) -> Result<Action, Failure> {
        let mut account = self.account(session_key).await?;
        let credits = self.service.get_credits(&account.tokens).await?;
        self.store_balance(session_key, &mut account, credits).await;
        if let Err(error) = check_credits(&account, &room) {
            BookingMetrics::record_rejected("insufficient_credits");
            return Err(Failure::Message(error.to_string()));
        }

        let reservation = match self.service.book(&account.tokens, &query, &room, credits).await {
            Ok(reservation) => reservation,
            Err(error) => {
                BookingMetrics::record_rejected("service");
                return Err(error.into());
            },
        };
        BookingMetrics::record_confirmed();
        self.store_balance(session_key, &mut account, balance_after_booking(credits, &room)).await;
        tracing::info!(
            session = session_key,
            room = %room.name,
            start = %reservation.start,
            end = %reservation.end,
            cost = reservation.cost,
            "Room booked"
        );
        Ok(Action::BookingConfirmed { reservation })
    }

    async fn list(&self, session_key: &str) -> Result<Action, Failure> {
        let account = self.account(session_key).await?;
        let reservations = self.service.list_future_reservations(&account.tokens).await?;
        Ok(Action::ReservationsLoaded { reservations })
    }

    async fn cancel(&self, session_key: &str, id: crate::types::ReservationId) -> Result<Action, Failure> {
        let account = self.account(session_key).await?;
        self.service.cancel_booking(&account.tokens, &id).await?;
        tracing::info!(session = session_key, reservation = %id, "Reservation cancelled");
        Ok(Action::ReservationCancelled { id })
    }

    async fn calendar(&self, session_key: &str, date: NaiveDate) -> Result<Action, Failure> {
        let account = self.account(session_key).await?;
        let rooms = self.rooms(&account).await?;
        let own = match self.service.list_future_reservations(&account.tokens).await {
            Ok(own) => own,
            Err(error) if error.requires_login() => return Err(error.into()),
            Err(error) => {
                tracing::warn!(session = session_key, %error, "Own reservations unavailable, calendar shows others only");
                Vec::new()
            },
        };
        let calendar = build_calendar(
            Arc::clone(&self.service),
            &account.tokens,
            &rooms,
            date,
            &own,
            self.fetch_timeout,
        )
        .await;
        Ok(Action::CalendarLoaded { calendar })
    }

    // Local state is cleared even when the service call fails.
    async fn logout(&self, session_key: &str) -> Option<Action> {
        if let Ok(Some(account)) = self.repository.get_account(session_key).await {
            if let Err(error) = self.service.logout(&account.tokens).await {
                tracing::warn!(session = session_key, %error, "Service logout failed");
            }
        }
        if let Err(error) = self.repository.clear_account(session_key).await {
            tracing::warn!(session = session_key, %error, "Could not clear account");
        }
        tracing::info!(session = session_key, "Logged out");
        None
    }
}

impl fmt::Debug for BookingEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookingEffects")
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

/// Why a command did not produce its success outcome
#[derive(Debug)]
pub enum Failure {
    /// The user has to log in (again)
    Expired(String),
    /// Shown on the current state
    Message(String),
}

impl From<crate::error::ServiceError> for Failure {
    fn from(error: crate::error::ServiceError) -> Self {
        if error.requires_login() {
            Self::Expired(error.to_string())
        } else {
            Self::Message(error.to_string())
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired(message) | Self::Message(message) => f.write_str(message),
        }
    }
}

#[async_trait]
impl CommandHandler for BookingEffects {
    type Command = Command;
    type Action = Action;

    async fn execute(&self, session_key: &str, command: Command) -> Option<Action> {
        let kind = command.kind();
        let result = match command {
            Command::Login { credentials } => self.login(session_key, credentials).await,
            Command::ShowLanding => self.show_landing(session_key).await,
            Command::SearchAvailability { query } => self.search(session_key, query).await,
            Command::ConfirmBooking { query, room } => self.confirm(session_key, query, room).await,
            Command::ListReservations => self.list(session_key).await,
            Command::CancelReservation { id } => self.cancel(session_key, id).await,
            Command::LoadCalendar { date } => self.calendar(session_key, date).await,
            Command::Logout => return self.logout(session_key).await,
        };

        match result {
            Ok(action) => Some(action),
            // A rejected login is not an expired session
            Err(Failure::Expired(message)) if kind == CommandKind::Login => Some(Action::failed(kind, message)),
            Err(Failure::Expired(message)) => {
                tracing::info!(session = session_key, command = %kind, "Session needs a new login");
                Some(Action::SessionExpired { message })
            },
            Err(Failure::Message(message)) => {
                tracing::warn!(session = session_key, command = %kind, error = %message, "Command failed");
                Some(Action::failed(kind, message))
            },
        }
    }

    fn label(command: &Command) -> &'static str {
        command.kind().as_str()
    }
}
