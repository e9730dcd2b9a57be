//! Interaction state machine.
//!
//! Every surface (terminal, chat webhook) drives the same closed set of
//! states. [`InteractionReducer`] is the single dispatcher: it matches on the
//! current variant and hands the action to that variant's transition
//! function, which either stays (possibly emitting a command) or replaces the
//! whole state.
//!
//! Commands are descriptions only; [`crate::executor::BookingEffects`] runs
//! them and reports the outcome back as an [`Action`].

use crate::calendar::Calendar;
use crate::types::{BookingQuery, Credentials, Reservation, ReservationId, Room, UserAccount};
use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use roombook_core::environment::Clock;
use roombook_core::reducer::Reducer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

mod browse;
mod calendar;
mod landing;
mod login;
mod quick_book;
mod reservations;

pub use browse::{BrowsePhase, BrowseState};
pub use calendar::CalendarState;
pub use landing::LandingState;
pub use login::LoginState;
pub use quick_book::{QuickBookPhase, QuickBookState};
pub use reservations::ReservationsState;

// ============================================================================
// State
// ============================================================================

/// Persisted state of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InteractionState {
    /// Waiting for credentials
    Login(LoginState),
    /// Main menu
    Landing(LandingState),
    /// Book the first room that fits, right now
    QuickBook(QuickBookState),
    /// Search a slot and pick a room
    Browse(BrowseState),
    /// Upcoming reservations, with cancellation
    Reservations(ReservationsState),
    /// Day grid of every room
    Calendar(CalendarState),
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::Login(LoginState::default())
    }
}

impl InteractionState {
    /// Variant name, as serialized in the `type` tag
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Landing(_) => "landing",
            Self::QuickBook(_) => "quick-book",
            Self::Browse(_) => "browse",
            Self::Reservations(_) => "reservations",
            Self::Calendar(_) => "calendar",
        }
    }

    /// Error message currently attached to the state
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Login(s) => s.error.as_deref(),
            Self::Landing(s) => s.error.as_deref(),
            Self::QuickBook(s) => s.error.as_deref(),
            Self::Browse(s) => s.error.as_deref(),
            Self::Reservations(s) => s.error.as_deref(),
            Self::Calendar(s) => s.error.as_deref(),
        }
    }

    /// Entry state for a surface: `Landing` when an account is known
    #[must_use]
    pub fn entry(account: Option<&UserAccount>) -> Self {
        match account {
            Some(account) => Self::Landing(LandingState::with_credits(account.credit_balance)),
            None => Self::default(),
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Form values submitted with a user action
///
/// Values are opaque strings keyed by field name; blank values count as
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, String>);

impl Values {
    /// No values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Trimmed, non-empty value for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Value for `key`, empty when missing
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A form submission or button click
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    /// Which button or form was used
    pub action_id: String,
    /// Submitted form values
    #[serde(default)]
    pub values: Values,
}

/// Everything that can happen to a session
#[derive(Debug, Clone)]
pub enum Action {
    /// Input from the user
    User(UserAction),

    /// `Login` succeeded
    LoggedIn {
        /// Balance at login
        credits: f64,
    },

    /// `ShowLanding` fetched a fresh balance
    AccountRefreshed {
        /// Current balance
        credits: f64,
    },

    /// `SearchAvailability` returned candidates, with a fresh account snapshot
    RoomsFound {
        /// Free rooms, in service order
        rooms: Vec<Room>,
        /// Account as of the search
        account: UserAccount,
    },

    /// `ConfirmBooking` succeeded
    BookingConfirmed {
        /// The new reservation
        reservation: Reservation,
    },

    /// `ListReservations` succeeded
    ReservationsLoaded {
        /// Current and upcoming reservations
        reservations: Vec<Reservation>,
    },

    /// `CancelReservation` succeeded
    ReservationCancelled {
        /// Cancelled reservation
        id: ReservationId,
    },

    /// `LoadCalendar` succeeded
    CalendarLoaded {
        /// The day grid
        calendar: Calendar,
    },

    /// A command failed; the message is shown to the user
    CommandFailed {
        /// Which command
        kind: CommandKind,
        /// User-facing reason
        message: String,
    },

    /// No usable account for the session; back to `Login`
    SessionExpired {
        /// User-facing reason
        message: String,
    },
}

impl Action {
    /// User action without values
    #[must_use]
    pub fn user(action_id: impl Into<String>) -> Self {
        Self::User(UserAction {
            action_id: action_id.into(),
            values: Values::new(),
        })
    }

    /// User action with form values
    #[must_use]
    pub fn submit(action_id: impl Into<String>, values: Values) -> Self {
        Self::User(UserAction {
            action_id: action_id.into(),
            values,
        })
    }

    /// Failure outcome for `kind`
    #[must_use]
    pub fn failed(kind: CommandKind, message: impl fmt::Display) -> Self {
        Self::CommandFailed {
            kind,
            message: message.to_string(),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Side-effecting request emitted by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Authenticate and store the account
    Login {
        /// Email and password
        credentials: Credentials,
    },
    /// Refresh the balance shown on the landing menu
    ShowLanding,
    /// Look for free rooms
    SearchAvailability {
        /// Validated query
        query: BookingQuery,
    },
    /// Book a room that passed selection and the credit check
    ConfirmBooking {
        /// Validated query
        query: BookingQuery,
        /// Selected room
        room: Room,
    },
    /// Fetch upcoming reservations
    ListReservations,
    /// Cancel a reservation that has not started
    CancelReservation {
        /// Reservation to cancel
        id: ReservationId,
    },
    /// Build the calendar for a day
    LoadCalendar {
        /// Day to show
        date: NaiveDate,
    },
    /// Invalidate tokens and forget the account
    Logout,
}

/// Command discriminant, carried by failure outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// [`Command::Login`]
    Login,
    /// [`Command::ShowLanding`]
    ShowLanding,
    /// [`Command::SearchAvailability`]
    SearchAvailability,
    /// [`Command::ConfirmBooking`]
    ConfirmBooking,
    /// [`Command::ListReservations`]
    ListReservations,
    /// [`Command::CancelReservation`]
    CancelReservation,
    /// [`Command::LoadCalendar`]
    LoadCalendar,
    /// [`Command::Logout`]
    Logout,
}

impl Command {
    /// Discriminant of this command
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Login { .. } => CommandKind::Login,
            Self::ShowLanding => CommandKind::ShowLanding,
            Self::SearchAvailability { .. } => CommandKind::SearchAvailability,
            Self::ConfirmBooking { .. } => CommandKind::ConfirmBooking,
            Self::ListReservations => CommandKind::ListReservations,
            Self::CancelReservation { .. } => CommandKind::CancelReservation,
            Self::LoadCalendar { .. } => CommandKind::LoadCalendar,
            Self::Logout => CommandKind::Logout,
        }
    }
}

impl CommandKind {
    /// Snake-case name for logs and metric labels
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::ShowLanding => "show_landing",
            Self::SearchAvailability => "search_availability",
            Self::ConfirmBooking => "confirm_booking",
            Self::ListReservations => "list_reservations",
            Self::CancelReservation => "cancel_reservation",
            Self::LoadCalendar => "load_calendar",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Clock and locale injected into every transition
#[derive(Clone)]
pub struct InteractionEnvironment {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Wall-clock zone of the coworking space
    pub timezone: Tz,
}

impl InteractionEnvironment {
    /// Creates a new `InteractionEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, timezone: Tz) -> Self {
        Self { clock, timezone }
    }

    /// Current local wall-clock time
    #[must_use]
    pub fn local_now(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.timezone).naive_local()
    }

    /// Current local calendar day
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

impl fmt::Debug for InteractionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionEnvironment")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Result of one variant's transition
#[derive(Debug)]
enum Step {
    /// Keep the (possibly mutated) variant
    Stay(Option<Command>),
    /// Replace the whole state
    Goto(InteractionState, Option<Command>),
}

impl Step {
    const fn stay() -> Self {
        Self::Stay(None)
    }

    const fn emit(command: Command) -> Self {
        Self::Stay(Some(command))
    }

    /// Leave the current flow for the landing menu, refreshing the balance
    fn to_landing() -> Self {
        Self::Goto(InteractionState::Landing(LandingState::default()), Some(Command::ShowLanding))
    }
}

/// Dispatches actions to the current variant's transition function
#[derive(Clone, Debug, Default)]
pub struct InteractionReducer;

impl InteractionReducer {
    /// Creates a new `InteractionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for InteractionReducer {
    type State = InteractionState;
    type Action = Action;
    type Command = Command;
    type Environment = InteractionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Option<Self::Command> {
        if let Action::SessionExpired { message } = action {
            tracing::info!(from = state.name(), "Session expired, back to login");
            *state = InteractionState::Login(LoginState::with_error(message));
            return None;
        }

        let step = match state {
            InteractionState::Login(s) => login::reduce(s, action),
            InteractionState::Landing(s) => landing::reduce(s, action, env),
            InteractionState::QuickBook(s) => quick_book::reduce(s, action, env),
            InteractionState::Browse(s) => browse::reduce(s, action, env),
            InteractionState::Reservations(s) => reservations::reduce(s, action, env),
            InteractionState::Calendar(s) => calendar::reduce(s, action, env),
        };

        match step {
            Step::Stay(command) => command,
            Step::Goto(next, command) => {
                tracing::debug!(from = state.name(), to = next.name(), "Transition");
                *state = next;
                command
            },
        }
    }
}

/// Outcome that does not belong to the current variant (stale or misrouted)
fn ignore(variant: &'static str, action: &Action) -> Step {
    tracing::debug!(variant, ?action, "Ignoring action");
    Step::stay()
}
