use super::{Action, Command, CommandKind, InteractionEnvironment, Step, ignore};
use crate::error::BookingError;
use crate::types::{Reservation, ReservationId};
use serde::{Deserialize, Serialize};

/// Upcoming reservations, with cancellation of the picked one
///
/// Any action id that parses as a reservation id picks that reservation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservationsState {
    /// Current and upcoming reservations
    pub reservations: Vec<Reservation>,
    /// `ListReservations` in flight
    pub loading: bool,
    /// Picked reservation
    pub picked: Option<ReservationId>,
    /// The picked reservation had started when last checked
    pub booking_started: bool,
    /// Confirmation message
    pub notice: Option<String>,
    /// Last error
    pub error: Option<String>,
}

impl ReservationsState {
    /// Empty list waiting for `ListReservations`
    #[must_use]
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    fn find(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    fn pick(&mut self, id: ReservationId, env: &InteractionEnvironment) -> Step {
        let Some(started) = self.find(&id).map(|r| r.has_started(env.local_now())) else {
            self.error = Some(format!("unknown reservation {id}"));
            return Step::stay();
        };
        self.picked = Some(id);
        self.booking_started = started;
        self.notice = None;
        self.error = None;
        Step::stay()
    }

    // Re-checked here: the reservation may have started since it was picked.
    fn cancel(&mut self, env: &InteractionEnvironment) -> Step {
        let Some(id) = self.picked else {
            self.error = Some("select a reservation first".to_string());
            return Step::stay();
        };
        let Some(started) = self.find(&id).map(|r| r.has_started(env.local_now())) else {
            self.picked = None;
            self.error = Some(format!("unknown reservation {id}"));
            return Step::stay();
        };
        self.booking_started = started;
        if started {
            tracing::info!(reservation = %id, "Refusing to cancel a started reservation");
            self.error = Some(BookingError::BookingStarted.to_string());
            return Step::stay();
        }
        self.error = None;
        Step::emit(Command::CancelReservation { id })
    }
}

pub(super) fn reduce(state: &mut ReservationsState, action: Action, env: &InteractionEnvironment) -> Step {
    match action {
        Action::User(user) => match user.action_id.as_str() {
            "cancel" => state.cancel(env),
            "back" => Step::to_landing(),
            "refresh" => {
                state.loading = true;
                Step::emit(Command::ListReservations)
            },
            other => match other.parse::<ReservationId>() {
                Ok(id) => state.pick(id, env),
                Err(_) => Step::stay(),
            },
        },
        Action::ReservationsLoaded { reservations } => {
            state.reservations = reservations;
            state.loading = false;
            if state.picked.is_some_and(|id| state.find(&id).is_none()) {
                state.picked = None;
                state.booking_started = false;
            }
            Step::stay()
        },
        Action::ReservationCancelled { id } => {
            state.reservations.retain(|r| r.id != id);
            state.picked = None;
            state.booking_started = false;
            state.notice = Some("reservation cancelled".to_string());
            state.error = None;
            Step::stay()
        },
        Action::CommandFailed {
            kind: CommandKind::ListReservations | CommandKind::CancelReservation,
            message,
        } => {
            state.loading = false;
            state.error = Some(message);
            Step::stay()
        },
        other => ignore("reservations", &other),
    }
}
