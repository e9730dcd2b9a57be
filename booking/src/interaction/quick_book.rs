use super::{Action, Command, CommandKind, InteractionEnvironment, Step, ignore};
use crate::query::{QueryInput, parse_query};
use crate::selection::{check_credits, select_room};
use crate::types::{BookingQuery, Reservation, Room};
use serde::{Deserialize, Serialize};

/// Where the quick-book flow is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuickBookPhase {
    /// Collecting duration and capacity
    #[default]
    Form,
    /// `SearchAvailability` in flight
    Searching,
    /// `ConfirmBooking` in flight
    Confirming,
    /// Done
    Booked,
}

/// Book the first fitting room at the next quarter hour
///
/// The user never picks a room: as soon as candidates arrive the first fit
/// is selected, credit-checked and booked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickBookState {
    /// Current phase
    pub phase: QuickBookPhase,
    /// Raw duration as typed
    pub duration: String,
    /// Raw capacity as typed
    pub capacity: String,
    /// Validated query, once submitted
    pub query: Option<BookingQuery>,
    /// Selected room
    pub room: Option<Room>,
    /// Confirmed reservation
    pub reservation: Option<Reservation>,
    /// Last error
    pub error: Option<String>,
}

impl QuickBookState {
    fn back_to_form(&mut self, error: String) -> Step {
        self.phase = QuickBookPhase::Form;
        self.room = None;
        self.error = Some(error);
        Step::stay()
    }
}

pub(super) fn reduce(state: &mut QuickBookState, action: Action, env: &InteractionEnvironment) -> Step {
    match action {
        Action::User(user) => match user.action_id.as_str() {
            "quick-book" if state.phase == QuickBookPhase::Form => {
                state.duration = user.values.text("duration");
                state.capacity = user.values.text("capacity");
                let input = QueryInput {
                    date: None,
                    time: None,
                    duration: state.duration.clone(),
                    capacity: state.capacity.clone(),
                };
                match parse_query(&input, env.local_now()) {
                    Ok(query) => {
                        state.phase = QuickBookPhase::Searching;
                        state.query = Some(query);
                        state.error = None;
                        Step::emit(Command::SearchAvailability { query })
                    },
                    Err(error) => {
                        state.error = Some(error.to_string());
                        Step::stay()
                    },
                }
            },
            "cancel" => Step::to_landing(),
            _ => Step::stay(),
        },
        Action::RoomsFound { rooms, account } if state.phase == QuickBookPhase::Searching => {
            let Some(query) = state.query else {
                return state.back_to_form("search again".to_string());
            };
            let selected = select_room(&rooms, query.capacity, None)
                .and_then(|room| check_credits(&account, room).map(|()| room.clone()));
            match selected {
                Ok(room) => {
                    state.phase = QuickBookPhase::Confirming;
                    state.room = Some(room.clone());
                    Step::emit(Command::ConfirmBooking { query, room })
                },
                Err(error) => state.back_to_form(error.to_string()),
            }
        },
        Action::BookingConfirmed { reservation } if state.phase == QuickBookPhase::Confirming => {
            state.phase = QuickBookPhase::Booked;
            state.reservation = Some(reservation);
            state.error = None;
            Step::stay()
        },
        Action::CommandFailed {
            kind: CommandKind::SearchAvailability | CommandKind::ConfirmBooking,
            message,
        } => state.back_to_form(message),
        other => ignore("quick-book", &other),
    }
}
