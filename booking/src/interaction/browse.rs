use super::{Action, Command, CommandKind, InteractionEnvironment, Step, Values, ignore};
use crate::error::BookingError;
use crate::query::{QueryInput, parse_query, validate_start};
use crate::selection::{ensure_affordable, select_room};
use crate::types::{BookingQuery, Reservation, Room};
use serde::{Deserialize, Serialize};

/// Where the browse flow is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowsePhase {
    /// Collecting date, time, duration and capacity
    #[default]
    Criteria,
    /// `SearchAvailability` in flight
    Searching,
    /// Choosing among the free rooms
    PickRoom,
    /// `ConfirmBooking` in flight
    Confirming,
    /// Done
    Booked,
}

/// Search a slot, then pick one of the free rooms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseState {
    /// Current phase
    pub phase: BrowsePhase,
    /// Criteria as typed
    pub input: QueryInput,
    /// Query the rooms were found for
    pub query: Option<BookingQuery>,
    /// Free rooms, in service order
    pub rooms: Vec<Room>,
    /// Balance when the rooms were found
    pub credit_balance: Option<f64>,
    /// Name of the picked room
    pub picked: Option<String>,
    /// Confirmed reservation
    pub reservation: Option<Reservation>,
    /// Last error
    pub error: Option<String>,
}

impl BrowseState {
    fn back_to_criteria(&mut self, error: Option<String>) -> Step {
        self.phase = BrowsePhase::Criteria;
        self.rooms.clear();
        self.picked = None;
        self.credit_balance = None;
        self.error = error;
        Step::stay()
    }

    fn fail(&mut self, error: impl ToString) -> Step {
        self.error = Some(error.to_string());
        Step::stay()
    }

    fn search(&mut self, values: &Values, env: &InteractionEnvironment) -> Step {
        self.input = QueryInput {
            date: values.get("date").map(str::to_string),
            time: values.get("time").map(str::to_string),
            duration: values.text("duration"),
            capacity: values.text("capacity"),
        };
        match parse_query(&self.input, env.local_now()) {
            Ok(query) => {
                self.phase = BrowsePhase::Searching;
                self.query = Some(query);
                self.error = None;
                Step::emit(Command::SearchAvailability { query })
            },
            Err(error) => self.fail(error),
        }
    }

    fn pick(&mut self, values: &Values) -> Step {
        let Some(wanted) = values.get("room") else {
            return self.fail("pick a room first");
        };
        match self.rooms.iter().find(|room| room.id.as_str() == wanted || room.name == wanted) {
            Some(room) => {
                self.picked = Some(room.name.clone());
                self.error = None;
                Step::stay()
            },
            None => self.fail(BookingError::RoomNotFound(wanted.to_string())),
        }
    }

    // Books the searched slot, never a re-derived one; the start may have
    // passed while the user was choosing.
    fn book(&mut self, env: &InteractionEnvironment) -> Step {
        let Some(picked) = self.picked.clone() else {
            return self.fail("pick a room first");
        };
        let Some(query) = self.query else {
            return self.back_to_criteria(None);
        };
        if let Err(error) = validate_start(query.start, env.local_now()) {
            return self.back_to_criteria(Some(error.to_string()));
        }
        let balance = self.credit_balance.unwrap_or_default();
        let selected = select_room(&self.rooms, query.capacity, Some(&picked))
            .and_then(|room| ensure_affordable(balance, room).map(|()| room.clone()));
        match selected {
            Ok(room) => {
                self.phase = BrowsePhase::Confirming;
                self.error = None;
                Step::emit(Command::ConfirmBooking { query, room })
            },
            Err(error) => self.fail(error),
        }
    }
}

pub(super) fn reduce(state: &mut BrowseState, action: Action, env: &InteractionEnvironment) -> Step {
    match action {
        Action::User(user) => match (user.action_id.as_str(), state.phase) {
            ("browse", BrowsePhase::Criteria) => state.search(&user.values, env),
            ("pick-room", BrowsePhase::PickRoom) => state.pick(&user.values),
            ("book", BrowsePhase::PickRoom) => state.book(env),
            ("back", BrowsePhase::PickRoom) => state.back_to_criteria(None),
            ("back" | "cancel", _) => Step::to_landing(),
            _ => Step::stay(),
        },
        Action::RoomsFound { rooms, account } if state.phase == BrowsePhase::Searching => {
            if rooms.is_empty() {
                return state.back_to_criteria(Some(BookingError::NoRoomAvailable.to_string()));
            }
            state.phase = BrowsePhase::PickRoom;
            state.rooms = rooms;
            state.credit_balance = Some(account.credit_balance);
            state.picked = None;
            state.error = None;
            Step::stay()
        },
        Action::BookingConfirmed { reservation } if state.phase == BrowsePhase::Confirming => {
            state.phase = BrowsePhase::Booked;
            state.reservation = Some(reservation);
            state.error = None;
            Step::stay()
        },
        Action::CommandFailed {
            kind: CommandKind::SearchAvailability,
            message,
        } => state.back_to_criteria(Some(message)),
        Action::CommandFailed {
            kind: CommandKind::ConfirmBooking,
            message,
        } => {
            state.phase = BrowsePhase::PickRoom;
            state.error = Some(message);
            Step::stay()
        },
        other => ignore("browse", &other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interaction::InteractionState;
    use crate::interaction::test_support::{env_at, test};
    use crate::types::{AuthTokens, RoomId, UserAccount};
    use roombook_testing::ReducerTest;
    use roombook_testing::assertions::{assert_command, assert_no_command};

    fn browse() -> InteractionState {
        InteractionState::Browse(BrowseState::default())
    }

    fn criteria(date: &str, time: &str, duration: &str) -> Action {
        Action::submit(
            "browse",
            Values::new()
                .with("date", date)
                .with("time", time)
                .with("duration", duration)
                .with("capacity", "1"),
        )
    }

    fn rooms_found(balance: f64) -> Action {
        Action::RoomsFound {
            rooms: vec![
                Room {
                    id: RoomId::new("r1"),
                    name: "Atlas".to_string(),
                    capacity: 6,
                    price: 5.0,
                },
                Room {
                    id: RoomId::new("r2"),
                    name: "Booth".to_string(),
                    capacity: 1,
                    price: 1.0,
                },
            ],
            account: UserAccount {
                tokens: AuthTokens {
                    access: "a".to_string(),
                    refresh: "r".to_string(),
                },
                credit_balance: balance,
            },
        }
    }

    fn pick(room: &str) -> Action {
        Action::submit("pick-room", Values::new().with("room", room))
    }

    fn state_of(state: &InteractionState) -> &BrowseState {
        match state {
            InteractionState::Browse(s) => s,
            other => unreachable!("expected browse, got {}", other.name()),
        }
    }

    #[test]
    fn criteria_errors_stay_inline() {
        for (date, time, duration) in [
            ("2025-03-11", "09:10", "30"),
            ("2025-03-09", "09:15", "30"),
            ("11/03/2025", "09:15", "30"),
            ("2025-03-11", "09:15", "0"),
        ] {
            test()
                .given_state(browse())
                .when_action(criteria(date, time, duration))
                .then_state(|state| {
                    assert_eq!(state_of(state).phase, BrowsePhase::Criteria);
                    assert!(state.error().is_some());
                })
                .then_command(|command| assert_no_command(command))
                .run();
        }
    }

    #[test]
    fn valid_criteria_search() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .then_state(|state| assert_eq!(state_of(state).phase, BrowsePhase::Searching))
            .then_command(|command| {
                assert_command(command, |c| matches!(c, Command::SearchAvailability { .. }));
            })
            .run();
    }

    #[test]
    fn empty_results_roll_back() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(Action::RoomsFound {
                rooms: vec![],
                account: match rooms_found(1.0) {
                    Action::RoomsFound { account, .. } => account,
                    _ => unreachable!(),
                },
            })
            .then_state(|state| {
                assert_eq!(state_of(state).phase, BrowsePhase::Criteria);
                assert_eq!(state.error(), Some("no room available"));
            })
            .run();
    }

    #[test]
    fn picked_room_is_booked_by_name() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(rooms_found(10.0))
            .when_action(pick("r1"))
            .when_action(Action::user("book"))
            .then_state(|state| {
                let browse = state_of(state);
                assert_eq!(browse.phase, BrowsePhase::Confirming);
                assert_eq!(browse.picked.as_deref(), Some("Atlas"));
            })
            .then_command(|command| {
                assert_command(command, |c| matches!(c, Command::ConfirmBooking { room, .. } if room.name == "Atlas"));
            })
            .run();
    }

    #[test]
    fn booking_requires_a_pick() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(rooms_found(10.0))
            .when_action(Action::user("book"))
            .then_state(|state| assert_eq!(state.error(), Some("pick a room first")))
            .then_command(|command| assert_no_command(command))
            .run();
    }

    #[test]
    fn unaffordable_pick_is_refused() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(rooms_found(3.0))
            .when_action(pick("Atlas"))
            .when_action(Action::user("book"))
            .then_state(|state| {
                assert_eq!(state_of(state).phase, BrowsePhase::PickRoom);
                assert!(state.error().unwrap().starts_with("not enough credits"));
            })
            .then_command(|command| assert_no_command(command))
            .run();
    }

    #[test]
    fn slot_gone_stale_goes_back_to_criteria() {
        let mut state = browse();
        let reducer = crate::interaction::InteractionReducer::new();
        let morning = env_at("2025-03-10T08:05:00Z");
        for action in [criteria("2025-03-10", "10:00", "30"), rooms_found(10.0), pick("Booth")] {
            roombook_core::reducer::Reducer::reduce(&reducer, &mut state, action, &morning);
        }

        ReducerTest::new(reducer)
            .with_env(env_at("2025-03-10T09:30:00Z"))
            .given_state(state)
            .when_action(Action::user("book"))
            .then_state(|state| {
                assert_eq!(state_of(state).phase, BrowsePhase::Criteria);
                assert!(state.error().unwrap().contains("in the past"));
            })
            .then_command(|command| assert_no_command(command))
            .run();
    }

    #[test]
    fn defaulted_slot_is_booked_as_searched() {
        let mut state = browse();
        let reducer = crate::interaction::InteractionReducer::new();
        // 09:05 in Paris, blank date and time default to 09:15
        let searched_at = env_at("2025-03-10T08:05:00Z");
        let blank = Action::submit("browse", Values::new().with("duration", "30").with("capacity", "1"));
        let search = roombook_core::reducer::Reducer::reduce(&reducer, &mut state, blank, &searched_at);
        assert!(matches!(search, Some(Command::SearchAvailability { query }) if query.start.format("%H:%M").to_string() == "09:15"));
        for action in [rooms_found(10.0), pick("Booth")] {
            roombook_core::reducer::Reducer::reduce(&reducer, &mut state, action, &searched_at);
        }

        ReducerTest::new(reducer)
            .with_env(env_at("2025-03-10T08:10:00Z"))
            .given_state(state)
            .when_action(Action::user("book"))
            .then_command(|command| {
                assert_command(command, |c| {
                    matches!(c, Command::ConfirmBooking { query, .. } if query.start.format("%H:%M").to_string() == "09:15")
                });
            })
            .run();
    }

    #[test]
    fn defaulted_slot_that_has_passed_is_not_moved() {
        let mut state = browse();
        let reducer = crate::interaction::InteractionReducer::new();
        let searched_at = env_at("2025-03-10T08:05:00Z");
        let blank = Action::submit("browse", Values::new().with("duration", "30").with("capacity", "1"));
        for action in [blank, rooms_found(10.0), pick("Booth")] {
            roombook_core::reducer::Reducer::reduce(&reducer, &mut state, action, &searched_at);
        }

        // 09:16 in Paris, the 09:15 slot has started
        ReducerTest::new(reducer)
            .with_env(env_at("2025-03-10T08:16:00Z"))
            .given_state(state)
            .when_action(Action::user("book"))
            .then_state(|state| {
                assert_eq!(state_of(state).phase, BrowsePhase::Criteria);
                assert!(state.error().unwrap().contains("in the past"));
            })
            .then_command(|command| assert_no_command(command))
            .run();
    }

    #[test]
    fn back_from_room_list_returns_to_criteria() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(rooms_found(10.0))
            .when_action(Action::user("back"))
            .then_state(|state| {
                let browse = state_of(state);
                assert_eq!(browse.phase, BrowsePhase::Criteria);
                assert!(browse.rooms.is_empty());
                assert_eq!(browse.input.time.as_deref(), Some("09:15"));
            })
            .then_command(|command| assert_no_command(command))
            .run();
    }

    #[test]
    fn booking_failure_returns_to_room_list() {
        test()
            .given_state(browse())
            .when_action(criteria("2025-03-11", "09:15", "30"))
            .when_action(rooms_found(10.0))
            .when_action(pick("Booth"))
            .when_action(Action::user("book"))
            .when_action(Action::failed(CommandKind::ConfirmBooking, "booking failed"))
            .then_state(|state| {
                assert_eq!(state_of(state).phase, BrowsePhase::PickRoom);
                assert_eq!(state.error(), Some("booking failed"));
            })
            .run();
    }
}
