use super::{Action, Command, CommandKind, InteractionEnvironment, Step, ignore};
use crate::calendar::Calendar;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Day grid of every room, navigable one day at a time from today onward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarState {
    /// Displayed day
    pub current_date: NaiveDate,
    /// Last grid built for `current_date`
    pub calendar: Option<Calendar>,
    /// `LoadCalendar` in flight
    pub loading: bool,
    /// Last error
    pub error: Option<String>,
}

impl CalendarState {
    /// Calendar waiting for `LoadCalendar(date)`
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self {
            current_date: date,
            calendar: None,
            loading: true,
            error: None,
        }
    }

    fn show(&mut self, date: NaiveDate) -> Step {
        self.current_date = date;
        self.calendar = None;
        self.loading = true;
        self.error = None;
        Step::emit(Command::LoadCalendar { date })
    }
}

pub(super) fn reduce(state: &mut CalendarState, action: Action, env: &InteractionEnvironment) -> Step {
    match action {
        Action::User(user) => match user.action_id.as_str() {
            "next-day" => state.show(state.current_date + Duration::days(1)),
            "prev-day" if state.current_date > env.today() => state.show(state.current_date - Duration::days(1)),
            "prev-day" => Step::stay(),
            "cancel" | "back" => Step::to_landing(),
            _ => Step::stay(),
        },
        // A slow load for a day the user already navigated away from is dropped.
        Action::CalendarLoaded { calendar } if calendar.date == state.current_date => {
            state.calendar = Some(calendar);
            state.loading = false;
            Step::stay()
        },
        Action::CommandFailed {
            kind: CommandKind::LoadCalendar,
            message,
        } => {
            state.loading = false;
            state.error = Some(message);
            Step::stay()
        },
        other => ignore("calendar", &other),
    }
}
