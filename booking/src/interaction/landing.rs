use super::{
    Action, BrowseState, CalendarState, Command, CommandKind, InteractionEnvironment, InteractionState,
    LoginState, QuickBookState, ReservationsState, Step, ignore,
};
use serde::{Deserialize, Serialize};

/// Main menu
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandingState {
    /// Last known balance, `None` until refreshed
    pub credits: Option<f64>,
    /// Last error
    pub error: Option<String>,
}

impl LandingState {
    /// Menu showing a known balance
    #[must_use]
    pub const fn with_credits(credits: f64) -> Self {
        Self {
            credits: Some(credits),
            error: None,
        }
    }
}

pub(super) fn reduce(state: &mut LandingState, action: Action, env: &InteractionEnvironment) -> Step {
    match action {
        Action::User(user) => match user.action_id.as_str() {
            "quick-book" => Step::Goto(InteractionState::QuickBook(QuickBookState::default()), None),
            "browse" => Step::Goto(InteractionState::Browse(BrowseState::default()), None),
            "reservations" => Step::Goto(
                InteractionState::Reservations(ReservationsState::loading()),
                Some(Command::ListReservations),
            ),
            "calendar" => {
                let today = env.today();
                Step::Goto(
                    InteractionState::Calendar(CalendarState::new(today)),
                    Some(Command::LoadCalendar { date: today }),
                )
            },
            "refresh" => Step::emit(Command::ShowLanding),
            "logout" => Step::Goto(InteractionState::Login(LoginState::default()), Some(Command::Logout)),
            other => {
                tracing::debug!(action_id = other, "Unknown landing action");
                Step::stay()
            },
        },
        Action::AccountRefreshed { credits } => {
            state.credits = Some(credits);
            state.error = None;
            Step::stay()
        },
        Action::CommandFailed {
            kind: CommandKind::ShowLanding,
            message,
        } => {
            state.error = Some(message);
            Step::stay()
        },
        other => ignore("landing", &other),
    }
}
