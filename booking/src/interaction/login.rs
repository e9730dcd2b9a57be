use super::{Action, Command, CommandKind, InteractionState, LandingState, Step, ignore};
use crate::types::Credentials;
use serde::{Deserialize, Serialize};

/// Login form
///
/// The password is never stored; it only travels inside the `Login` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    /// Last submitted email, kept to pre-fill the form
    pub email: String,
    /// A `Login` command is in flight
    pub pending: bool,
    /// Last error
    pub error: Option<String>,
}

impl LoginState {
    /// Login form showing `error`
    #[must_use]
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

pub(super) fn reduce(state: &mut LoginState, action: Action) -> Step {
    match action {
        Action::User(user) if user.action_id == "login" => {
            let (Some(email), Some(password)) = (user.values.get("email"), user.values.get("password")) else {
                state.error = Some("email and password are required".to_string());
                return Step::stay();
            };
            state.email = email.to_string();
            state.pending = true;
            state.error = None;
            Step::emit(Command::Login {
                credentials: Credentials {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            })
        },
        Action::LoggedIn { credits } => {
            Step::Goto(InteractionState::Landing(LandingState::with_credits(credits)), None)
        },
        Action::CommandFailed {
            kind: CommandKind::Login,
            message,
        } => {
            state.pending = false;
            state.error = Some(message);
            Step::stay()
        },
        other => ignore("login", &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Values;
    use crate::interaction::test_support::test;

    fn submit(email: &str, password: &str) -> Action {
        Action::submit("login", Values::new().with("email", email).with("password", password))
    }

    #[test]
    fn missing_fields_stay_with_error() {
        test()
            .given_state(InteractionState::default())
            .when_action(submit("ada@example.com", " "))
            .then_state(|state| assert_eq!(state.error(), Some("email and password are required")))
            .then_command(|command| assert!(command.is_none()))
            .run();
    }

    #[test]
    fn complete_form_emits_login() {
        test()
            .given_state(InteractionState::default())
            .when_action(submit("ada@example.com", "hunter2"))
            .then_state(|state| {
                let InteractionState::Login(login) = state else {
                    unreachable!("still on login")
                };
                assert!(login.pending);
                assert_eq!(login.email, "ada@example.com");
            })
            .then_command(|command| {
                assert!(matches!(
                    command,
                    Some(Command::Login { credentials }) if credentials.password == "hunter2"
                ));
            })
            .run();
    }

    #[test]
    fn success_lands_with_balance() {
        test()
            .given_state(InteractionState::default())
            .when_action(submit("ada@example.com", "hunter2"))
            .when_action(Action::LoggedIn { credits: 12.0 })
            .then_state(|state| {
                assert_eq!(*state, InteractionState::Landing(LandingState::with_credits(12.0)));
            })
            .run();
    }

    #[test]
    fn rejected_credentials_show_error() {
        test()
            .given_state(InteractionState::default())
            .when_action(submit("ada@example.com", "wrong"))
            .when_action(Action::failed(CommandKind::Login, "invalid email or password"))
            .then_state(|state| {
                assert_eq!(state.name(), "login");
                assert_eq!(state.error(), Some("invalid email or password"));
            })
            .then_command(|command| assert!(command.is_none()))
            .run();
    }

    #[test]
    fn other_buttons_are_ignored() {
        test()
            .given_state(InteractionState::default())
            .when_action(Action::user("browse"))
            .then_state(|state| assert_eq!(*state, InteractionState::default()))
            .run();
    }
}
