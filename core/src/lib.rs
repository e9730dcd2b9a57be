//! # Roombook Core
//!
//! Core traits for the Roombook interaction engine.
//!
//! The engine is built around a single idea: every user-facing surface is a
//! state machine whose transition function is pure. Side effects are not
//! performed by the transition function; it only *describes* the next thing
//! that must happen as a command value, and a runtime executes it.
//!
//! ## Core Concepts
//!
//! - **State**: The persisted interaction state of one session
//! - **Action**: Everything that can happen to a session (user input, command outcomes)
//! - **Command**: A description of a side-effecting request (at most one per transition)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Command?)`
//! - **Environment**: Injected dependencies (clock, locale)
//!
//! ## Example
//!
//! ```ignore
//! use roombook_core::reducer::Reducer;
//!
//! impl Reducer for LoginReducer {
//!     type State = LoginState;
//!     type Action = LoginAction;
//!     type Command = LoginCommand;
//!     type Environment = LoginEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut LoginState,
//!         action: LoginAction,
//!         env: &LoginEnvironment,
//!     ) -> Option<LoginCommand> {
//!         // Business logic goes here
//!         None
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// Reducer module - the core trait for interaction logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Command?)`
///
/// They hold all business rules and are deterministic given their inputs,
/// which is what makes them testable without any I/O.
pub mod reducer {
    /// The Reducer trait - core abstraction for interaction logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Command`: The side-effect descriptions this reducer may emit
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The command type describing requested side effects
        type Command;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into a state change and at most one command
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates (or replaces) the state in place
        /// 3. Returns the command the caller must execute, if any
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Option<Self::Command>;
    }
}

/// Environment module - dependency injection traits
///
/// Anything a reducer would otherwise read from ambient global state
/// (wall-clock time in particular) is abstracted behind a trait and
/// injected via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use roombook_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};
    use super::reducer::Reducer;

    struct Toggle;

    impl Reducer for Toggle {
        type State = bool;
        type Action = ();
        type Command = &'static str;
        type Environment = ();

        fn reduce(&self, state: &mut bool, (): (), (): &()) -> Option<&'static str> {
            *state = !*state;
            state.then_some("switched-on")
        }
    }

    #[test]
    fn reducer_emits_command_only_when_requested() {
        let mut state = false;
        assert_eq!(Toggle.reduce(&mut state, (), &()), Some("switched-on"));
        assert_eq!(Toggle.reduce(&mut state, (), &()), None);
        assert!(!state);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
