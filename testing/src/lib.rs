//! # Roombook Testing
//!
//! Testing utilities and helpers for the Roombook interaction engine.
//!
//! This crate provides:
//! - Deterministic clocks for time-dependent rules
//! - A Given-When-Then harness for reducers
//! - Assertion helpers for emitted commands
//!
//! ## Example
//!
//! ```ignore
//! use roombook_testing::{ReducerTest, FixedClock};
//!
//! ReducerTest::new(InteractionReducer)
//!     .with_env(env_at(FixedClock::at("2025-03-10T08:00:00Z")))
//!     .given_state(InteractionState::default())
//!     .when_action(Action::user("login"))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use roombook_core::environment::Clock;
use std::sync::RwLock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, RwLock, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until explicitly advanced, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use roombook_testing::mocks::FixedClock;
    /// use roombook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Create a fixed clock from an RFC 3339 timestamp
        ///
        /// # Panics
        ///
        /// Panics if `timestamp` is not valid RFC 3339.
        #[must_use]
        #[allow(clippy::expect_used)]
        pub fn at(timestamp: &str) -> Self {
            Self::new(
                DateTime::parse_from_rfc3339(timestamp)
                    .expect("test timestamp should be RFC 3339")
                    .with_timezone(&Utc),
            )
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if the lock was poisoned by a panicking test thread.
        #[allow(clippy::expect_used)]
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().expect("clock lock poisoned");
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::expect_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().expect("clock lock poisoned")
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 09:00:00 UTC, a Wednesday morning)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::at("2025-01-01T09:00:00Z")
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn advancing_moves_time_forward() {
        let clock = FixedClock::at("2025-01-01T09:00:00Z");
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T10:30:00+00:00");
    }
}
