//! # Roombook Runtime
//!
//! Runtime for the Roombook interaction engine.
//!
//! The [`Store`](store::Store) owns the imperative shell around a pure
//! reducer: for every incoming action it loads the session's persisted
//! state, reduces the action, executes the emitted command, feeds the
//! command's outcome back into the reducer, and finally persists the
//! resulting state.
//!
//! ## Core Components
//!
//! - **Store**: per-session load → reduce → execute → fold → save loop
//! - **`StateRepository`**: persistence contract for session state
//! - **`CommandHandler`**: executes command descriptions and reports outcomes
//! - **Retry**: exponential backoff for transient failures
//! - **Metrics**: Prometheus counters and histograms
//!
//! ## Example
//!
//! ```ignore
//! use roombook_runtime::store::Store;
//!
//! let store = Store::new(reducer, environment, handler, repository);
//!
//! // Process one user action for a session and get the resulting state
//! let state = store.send("U024BE7LH", action).await?;
//! ```

use async_trait::async_trait;
use roombook_core::reducer::Reducer;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors raised by a [`StateRepository`](super::StateRepository)
    #[derive(Error, Debug)]
    pub enum RepositoryError {
        /// Underlying storage I/O failed
        #[error("Storage I/O failed: {0}")]
        Io(#[from] std::io::Error),

        /// Stored data could not be encoded or decoded
        #[error("Stored data is malformed: {0}")]
        Serialization(String),

        /// The repository cannot serve requests at all
        #[error("Repository unavailable: {0}")]
        Unavailable(String),
    }

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Loading the session state failed
        #[error("Failed to load session {key}: {source}")]
        Load {
            /// Session key
            key: String,
            /// Repository failure
            #[source]
            source: RepositoryError,
        },

        /// Saving the session state failed
        #[error("Failed to save session {key}: {source}")]
        Save {
            /// Session key
            key: String,
            /// Repository failure
            #[source]
            source: RepositoryError,
        },

        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

pub use error::{RepositoryError, StoreError};

/// Persistence contract for per-session state.
///
/// Only the read/write contract matters to the store; schema and storage
/// engine are up to the implementation.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// State persisted per session key
    type State: Send + Sync;

    /// Load the state for `key`, `None` if the session was never saved
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be read.
    async fn load(&self, key: &str) -> Result<Option<Self::State>, RepositoryError>;

    /// Persist the state for `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be written.
    async fn save(&self, key: &str, state: &Self::State) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<T> StateRepository for Arc<T>
where
    T: StateRepository + ?Sized,
{
    type State = T::State;

    async fn load(&self, key: &str) -> Result<Option<Self::State>, RepositoryError> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, state: &Self::State) -> Result<(), RepositoryError> {
        (**self).save(key, state).await
    }
}

/// Executes command descriptions emitted by a reducer.
///
/// Execution never fails from the store's point of view: failures are
/// reported as outcome actions so the reducer can fold them into state.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command type consumed
    type Command: Send + 'static;

    /// Outcome action type produced
    type Action: Send + 'static;

    /// Execute `command` for `session_key`; the returned action, if any, is
    /// fed back into the reducer.
    async fn execute(&self, session_key: &str, command: Self::Command) -> Option<Self::Action>;

    /// Short label for logs and metrics
    fn label(_command: &Self::Command) -> &'static str {
        "command"
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of commands executed for a single incoming action
    pub max_feedback_steps: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_feedback_steps: 8,
        }
    }
}

impl StoreConfig {
    /// Set the feedback step limit
    #[must_use]
    pub const fn with_max_feedback_steps(mut self, steps: usize) -> Self {
        self.max_feedback_steps = steps;
        self
    }
}

/// Store module - the runtime coordinator
pub mod store {
    use super::{
        Arc, AtomicBool, CommandHandler, Duration, HashMap, Instant, Mutex, Ordering, Reducer,
        StateRepository, StoreConfig, StoreError,
    };
    use crate::metrics::SessionMetrics;

    /// The Store - runtime coordinator for a session reducer
    ///
    /// The Store manages:
    /// 1. Reducer (business logic)
    /// 2. Environment (injected dependencies)
    /// 3. Command execution (with feedback loop)
    /// 4. Session persistence
    ///
    /// `send` calls for the same session key are serialized; calls for
    /// different keys run concurrently.
    ///
    /// # Type Parameters
    ///
    /// - `R`: Reducer implementation
    /// - `H`: Command handler
    /// - `P`: State repository
    pub struct Store<R, H, P>
    where
        R: Reducer,
    {
        reducer: R,
        environment: R::Environment,
        handler: H,
        repository: P,
        config: StoreConfig,
        locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
        shutdown: AtomicBool,
    }

    impl<R, H, P> Store<R, H, P>
    where
        R: Reducer + Send + Sync,
        R::State: Default + Clone + Send + Sync,
        R::Action: Send,
        R::Command: Send + 'static,
        R::Environment: Send + Sync,
        H: CommandHandler<Command = R::Command, Action = R::Action>,
        P: StateRepository<State = R::State>,
    {
        /// Create a store with default configuration
        #[must_use]
        pub fn new(reducer: R, environment: R::Environment, handler: H, repository: P) -> Self {
            Self {
                reducer,
                environment,
                handler,
                repository,
                config: StoreConfig::default(),
                locks: Mutex::new(HashMap::new()),
                shutdown: AtomicBool::new(false),
            }
        }

        /// Replace the configuration
        #[must_use]
        pub fn with_config(mut self, config: StoreConfig) -> Self {
            self.config = config;
            self
        }

        /// Injected environment
        pub const fn environment(&self) -> &R::Environment {
            &self.environment
        }

        /// Command handler
        pub const fn handler(&self) -> &H {
            &self.handler
        }

        /// State repository
        pub const fn repository(&self) -> &P {
            &self.repository
        }

        /// Process one action for `session_key` and return the persisted state.
        ///
        /// 1. Loads the session state (default state for unknown sessions)
        /// 2. Reduces the action
        /// 3. Executes the emitted command, feeding its outcome back
        /// 4. Repeats until no command is emitted or the step limit is hit
        /// 5. Saves the final state
        ///
        /// # Errors
        ///
        /// Returns [`StoreError`] when the store is shutting down or the
        /// repository fails.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, session_key: &str, action: R::Action) -> Result<R::State, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(StoreError::ShutdownInProgress);
            }

            let started = Instant::now();
            let lock = self.session_lock(session_key).await;
            let result = {
                let _guard = lock.lock().await;
                self.process(session_key, action).await
            };
            self.release_lock(session_key, lock).await;

            SessionMetrics::record_send(started.elapsed());
            result
        }

        /// Read the persisted state for `session_key`
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Load`] if the repository fails.
        pub async fn state(&self, session_key: &str) -> Result<Option<R::State>, StoreError> {
            self.repository
                .load(session_key)
                .await
                .map_err(|source| StoreError::Load {
                    key: session_key.to_string(),
                    source,
                })
        }

        /// Overwrite the state for `session_key` (session open, logout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError`] when the store is shutting down or the
        /// repository fails.
        pub async fn reset(&self, session_key: &str, state: R::State) -> Result<R::State, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(StoreError::ShutdownInProgress);
            }

            let lock = self.session_lock(session_key).await;
            let result = {
                let _guard = lock.lock().await;
                self.persist(session_key, &state).await.map(|()| state)
            };
            self.release_lock(session_key, lock).await;
            result
        }

        /// Run `command` under the session lock, then overwrite the state.
        ///
        /// Used for teardown (logout) that must not interleave with an
        /// in-flight `send`. The command's outcome is discarded.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError`] when the store is shutting down or the
        /// repository fails.
        pub async fn execute_and_reset(
            &self,
            session_key: &str,
            command: R::Command,
            state: R::State,
        ) -> Result<R::State, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(StoreError::ShutdownInProgress);
            }

            let lock = self.session_lock(session_key).await;
            let result = {
                let _guard = lock.lock().await;
                let label = H::label(&command);
                SessionMetrics::record_command(label);
                if self.handler.execute(session_key, command).await.is_some() {
                    tracing::debug!(session = session_key, command = label, "Outcome dropped on reset");
                }
                self.persist(session_key, &state).await.map(|()| state)
            };
            self.release_lock(session_key, lock).await;
            result
        }

        /// Stop accepting new actions
        pub fn shutdown(&self) {
            self.shutdown.store(true, Ordering::Release);
            tracing::info!("Store shutdown requested");
        }

        async fn process(&self, session_key: &str, action: R::Action) -> Result<R::State, StoreError> {
            let mut state = self.state(session_key).await?.unwrap_or_default();

            let mut next = Some(action);
            let mut steps = 0;
            while let Some(action) = next.take() {
                SessionMetrics::record_action();
                let Some(command) = self.reducer.reduce(&mut state, action, &self.environment) else {
                    break;
                };

                if steps >= self.config.max_feedback_steps {
                    SessionMetrics::record_feedback_limit();
                    tracing::warn!(
                        session = session_key,
                        steps,
                        command = H::label(&command),
                        "Feedback step limit reached, dropping command"
                    );
                    break;
                }
                steps += 1;

                let label = H::label(&command);
                SessionMetrics::record_command(label);
                let command_started = Instant::now();
                next = self.handler.execute(session_key, command).await;
                tracing::debug!(
                    session = session_key,
                    command = label,
                    elapsed_ms = duration_ms(command_started.elapsed()),
                    produced_outcome = next.is_some(),
                    "Command executed"
                );
            }

            self.persist(session_key, &state).await?;
            Ok(state)
        }

        async fn persist(&self, session_key: &str, state: &R::State) -> Result<(), StoreError> {
            self.repository
                .save(session_key, state)
                .await
                .map_err(|source| StoreError::Save {
                    key: session_key.to_string(),
                    source,
                })
        }

        async fn session_lock(&self, session_key: &str) -> Arc<Mutex<()>> {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(session_key.to_string()).or_default())
        }

        // Drops the map entry once no other caller holds or waits on it.
        async fn release_lock(&self, session_key: &str, lock: Arc<Mutex<()>>) {
            let mut locks = self.locks.lock().await;
            if Arc::strong_count(&lock) == 2 {
                locks.remove(session_key);
            }
        }
    }

    fn duration_ms(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::store::Store;
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Tally {
        count: u32,
        pending: bool,
    }

    #[derive(Debug)]
    enum TallyAction {
        Bump,
        Bumped,
        Spin,
    }

    #[derive(Debug)]
    enum TallyCommand {
        Persist,
        Loop,
    }

    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = Tally;
        type Action = TallyAction;
        type Command = TallyCommand;
        type Environment = ();

        fn reduce(&self, state: &mut Tally, action: TallyAction, (): &()) -> Option<TallyCommand> {
            match action {
                TallyAction::Bump => {
                    state.pending = true;
                    Some(TallyCommand::Persist)
                },
                TallyAction::Bumped => {
                    state.pending = false;
                    state.count += 1;
                    None
                },
                TallyAction::Spin => Some(TallyCommand::Loop),
            }
        }
    }

    struct SlowHandler {
        executed: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl CommandHandler for SlowHandler {
        type Command = TallyCommand;
        type Action = TallyAction;

        async fn execute(&self, _session_key: &str, command: TallyCommand) -> Option<TallyAction> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match command {
                TallyCommand::Persist => Some(TallyAction::Bumped),
                TallyCommand::Loop => Some(TallyAction::Spin),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStates {
        states: Mutex<HashMap<String, Tally>>,
    }

    #[async_trait]
    impl StateRepository for MemoryStates {
        type State = Tally;

        async fn load(&self, key: &str) -> Result<Option<Tally>, RepositoryError> {
            Ok(self.states.lock().await.get(key).cloned())
        }

        async fn save(&self, key: &str, state: &Tally) -> Result<(), RepositoryError> {
            self.states.lock().await.insert(key.to_string(), state.clone());
            Ok(())
        }
    }

    fn store(delay: Duration) -> Store<TallyReducer, SlowHandler, MemoryStates> {
        Store::new(
            TallyReducer,
            (),
            SlowHandler {
                executed: AtomicUsize::new(0),
                delay,
            },
            MemoryStates::default(),
        )
    }

    #[tokio::test]
    async fn send_folds_command_outcome_and_persists() {
        let store = store(Duration::ZERO);

        let state = store.send("alice", TallyAction::Bump).await.unwrap();

        assert_eq!(state, Tally { count: 1, pending: false });
        assert_eq!(store.state("alice").await.unwrap(), Some(state));
        assert_eq!(store.handler().executed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_sends_for_same_session_are_serialized() {
        let store = Arc::new(store(Duration::from_millis(20)));

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send("alice", TallyAction::Bump).await }
        });
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send("alice", TallyAction::Bump).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let state = store.state("alice").await.unwrap().unwrap();
        assert_eq!(state.count, 2);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = store(Duration::ZERO);

        store.send("alice", TallyAction::Bump).await.unwrap();
        store.send("alice", TallyAction::Bump).await.unwrap();
        store.send("bob", TallyAction::Bump).await.unwrap();

        assert_eq!(store.state("alice").await.unwrap().unwrap().count, 2);
        assert_eq!(store.state("bob").await.unwrap().unwrap().count, 1);
        assert!(store.state("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn feedback_loop_is_bounded() {
        let store = store(Duration::ZERO).with_config(StoreConfig::default().with_max_feedback_steps(3));

        store.send("alice", TallyAction::Spin).await.unwrap();

        assert_eq!(store.handler().executed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn reset_overwrites_state() {
        let store = store(Duration::ZERO);
        store.send("alice", TallyAction::Bump).await.unwrap();

        store.reset("alice", Tally::default()).await.unwrap();

        assert_eq!(store.state("alice").await.unwrap(), Some(Tally::default()));
    }

    #[tokio::test]
    async fn execute_and_reset_waits_for_in_flight_send() {
        let store = Arc::new(store(Duration::from_millis(50)));
        let in_flight = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.send("alice", TallyAction::Bump).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        store
            .execute_and_reset("alice", TallyCommand::Persist, Tally::default())
            .await
            .unwrap();
        in_flight.await.unwrap().unwrap();

        // The send finished and saved first, so the reset is what remains
        assert_eq!(store.state("alice").await.unwrap(), Some(Tally::default()));
        assert_eq!(store.handler().executed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = store(Duration::ZERO);
        store.shutdown();

        let result = store.send("alice", TallyAction::Bump).await;

        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }
}
