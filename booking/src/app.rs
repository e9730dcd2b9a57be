//! Application wiring.
//!
//! [`RoombookApp`] owns the session store and is shared by every surface:
//! the chat webhook server, the terminal driver and the one-shot CLI
//! commands.

use crate::client::HttpBookingService;
use crate::config::Config;
use crate::executor::BookingEffects;
use crate::fast_path::{self, BookRequest, BookingSummary};
use crate::interaction::{Action, Command, InteractionEnvironment, InteractionReducer, InteractionState};
use crate::repository::{FileRepository, MemoryRepository, SessionRepository};
use crate::service::BookingService;
use crate::types::Room;
use anyhow::Context;
use roombook_core::environment::{Clock, SystemClock};
use roombook_runtime::store::Store;
use roombook_runtime::StoreError;
use std::sync::Arc;

/// Session key used by the terminal and the one-shot CLI commands
pub const TERMINAL_SESSION: &str = "terminal";

/// Store type driving every session
pub type BookingStore = Store<InteractionReducer, BookingEffects, Arc<dyn SessionRepository>>;

/// The assembled engine
#[derive(Clone)]
pub struct RoombookApp {
    store: Arc<BookingStore>,
}

impl RoombookApp {
    /// Wire the engine from its collaborators
    #[must_use]
    pub fn new(
        config: &Config,
        service: Arc<dyn BookingService>,
        repository: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let environment = InteractionEnvironment::new(clock, config.api.timezone);
        let effects = BookingEffects::new(service, Arc::clone(&repository), config.calendar.fetch_timeout);
        let store = Store::new(InteractionReducer::new(), environment, effects, repository);
        Self { store: Arc::new(store) }
    }

    /// Production wiring: HTTP client, JSON files under the data dir, system clock
    ///
    /// # Errors
    ///
    /// Fails if the data directory cannot be created or the HTTP client
    /// cannot be built.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let repository = FileRepository::open(&config.data_dir)
            .await
            .with_context(|| format!("cannot open data directory {}", config.data_dir.display()))?;
        let service = HttpBookingService::new(config.api.clone()).context("cannot build HTTP client")?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            api = %config.api.base_url,
            timezone = %config.api.timezone,
            "Application wired"
        );
        Ok(Self::new(config, Arc::new(service), Arc::new(repository), Arc::new(SystemClock)))
    }

    /// In-memory sessions over `service`, for demos and tests
    #[must_use]
    pub fn in_memory(config: &Config, service: Arc<dyn BookingService>, clock: Arc<dyn Clock>) -> Self {
        Self::new(config, service, Arc::new(MemoryRepository::new()), clock)
    }

    /// Session store
    #[must_use]
    pub fn store(&self) -> &Arc<BookingStore> {
        &self.store
    }

    /// Session repository
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        self.store.repository()
    }

    /// Booking service
    #[must_use]
    pub fn service(&self) -> &Arc<dyn BookingService> {
        self.store.handler().service()
    }

    /// Start (or restart) a session: `Landing` with a fresh balance when an
    /// account is stored for `session_key`, `Login` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the state cannot be persisted.
    pub async fn open_session(&self, session_key: &str) -> Result<InteractionState, StoreError> {
        let account = match self.repository().get_account(session_key).await {
            Ok(account) => account,
            Err(error) => {
                tracing::warn!(session = session_key, %error, "Stored account unreadable, asking for login");
                None
            },
        };
        let entry = self.store.reset(session_key, InteractionState::entry(account.as_ref())).await?;
        if matches!(entry, InteractionState::Landing(_)) {
            return self.store.send(session_key, Action::user("refresh")).await;
        }
        Ok(entry)
    }

    /// Feed one action to a session
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session cannot be loaded or saved.
    pub async fn interact(&self, session_key: &str, action: Action) -> Result<InteractionState, StoreError> {
        self.store.send(session_key, action).await
    }

    /// Persisted state of a session, if any
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the repository fails.
    pub async fn session(&self, session_key: &str) -> Result<Option<InteractionState>, StoreError> {
        self.store.state(session_key).await
    }

    /// Log the session out from any state
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the reset state cannot be persisted.
    pub async fn logout(&self, session_key: &str) -> Result<InteractionState, StoreError> {
        self.store
            .execute_and_reset(session_key, Command::Logout, InteractionState::default())
            .await
    }

    /// One-shot booking for a logged-in session
    ///
    /// # Errors
    ///
    /// Fails when the session has no account or any booking step fails.
    pub async fn book(&self, session_key: &str, request: &BookRequest) -> anyhow::Result<BookingSummary> {
        let mut account = self
            .repository()
            .get_account(session_key)
            .await?
            .context("not logged in, run `roombook login` first")?;
        let now = self.store.environment().local_now();

        let summary = fast_path::book(self.service().as_ref(), &account, request, now).await?;

        account.credit_balance = summary.credits_left;
        if let Err(error) = self.repository().save_account(session_key, &account).await {
            tracing::warn!(session = session_key, %error, "Could not store balance after booking");
        }
        Ok(summary)
    }

    /// Room catalogue for a logged-in session, cached after the first fetch
    ///
    /// # Errors
    ///
    /// Fails when the session has no account or the catalogue cannot be fetched.
    pub async fn rooms(&self, session_key: &str) -> anyhow::Result<Vec<Room>> {
        let account = self
            .repository()
            .get_account(session_key)
            .await?
            .context("not logged in, run `roombook login` first")?;
        self.store
            .handler()
            .rooms(&account)
            .await
            .map_err(|failure| anyhow::anyhow!("cannot list rooms: {failure}"))
    }

    /// Stop accepting actions
    pub fn shutdown(&self) {
        self.store.shutdown();
    }
}
