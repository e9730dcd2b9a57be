use super::SessionRepository;
use crate::interaction::InteractionState;
use crate::types::{Room, UserAccount};
use async_trait::async_trait;
use roombook_runtime::{RepositoryError, StateRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory session store
///
/// Used by tests and by `serve --ephemeral`; everything is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    states: RwLock<HashMap<String, InteractionState>>,
    accounts: RwLock<HashMap<String, UserAccount>>,
    rooms: RwLock<Option<Vec<Room>>>,
}

impl MemoryRepository {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a saved state
    pub async fn session_count(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl StateRepository for MemoryRepository {
    type State = InteractionState;

    async fn load(&self, key: &str) -> Result<Option<InteractionState>, RepositoryError> {
        Ok(self.states.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, state: &InteractionState) -> Result<(), RepositoryError> {
        self.states.write().await.insert(key.to_string(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryRepository {
    async fn get_account(&self, key: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Ok(self.accounts.read().await.get(key).cloned())
    }

    async fn save_account(&self, key: &str, account: &UserAccount) -> Result<(), RepositoryError> {
        self.accounts.write().await.insert(key.to_string(), account.clone());
        Ok(())
    }

    async fn clear_account(&self, key: &str) -> Result<(), RepositoryError> {
        self.accounts.write().await.remove(key);
        Ok(())
    }

    async fn rooms(&self) -> Result<Option<Vec<Room>>, RepositoryError> {
        Ok(self.rooms.read().await.clone())
    }

    async fn save_rooms(&self, rooms: &[Room]) -> Result<(), RepositoryError> {
        *self.rooms.write().await = Some(rooms.to_vec());
        Ok(())
    }
}
