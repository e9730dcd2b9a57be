//! Session persistence.
//!
//! A session key maps to its [`InteractionState`] and, once logged in, to the
//! [`UserAccount`] used for service calls. The room catalogue is cached next
//! to the sessions since it does not change between users.

use crate::interaction::InteractionState;
use crate::types::{Room, UserAccount};
use async_trait::async_trait;
use roombook_runtime::{RepositoryError, StateRepository};
use std::sync::Arc;

mod file;
mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

/// Session store used by the interaction engine
///
/// `load`/`save` come from [`StateRepository`]; the remaining methods cover
/// the account and the room catalogue cache.
#[async_trait]
pub trait SessionRepository: StateRepository<State = InteractionState> {
    /// Account stored for `key`, `None` when logged out
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be read.
    async fn get_account(&self, key: &str) -> Result<Option<UserAccount>, RepositoryError>;

    /// Store the account for `key`
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be written.
    async fn save_account(&self, key: &str, account: &UserAccount) -> Result<(), RepositoryError>;

    /// Forget the account for `key`
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be written.
    async fn clear_account(&self, key: &str) -> Result<(), RepositoryError>;

    /// Cached room catalogue, `None` until first saved
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be read.
    async fn rooms(&self) -> Result<Option<Vec<Room>>, RepositoryError>;

    /// Replace the cached room catalogue
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage cannot be written.
    async fn save_rooms(&self, rooms: &[Room]) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<T> SessionRepository for Arc<T>
where
    T: SessionRepository + ?Sized,
{
    async fn get_account(&self, key: &str) -> Result<Option<UserAccount>, RepositoryError> {
        (**self).get_account(key).await
    }

    async fn save_account(&self, key: &str, account: &UserAccount) -> Result<(), RepositoryError> {
        (**self).save_account(key, account).await
    }

    async fn clear_account(&self, key: &str) -> Result<(), RepositoryError> {
        (**self).clear_account(key).await
    }

    async fn rooms(&self) -> Result<Option<Vec<Room>>, RepositoryError> {
        (**self).rooms().await
    }

    async fn save_rooms(&self, rooms: &[Room]) -> Result<(), RepositoryError> {
        (**self).save_rooms(rooms).await
    }
}
