use super::SessionRepository;
use crate::interaction::InteractionState;
use crate::types::{Room, UserAccount};
use async_trait::async_trait;
use roombook_runtime::{RepositoryError, StateRepository};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SESSIONS_DIR: &str = "sessions";
const ACCOUNTS_DIR: &str = "accounts";
const ROOMS_FILE: &str = "rooms.json";

/// JSON files under a data directory
///
/// ```text
/// <root>/sessions/<key>.json   interaction state
/// <root>/accounts/<key>.json   tokens and balance
/// <root>/rooms.json            room catalogue cache
/// ```
///
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Open (and create if needed) the data directory
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Io`] if the directories cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(SESSIONS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(ACCOUNTS_DIR)).await?;
        tracing::debug!(root = %root.display(), "Opened file repository");
        Ok(Self { root })
    }

    /// Data directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, dir: &str, key: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", file_stem(key)))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RepositoryError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", path.display())))
    }

    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Map a session key to a safe file name; bytes outside `[A-Za-z0-9_-]` are
/// hex-escaped so distinct keys never collide.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02x}");
        }
    }
    stem
}

#[async_trait]
impl StateRepository for FileRepository {
    type State = InteractionState;

    async fn load(&self, key: &str) -> Result<Option<InteractionState>, RepositoryError> {
        Self::read_json(&self.entry(SESSIONS_DIR, key)).await
    }

    async fn save(&self, key: &str, state: &InteractionState) -> Result<(), RepositoryError> {
        Self::write_json(&self.entry(SESSIONS_DIR, key), state).await
    }
}

#[async_trait]
impl SessionRepository for FileRepository {
    async fn get_account(&self, key: &str) -> Result<Option<UserAccount>, RepositoryError> {
        Self::read_json(&self.entry(ACCOUNTS_DIR, key)).await
    }

    async fn save_account(&self, key: &str, account: &UserAccount) -> Result<(), RepositoryError> {
        Self::write_json(&self.entry(ACCOUNTS_DIR, key), account).await
    }

    async fn clear_account(&self, key: &str) -> Result<(), RepositoryError> {
        match tokio::fs::remove_file(self.entry(ACCOUNTS_DIR, key)).await {
            Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }

    async fn rooms(&self) -> Result<Option<Vec<Room>>, RepositoryError> {
        Self::read_json(&self.root.join(ROOMS_FILE)).await
    }

    async fn save_rooms(&self, rooms: &[Room]) -> Result<(), RepositoryError> {
        Self::write_json(&self.root.join(ROOMS_FILE), rooms).await
    }
}
