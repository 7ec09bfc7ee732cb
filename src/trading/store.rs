use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::error::LedgerError;
use crate::trading::ledger::Session;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot '{0}' not found")]
    NotFound(String),

    #[error("invalid snapshot name '{0}'")]
    InvalidName(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("snapshot '{name}' is inconsistent: {source}")]
    Inconsistent { name: String, source: LedgerError },
}

/// Persistence for whole-session snapshots.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, name: &str, session: &Session) -> Result<(), StoreError>;
    async fn load(&self, name: &str) -> Result<Session, StoreError>;
}

/// Pretty JSON snapshots under a directory, one file per name.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, name: &str, session: &Session) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&path, json).await?;
        info!("Session snapshot saved to {}", path.display());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Session, StoreError> {
        let path = self.path_for(name)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&content)?;
        session
            .check_integrity()
            .map_err(|source| StoreError::Inconsistent {
                name: name.to_string(),
                source,
            })?;
        info!("Session snapshot loaded from {}", path.display());
        Ok(session)
    }
}
