//! File persistence under a restricted data directory.
//!
//! [`FileStore`] loads and saves any serde value as YAML. Target names are
//! plain file names: anything that could escape the base directory is
//! rejected. Saving writes an exclusively created `<name>.tmp` sibling and
//! renames it over the target, so a reader never sees a half-written file.
//!
//! Configure the base directory via `ircbot.toml`:
//!
//! ```toml
//! [storage]
//! data_dir = "./bot_data"
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Errors raised by [`FileStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No data directory is configured.
    #[error("file operations disabled")]
    Disabled,

    /// The name contains a path separator or is otherwise unusable.
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    /// Nothing to load.
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("malformed data: {0}")]
    Format(#[from] serde_yaml::Error),
}

impl StoreError {
    /// Missing files are the expected failure of a load.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Returns `true` if `name` may be used as a target file name.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[derive(Debug, Clone, Default)]
pub struct FileStore {
    base_dir: Option<PathBuf>,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// A store that refuses every operation.
    pub fn disabled() -> Self {
        Self { base_dir: None }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Full path of `name` inside the base directory.
    pub fn resolve(&self, name: &str) -> StoreResult<PathBuf> {
        let base = self.base_dir.as_ref().ok_or(StoreError::Disabled)?;
        if !is_plain_file_name(name) {
            return Err(StoreError::InvalidFileName(name.to_string()));
        }
        Ok(base.join(name))
    }

    /// Serializes `data` into `name`, replacing it atomically.
    pub async fn save<T>(&self, data: &T, name: &str) -> StoreResult<PathBuf>
    where
        T: Serialize + ?Sized,
    {
        let path = self.resolve(name)?;
        let text = serde_yaml::to_string(data)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let tmp = path.with_file_name(format!("{name}.tmp"));
        // an existing .tmp means another save is in flight
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await?;
        let written = async {
            file.write_all(text.as_bytes()).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), bytes = text.len(), "Saved");
        Ok(path)
    }

    /// Deserializes the content of `name`.
    ///
    /// Merging into existing state is up to the caller.
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> StoreResult<T> {
        let path = self.resolve(name)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };
        let data = serde_yaml::from_str(&text)?;
        debug!(path = %path.display(), "Loaded");
        Ok(data)
    }
}
