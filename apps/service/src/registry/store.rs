use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::file::{self, FileState, RegistryFile, WriteMode};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("registry is not a JSON array of URIs: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode registry: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result of [`RegistryStore::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

/// Result of [`RegistryStore::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// On-disk entry. Older registries stored objects with a `uri` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Uri(String),
    Legacy { uri: String },
}

impl From<StoredEntry> for String {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Uri(uri) | StoredEntry::Legacy { uri } => uri,
        }
    }
}

/// The single owner of the monitored-URI registry.
///
/// Each operation takes the lock for its whole load, mutate and persist
/// sequence, so the command loop and the poller never interleave file I/O.
pub struct RegistryStore {
    file: Mutex<Box<dyn RegistryFile>>,
}

impl RegistryStore {
    pub fn new(file: Box<dyn RegistryFile>) -> Self {
        Self { file: Mutex::new(file) }
    }

    /// Open the registry at `path`, creating it if it does not exist
    pub async fn open(path: &Path, mode: WriteMode) -> Result<(Self, FileState), RegistryError> {
        let (medium, state) = file::open(path, mode).await?;
        Ok((Self::new(medium), state))
    }

    /// Read the full registry. An empty file is an empty registry.
    pub async fn load(&self) -> Result<Vec<String>, RegistryError> {
        let mut file = self.file.lock().await;
        read_registry(file.as_mut()).await
    }

    /// Same as [`load`](Self::load); never writes.
    pub async fn list(&self) -> Result<Vec<String>, RegistryError> {
        self.load().await
    }

    /// Append `uri` unless an identical string is already registered
    pub async fn add(&self, uri: &str) -> Result<AddOutcome, RegistryError> {
        let mut file = self.file.lock().await;
        let mut uris = read_registry(file.as_mut()).await?;

        if uris.iter().any(|existing| existing == uri) {
            debug!(uri, "URI already registered");
            return Ok(AddOutcome::AlreadyExists);
        }

        uris.push(uri.to_owned());
        write_registry(file.as_mut(), &uris).await?;

        info!(uri, count = uris.len(), "Added URI to registry");
        Ok(AddOutcome::Added)
    }

    /// Remove the first entry equal to `uri`. The file is left untouched
    /// when nothing matched.
    pub async fn remove(&self, uri: &str) -> Result<RemoveOutcome, RegistryError> {
        let mut file = self.file.lock().await;
        let mut uris = read_registry(file.as_mut()).await?;

        let Some(index) = uris.iter().position(|existing| existing == uri) else {
            debug!(uri, "URI not registered, nothing to remove");
            return Ok(RemoveOutcome::NotFound);
        };

        uris.remove(index);
        write_registry(file.as_mut(), &uris).await?;

        info!(uri, count = uris.len(), "Removed URI from registry");
        Ok(RemoveOutcome::Removed)
    }
}

async fn read_registry(file: &mut dyn RegistryFile) -> Result<Vec<String>, RegistryError> {
    let bytes = file.read_all().await?;
    decode(&bytes)
}

async fn write_registry(file: &mut dyn RegistryFile, uris: &[String]) -> Result<(), RegistryError> {
    let bytes = serde_json::to_vec(uris).map_err(RegistryError::Encode)?;
    file.overwrite(&bytes).await?;
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<Vec<String>, RegistryError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let entries: Vec<StoredEntry> = serde_json::from_slice(bytes).map_err(RegistryError::Decode)?;
    Ok(entries.into_iter().map(String::from).collect())
}
