use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::types::Snapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to create snapshot directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("snapshot {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("failed to write snapshot {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Writes each snapshot to `<root>/<YYYY-MM-DD>/<HH-MM-SS>.json`.
///
/// Files are created exclusively and never touched again.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
}

impl SnapshotWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location a snapshot taken at `taken_at` is written to
    pub fn path_for(&self, taken_at: &DateTime<Local>) -> PathBuf {
        self.root
            .join(taken_at.format("%Y-%m-%d").to_string())
            .join(format!("{}.json", taken_at.format("%H-%M-%S")))
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(&snapshot.taken_at);
        let body = encode(snapshot)?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| SnapshotError::CreateDir { path: dir.to_path_buf(), source })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => SnapshotError::AlreadyExists(path.clone()),
                _ => SnapshotError::Io { path: path.clone(), source },
            })?;

        file.write_all(&body)
            .await
            .map_err(|source| SnapshotError::Io { path: path.clone(), source })?;
        file.flush().await.map_err(|source| SnapshotError::Io { path: path.clone(), source })?;

        debug!(path = %path.display(), entries = snapshot.len(), "Snapshot written");
        Ok(path)
    }
}

/// Tab-indented JSON array of the snapshot's outcomes
fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    snapshot.outcomes.serialize(&mut serializer)?;
    Ok(buf)
}
