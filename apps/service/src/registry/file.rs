use std::ffi::OsString;
use std::fmt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

/// Owner-only read/write
const PERM_CODE: u32 = 0o600;

/// How a mutated registry is written back to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Write a sibling temp file, then rename it over the registry
    #[default]
    Replace,
    /// Truncate the open handle and rewrite it from offset zero
    InPlace,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Replace => write!(f, "replace"),
            WriteMode::InPlace => write!(f, "in_place"),
        }
    }
}

/// What the registry file looked like when it was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// The file did not exist and was created empty
    Created,
    /// The file existed with zero length
    Empty,
    /// The file existed with content
    Populated,
}

/// Backing medium for the registry's serialized form.
///
/// Implementations are not synchronized; the store holds them behind its lock.
#[async_trait]
pub trait RegistryFile: Send {
    /// Read the entire file from its start
    async fn read_all(&mut self) -> io::Result<Vec<u8>>;

    /// Replace the entire file content with `contents`
    async fn overwrite(&mut self, contents: &[u8]) -> io::Result<()>;
}

/// Open (creating if absent) the registry file at `path`.
pub async fn open(path: &Path, mode: WriteMode) -> io::Result<(Box<dyn RegistryFile>, FileState)> {
    let state = match fs::metadata(path).await {
        Ok(meta) if meta.len() == 0 => FileState::Empty,
        Ok(_) => FileState::Populated,
        Err(e) if e.kind() == io::ErrorKind::NotFound => FileState::Created,
        Err(e) => return Err(e),
    };

    let file = open_options().read(true).write(true).create(true).open(path).await?;
    debug!(path = %path.display(), ?state, %mode, "Opened registry file");

    let medium: Box<dyn RegistryFile> = match mode {
        WriteMode::InPlace => Box::new(InPlaceFile::new(file)),
        WriteMode::Replace => {
            drop(file);
            Box::new(ReplaceFile::new(path))
        }
    };

    Ok((medium, state))
}

fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    options.mode(PERM_CODE);
    options
}

/// Single long-lived handle rewritten in place.
///
/// A failure after the truncate leaves the file empty.
pub struct InPlaceFile {
    file: File,
}

impl InPlaceFile {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

#[async_trait]
impl RegistryFile for InPlaceFile {
    async fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(0)).await?;
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn overwrite(&mut self, contents: &[u8]) -> io::Result<()> {
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(contents).await?;
        self.file.flush().await?;
        self.file.sync_data().await
    }
}

/// Path-based medium that swaps in a fully written temp file.
///
/// The registry on disk is always either the old or the new array.
pub struct ReplaceFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl ReplaceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp: OsString = path.clone().into_os_string();
        tmp.push(".tmp");
        Self { path, tmp_path: PathBuf::from(tmp) }
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }
}

#[async_trait]
impl RegistryFile for ReplaceFile {
    async fn read_all(&mut self) -> io::Result<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(buf) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn overwrite(&mut self, contents: &[u8]) -> io::Result<()> {
        // A temp file left by an interrupted write keeps whatever mode it had.
        match fs::remove_file(&self.tmp_path).await {
            Ok(()) => debug!(path = %self.tmp_path.display(), "Removed stale registry temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let mut tmp = open_options().write(true).create_new(true).open(&self.tmp_path).await?;
        tmp.write_all(contents).await?;
        tmp.flush().await?;
        tmp.sync_all().await?;
        drop(tmp);

        // The rename must not change the mode of an existing registry.
        match fs::metadata(&self.path).await {
            Ok(meta) => fs::set_permissions(&self.tmp_path, meta.permissions()).await?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        fs::rename(&self.tmp_path, &self.path).await
    }
}
