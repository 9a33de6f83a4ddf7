//! Configuration types for vdrive
//!
//! A [`FsConfig`] describes the initial state of a filesystem: which
//! volumes exist, which directories and files are already there, and a
//! few runtime knobs. It is consumed once by [`crate::FileSystem::new`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::path::AbsolutePath;
use crate::types::{DriveType, FileAttributes};
use crate::volume::{DEFAULT_CAPACITY, DEFAULT_FORMAT};

/// Called with `(source, destination)` before a file copy takes the
/// engine lock.
pub type CopyHook = Arc<dyn Fn(&AbsolutePath, &AbsolutePath) + Send + Sync>;

/// One drive letter or network share
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// `"D:"` or `"\\server\share"`.
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Defaults to `capacity`.
    #[serde(default)]
    pub free_space: Option<u64>,
    #[serde(default)]
    pub drive_type: DriveType,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_true")]
    pub is_ready: bool,
}

impl VolumeConfig {
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            free_space: None,
            drive_type: DriveType::Fixed,
            format: DEFAULT_FORMAT.to_string(),
            label: String::new(),
            is_ready: true,
        }
    }
}

/// File present when the filesystem is built
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileSeed {
    pub path: String,
    #[serde(default)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub attributes: FileAttributes,
}

impl FileSeed {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            attributes: FileAttributes::NORMAL,
        }
    }
}

/// Main filesystem configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Mount `C:` with the default volume unless `volumes` names it.
    pub include_default_drive: bool,
    pub volumes: Vec<VolumeConfig>,
    pub directories: Vec<String>,
    pub files: Vec<FileSeed>,
    /// Defaults to `C:\Temp`.
    pub temp_directory: Option<String>,
    /// Defaults to the root of the first mounted drive.
    pub current_directory: Option<String>,
    pub watcher_queue_capacity: usize,
    #[serde(skip)]
    pub copy_hook: Option<CopyHook>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            include_default_drive: true,
            volumes: Vec::new(),
            directories: Vec::new(),
            files: Vec::new(),
            temp_directory: None,
            current_directory: None,
            watcher_queue_capacity: 1024,
            copy_hook: None,
        }
    }
}

impl fmt::Debug for FsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsConfig")
            .field("include_default_drive", &self.include_default_drive)
            .field("volumes", &self.volumes)
            .field("directories", &self.directories)
            .field("files", &self.files.len())
            .field("temp_directory", &self.temp_directory)
            .field("current_directory", &self.current_directory)
            .field("watcher_queue_capacity", &self.watcher_queue_capacity)
            .field("copy_hook", &self.copy_hook.is_some())
            .finish()
    }
}

impl FsConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid filesystem configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn with_volume(mut self, volume: VolumeConfig) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_directory(mut self, path: impl Into<String>) -> Self {
        self.directories.push(path.into());
        self
    }

    pub fn with_file(mut self, seed: FileSeed) -> Self {
        self.files.push(seed);
        self
    }

    pub fn with_copy_hook(
        mut self,
        hook: impl Fn(&AbsolutePath, &AbsolutePath) + Send + Sync + 'static,
    ) -> Self {
        self.copy_hook = Some(Arc::new(hook));
        self
    }
}

fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}
