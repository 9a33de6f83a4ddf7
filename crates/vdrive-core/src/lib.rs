//! vdrive core: an in-memory drive-letter and UNC filesystem
//!
//! This crate emulates a Windows-style filesystem entirely in memory so
//! code that touches files can be tested deterministically: case-insensitive
//! but case-preserving names, sharing violations, all-or-nothing recursive
//! deletes, exact free-space accounting per volume, and change notification
//! gated by notify filters.
//!
//! ```no_run
//! use vdrive_core::{FileSystem, FsConfig};
//!
//! let fs = FileSystem::new(FsConfig::default())?;
//! fs.directory().create_directory(r"C:\Some\Folder")?;
//! fs.file().write_all_text(r"c:\some\folder\notes.txt", "hello")?;
//! assert!(fs.file().exists(r"C:\SOME\FOLDER\NOTES.TXT"));
//! # Ok::<(), vdrive_core::FsError>(())
//! ```

pub mod config;
pub mod enumerate;
pub mod error;
pub mod fs;
pub mod navigator;
pub mod path;
pub mod pattern;
pub mod stream;
pub mod types;
pub mod watcher;

mod handles;
mod ops;
mod tree;
mod volume;

// Re-export key types for convenience
pub use config::{CopyHook, FileSeed, FsConfig, VolumeConfig};
pub use enumerate::{Enumeration, EntryIter};
pub use error::{ErrorKind, FsError, FsResult};
pub use fs::{Directory, Drive, File, FileSystem, Path};
pub use navigator::PathNavigator;
pub use path::AbsolutePath;
pub use pattern::PathPattern;
pub use stream::FileStream;
pub use types::*;
pub use volume::{DEFAULT_CAPACITY, DEFAULT_FORMAT};
pub use watcher::{ChangeKind, FileSystemEventArgs, FileSystemWatcher, NotifyFilters, WatcherError};
