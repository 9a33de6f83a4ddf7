//! Core type definitions for vdrive

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Opaque watcher subscription identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

bitflags::bitflags! {
    /// Entry attributes, using the bit values of the Win32 attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileAttributes: u32 {
        const READ_ONLY = 0x0001;
        const HIDDEN = 0x0002;
        const SYSTEM = 0x0004;
        const DIRECTORY = 0x0010;
        const ARCHIVE = 0x0020;
        const DEVICE = 0x0040;
        const NORMAL = 0x0080;
        const TEMPORARY = 0x0100;
        const SPARSE_FILE = 0x0200;
        const REPARSE_POINT = 0x0400;
        const COMPRESSED = 0x0800;
        const OFFLINE = 0x1000;
        const NOT_CONTENT_INDEXED = 0x2000;
        const ENCRYPTED = 0x4000;
    }
}

impl Default for FileAttributes {
    fn default() -> Self {
        FileAttributes::NORMAL
    }
}

impl FileAttributes {
    /// Normalize a caller-supplied mask for a file: `DIRECTORY` is dropped
    /// and an empty mask becomes `NORMAL`. `NORMAL` never combines with
    /// other bits.
    pub(crate) fn for_file(self) -> Self {
        let attrs = self - FileAttributes::DIRECTORY;
        let others = attrs - FileAttributes::NORMAL;
        if others.is_empty() {
            FileAttributes::NORMAL
        } else {
            others
        }
    }

    /// Normalize a caller-supplied mask for a directory: `DIRECTORY` is
    /// always set and `NORMAL` is dropped.
    pub(crate) fn for_directory(self) -> Self {
        (self - FileAttributes::NORMAL) | FileAttributes::DIRECTORY
    }
}

/// Earliest timestamp the filesystem can represent. Timestamp queries
/// against a path that does not exist report this value.
pub fn file_time_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Entry timestamps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTimes {
    pub creation: DateTime<Utc>,
    pub last_write: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
}

impl FileTimes {
    pub(crate) fn at(now: DateTime<Utc>) -> Self {
        Self {
            creation: now,
            last_write: now,
            last_access: now,
        }
    }
}

/// Which timestamp an operation reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeKind {
    Creation,
    LastWrite,
    LastAccess,
}

/// Requested access of an open handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    pub fn can_read(self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

bitflags::bitflags! {
    /// What other handles may do while a handle is open.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileShare: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const READ_WRITE = 0x3;
        const DELETE = 0x4;
    }
}

/// How an open treats an existing or missing file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Fail if the file exists.
    CreateNew,
    /// Create, truncating an existing file.
    Create,
    /// Fail if the file is missing.
    Open,
    OpenOrCreate,
    /// Open an existing file and cut it to zero length.
    Truncate,
    /// Open or create, positioned at the end; writes only.
    Append,
}

bitflags::bitflags! {
    /// Advanced open options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FileOptions: u32 {
        const WRITE_THROUGH = 0x8000_0000;
        const ASYNCHRONOUS = 0x4000_0000;
        const RANDOM_ACCESS = 0x1000_0000;
        const DELETE_ON_CLOSE = 0x0400_0000;
        const SEQUENTIAL_SCAN = 0x0800_0000;
        const ENCRYPTED = 0x0000_4000;
    }
}

impl FileOptions {
    /// Reject options the engine recognizes but does not emulate.
    pub(crate) fn ensure_supported(self) -> crate::FsResult<()> {
        if self.contains(FileOptions::ENCRYPTED) {
            return Err(crate::FsError::unsupported_option("Encrypted"));
        }
        if self.contains(FileOptions::DELETE_ON_CLOSE) {
            return Err(crate::FsError::unsupported_option("DeleteOnClose"));
        }
        Ok(())
    }
}

/// Arguments of a file open
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    pub mode: FileMode,
    pub access: FileAccess,
    pub share: FileShare,
    pub options: FileOptions,
}

impl OpenOptions {
    /// Options for `mode` with the access a plain open would pick:
    /// write-only for `Append`, read-write otherwise, no sharing.
    pub fn new(mode: FileMode) -> Self {
        let access = match mode {
            FileMode::Append => FileAccess::Write,
            _ => FileAccess::ReadWrite,
        };
        Self {
            mode,
            access,
            share: FileShare::empty(),
            options: FileOptions::empty(),
        }
    }

    pub fn read_only() -> Self {
        Self {
            mode: FileMode::Open,
            access: FileAccess::Read,
            share: FileShare::READ,
            options: FileOptions::empty(),
        }
    }
}

/// Depth of an enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SearchOption {
    #[default]
    TopDirectoryOnly,
    AllDirectories,
}

/// Which entry kinds an enumeration yields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EntryFilter {
    Files,
    Directories,
    #[default]
    All,
}

impl EntryFilter {
    pub(crate) fn accepts(self, is_dir: bool) -> bool {
        match self {
            EntryFilter::Files => !is_dir,
            EntryFilter::Directories => is_dir,
            EntryFilter::All => true,
        }
    }
}

/// Kind of volume behind a drive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DriveType {
    Unknown,
    NoRootDirectory,
    Removable,
    #[default]
    Fixed,
    Network,
    CdRom,
    Ram,
}

/// Snapshot of one mounted drive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveInfo {
    /// Root text, e.g. `C:\` or `\\server\share`.
    pub name: String,
    pub is_ready: bool,
    pub total_size: u64,
    pub total_free_space: u64,
    pub available_free_space: u64,
    pub drive_type: DriveType,
    pub drive_format: String,
    pub volume_label: String,
}
