//! Error types for vdrive core
//!
//! Every failure the engine can raise is built here, so the message text
//! stays the same whichever operation produced it.

use std::io;

/// Semantic category of an [`FsError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFoundDirectory,
    NotFoundFile,
    NotFoundDrive,
    AlreadyExists,
    AccessDenied,
    InUse,
    NotEmpty,
    InvalidPath,
    IllegalCharacters,
    UnsupportedOption,
    InsufficientDiskSpace,
}

/// Core filesystem error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("Could not find a part of the path '{path}'.")]
    DirectoryNotFound { path: String },

    #[error("Could not find file '{path}'.")]
    FileNotFound { path: String },

    #[error("Could not find the drive '{path}'. The drive might not be ready or might not be mapped.")]
    DriveNotFound { path: String },

    #[error("The file '{path}' already exists.")]
    FileAlreadyExists { path: String },

    #[error("Cannot create '{path}' because a file or directory with the same name already exists.")]
    EntryAlreadyExists { path: String },

    #[error("The file exists. : '{path}'")]
    FileExists { path: String },

    #[error("Access to the path '{path}' is denied.")]
    AccessDenied { path: String },

    #[error("The process cannot access the file '{path}' because it is being used by another process.")]
    SharingViolation { path: String },

    #[error("The process cannot access the file '{path}' because it is being used by another process.")]
    CurrentDirectoryInUse { path: String },

    #[error("The directory is not empty. : '{path}'")]
    DirectoryNotEmpty { path: String },

    #[error("The filename, directory name, or volume label syntax is incorrect. : '{path}'")]
    InvalidPath { path: String },

    #[error("The path '{path}' must start with a drive letter or a network share.")]
    NotRooted { path: String },

    #[error("The path '{path}' refers to a location above its root.")]
    EscapesRoot { path: String },

    #[error("The path is empty.")]
    EmptyPath,

    #[error("Illegal characters in path '{path}'.")]
    IllegalCharacters { path: String },

    #[error("The file option '{option}' is not supported.")]
    UnsupportedOption { option: String },

    #[error("There is not enough space on the disk. : '{path}'")]
    InsufficientDiskSpace { path: String },
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub fn directory_not_found(path: impl Into<String>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn drive_not_found(path: impl Into<String>) -> Self {
        Self::DriveNotFound { path: path.into() }
    }

    pub fn file_already_exists(path: impl Into<String>) -> Self {
        Self::FileAlreadyExists { path: path.into() }
    }

    pub fn entry_already_exists(path: impl Into<String>) -> Self {
        Self::EntryAlreadyExists { path: path.into() }
    }

    pub fn file_exists(path: impl Into<String>) -> Self {
        Self::FileExists { path: path.into() }
    }

    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::AccessDenied { path: path.into() }
    }

    pub fn sharing_violation(path: impl Into<String>) -> Self {
        Self::SharingViolation { path: path.into() }
    }

    pub fn current_directory_in_use(path: impl Into<String>) -> Self {
        Self::CurrentDirectoryInUse { path: path.into() }
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    pub fn not_rooted(path: impl Into<String>) -> Self {
        Self::NotRooted { path: path.into() }
    }

    pub fn escapes_root(path: impl Into<String>) -> Self {
        Self::EscapesRoot { path: path.into() }
    }

    pub fn illegal_characters(path: impl Into<String>) -> Self {
        Self::IllegalCharacters { path: path.into() }
    }

    pub fn unsupported_option(option: impl Into<String>) -> Self {
        Self::UnsupportedOption {
            option: option.into(),
        }
    }

    pub fn insufficient_disk_space(path: impl Into<String>) -> Self {
        Self::InsufficientDiskSpace { path: path.into() }
    }

    /// The semantic category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotFound { .. } => ErrorKind::NotFoundDirectory,
            Self::FileNotFound { .. } => ErrorKind::NotFoundFile,
            Self::DriveNotFound { .. } => ErrorKind::NotFoundDrive,
            Self::FileAlreadyExists { .. }
            | Self::EntryAlreadyExists { .. }
            | Self::FileExists { .. } => ErrorKind::AlreadyExists,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::SharingViolation { .. } | Self::CurrentDirectoryInUse { .. } => ErrorKind::InUse,
            Self::DirectoryNotEmpty { .. } => ErrorKind::NotEmpty,
            Self::InvalidPath { .. }
            | Self::NotRooted { .. }
            | Self::EscapesRoot { .. }
            | Self::EmptyPath => ErrorKind::InvalidPath,
            Self::IllegalCharacters { .. } => ErrorKind::IllegalCharacters,
            Self::UnsupportedOption { .. } => ErrorKind::UnsupportedOption,
            Self::InsufficientDiskSpace { .. } => ErrorKind::InsufficientDiskSpace,
        }
    }

    /// The offending path (or option name) carried by this error.
    pub fn path(&self) -> &str {
        match self {
            Self::DirectoryNotFound { path }
            | Self::FileNotFound { path }
            | Self::DriveNotFound { path }
            | Self::FileAlreadyExists { path }
            | Self::EntryAlreadyExists { path }
            | Self::FileExists { path }
            | Self::AccessDenied { path }
            | Self::SharingViolation { path }
            | Self::CurrentDirectoryInUse { path }
            | Self::DirectoryNotEmpty { path }
            | Self::InvalidPath { path }
            | Self::NotRooted { path }
            | Self::EscapesRoot { path }
            | Self::IllegalCharacters { path }
            | Self::InsufficientDiskSpace { path } => path,
            Self::UnsupportedOption { option } => option,
            Self::EmptyPath => "",
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFoundDirectory | ErrorKind::NotFoundFile | ErrorKind::NotFoundDrive => {
                io::ErrorKind::NotFound
            }
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::AccessDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::InvalidPath | ErrorKind::IllegalCharacters => io::ErrorKind::InvalidInput,
            ErrorKind::UnsupportedOption => io::ErrorKind::Unsupported,
            ErrorKind::InUse | ErrorKind::NotEmpty | ErrorKind::InsufficientDiskSpace => {
                io::ErrorKind::Other
            }
        };
        io::Error::new(kind, err)
    }
}
