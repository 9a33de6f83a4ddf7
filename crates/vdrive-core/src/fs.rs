//! Public facade
//!
//! [`FileSystem`] is a cheap, cloneable handle onto one engine. Operations
//! are grouped the way callers know them from a real drive API:
//! [`Directory`], [`File`], [`Path`] and [`Drive`]. Every method takes
//! path text, resolves it against the working directory and runs one
//! atomic engine operation.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use tracing::info;

use crate::config::{FileSeed, FsConfig};
use crate::enumerate::Enumeration;
use crate::error::{FsError, FsResult};
use crate::handles::HandleRegistry;
use crate::ops::{
    self, CloseHandle, CopyFile, CreateDirectory, DeleteDirectory, DeleteFile, Engine, FsState,
    GetAttributes, GetTempFileName, GetTempPath, GetTime, MoveDirectory, MoveFile, OpenFile,
    ReadAt, ReplaceFile, SetAttributes, SetCurrentDirectory, SetTime, WriteAt,
};
use crate::path::{AbsolutePath, SEPARATOR};
use crate::pattern::PathPattern;
use crate::stream::FileStream;
use crate::tree::EntryTree;
use crate::types::{
    DriveInfo, DriveType, EntryFilter, FileAccess, FileAttributes, FileMode, FileOptions,
    OpenOptions, SearchOption, TimeKind,
};
use crate::volume::{Volume, VolumeLedger, DEFAULT_CAPACITY};
use crate::watcher::{FileSystemWatcher, WatcherRegistry};

pub const DEFAULT_DRIVE: &str = "C:";
pub const DEFAULT_TEMP_DIRECTORY: &str = r"C:\Temp";

/// In-memory filesystem
#[derive(Clone)]
pub struct FileSystem {
    engine: Arc<Engine>,
}

impl FileSystem {
    /// Build a filesystem from `config`: mount the volumes, then create
    /// the seeded directories and files.
    pub fn new(config: FsConfig) -> FsResult<Self> {
        let now = Utc::now();
        let mut tree = EntryTree::new(now);
        let mut volumes = VolumeLedger::new();

        for volume_config in &config.volumes {
            let root = AbsolutePath::parse(&volume_config.name)?;
            if !root.is_root() || (root.is_unc() && !ops::is_share_root(root.root())) {
                return Err(FsError::invalid_path(volume_config.name.clone()));
            }
            let mut volume = Volume::new(root.root(), volume_config.capacity, volume_config.drive_type);
            volume.free = volume_config
                .free_space
                .unwrap_or(volume_config.capacity)
                .min(volume_config.capacity);
            volume.format = volume_config.format.clone();
            volume.label = volume_config.label.clone();
            volume.is_ready = volume_config.is_ready;
            tree.mount(root.root(), now);
            volumes.add(volume);
        }
        if config.include_default_drive && !volumes.contains(DEFAULT_DRIVE) {
            tree.mount(DEFAULT_DRIVE, now);
            volumes.add(Volume::new(DEFAULT_DRIVE, DEFAULT_CAPACITY, DriveType::Fixed));
        }

        let drives = volumes.drives();
        let first_root = drives
            .first()
            .map(|d| d.name.as_str())
            .unwrap_or(r"C:\");
        let state = FsState {
            tree,
            handles: HandleRegistry::new(),
            volumes,
            watchers: WatcherRegistry::new(),
            current_dir: AbsolutePath::parse(first_root)?,
            temp_dir: AbsolutePath::parse(
                config
                    .temp_directory
                    .as_deref()
                    .unwrap_or(DEFAULT_TEMP_DIRECTORY),
            )?,
        };

        let fs = Self {
            engine: Arc::new(Engine::new(
                state,
                config.copy_hook.clone(),
                config.watcher_queue_capacity,
            )),
        };
        for dir in &config.directories {
            fs.directory().create_directory(dir)?;
        }
        for seed in &config.files {
            fs.seed_file(seed)?;
        }
        if let Some(dir) = &config.current_directory {
            fs.directory().set_current_directory(dir)?;
        }

        info!(
            drives = drives.len(),
            directories = config.directories.len(),
            files = config.files.len(),
            "filesystem ready"
        );
        Ok(fs)
    }

    fn seed_file(&self, seed: &FileSeed) -> FsResult<()> {
        let path = self.resolve(&seed.path)?;
        if let Some(parent) = path.parent() {
            self.engine.execute(CreateDirectory { path: parent })?;
        }
        self.write_through(path.clone(), FileMode::Create, &seed.content)?;
        self.engine.execute(SetAttributes {
            path,
            attributes: seed.attributes,
        })
    }

    fn resolve(&self, text: &str) -> FsResult<AbsolutePath> {
        self.engine.read(|state| state.resolve(text))
    }

    /// Open `path`, write `data` at the open position, close. The handle
    /// is closed even when the write fails.
    fn write_through(&self, path: AbsolutePath, mode: FileMode, data: &[u8]) -> FsResult<()> {
        let opened = self.engine.execute(OpenFile {
            path,
            options: OpenOptions::new(mode),
        })?;
        let written = self.engine.execute(WriteAt {
            handle: opened.handle,
            path: &opened.path,
            offset: opened.position,
            data,
        });
        self.engine.execute(CloseHandle {
            handle: opened.handle,
        })?;
        written
    }

    pub fn directory(&self) -> Directory<'_> {
        Directory { fs: self }
    }

    pub fn file(&self) -> File<'_> {
        File { fs: self }
    }

    pub fn path(&self) -> Path<'_> {
        Path { fs: self }
    }

    pub fn drive(&self) -> Drive<'_> {
        Drive { fs: self }
    }

    /// Subscribe to changes below the directory `path`. The watcher starts
    /// disabled.
    pub fn create_watcher(&self, path: &str) -> FsResult<FileSystemWatcher> {
        let path = self.resolve(path)?;
        let mut state = self.engine.lock();
        let id = state.existing_directory(&path)?;
        let root = state.tree.path_of(id).unwrap_or(path);
        Ok(state
            .watchers
            .subscribe(root, self.engine.watcher_queue_capacity()))
    }
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("drives", &self.drive().get_drives().len())
            .finish()
    }
}

/// Directory operations
#[derive(Clone, Copy, Debug)]
pub struct Directory<'a> {
    fs: &'a FileSystem,
}

impl Directory<'_> {
    /// Whether `path` names an existing directory. Bad paths read as `false`.
    pub fn exists(&self, path: &str) -> bool {
        self.fs.engine.read(|state| {
            state
                .resolve(path)
                .ok()
                .and_then(|p| state.tree.try_get_existing_directory(&p))
                .is_some()
        })
    }

    /// Create `path` and every missing parent. Returns the directory's path.
    pub fn create_directory(&self, path: &str) -> FsResult<AbsolutePath> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(CreateDirectory { path })
    }

    pub fn delete(&self, path: &str, recursive: bool) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(DeleteDirectory { path, recursive })
    }

    pub fn move_directory(&self, source: &str, destination: &str) -> FsResult<()> {
        let source = self.fs.resolve(source)?;
        let destination = self.fs.resolve(destination)?;
        self.fs.engine.execute(MoveDirectory {
            source,
            destination,
        })
    }

    /// Lazy listing of the entries under `path` whose names match
    /// `pattern`. The directory and pattern are checked up front.
    pub fn enumerate_entries(
        &self,
        path: &str,
        pattern: &str,
        search: SearchOption,
        filter: EntryFilter,
    ) -> FsResult<Enumeration> {
        let pattern = PathPattern::new(pattern)?;
        let root = self.fs.engine.read(|state| {
            let path = state.resolve(path)?;
            let id = state.existing_directory(&path)?;
            Ok::<_, FsError>(state.tree.path_of(id).unwrap_or(path))
        })?;
        Ok(Enumeration::new(
            Arc::clone(&self.fs.engine),
            root,
            pattern,
            search,
            filter,
        ))
    }

    pub fn enumerate_files(
        &self,
        path: &str,
        pattern: &str,
        search: SearchOption,
    ) -> FsResult<Enumeration> {
        self.enumerate_entries(path, pattern, search, EntryFilter::Files)
    }

    pub fn enumerate_directories(
        &self,
        path: &str,
        pattern: &str,
        search: SearchOption,
    ) -> FsResult<Enumeration> {
        self.enumerate_entries(path, pattern, search, EntryFilter::Directories)
    }

    pub fn get_files(&self, path: &str, pattern: &str, search: SearchOption) -> FsResult<Vec<String>> {
        Ok(self.enumerate_files(path, pattern, search)?.into_iter().collect())
    }

    pub fn get_directories(
        &self,
        path: &str,
        pattern: &str,
        search: SearchOption,
    ) -> FsResult<Vec<String>> {
        Ok(self
            .enumerate_directories(path, pattern, search)?
            .into_iter()
            .collect())
    }

    pub fn get_file_system_entries(
        &self,
        path: &str,
        pattern: &str,
        search: SearchOption,
    ) -> FsResult<Vec<String>> {
        Ok(self
            .enumerate_entries(path, pattern, search, EntryFilter::All)?
            .into_iter()
            .collect())
    }

    pub fn get_current_directory(&self) -> String {
        self.fs.engine.read(|state| state.current_dir.to_string())
    }

    pub fn set_current_directory(&self, path: &str) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(SetCurrentDirectory { path })
    }
}

/// File operations
#[derive(Clone, Copy, Debug)]
pub struct File<'a> {
    fs: &'a FileSystem,
}

impl File<'_> {
    /// Whether `path` names an existing file. Bad paths read as `false`.
    pub fn exists(&self, path: &str) -> bool {
        self.fs.engine.read(|state| {
            state
                .resolve(path)
                .ok()
                .and_then(|p| state.tree.try_get_existing_file(&p))
                .is_some()
        })
    }

    /// Create or truncate `path` and open it for reading and writing.
    pub fn create(&self, path: &str) -> FsResult<FileStream> {
        self.create_with_options(path, FileOptions::empty())
    }

    pub fn create_with_options(&self, path: &str, options: FileOptions) -> FsResult<FileStream> {
        let mut open = OpenOptions::new(FileMode::Create);
        open.options = options;
        self.open_with(path, open)
    }

    /// Open with `mode` and `access`, sharing nothing.
    pub fn open(&self, path: &str, mode: FileMode, access: FileAccess) -> FsResult<FileStream> {
        let mut open = OpenOptions::new(mode);
        open.access = access;
        self.open_with(path, open)
    }

    /// Open an existing file for reading, letting others read too.
    pub fn open_read(&self, path: &str) -> FsResult<FileStream> {
        self.open_with(path, OpenOptions::read_only())
    }

    pub fn open_with(&self, path: &str, options: OpenOptions) -> FsResult<FileStream> {
        let path = self.fs.resolve(path)?;
        let opened = self.fs.engine.execute(OpenFile { path, options })?;
        Ok(FileStream::new(
            Arc::clone(&self.fs.engine),
            opened.handle,
            opened.path,
            options.access,
            opened.position,
        ))
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(DeleteFile { path })
    }

    pub fn copy(&self, source: &str, destination: &str, overwrite: bool) -> FsResult<()> {
        let source = self.fs.resolve(source)?;
        let destination = self.fs.resolve(destination)?;
        if let Some(hook) = self.fs.engine.copy_hook() {
            hook(&source, &destination);
        }
        self.fs.engine.execute(CopyFile {
            source,
            destination,
            overwrite,
        })
    }

    pub fn move_file(&self, source: &str, destination: &str, overwrite: bool) -> FsResult<()> {
        let source = self.fs.resolve(source)?;
        let destination = self.fs.resolve(destination)?;
        self.fs.engine.execute(MoveFile {
            source,
            destination,
            overwrite,
        })
    }

    /// Replace `destination` with `source`, keeping the old destination as
    /// `backup` when given.
    pub fn replace(&self, source: &str, destination: &str, backup: Option<&str>) -> FsResult<()> {
        let source = self.fs.resolve(source)?;
        let destination = self.fs.resolve(destination)?;
        let backup = backup.map(|b| self.fs.resolve(b)).transpose()?;
        self.fs.engine.execute(ReplaceFile {
            source,
            destination,
            backup,
        })
    }

    pub fn get_attributes(&self, path: &str) -> FsResult<FileAttributes> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(GetAttributes { path })
    }

    pub fn set_attributes(&self, path: &str, attributes: FileAttributes) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(SetAttributes { path, attributes })
    }

    fn get_time(&self, path: &str, kind: TimeKind) -> FsResult<DateTime<Utc>> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(GetTime { path, kind })
    }

    fn set_time(&self, path: &str, kind: TimeKind, value: DateTime<Utc>) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.engine.execute(SetTime { path, kind, value })
    }

    pub fn get_creation_time_utc(&self, path: &str) -> FsResult<DateTime<Utc>> {
        self.get_time(path, TimeKind::Creation)
    }

    pub fn get_creation_time(&self, path: &str) -> FsResult<DateTime<Local>> {
        Ok(self.get_creation_time_utc(path)?.with_timezone(&Local))
    }

    pub fn set_creation_time_utc(&self, path: &str, value: DateTime<Utc>) -> FsResult<()> {
        self.set_time(path, TimeKind::Creation, value)
    }

    pub fn set_creation_time<Tz: TimeZone>(&self, path: &str, value: DateTime<Tz>) -> FsResult<()> {
        self.set_time(path, TimeKind::Creation, value.with_timezone(&Utc))
    }

    pub fn get_last_write_time_utc(&self, path: &str) -> FsResult<DateTime<Utc>> {
        self.get_time(path, TimeKind::LastWrite)
    }

    pub fn get_last_write_time(&self, path: &str) -> FsResult<DateTime<Local>> {
        Ok(self.get_last_write_time_utc(path)?.with_timezone(&Local))
    }

    pub fn set_last_write_time_utc(&self, path: &str, value: DateTime<Utc>) -> FsResult<()> {
        self.set_time(path, TimeKind::LastWrite, value)
    }

    pub fn set_last_write_time<Tz: TimeZone>(&self, path: &str, value: DateTime<Tz>) -> FsResult<()> {
        self.set_time(path, TimeKind::LastWrite, value.with_timezone(&Utc))
    }

    pub fn get_last_access_time_utc(&self, path: &str) -> FsResult<DateTime<Utc>> {
        self.get_time(path, TimeKind::LastAccess)
    }

    pub fn get_last_access_time(&self, path: &str) -> FsResult<DateTime<Local>> {
        Ok(self.get_last_access_time_utc(path)?.with_timezone(&Local))
    }

    pub fn set_last_access_time_utc(&self, path: &str, value: DateTime<Utc>) -> FsResult<()> {
        self.set_time(path, TimeKind::LastAccess, value)
    }

    pub fn set_last_access_time<Tz: TimeZone>(
        &self,
        path: &str,
        value: DateTime<Tz>,
    ) -> FsResult<()> {
        self.set_time(path, TimeKind::LastAccess, value.with_timezone(&Utc))
    }

    pub fn read_all_bytes(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = self.fs.resolve(path)?;
        let opened = self.fs.engine.execute(OpenFile {
            path,
            options: OpenOptions::read_only(),
        })?;
        let bytes = self.fs.engine.execute(ReadAt {
            handle: opened.handle,
            path: &opened.path,
            offset: 0,
            len: usize::MAX,
        });
        self.fs.engine.execute(CloseHandle {
            handle: opened.handle,
        })?;
        bytes
    }

    /// Create or truncate `path` and write `data`. If the write does not
    /// fit on the volume the file is left empty.
    pub fn write_all_bytes(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.write_through(path, FileMode::Create, data)
    }

    pub fn append_all_bytes(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let path = self.fs.resolve(path)?;
        self.fs.write_through(path, FileMode::Append, data)
    }

    /// Read `path` as UTF-8, dropping a byte order mark.
    pub fn read_all_text(&self, path: &str) -> FsResult<String> {
        let bytes = self.read_all_bytes(path)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.strip_prefix('\u{feff}').unwrap_or(&text).to_string())
    }

    pub fn write_all_text(&self, path: &str, text: &str) -> FsResult<()> {
        self.write_all_bytes(path, text.as_bytes())
    }

    pub fn append_all_text(&self, path: &str, text: &str) -> FsResult<()> {
        self.append_all_bytes(path, text.as_bytes())
    }
}

/// Path operations
#[derive(Clone, Copy, Debug)]
pub struct Path<'a> {
    fs: &'a FileSystem,
}

impl Path<'_> {
    /// Absolute, normalized form of `path`.
    pub fn get_full_path(&self, path: &str) -> FsResult<String> {
        Ok(self.fs.resolve(path)?.to_string())
    }

    /// Temp directory with a trailing separator, created if absent.
    pub fn get_temp_path(&self) -> FsResult<String> {
        let dir = self.fs.engine.execute(GetTempPath)?;
        let mut text = dir.to_string();
        if !text.ends_with(SEPARATOR) {
            text.push(SEPARATOR);
        }
        Ok(text)
    }

    /// Create an empty, uniquely named file in the temp directory.
    pub fn get_temp_file_name(&self) -> FsResult<String> {
        Ok(self.fs.engine.execute(GetTempFileName)?.to_string())
    }
}

/// Drive queries
#[derive(Clone, Copy, Debug)]
pub struct Drive<'a> {
    fs: &'a FileSystem,
}

impl Drive<'_> {
    /// Every mounted drive, letters first, then network shares.
    pub fn get_drives(&self) -> Vec<DriveInfo> {
        self.fs.engine.read(|state| state.volumes.drives())
    }

    /// Look up one drive by `C`, `C:`, `C:\` or `\\server\share`.
    pub fn get_drive(&self, name: &str) -> FsResult<DriveInfo> {
        let text = match name.len() {
            1 => format!("{name}:"),
            _ => name.to_string(),
        };
        let root = AbsolutePath::parse(&text).map_err(|_| FsError::drive_not_found(name))?;
        self.fs
            .engine
            .read(|state| state.volumes.drive(root.root()))
            .ok_or_else(|| FsError::drive_not_found(name))
    }
}
