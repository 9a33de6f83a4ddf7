//! Operation handlers
//!
//! Every public call is expressed as a small argument struct implementing
//! [`Operation`]. [`Engine::execute`] takes the engine lock, runs the
//! handler against [`FsState`] and releases the lock, so each operation
//! validates, mutates the tree, settles the volume ledger and queues its
//! change events as one unit.

mod directory;
mod file;
mod handle;
mod path;

pub(crate) use directory::{CreateDirectory, DeleteDirectory, MoveDirectory, SetCurrentDirectory};
pub(crate) use file::{
    CopyFile, DeleteFile, GetAttributes, GetTime, MoveFile, OpenFile, ReplaceFile, SetAttributes,
    SetTime,
};
pub(crate) use handle::{CloseHandle, HandleLength, ReadAt, SetLength, WriteAt};
pub(crate) use path::{GetTempFileName, GetTempPath};

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::CopyHook;
use crate::error::{FsError, FsResult};
use crate::handles::HandleRegistry;
use crate::path::{is_separator, AbsolutePath, SEPARATOR};
use crate::tree::{DeleteGuard, EntryTree, NodeId};
use crate::types::DriveType;
use crate::volume::{LedgerTxn, Volume, VolumeLedger, DEFAULT_CAPACITY};
use crate::watcher::{RawChange, WatcherRegistry};

/// Everything guarded by the engine lock
pub(crate) struct FsState {
    pub tree: EntryTree,
    pub handles: HandleRegistry,
    pub volumes: VolumeLedger,
    pub watchers: WatcherRegistry,
    pub current_dir: AbsolutePath,
    pub temp_dir: AbsolutePath,
}

impl FsState {
    /// Turn caller text into an absolute path. Relative text is taken
    /// from the working directory, `\x` from the working directory's root.
    pub fn resolve(&self, text: &str) -> FsResult<AbsolutePath> {
        if text.trim().is_empty() {
            return Err(FsError::EmptyPath);
        }
        if AbsolutePath::is_rooted(text) {
            return AbsolutePath::parse(text);
        }
        if text.starts_with(is_separator) {
            return AbsolutePath::parse(&format!("{}{text}", self.current_dir.root()));
        }
        self.current_dir.join(text)
    }

    pub fn emit(&mut self, change: RawChange) {
        self.watchers.notify(change);
    }

    pub fn emit_all(&mut self, changes: impl IntoIterator<Item = RawChange>) {
        self.watchers.notify_all(changes);
    }

    /// Error for an entry that should exist at `path` but does not:
    /// a missing drive or parent if that is the cause, file-not-found
    /// otherwise.
    pub fn missing_entry(&self, path: &AbsolutePath) -> FsError {
        if path.is_root() {
            return FsError::drive_not_found(path.to_string());
        }
        match self.tree.resolve_parent(path) {
            Ok(_) => FsError::file_not_found(path.to_string()),
            Err(err) => err,
        }
    }

    /// Volume to mount before `path` can be written: a network share seen
    /// for the first time. Drive letters are never mounted implicitly.
    pub fn pending_share(&self, path: &AbsolutePath) -> FsResult<Option<Volume>> {
        if !path.is_unc() || self.volumes.contains(path.root()) {
            return Ok(None);
        }
        if !is_share_root(path.root()) {
            return Err(FsError::invalid_path(path.to_string()));
        }
        Ok(Some(Volume::new(
            path.root(),
            DEFAULT_CAPACITY,
            DriveType::Network,
        )))
    }

    /// Commit `txn`, mounting `share` in the same step. On failure neither
    /// the ledger nor the tree changes.
    pub fn commit(
        &mut self,
        txn: &LedgerTxn,
        path: &AbsolutePath,
        share: Option<Volume>,
        now: DateTime<Utc>,
    ) -> FsResult<()> {
        let root = share.as_ref().map(|v| v.name.clone());
        self.volumes.apply_mounting(txn, path, share)?;
        if let Some(root) = root {
            self.tree.mount(&root, now);
            debug!(share = %root, "network share mounted");
        }
        Ok(())
    }

    /// Mount a network share on first use.
    pub fn mount_share(&mut self, path: &AbsolutePath, now: DateTime<Utc>) -> FsResult<()> {
        let share = self.pending_share(path)?;
        self.commit(&LedgerTxn::new(), path, share, now)
    }

    /// File or directory at `path`, or the matching not-found error.
    pub fn existing_entry(&self, path: &AbsolutePath) -> FsResult<NodeId> {
        self.tree
            .lookup(path)
            .ok_or_else(|| self.missing_entry(path))
    }

    /// File at `path`. A directory in its place reads as a missing file.
    pub fn existing_file(&self, path: &AbsolutePath) -> FsResult<NodeId> {
        match self.tree.lookup(path) {
            Some(id) if self.tree.get(id).is_some_and(|n| !n.is_dir()) => Ok(id),
            Some(_) => Err(FsError::file_not_found(path.to_string())),
            None => Err(self.missing_entry(path)),
        }
    }

    /// Directory at `path`, or directory-not-found (drive-not-found for
    /// an unmounted root).
    pub fn existing_directory(&self, path: &AbsolutePath) -> FsResult<NodeId> {
        if let Some(id) = self.tree.try_get_existing_directory(path) {
            return Ok(id);
        }
        if path.is_root() || !self.volumes.contains(path.root()) {
            return Err(FsError::drive_not_found(path.root_path().to_string()));
        }
        Err(FsError::directory_not_found(path.to_string()))
    }
}

/// `\\server\share`, as opposed to a bare `\\server`.
pub(crate) fn is_share_root(root: &str) -> bool {
    root.trim_start_matches(SEPARATOR).contains(SEPARATOR)
}

/// Open handles and the working directory, as seen by tree deletes
pub(crate) struct DeleteChecks<'a> {
    handles: &'a HandleRegistry,
    current_dir: &'a AbsolutePath,
}

impl DeleteGuard for DeleteChecks<'_> {
    fn blocks_delete(&self, node: NodeId) -> bool {
        self.handles.blocks_delete(node)
    }

    fn holds_current_directory(&self, tree: &EntryTree, node: NodeId) -> bool {
        tree.try_get_existing_directory(self.current_dir)
            .is_some_and(|cwd| tree.is_ancestor_or_self(node, cwd))
    }
}

/// One engine operation: its arguments plus the handler that applies them.
pub(crate) trait Operation: Debug {
    type Output;

    const NAME: &'static str;

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<Self::Output>;
}

/// Engine lock plus the settings that live outside it
pub(crate) struct Engine {
    state: Mutex<FsState>,
    copy_hook: Option<CopyHook>,
    watcher_queue_capacity: usize,
}

impl Engine {
    pub fn new(state: FsState, copy_hook: Option<CopyHook>, watcher_queue_capacity: usize) -> Self {
        Self {
            state: Mutex::new(state),
            copy_hook,
            watcher_queue_capacity,
        }
    }

    pub fn execute<O: Operation>(&self, op: O) -> FsResult<O::Output> {
        debug!(operation = O::NAME, args = ?op);
        let now = Utc::now();
        let mut state = self.state.lock();
        let result = op.apply(&mut state, now);
        if let Err(err) = &result {
            debug!(operation = O::NAME, error = %err, "operation failed");
        }
        result
    }

    /// Run a read-only query under the lock.
    pub fn read<T>(&self, query: impl FnOnce(&FsState) -> T) -> T {
        query(&*self.state.lock())
    }

    pub fn lock(&self) -> MutexGuard<'_, FsState> {
        self.state.lock()
    }

    pub fn copy_hook(&self) -> Option<&CopyHook> {
        self.copy_hook.as_ref()
    }

    pub fn watcher_queue_capacity(&self) -> usize {
        self.watcher_queue_capacity
    }
}
