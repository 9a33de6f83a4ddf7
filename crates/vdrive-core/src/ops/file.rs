//! File handlers: open, delete, copy, move, replace, attributes and times

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{DeleteChecks, FsState, Operation};
use crate::error::{FsError, FsResult};
use crate::path::{fold, AbsolutePath};
use crate::types::{file_time_epoch, FileAttributes, FileMode, HandleId, OpenOptions, TimeKind};
use crate::volume::LedgerTxn;
use crate::watcher::{NotifyFilters, RawChange};

fn same_volume(a: &AbsolutePath, b: &AbsolutePath) -> bool {
    fold(a.root()) == fold(b.root())
}

/// Open (and possibly create or truncate) a file.
#[derive(Debug)]
pub(crate) struct OpenFile {
    pub path: AbsolutePath,
    pub options: OpenOptions,
}

/// Handle and start position of a freshly opened file
#[derive(Debug)]
pub(crate) struct OpenedFile {
    pub handle: HandleId,
    pub path: AbsolutePath,
    pub position: u64,
}

impl OpenFile {
    fn validate(&self) -> FsResult<()> {
        let OpenOptions {
            mode,
            access,
            options,
            ..
        } = self.options;
        if let Err(err) = options.ensure_supported() {
            warn!(path = %self.path, ?options, "rejected file options");
            return Err(err);
        }
        if mode == FileMode::Append && access.can_read() {
            return Err(FsError::unsupported_option("Append"));
        }
        let creates_or_cuts = matches!(
            mode,
            FileMode::CreateNew | FileMode::Create | FileMode::Truncate
        );
        if creates_or_cuts && !access.can_write() {
            return Err(FsError::unsupported_option(format!("{mode:?}")));
        }
        if self.path.is_root() {
            return Err(FsError::access_denied(self.path.to_string()));
        }
        Ok(())
    }
}

impl Operation for OpenFile {
    type Output = OpenedFile;

    const NAME: &'static str = "open_file";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<OpenedFile> {
        self.validate()?;
        let OpenFile { path, options } = self;

        let node_id = match state.tree.lookup(&path) {
            Some(id) => {
                let node = state.tree.node(id, &path)?;
                if node.is_dir() {
                    return Err(FsError::access_denied(path.to_string()));
                }
                if options.mode == FileMode::CreateNew {
                    return Err(FsError::file_already_exists(path.to_string()));
                }
                if options.access.can_write() && node.is_read_only() {
                    return Err(FsError::access_denied(path.to_string()));
                }
                let old_len = node.len();
                state
                    .handles
                    .check_open(id, &path, options.access, options.share)?;

                if matches!(options.mode, FileMode::Create | FileMode::Truncate) {
                    let mut txn = LedgerTxn::new();
                    txn.credit(&path, old_len);
                    state.volumes.apply(&txn, &path)?;
                    state.tree.get_or_create_file(&path, true, now)?;
                    if old_len > 0 {
                        state.emit(RawChange::changed(
                            path.clone(),
                            NotifyFilters::SIZE | NotifyFilters::LAST_WRITE,
                        ));
                    }
                }
                id
            }
            None => {
                if matches!(options.mode, FileMode::Open | FileMode::Truncate) {
                    return Err(state.missing_entry(&path));
                }
                let (id, _) = state.tree.get_or_create_file(&path, false, now)?;
                state.emit(RawChange::created(path.clone(), false));
                id
            }
        };

        let handle = state
            .handles
            .open(node_id, &path, options.access, options.share)?;
        let position = if options.mode == FileMode::Append {
            state.tree.node(node_id, &path)?.len()
        } else {
            0
        };
        Ok(OpenedFile {
            handle,
            path: state.tree.path_of(node_id).unwrap_or(path),
            position,
        })
    }
}

/// Delete a file. A missing file in an existing directory is not an error.
#[derive(Debug)]
pub(crate) struct DeleteFile {
    pub path: AbsolutePath,
}

impl Operation for DeleteFile {
    type Output = ();

    const NAME: &'static str = "delete_file";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let path = self.path;
        if path.is_root() {
            return Err(state.missing_entry(&path));
        }
        state.tree.resolve_parent(&path)?;
        let Some(id) = state.tree.lookup(&path) else {
            return Ok(());
        };

        let checks = DeleteChecks {
            handles: &state.handles,
            current_dir: &state.current_dir,
        };
        let removed = state.tree.delete_file(id, &checks, now)?;

        let mut txn = LedgerTxn::new();
        txn.credit(&removed.path, removed.len);
        state.volumes.apply(&txn, &path)?;
        state.emit(RawChange::deleted(removed.path, false));
        Ok(())
    }
}

/// Copy a file's bytes, attributes and last-write time.
#[derive(Debug)]
pub(crate) struct CopyFile {
    pub source: AbsolutePath,
    pub destination: AbsolutePath,
    pub overwrite: bool,
}

impl Operation for CopyFile {
    type Output = ();

    const NAME: &'static str = "copy_file";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let CopyFile {
            source,
            destination,
            overwrite,
        } = self;

        let src_id = match state.tree.lookup(&source) {
            Some(id) if state.tree.node(id, &source)?.is_dir() => {
                return Err(FsError::access_denied(source.to_string()))
            }
            Some(id) => id,
            None => return Err(state.missing_entry(&source)),
        };
        if state.handles.blocks_read(src_id) {
            return Err(FsError::sharing_violation(source.to_string()));
        }
        if destination.is_root() {
            return Err(FsError::access_denied(destination.to_string()));
        }
        let dst_parent = state.tree.resolve_parent(&destination)?;

        let existing = match state.tree.lookup(&destination) {
            Some(id) => {
                let node = state.tree.node(id, &destination)?;
                if node.is_dir() {
                    return Err(FsError::access_denied(destination.to_string()));
                }
                if !overwrite {
                    return Err(FsError::file_already_exists(destination.to_string()));
                }
                if node.is_read_only() {
                    return Err(FsError::access_denied(destination.to_string()));
                }
                if id == src_id || state.handles.is_open(id) {
                    return Err(FsError::sharing_violation(destination.to_string()));
                }
                Some((id, node.len()))
            }
            None => None,
        };

        let src = state.tree.node(src_id, &source)?;
        let (attributes, last_write) = (src.attributes, src.times.last_write);
        let content = src
            .as_file()
            .map(|f| f.content.clone())
            .unwrap_or_default();

        let mut txn = LedgerTxn::new();
        txn.debit(&destination, content.len() as u64);
        if let Some((_, old_len)) = existing {
            txn.credit(&destination, old_len);
        }
        state.volumes.apply(&txn, &destination)?;

        state.tree.node_mut(src_id, &source)?.times.last_access = now;
        match existing {
            Some((id, _)) => {
                let node = state.tree.node_mut(id, &destination)?;
                if let Some(file) = node.as_file_mut() {
                    file.content = content;
                }
                node.attributes = attributes;
                node.times.last_write = last_write;
                node.times.last_access = now;
                state.emit(RawChange::changed(
                    destination,
                    NotifyFilters::SIZE | NotifyFilters::LAST_WRITE,
                ));
            }
            None => {
                state
                    .tree
                    .deep_copy(src_id, dst_parent, destination.name(), now)
                    .ok_or_else(|| FsError::file_not_found(source.to_string()))?;
                state.emit(RawChange::created(destination, false));
            }
        }
        Ok(())
    }
}

/// Move or rename a file, optionally over an existing one.
#[derive(Debug)]
pub(crate) struct MoveFile {
    pub source: AbsolutePath,
    pub destination: AbsolutePath,
    pub overwrite: bool,
}

impl Operation for MoveFile {
    type Output = ();

    const NAME: &'static str = "move_file";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let MoveFile {
            source,
            destination,
            overwrite,
        } = self;

        let src_id = state.existing_file(&source)?;
        if state.handles.blocks_delete(src_id) {
            return Err(FsError::sharing_violation(source.to_string()));
        }
        if destination.is_root() {
            return Err(FsError::access_denied(destination.to_string()));
        }
        let dst_parent = state.tree.resolve_parent(&destination)?;

        let replaced = match state.tree.lookup(&destination) {
            Some(id) if id == src_id => None,
            Some(id) => {
                let node = state.tree.node(id, &destination)?;
                if node.is_dir() || !overwrite {
                    return Err(FsError::file_already_exists(destination.to_string()));
                }
                if node.is_read_only() {
                    return Err(FsError::access_denied(destination.to_string()));
                }
                if state.handles.is_open(id) {
                    return Err(FsError::sharing_violation(destination.to_string()));
                }
                Some((id, node.len()))
            }
            None => None,
        };

        let len = state.tree.node(src_id, &source)?.len();
        let mut txn = LedgerTxn::new();
        if !same_volume(&source, &destination) {
            txn.credit(&source, len).debit(&destination, len);
        }
        if let Some((_, old_len)) = replaced {
            txn.credit(&destination, old_len);
        }
        state.volumes.apply(&txn, &destination)?;

        if let Some((id, _)) = replaced {
            state.tree.remove(id, now);
            state.emit(RawChange::deleted(destination.clone(), false));
        }
        state.tree.relocate(src_id, dst_parent, destination.name(), now);
        let moved = state.tree.path_of(src_id).unwrap_or(destination);
        state.emit(RawChange::renamed(source, moved, false));
        Ok(())
    }
}

/// Put `source` in place of `destination`, keeping the old destination as
/// `backup` when one is given.
#[derive(Debug)]
pub(crate) struct ReplaceFile {
    pub source: AbsolutePath,
    pub destination: AbsolutePath,
    pub backup: Option<AbsolutePath>,
}

impl Operation for ReplaceFile {
    type Output = ();

    const NAME: &'static str = "replace_file";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let ReplaceFile {
            source,
            destination,
            backup,
        } = self;

        let src_id = state.existing_file(&source)?;
        let dst_id = state.existing_file(&destination)?;
        if src_id == dst_id {
            return Err(FsError::sharing_violation(destination.to_string()));
        }
        let dst = state.tree.node(dst_id, &destination)?;
        if dst.is_read_only() {
            return Err(FsError::access_denied(destination.to_string()));
        }
        let (dst_len, dst_attributes, dst_created) =
            (dst.len(), dst.attributes, dst.times.creation);
        let dst_parent = state.tree.resolve_parent(&destination)?;
        if state.handles.blocks_delete(src_id) {
            return Err(FsError::sharing_violation(source.to_string()));
        }
        if state.handles.blocks_delete(dst_id) {
            return Err(FsError::sharing_violation(destination.to_string()));
        }

        // (path, parent, replaced backup)
        let backup = match backup {
            Some(path) => {
                if path.is_root() {
                    return Err(FsError::access_denied(path.to_string()));
                }
                let parent = state.tree.resolve_parent(&path)?;
                let old = match state.tree.lookup(&path) {
                    Some(id) if id == src_id || id == dst_id => {
                        return Err(FsError::sharing_violation(path.to_string()))
                    }
                    Some(id) => {
                        let node = state.tree.node(id, &path)?;
                        if node.is_dir() || node.is_read_only() {
                            return Err(FsError::access_denied(path.to_string()));
                        }
                        if state.handles.is_open(id) {
                            return Err(FsError::sharing_violation(path.to_string()));
                        }
                        Some((id, node.len()))
                    }
                    None => None,
                };
                Some((path, parent, old))
            }
            None => None,
        };

        let src_len = state.tree.node(src_id, &source)?.len();
        let mut txn = LedgerTxn::new();
        txn.credit(&source, src_len)
            .resize(&destination, dst_len, src_len);
        if let Some((path, _, old)) = &backup {
            txn.debit(path, dst_len);
            if let Some((_, old_len)) = old {
                txn.credit(path, *old_len);
            }
        }
        state.volumes.apply(&txn, &destination)?;

        match &backup {
            Some((path, parent, old)) => {
                if let Some((id, _)) = old {
                    state.tree.remove(*id, now);
                }
                state.tree.relocate(dst_id, *parent, path.name(), now);
            }
            None => state.tree.remove(dst_id, now),
        }
        state.tree.relocate(src_id, dst_parent, destination.name(), now);
        let node = state.tree.node_mut(src_id, &destination)?;
        node.attributes = dst_attributes;
        node.times.creation = dst_created;

        state.emit(RawChange::deleted(source, false));
        state.emit(RawChange::changed(
            destination,
            NotifyFilters::SIZE | NotifyFilters::LAST_WRITE,
        ));
        if let Some((path, _, old)) = backup {
            match old {
                Some(_) => state.emit(RawChange::changed(
                    path,
                    NotifyFilters::SIZE | NotifyFilters::LAST_WRITE,
                )),
                None => state.emit(RawChange::created(path, false)),
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct GetAttributes {
    pub path: AbsolutePath,
}

impl Operation for GetAttributes {
    type Output = FileAttributes;

    const NAME: &'static str = "get_attributes";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<FileAttributes> {
        let id = state.existing_entry(&self.path)?;
        Ok(state.tree.node(id, &self.path)?.attributes)
    }
}

#[derive(Debug)]
pub(crate) struct SetAttributes {
    pub path: AbsolutePath,
    pub attributes: FileAttributes,
}

impl Operation for SetAttributes {
    type Output = ();

    const NAME: &'static str = "set_attributes";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<()> {
        let id = state.existing_entry(&self.path)?;
        let node = state.tree.node_mut(id, &self.path)?;
        node.attributes = if node.is_dir() {
            self.attributes.for_directory()
        } else {
            self.attributes.for_file()
        };
        state.emit(RawChange::changed(self.path, NotifyFilters::ATTRIBUTES));
        Ok(())
    }
}

/// Read one timestamp. A missing entry reads as the filesystem epoch.
#[derive(Debug)]
pub(crate) struct GetTime {
    pub path: AbsolutePath,
    pub kind: TimeKind,
}

impl Operation for GetTime {
    type Output = DateTime<Utc>;

    const NAME: &'static str = "get_time";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<DateTime<Utc>> {
        let Some(node) = state.tree.lookup(&self.path).and_then(|id| state.tree.get(id)) else {
            return Ok(file_time_epoch());
        };
        Ok(match self.kind {
            TimeKind::Creation => node.times.creation,
            TimeKind::LastWrite => node.times.last_write,
            TimeKind::LastAccess => node.times.last_access,
        })
    }
}

#[derive(Debug)]
pub(crate) struct SetTime {
    pub path: AbsolutePath,
    pub kind: TimeKind,
    pub value: DateTime<Utc>,
}

impl Operation for SetTime {
    type Output = ();

    const NAME: &'static str = "set_time";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<()> {
        let id = state
            .tree
            .lookup(&self.path)
            .ok_or_else(|| FsError::file_not_found(self.path.to_string()))?;
        let node = state.tree.node_mut(id, &self.path)?;
        let filter = match self.kind {
            TimeKind::Creation => {
                node.times.creation = self.value;
                NotifyFilters::CREATION_TIME
            }
            TimeKind::LastWrite => {
                node.times.last_write = self.value;
                NotifyFilters::LAST_WRITE
            }
            TimeKind::LastAccess => {
                node.times.last_access = self.value;
                NotifyFilters::LAST_ACCESS
            }
        };
        state.emit(RawChange::changed(self.path, filter));
        Ok(())
    }
}
