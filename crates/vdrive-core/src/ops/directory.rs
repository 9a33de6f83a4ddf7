//! Directory handlers

use chrono::{DateTime, Utc};

use super::{DeleteChecks, FsState, Operation};
use crate::error::{FsError, FsResult};
use crate::path::{fold, AbsolutePath};
use crate::volume::LedgerTxn;
use crate::watcher::RawChange;

/// Create a directory and any missing parents.
#[derive(Debug)]
pub(crate) struct CreateDirectory {
    pub path: AbsolutePath,
}

impl Operation for CreateDirectory {
    type Output = AbsolutePath;

    const NAME: &'static str = "create_directory";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<AbsolutePath> {
        state.mount_share(&self.path, now)?;
        let (id, created) = state.tree.create_directories(self.path.navigator(), now)?;
        state.emit_all(created.into_iter().map(|p| RawChange::created(p, true)));
        Ok(state.tree.path_of(id).unwrap_or(self.path))
    }
}

#[derive(Debug)]
pub(crate) struct DeleteDirectory {
    pub path: AbsolutePath,
    pub recursive: bool,
}

impl Operation for DeleteDirectory {
    type Output = ();

    const NAME: &'static str = "delete_directory";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let path = self.path;

        // Unmounted roots keep the historical error split.
        if path.is_root() && !state.volumes.contains(path.root()) {
            return Err(if self.recursive {
                FsError::file_not_found(fold(&path.to_string()))
            } else {
                FsError::directory_not_empty(path.to_string())
            });
        }

        let id = state.existing_directory(&path)?;
        let checks = DeleteChecks {
            handles: &state.handles,
            current_dir: &state.current_dir,
        };
        let removed = state.tree.delete_directory(id, self.recursive, &checks, now)?;

        let mut txn = LedgerTxn::new();
        for entry in &removed {
            txn.credit(&entry.path, entry.len);
        }
        state.volumes.apply(&txn, &path)?;

        state.emit_all(
            removed
                .into_iter()
                .map(|entry| RawChange::deleted(entry.path, entry.is_dir)),
        );
        Ok(())
    }
}

/// Move or rename a directory with its whole subtree.
#[derive(Debug)]
pub(crate) struct MoveDirectory {
    pub source: AbsolutePath,
    pub destination: AbsolutePath,
}

impl Operation for MoveDirectory {
    type Output = ();

    const NAME: &'static str = "move_directory";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let MoveDirectory {
            source,
            destination,
        } = self;

        let id = state.existing_directory(&source)?;
        if state.tree.is_volume_root(id) {
            return Err(FsError::access_denied(source.to_string()));
        }
        if destination.is_root() {
            return Err(FsError::access_denied(destination.to_string()));
        }
        let renaming_in_place = source == destination;
        if !renaming_in_place {
            if destination.starts_with(&source) {
                return Err(FsError::invalid_path(destination.to_string()));
            }
            if state.tree.lookup(&destination).is_some() {
                return Err(FsError::entry_already_exists(destination.to_string()));
            }
        }

        // An unmounted share only has its root, so the destination must
        // sit directly under it.
        let share = state.pending_share(&destination)?;
        let new_parent = match share {
            Some(_) if destination.components().len() > 2 => {
                let missing =
                    AbsolutePath::from_components(destination.components()[..2].to_vec());
                return Err(FsError::directory_not_found(missing.to_string()));
            }
            Some(_) => None,
            None => Some(state.tree.resolve_parent(&destination)?),
        };

        let cwd_inside = state
            .tree
            .try_get_existing_directory(&state.current_dir)
            .is_some_and(|cwd| state.tree.is_ancestor_or_self(id, cwd));
        if cwd_inside {
            return Err(FsError::current_directory_in_use(source.to_string()));
        }
        for node in state.tree.subtree(id) {
            if state.handles.blocks_delete(node) {
                let offending = state.tree.path_of(node).unwrap_or_else(|| source.clone());
                return Err(FsError::sharing_violation(offending.to_string()));
            }
        }

        let mut txn = LedgerTxn::new();
        if fold(source.root()) != fold(destination.root()) {
            let bytes = state.tree.subtree_len(id);
            txn.credit(&source, bytes).debit(&destination, bytes);
        }
        state.commit(&txn, &destination, share, now)?;
        let new_parent = match new_parent {
            Some(parent) => parent,
            None => state.tree.resolve_parent(&destination)?,
        };

        state.tree.relocate(id, new_parent, destination.name(), now);
        let moved = state.tree.path_of(id).unwrap_or(destination);
        state.emit(RawChange::renamed(source, moved, true));
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct SetCurrentDirectory {
    pub path: AbsolutePath,
}

impl Operation for SetCurrentDirectory {
    type Output = ();

    const NAME: &'static str = "set_current_directory";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<()> {
        let id = state.existing_directory(&self.path)?;
        state.current_dir = state.tree.path_of(id).unwrap_or(self.path);
        Ok(())
    }
}
