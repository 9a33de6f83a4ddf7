//! Handlers behind an open [`crate::FileStream`]

use std::fmt;

use chrono::{DateTime, Utc};

use super::{FsState, Operation};
use crate::error::{FsError, FsResult};
use crate::path::AbsolutePath;
use crate::tree::NodeId;
use crate::types::HandleId;
use crate::volume::LedgerTxn;
use crate::watcher::{NotifyFilters, RawChange};

/// Node behind `handle` and its current path. `opened_as` names the file
/// in errors once it is gone.
fn target(
    state: &FsState,
    handle: HandleId,
    opened_as: &AbsolutePath,
) -> FsResult<(NodeId, AbsolutePath)> {
    let node = state
        .handles
        .get(handle)
        .map(|h| h.node_id)
        .ok_or_else(|| FsError::file_not_found(opened_as.to_string()))?;
    let path = state
        .tree
        .path_of(node)
        .ok_or_else(|| FsError::file_not_found(opened_as.to_string()))?;
    Ok((node, path))
}

fn size_filters(old_len: u64, new_len: u64) -> NotifyFilters {
    if old_len == new_len {
        NotifyFilters::LAST_WRITE
    } else {
        NotifyFilters::SIZE | NotifyFilters::LAST_WRITE
    }
}

#[derive(Debug)]
pub(crate) struct ReadAt<'a> {
    pub handle: HandleId,
    pub path: &'a AbsolutePath,
    pub offset: u64,
    pub len: usize,
}

impl Operation for ReadAt<'_> {
    type Output = Vec<u8>;

    const NAME: &'static str = "read";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<Vec<u8>> {
        let (node_id, path) = target(state, self.handle, self.path)?;
        let node = state.tree.node_mut(node_id, &path)?;
        node.times.last_access = now;
        let content = node
            .as_file()
            .map(|f| f.content.as_slice())
            .unwrap_or_default();
        let start = usize::try_from(self.offset)
            .unwrap_or(usize::MAX)
            .min(content.len());
        let end = start.saturating_add(self.len).min(content.len());
        Ok(content[start..end].to_vec())
    }
}

pub(crate) struct WriteAt<'a> {
    pub handle: HandleId,
    pub path: &'a AbsolutePath,
    pub offset: u64,
    pub data: &'a [u8],
}

impl fmt::Debug for WriteAt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteAt")
            .field("handle", &self.handle)
            .field("path", &self.path.to_string())
            .field("offset", &self.offset)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Operation for WriteAt<'_> {
    type Output = ();

    const NAME: &'static str = "write";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let (node_id, path) = target(state, self.handle, self.path)?;
        let old_len = state.tree.node(node_id, &path)?.len();
        let (start, end) = usize::try_from(self.offset)
            .ok()
            .and_then(|start| Some((start, start.checked_add(self.data.len())?)))
            .ok_or_else(|| FsError::insufficient_disk_space(path.to_string()))?;
        let new_len = old_len.max(end as u64);

        let mut txn = LedgerTxn::new();
        txn.resize(&path, old_len, new_len);
        state.volumes.apply(&txn, &path)?;

        let node = state.tree.node_mut(node_id, &path)?;
        if let Some(file) = node.as_file_mut() {
            if file.content.len() < end {
                file.content.resize(end, 0);
            }
            file.content[start..end].copy_from_slice(self.data);
        }
        node.times.last_write = now;
        node.times.last_access = now;

        state.emit(RawChange::changed(path, size_filters(old_len, new_len)));
        Ok(())
    }
}

/// Grow (zero-filled) or cut the file behind a handle.
#[derive(Debug)]
pub(crate) struct SetLength<'a> {
    pub handle: HandleId,
    pub path: &'a AbsolutePath,
    pub len: u64,
}

impl Operation for SetLength<'_> {
    type Output = ();

    const NAME: &'static str = "set_length";

    fn apply(self, state: &mut FsState, now: DateTime<Utc>) -> FsResult<()> {
        let (node_id, path) = target(state, self.handle, self.path)?;
        let old_len = state.tree.node(node_id, &path)?.len();
        let new_len = usize::try_from(self.len)
            .map_err(|_| FsError::insufficient_disk_space(path.to_string()))?;

        let mut txn = LedgerTxn::new();
        txn.resize(&path, old_len, self.len);
        state.volumes.apply(&txn, &path)?;

        let node = state.tree.node_mut(node_id, &path)?;
        if let Some(file) = node.as_file_mut() {
            file.content.resize(new_len, 0);
        }
        node.times.last_write = now;
        node.times.last_access = now;

        state.emit(RawChange::changed(path, size_filters(old_len, self.len)));
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct HandleLength<'a> {
    pub handle: HandleId,
    pub path: &'a AbsolutePath,
}

impl Operation for HandleLength<'_> {
    type Output = u64;

    const NAME: &'static str = "length";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<u64> {
        let (node_id, path) = target(state, self.handle, self.path)?;
        Ok(state.tree.node(node_id, &path)?.len())
    }
}

#[derive(Debug)]
pub(crate) struct CloseHandle {
    pub handle: HandleId,
}

impl Operation for CloseHandle {
    type Output = ();

    const NAME: &'static str = "close";

    fn apply(self, state: &mut FsState, _now: DateTime<Utc>) -> FsResult<()> {
        state.handles.close(self.handle);
        Ok(())
    }
}
