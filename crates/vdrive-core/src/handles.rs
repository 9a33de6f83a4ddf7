//! Open-handle registry and sharing rules

use std::collections::HashMap;

use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::path::AbsolutePath;
use crate::tree::NodeId;
use crate::types::{FileAccess, FileShare, HandleId};

/// Open stream on a file entry
#[derive(Clone, Debug)]
pub(crate) struct OpenHandle {
    pub node_id: NodeId,
    pub access: FileAccess,
    pub share: FileShare,
}

impl OpenHandle {
    /// Whether a second open with `access`/`share` can coexist with this one.
    ///
    /// Each side must allow what the other one does: the new handle's
    /// access has to be in this handle's share mode and this handle's
    /// access has to be in the new handle's share mode.
    fn admits(&self, access: FileAccess, share: FileShare) -> bool {
        let wanted_by_new = access_as_share(access);
        let held_by_self = access_as_share(self.access);
        self.share.contains(wanted_by_new) && share.contains(held_by_self)
    }
}

fn access_as_share(access: FileAccess) -> FileShare {
    match access {
        FileAccess::Read => FileShare::READ,
        FileAccess::Write => FileShare::WRITE,
        FileAccess::ReadWrite => FileShare::READ_WRITE,
    }
}

/// Tracks every open handle, per entry
#[derive(Debug)]
pub(crate) struct HandleRegistry {
    handles: HashMap<HandleId, OpenHandle>,
    next_handle_id: u64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            next_handle_id: 1,
        }
    }

    fn allocate_handle_id(&mut self) -> HandleId {
        let id = HandleId::new(self.next_handle_id);
        self.next_handle_id += 1;
        id
    }

    /// Fail with a sharing violation naming `path` if an open with
    /// `access`/`share` conflicts with a handle already on `node_id`.
    pub fn check_open(
        &self,
        node_id: NodeId,
        path: &AbsolutePath,
        access: FileAccess,
        share: FileShare,
    ) -> FsResult<()> {
        let conflict = self
            .handles_on(node_id)
            .any(|existing| !existing.admits(access, share));
        if conflict {
            return Err(FsError::sharing_violation(path.to_string()));
        }
        Ok(())
    }

    pub fn open(
        &mut self,
        node_id: NodeId,
        path: &AbsolutePath,
        access: FileAccess,
        share: FileShare,
    ) -> FsResult<HandleId> {
        self.check_open(node_id, path, access, share)?;
        let id = self.allocate_handle_id();
        self.handles.insert(
            id,
            OpenHandle {
                node_id,
                access,
                share,
            },
        );
        trace!(handle = id.as_u64(), path = %path, ?access, ?share, "handle opened");
        Ok(id)
    }

    pub fn close(&mut self, id: HandleId) -> Option<OpenHandle> {
        let handle = self.handles.remove(&id);
        if handle.is_some() {
            trace!(handle = id.as_u64(), "handle closed");
        }
        handle
    }

    pub fn get(&self, id: HandleId) -> Option<&OpenHandle> {
        self.handles.get(&id)
    }

    pub fn handles_on(&self, node_id: NodeId) -> impl Iterator<Item = &OpenHandle> {
        self.handles.values().filter(move |h| h.node_id == node_id)
    }

    pub fn is_open(&self, node_id: NodeId) -> bool {
        self.handles_on(node_id).next().is_some()
    }

    /// An open handle blocks delete, move and replace of its entry unless
    /// it was opened with [`FileShare::DELETE`].
    pub fn blocks_delete(&self, node_id: NodeId) -> bool {
        self.handles_on(node_id)
            .any(|h| !h.share.contains(FileShare::DELETE))
    }

    /// Whether some handle on `node_id` would refuse a plain reader, as a
    /// copy needs for its source.
    pub fn blocks_read(&self, node_id: NodeId) -> bool {
        self.handles_on(node_id)
            .any(|h| !h.admits(FileAccess::Read, FileShare::READ_WRITE | FileShare::DELETE))
    }
}
