//! Entry tree: directories and files of every mounted volume
//!
//! Nodes live in an arena keyed by [`NodeId`]. A directory owns its
//! children through its child map; the `parent` link on each node is a
//! plain id used to rebuild paths and answer ancestor queries, never to
//! decide when a node goes away. Removing a node removes its whole subtree
//! from the arena.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::{FsError, FsResult};
use crate::navigator::PathNavigator;
use crate::path::{fold, AbsolutePath};
use crate::types::{FileAttributes, FileTimes};

/// Internal node ID for tree nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u64);

#[derive(Clone, Debug, Default)]
pub(crate) struct DirectoryEntry {
    /// Folded name -> child. Iteration order is insertion order.
    pub children: IndexMap<String, NodeId>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct FileEntry {
    pub content: Vec<u8>,
}

#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    Directory(DirectoryEntry),
    File(FileEntry),
}

/// Tree node
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Display name, cased as first written.
    pub name: String,
    pub attributes: FileAttributes,
    pub times: FileTimes,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(FileAttributes::READ_ONLY)
    }

    pub fn len(&self) -> u64 {
        match &self.kind {
            NodeKind::File(file) => file.content.len() as u64,
            NodeKind::Directory(_) => 0,
        }
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match &self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileEntry> {
        match &mut self.kind {
            NodeKind::File(file) => Some(file),
            NodeKind::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntry> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            NodeKind::File(_) => None,
        }
    }
}

/// Entry removed by a delete, reported children first.
#[derive(Clone, Debug)]
pub(crate) struct RemovedEntry {
    pub path: AbsolutePath,
    pub is_dir: bool,
    pub len: u64,
}

/// What [`EntryTree::get_or_create_file`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Created,
    /// Existing file cut to zero; carries its previous length.
    Truncated(u64),
}

/// Outside state that can veto a delete.
pub(crate) trait DeleteGuard {
    /// Whether an open handle on `node` forbids deleting it.
    fn blocks_delete(&self, node: NodeId) -> bool;

    /// Whether `node` is the working directory or one of its ancestors.
    fn holds_current_directory(&self, tree: &EntryTree, node: NodeId) -> bool;
}

/// Hierarchical store of every entry
#[derive(Debug)]
pub(crate) struct EntryTree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_node_id: u64,
}

impl EntryTree {
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId(0),
            next_node_id: 1,
        };
        let root = Node {
            id: NodeId(0),
            parent: None,
            name: String::new(),
            attributes: FileAttributes::DIRECTORY,
            times: FileTimes::at(now),
            kind: NodeKind::Directory(DirectoryEntry::default()),
        };
        tree.nodes.insert(root.id, root);
        tree
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Node `id`, which is expected to live at `path`.
    pub fn node(&self, id: NodeId, path: &AbsolutePath) -> FsResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| FsError::file_not_found(path.to_string()))
    }

    pub fn node_mut(&mut self, id: NodeId, path: &AbsolutePath) -> FsResult<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| FsError::file_not_found(path.to_string()))
    }

    fn child_of(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&dir)?
            .as_directory()?
            .children
            .get(&fold(name))
            .copied()
    }

    /// Children of `dir` in insertion order.
    pub fn children(&self, dir: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&dir)
            .and_then(Node::as_directory)
            .map(|d| d.children.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_empty_dir(&self, dir: NodeId) -> bool {
        self.nodes
            .get(&dir)
            .and_then(Node::as_directory)
            .map(|d| d.children.is_empty())
            .unwrap_or(true)
    }

    // Volume roots

    /// Add a root directory for `root_token` unless one exists.
    pub fn mount(&mut self, root_token: &str, now: DateTime<Utc>) -> NodeId {
        if let Some(existing) = self.child_of(self.root, root_token) {
            return existing;
        }
        self.link_new(
            self.root,
            root_token,
            FileAttributes::DIRECTORY,
            now,
            NodeKind::Directory(DirectoryEntry::default()),
        )
    }

    pub fn volume_root(&self, root_token: &str) -> Option<NodeId> {
        self.child_of(self.root, root_token)
    }

    pub fn is_volume_root(&self, id: NodeId) -> bool {
        self.nodes.get(&id).and_then(|n| n.parent) == Some(self.root)
    }

    // Lookup

    /// Walk `nav` from the current component to the end.
    fn walk(&self, nav: &mut PathNavigator<'_>) -> Option<NodeId> {
        let mut current = self.root;
        while let Some(component) = nav.current() {
            current = self.child_of(current, component)?;
            nav.move_next();
        }
        Some(current)
    }

    pub fn lookup(&self, path: &AbsolutePath) -> Option<NodeId> {
        self.walk(&mut path.navigator())
    }

    /// Directory at `path`, or `None` when absent or a file.
    pub fn try_get_existing_directory(&self, path: &AbsolutePath) -> Option<NodeId> {
        self.lookup(path)
            .filter(|id| self.nodes.get(id).is_some_and(Node::is_dir))
    }

    /// File at `path`, or `None` when absent or a directory.
    pub fn try_get_existing_file(&self, path: &AbsolutePath) -> Option<NodeId> {
        self.lookup(path)
            .filter(|id| self.nodes.get(id).is_some_and(|n| !n.is_dir()))
    }

    /// Resolve the directory that holds `path`'s leaf.
    ///
    /// Fails with drive-not-found for an unmounted root and with
    /// directory-not-found naming the first missing (or non-directory)
    /// component otherwise.
    pub fn resolve_parent(&self, path: &AbsolutePath) -> FsResult<NodeId> {
        let mut nav = path.navigator();
        let mut current = self.root;
        while !nav.is_at_leaf() {
            let Some(component) = nav.current() else { break };
            let next = self.child_of(current, component).filter(|id| {
                self.nodes.get(id).is_some_and(Node::is_dir)
            });
            match next {
                Some(id) => current = id,
                None if nav.position() == 0 => {
                    return Err(FsError::drive_not_found(path.root_path().to_string()))
                }
                None => return Err(FsError::directory_not_found(nav.walked().to_string())),
            }
            nav.move_next();
        }
        Ok(current)
    }

    /// Create every missing directory along `nav` and return the last
    /// one, with the paths that were created.
    pub fn create_directories(
        &mut self,
        mut nav: PathNavigator<'_>,
        now: DateTime<Utc>,
    ) -> FsResult<(NodeId, Vec<AbsolutePath>)> {
        let path = nav.path();
        let root_token = nav.current().unwrap_or_default();
        let mut current = self
            .volume_root(root_token)
            .ok_or_else(|| FsError::drive_not_found(path.root_path().to_string()))?;
        let mut created = Vec::new();

        while nav.move_next() {
            let Some(component) = nav.current() else { break };
            current = match self.child_of(current, component) {
                Some(id) if self.nodes.get(&id).is_some_and(Node::is_dir) => id,
                Some(_) => return Err(FsError::entry_already_exists(nav.walked().to_string())),
                None => {
                    let id = self.link_new(
                        current,
                        component,
                        FileAttributes::DIRECTORY,
                        now,
                        NodeKind::Directory(DirectoryEntry::default()),
                    );
                    created.push(nav.walked());
                    id
                }
            };
        }

        Ok((current, created))
    }

    /// Find or create the file at `path`.
    ///
    /// The parent directory must exist. An existing file is an error
    /// unless `overwrite`, in which case its content is dropped.
    pub fn get_or_create_file(
        &mut self,
        path: &AbsolutePath,
        overwrite: bool,
        now: DateTime<Utc>,
    ) -> FsResult<(NodeId, FileOutcome)> {
        if path.is_root() {
            return Err(FsError::access_denied(path.to_string()));
        }
        let parent = self.resolve_parent(path)?;

        match self.child_of(parent, path.name()) {
            Some(id) => {
                let node = self
                    .nodes
                    .get_mut(&id)
                    .ok_or_else(|| FsError::file_not_found(path.to_string()))?;
                let file = match &mut node.kind {
                    NodeKind::Directory(_) => {
                        return Err(FsError::entry_already_exists(path.to_string()))
                    }
                    NodeKind::File(file) => file,
                };
                if !overwrite {
                    return Err(FsError::file_already_exists(path.to_string()));
                }
                let old_len = file.content.len() as u64;
                file.content = Vec::new();
                node.times.last_write = now;
                node.times.last_access = now;
                Ok((id, FileOutcome::Truncated(old_len)))
            }
            None => {
                let id = self.link_new(
                    parent,
                    path.name(),
                    FileAttributes::ARCHIVE,
                    now,
                    NodeKind::File(FileEntry::default()),
                );
                Ok((id, FileOutcome::Created))
            }
        }
    }

    fn link_new(
        &mut self,
        parent: NodeId,
        name: &str,
        attributes: FileAttributes,
        now: DateTime<Utc>,
        kind: NodeKind,
    ) -> NodeId {
        let id = self.allocate_node_id();
        let node = Node {
            id,
            parent: Some(parent),
            name: name.to_string(),
            attributes,
            times: FileTimes::at(now),
            kind,
        };
        self.nodes.insert(id, node);
        self.link(parent, id, name, now);
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId, name: &str, now: DateTime<Utc>) {
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            if let NodeKind::Directory(dir) = &mut parent_node.kind {
                dir.children.insert(fold(name), child);
            }
            parent_node.times.last_write = now;
            parent_node.times.last_access = now;
        }
    }

    fn unlink(&mut self, child: NodeId, now: DateTime<Utc>) {
        let Some((parent, key)) = self
            .nodes
            .get(&child)
            .and_then(|n| n.parent.map(|p| (p, fold(&n.name))))
        else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            if let NodeKind::Directory(dir) = &mut parent_node.kind {
                dir.children.shift_remove(&key);
            }
            parent_node.times.last_write = now;
            parent_node.times.last_access = now;
        }
    }

    // Structure queries

    /// Rebuild the path of `id` from parent links.
    pub fn path_of(&self, id: NodeId) -> Option<AbsolutePath> {
        let mut components = Vec::new();
        let mut current = self.nodes.get(&id)?;
        while let Some(parent) = current.parent {
            components.push(current.name.clone());
            current = self.nodes.get(&parent)?;
        }
        if components.is_empty() {
            return None;
        }
        components.reverse();
        Some(AbsolutePath::from_components(components))
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// `id` and all of its descendants, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Total file bytes in the subtree rooted at `id`.
    pub fn subtree_len(&self, id: NodeId) -> u64 {
        self.subtree(id)
            .into_iter()
            .filter_map(|n| self.nodes.get(&n))
            .map(Node::len)
            .sum()
    }

    // Mutation

    /// Move `id` under `new_parent` as `new_name`.
    pub fn relocate(&mut self, id: NodeId, new_parent: NodeId, new_name: &str, now: DateTime<Utc>) {
        self.unlink(id, now);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(new_parent);
            node.name = new_name.to_string();
        }
        self.link(new_parent, id, new_name, now);
    }

    /// Duplicate the subtree at `source` under `dest_parent` as `name`.
    /// File buffers are copied, not shared.
    pub fn deep_copy(
        &mut self,
        source: NodeId,
        dest_parent: NodeId,
        name: &str,
        now: DateTime<Utc>,
    ) -> Option<NodeId> {
        let original = self.nodes.get(&source)?.clone();
        let kind = match &original.kind {
            NodeKind::File(file) => NodeKind::File(FileEntry {
                content: file.content.clone(),
            }),
            NodeKind::Directory(_) => NodeKind::Directory(DirectoryEntry::default()),
        };
        let copy = self.link_new(dest_parent, name, original.attributes, now, kind);
        if let Some(node) = self.nodes.get_mut(&copy) {
            node.times.last_write = original.times.last_write;
        }

        for child in self.children(source) {
            let child_name = self.nodes.get(&child)?.name.clone();
            self.deep_copy(child, copy, &child_name, now)?;
        }
        Some(copy)
    }

    /// Drop `id` and its subtree from the arena.
    pub fn remove(&mut self, id: NodeId, now: DateTime<Utc>) {
        self.unlink(id, now);
        for node in self.subtree(id) {
            self.nodes.remove(&node);
        }
    }

    fn removal_report(&self, id: NodeId) -> Vec<RemovedEntry> {
        let mut report: Vec<RemovedEntry> = self
            .subtree(id)
            .into_iter()
            .filter_map(|n| {
                let node = self.nodes.get(&n)?;
                Some(RemovedEntry {
                    path: self.path_of(n)?,
                    is_dir: node.is_dir(),
                    len: node.len(),
                })
            })
            .collect();
        report.reverse();
        report
    }

    /// Delete the file `id` after checking read-only and open handles.
    pub fn delete_file(
        &mut self,
        id: NodeId,
        guard: &dyn DeleteGuard,
        now: DateTime<Utc>,
    ) -> FsResult<RemovedEntry> {
        let path = self
            .path_of(id)
            .ok_or_else(|| FsError::file_not_found(String::new()))?;
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| FsError::file_not_found(path.to_string()))?;
        if node.is_dir() || node.is_read_only() {
            return Err(FsError::access_denied(path.to_string()));
        }
        if guard.blocks_delete(id) {
            return Err(FsError::sharing_violation(path.to_string()));
        }
        let len = node.len();
        self.remove(id, now);
        Ok(RemovedEntry {
            path,
            is_dir: false,
            len,
        })
    }

    /// Delete the directory `id`.
    ///
    /// The whole subtree is validated before anything is removed: a
    /// read-only entry, an open file, the working directory or a volume
    /// root aborts the delete with nothing changed.
    pub fn delete_directory(
        &mut self,
        id: NodeId,
        recursive: bool,
        guard: &dyn DeleteGuard,
        now: DateTime<Utc>,
    ) -> FsResult<Vec<RemovedEntry>> {
        let path = self
            .path_of(id)
            .ok_or_else(|| FsError::directory_not_found(String::new()))?;

        if self.is_volume_root(id) {
            return Err(FsError::access_denied(path.to_string()));
        }
        if !recursive && !self.is_empty_dir(id) {
            return Err(FsError::directory_not_empty(path.to_string()));
        }
        if guard.holds_current_directory(self, id) {
            return Err(FsError::current_directory_in_use(path.to_string()));
        }

        for node_id in self.subtree(id) {
            let Some(node) = self.nodes.get(&node_id) else {
                continue;
            };
            if node.is_read_only() {
                let offending = self.path_of(node_id).unwrap_or_else(|| path.clone());
                return Err(FsError::access_denied(offending.to_string()));
            }
            if guard.blocks_delete(node_id) {
                let offending = self.path_of(node_id).unwrap_or_else(|| path.clone());
                return Err(FsError::sharing_violation(offending.to_string()));
            }
        }

        let report = self.removal_report(id);
        self.remove(id, now);
        Ok(report)
    }
}
