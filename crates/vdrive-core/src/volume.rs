//! Per-volume capacity and free-space bookkeeping
//!
//! Every size-changing operation describes its byte deltas in a
//! [`LedgerTxn`] and applies it before touching the tree. A transaction is
//! all-or-nothing: if any volume would go below zero free bytes, nothing is
//! committed.

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{FsError, FsResult};
use crate::path::{fold, AbsolutePath, SEPARATOR};
use crate::types::{DriveInfo, DriveType};

/// Capacity given to volumes that do not state one (1 TiB).
pub const DEFAULT_CAPACITY: u64 = 1024 * 1024 * 1024 * 1024;
pub const DEFAULT_FORMAT: &str = "NTFS";

/// One drive or share
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Volume {
    /// Root token, e.g. `C:` or `\\server\share`.
    pub name: String,
    pub capacity: u64,
    pub free: u64,
    pub drive_type: DriveType,
    pub format: String,
    pub label: String,
    pub is_ready: bool,
}

impl Volume {
    pub fn new(name: impl Into<String>, capacity: u64, drive_type: DriveType) -> Self {
        Self {
            name: name.into(),
            capacity,
            free: capacity,
            drive_type,
            format: DEFAULT_FORMAT.to_string(),
            label: String::new(),
            is_ready: true,
        }
    }

    fn info(&self) -> DriveInfo {
        let name = if self.name.starts_with(SEPARATOR) {
            self.name.clone()
        } else {
            format!("{}{SEPARATOR}", self.name)
        };
        DriveInfo {
            name,
            is_ready: self.is_ready,
            total_size: self.capacity,
            total_free_space: self.free,
            available_free_space: self.free,
            drive_type: self.drive_type,
            drive_format: self.format.clone(),
            volume_label: self.label.clone(),
        }
    }
}

/// Pending byte deltas, keyed by volume
#[derive(Debug, Default)]
pub(crate) struct LedgerTxn {
    deltas: IndexMap<String, i128>,
}

impl LedgerTxn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes that will be allocated on `path`'s volume.
    pub fn debit(&mut self, path: &AbsolutePath, bytes: u64) -> &mut Self {
        *self.deltas.entry(fold(path.root())).or_default() += i128::from(bytes);
        self
    }

    /// Bytes that will be released on `path`'s volume.
    pub fn credit(&mut self, path: &AbsolutePath, bytes: u64) -> &mut Self {
        *self.deltas.entry(fold(path.root())).or_default() -= i128::from(bytes);
        self
    }

    /// Length change of a file on `path`'s volume.
    pub fn resize(&mut self, path: &AbsolutePath, old_len: u64, new_len: u64) -> &mut Self {
        if new_len >= old_len {
            self.debit(path, new_len - old_len)
        } else {
            self.credit(path, old_len - new_len)
        }
    }
}

/// All volumes, keyed by folded root token
#[derive(Debug, Default)]
pub(crate) struct VolumeLedger {
    volumes: IndexMap<String, Volume>,
}

impl VolumeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, volume: Volume) {
        self.volumes.insert(fold(&volume.name), volume);
    }

    pub fn contains(&self, root: &str) -> bool {
        self.volumes.contains_key(&fold(root))
    }

    pub fn get(&self, root: &str) -> Option<&Volume> {
        self.volumes.get(&fold(root))
    }

    /// Validate every delta in `txn`, then commit them together.
    ///
    /// `path` names the entry being written in the disk-full error.
    pub fn apply(&mut self, txn: &LedgerTxn, path: &AbsolutePath) -> FsResult<()> {
        self.apply_mounting(txn, path, None)
    }

    /// Like [`VolumeLedger::apply`], with `mount` added to the ledger in
    /// the same commit. Nothing is added when validation fails.
    pub fn apply_mounting(
        &mut self,
        txn: &LedgerTxn,
        path: &AbsolutePath,
        mount: Option<Volume>,
    ) -> FsResult<()> {
        let mount_key = mount.as_ref().map(|v| fold(&v.name));
        for (key, delta) in &txn.deltas {
            let free = match (self.volumes.get(key), &mount) {
                (Some(volume), _) => volume.free,
                (None, Some(volume)) if mount_key.as_deref() == Some(key.as_str()) => volume.free,
                (None, _) => return Err(FsError::drive_not_found(key.clone())),
            };
            if *delta > 0 && *delta > i128::from(free) {
                return Err(FsError::insufficient_disk_space(path.to_string()));
            }
        }

        if let Some(volume) = mount {
            self.add(volume);
        }
        for (key, delta) in &txn.deltas {
            let Some(volume) = self.volumes.get_mut(key) else {
                continue;
            };
            let free = (i128::from(volume.free) - delta).clamp(0, i128::from(volume.capacity));
            volume.free = u64::try_from(free).unwrap_or(volume.capacity);
            trace!(volume = %volume.name, delta = %delta, free = volume.free, "ledger adjusted");
        }
        Ok(())
    }

    /// Drive snapshots: letters in order, then shares.
    pub fn drives(&self) -> Vec<DriveInfo> {
        let mut volumes: Vec<&Volume> = self.volumes.values().collect();
        volumes.sort_by_key(|v| (v.name.starts_with(SEPARATOR), fold(&v.name)));
        volumes.into_iter().map(Volume::info).collect()
    }

    pub fn drive(&self, root: &str) -> Option<DriveInfo> {
        self.get(root).map(Volume::info)
    }
}
