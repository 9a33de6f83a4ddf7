//! Change notification for watched directories
//!
//! Tree mutations are reported to the [`WatcherRegistry`] while the engine
//! lock is held, so every subscription sees changes in mutation order.
//! Each subscription owns a bounded queue and a worker thread that applies
//! the notify filter and calls the registered callbacks. Enqueueing never
//! blocks the operation that produced the change: when a queue is full the
//! change is dropped and an error event is raised once the worker catches up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::error::FsResult;
use crate::path::AbsolutePath;
use crate::pattern::PathPattern;
use crate::types::SubscriptionId;

bitflags::bitflags! {
    /// Categories of change a subscription listens for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyFilters: u32 {
        const FILE_NAME = 0x001;
        const DIRECTORY_NAME = 0x002;
        const ATTRIBUTES = 0x004;
        const SIZE = 0x008;
        const LAST_WRITE = 0x010;
        const LAST_ACCESS = 0x020;
        const CREATION_TIME = 0x040;
        const SECURITY = 0x100;
    }
}

impl Default for NotifyFilters {
    fn default() -> Self {
        NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME | NotifyFilters::LAST_WRITE
    }
}

/// What happened to an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Deleted,
    Changed,
    Renamed,
}

/// Change as reported by the tree, before any subscription scoping.
#[derive(Clone, Debug)]
pub(crate) struct RawChange {
    pub kind: ChangeKind,
    pub path: AbsolutePath,
    pub old_path: Option<AbsolutePath>,
    pub filters: NotifyFilters,
}

fn name_filter(is_dir: bool) -> NotifyFilters {
    if is_dir {
        NotifyFilters::DIRECTORY_NAME
    } else {
        NotifyFilters::FILE_NAME
    }
}

impl RawChange {
    pub fn created(path: AbsolutePath, is_dir: bool) -> Self {
        Self {
            kind: ChangeKind::Created,
            path,
            old_path: None,
            filters: name_filter(is_dir),
        }
    }

    pub fn deleted(path: AbsolutePath, is_dir: bool) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            path,
            old_path: None,
            filters: name_filter(is_dir),
        }
    }

    pub fn changed(path: AbsolutePath, filters: NotifyFilters) -> Self {
        Self {
            kind: ChangeKind::Changed,
            path,
            old_path: None,
            filters,
        }
    }

    pub fn renamed(old_path: AbsolutePath, path: AbsolutePath, is_dir: bool) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path,
            old_path: Some(old_path),
            filters: name_filter(is_dir),
        }
    }
}

/// Event handed to `created`/`deleted`/`changed`/`renamed` callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSystemEventArgs {
    pub change_type: ChangeKind,
    pub full_path: String,
    /// Path relative to the watched directory.
    pub name: String,
    pub old_full_path: Option<String>,
    pub old_name: Option<String>,
}

/// Event handed to `error` callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatcherError {
    pub path: String,
    pub message: String,
}

type EventCallback = Arc<dyn Fn(&FileSystemEventArgs) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&WatcherError) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    created: Vec<EventCallback>,
    deleted: Vec<EventCallback>,
    changed: Vec<EventCallback>,
    renamed: Vec<EventCallback>,
    error: Vec<ErrorCallback>,
}

struct Settings {
    enabled: bool,
    recursive: bool,
    notify_filter: NotifyFilters,
    filter: PathPattern,
}

/// State shared between the registry, the watcher handle and its worker.
struct Subscription {
    id: SubscriptionId,
    root: AbsolutePath,
    settings: Mutex<Settings>,
    callbacks: RwLock<Callbacks>,
    sender: Mutex<Option<Sender<RawChange>>>,
    pending: Mutex<usize>,
    idle: Condvar,
    overflowed: AtomicBool,
    cancelled: AtomicBool,
}

impl Subscription {
    /// Scope `change` to this subscription, or drop it.
    fn scope(&self, change: &RawChange) -> Option<RawChange> {
        let settings = self.settings.lock();
        if !settings.enabled {
            return None;
        }
        let in_scope = |path: &AbsolutePath| match path.relative_to(&self.root) {
            Some([]) | None => false,
            Some(rest) => settings.recursive || rest.len() == 1,
        };
        let name_matches = |path: &AbsolutePath| settings.filter.is_match(path.name());

        match &change.old_path {
            Some(old) => {
                let (old_in, new_in) = (in_scope(old), in_scope(&change.path));
                let scoped = match (old_in, new_in) {
                    (true, true) => change.clone(),
                    (true, false) => RawChange {
                        kind: ChangeKind::Deleted,
                        path: old.clone(),
                        old_path: None,
                        filters: change.filters,
                    },
                    (false, true) => RawChange {
                        kind: ChangeKind::Created,
                        path: change.path.clone(),
                        old_path: None,
                        filters: change.filters,
                    },
                    (false, false) => return None,
                };
                let matches = name_matches(&scoped.path)
                    || scoped.old_path.as_ref().is_some_and(|p| name_matches(p));
                matches.then_some(scoped)
            }
            None => {
                (in_scope(&change.path) && name_matches(&change.path)).then(|| change.clone())
            }
        }
    }

    fn offer(&self, change: &RawChange) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let Some(scoped) = self.scope(change) else {
            return;
        };
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return;
        };

        *self.pending.lock() += 1;
        match sender.try_send(scoped) {
            Ok(()) => trace!(subscription = ?self.id, path = %change.path, kind = ?change.kind, "change queued"),
            Err(TrySendError::Full(dropped)) => {
                self.finish_one();
                if !self.overflowed.swap(true, Ordering::AcqRel) {
                    warn!(subscription = ?self.id, path = %dropped.path, "watcher queue full, dropping changes");
                }
            }
            Err(TrySendError::Disconnected(_)) => self.finish_one(),
        }
    }

    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }

    fn relative_name(&self, path: &AbsolutePath) -> String {
        path.relative_to(&self.root)
            .map(|rest| rest.join("\\"))
            .unwrap_or_else(|| path.name().to_string())
    }

    fn dispatch(&self, change: &RawChange) {
        let notify_filter = self.settings.lock().notify_filter;
        if !change.filters.intersects(notify_filter) {
            return;
        }

        let args = FileSystemEventArgs {
            change_type: change.kind,
            full_path: change.path.to_string(),
            name: self.relative_name(&change.path),
            old_full_path: change.old_path.as_ref().map(ToString::to_string),
            old_name: change.old_path.as_ref().map(|p| self.relative_name(p)),
        };
        let targets = {
            let callbacks = self.callbacks.read();
            match change.kind {
                ChangeKind::Created => callbacks.created.clone(),
                ChangeKind::Deleted => callbacks.deleted.clone(),
                ChangeKind::Changed => callbacks.changed.clone(),
                ChangeKind::Renamed => callbacks.renamed.clone(),
            }
        };
        for callback in targets {
            callback(&args);
        }
    }

    fn dispatch_overflow(&self) {
        let error = WatcherError {
            path: self.root.to_string(),
            message: format!("Too many changes at once in directory:{}.", self.root),
        };
        let targets = self.callbacks.read().error.clone();
        for callback in targets {
            callback(&error);
        }
    }

    fn run(self: Arc<Self>, receiver: Receiver<RawChange>) {
        for change in receiver.iter() {
            if !self.cancelled.load(Ordering::Acquire) {
                self.dispatch(&change);
                if self.overflowed.swap(false, Ordering::AcqRel) {
                    self.dispatch_overflow();
                }
            }
            self.finish_one();
        }
        debug!(subscription = ?self.id, "watcher worker stopped");
    }
}

/// Every live subscription. Lives inside the engine state, so it is only
/// touched under the engine lock.
#[derive(Default)]
pub(crate) struct WatcherRegistry {
    subscriptions: Vec<Arc<Subscription>>,
}

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription on `root` and start its worker.
    pub fn subscribe(&mut self, root: AbsolutePath, queue_capacity: usize) -> FileSystemWatcher {
        let (sender, receiver) = crossbeam_channel::bounded(queue_capacity.max(1));
        let id = SubscriptionId::new(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));
        let subscription = Arc::new(Subscription {
            id,
            root,
            settings: Mutex::new(Settings {
                enabled: false,
                recursive: false,
                notify_filter: NotifyFilters::default(),
                filter: PathPattern::match_all(),
            }),
            callbacks: RwLock::new(Callbacks::default()),
            sender: Mutex::new(Some(sender)),
            pending: Mutex::new(0),
            idle: Condvar::new(),
            overflowed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        });

        let worker = Arc::clone(&subscription);
        std::thread::spawn(move || worker.run(receiver));
        debug!(subscription = ?id, path = %subscription.root, "watcher subscribed");

        self.subscriptions.push(Arc::clone(&subscription));
        FileSystemWatcher { subscription }
    }

    /// Fan `change` out to every live subscription.
    pub fn notify(&mut self, change: RawChange) {
        self.subscriptions
            .retain(|s| !s.cancelled.load(Ordering::Acquire));
        for subscription in &self.subscriptions {
            subscription.offer(&change);
        }
    }

    pub fn notify_all(&mut self, changes: impl IntoIterator<Item = RawChange>) {
        for change in changes {
            self.notify(change);
        }
    }
}

/// Handle to a watcher subscription.
///
/// Starts disabled, non-recursive, with the default notify filter and a
/// `*` name filter. Dropping it stops dispatch and discards queued events.
pub struct FileSystemWatcher {
    subscription: Arc<Subscription>,
}

impl FileSystemWatcher {
    pub fn path(&self) -> &AbsolutePath {
        &self.subscription.root
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription.settings.lock().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.subscription.settings.lock().enabled = enabled;
    }

    pub fn include_subdirectories(&self) -> bool {
        self.subscription.settings.lock().recursive
    }

    pub fn set_include_subdirectories(&self, recursive: bool) {
        self.subscription.settings.lock().recursive = recursive;
    }

    pub fn notify_filter(&self) -> NotifyFilters {
        self.subscription.settings.lock().notify_filter
    }

    pub fn set_notify_filter(&self, filter: NotifyFilters) {
        self.subscription.settings.lock().notify_filter = filter;
    }

    /// Only report entries whose name matches `pattern`.
    pub fn set_filter(&self, pattern: &str) -> FsResult<()> {
        let compiled = if pattern.is_empty() {
            PathPattern::match_all()
        } else {
            PathPattern::new(pattern)?
        };
        self.subscription.settings.lock().filter = compiled;
        Ok(())
    }

    pub fn on_created(&self, callback: impl Fn(&FileSystemEventArgs) + Send + Sync + 'static) {
        self.subscription.callbacks.write().created.push(Arc::new(callback));
    }

    pub fn on_deleted(&self, callback: impl Fn(&FileSystemEventArgs) + Send + Sync + 'static) {
        self.subscription.callbacks.write().deleted.push(Arc::new(callback));
    }

    pub fn on_changed(&self, callback: impl Fn(&FileSystemEventArgs) + Send + Sync + 'static) {
        self.subscription.callbacks.write().changed.push(Arc::new(callback));
    }

    pub fn on_renamed(&self, callback: impl Fn(&FileSystemEventArgs) + Send + Sync + 'static) {
        self.subscription.callbacks.write().renamed.push(Arc::new(callback));
    }

    pub fn on_error(&self, callback: impl Fn(&WatcherError) + Send + Sync + 'static) {
        self.subscription.callbacks.write().error.push(Arc::new(callback));
    }

    /// Block until every queued change has been dispatched, or `timeout`
    /// passes. Returns whether the queue drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.subscription.pending.lock();
        while *pending > 0 {
            if self
                .subscription
                .idle
                .wait_until(&mut pending, deadline)
                .timed_out()
            {
                return *pending == 0;
            }
        }
        true
    }

    /// Stop dispatching. Queued changes are discarded.
    pub fn dispose(&self) {
        if self.subscription.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscription.sender.lock().take();
        debug!(subscription = ?self.subscription.id, "watcher disposed");
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for FileSystemWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemWatcher")
            .field("id", &self.subscription.id)
            .field("path", &self.subscription.root.to_string())
            .finish()
    }
}
