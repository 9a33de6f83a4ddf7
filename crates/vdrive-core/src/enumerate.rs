//! Lazy directory enumeration
//!
//! An [`Enumeration`] is a recipe; each call to `into_iter` starts a fresh
//! walk. The walk takes the engine lock once per directory to snapshot its
//! children, so a long enumeration never blocks other callers for long and
//! sees changes made to directories it has not reached yet.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::ops::Engine;
use crate::path::AbsolutePath;
use crate::pattern::PathPattern;
use crate::types::{EntryFilter, SearchOption};

/// Restartable sequence of entry paths under a directory.
#[derive(Clone)]
pub struct Enumeration {
    engine: Arc<Engine>,
    root: AbsolutePath,
    pattern: PathPattern,
    search: SearchOption,
    filter: EntryFilter,
}

impl Enumeration {
    pub(crate) fn new(
        engine: Arc<Engine>,
        root: AbsolutePath,
        pattern: PathPattern,
        search: SearchOption,
        filter: EntryFilter,
    ) -> Self {
        Self {
            engine,
            root,
            pattern,
            search,
            filter,
        }
    }

    pub fn iter(&self) -> EntryIter {
        let mut iter = EntryIter {
            engine: Arc::clone(&self.engine),
            search: self.search,
            filter: self.filter,
            stack: Vec::new(),
        };
        iter.push(self.root.clone(), self.pattern.clone());
        iter
    }
}

impl std::fmt::Debug for Enumeration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumeration")
            .field("root", &self.root.to_string())
            .field("pattern", &self.pattern.as_str())
            .field("search", &self.search)
            .field("filter", &self.filter)
            .finish()
    }
}

impl IntoIterator for Enumeration {
    type Item = String;
    type IntoIter = EntryIter;

    fn into_iter(self) -> EntryIter {
        self.iter()
    }
}

impl IntoIterator for &Enumeration {
    type Item = String;
    type IntoIter = EntryIter;

    fn into_iter(self) -> EntryIter {
        self.iter()
    }
}

struct Frame {
    dir: AbsolutePath,
    pattern: PathPattern,
    /// (display name, is directory), in insertion order.
    entries: VecDeque<(String, bool)>,
}

/// Pre-order walk: a directory is yielded before its contents.
pub struct EntryIter {
    engine: Arc<Engine>,
    search: SearchOption,
    filter: EntryFilter,
    stack: Vec<Frame>,
}

impl EntryIter {
    fn push(&mut self, dir: AbsolutePath, pattern: PathPattern) {
        let entries = self.engine.read(|state| {
            let Some(id) = state.tree.try_get_existing_directory(&dir) else {
                return VecDeque::new();
            };
            state
                .tree
                .children(id)
                .into_iter()
                .filter_map(|child| state.tree.get(child))
                .map(|node| (node.name.clone(), node.is_dir()))
                .collect()
        });
        self.stack.push(Frame {
            dir,
            pattern,
            entries,
        });
    }
}

impl Iterator for EntryIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some((name, is_dir)) = frame.entries.pop_front() else {
                self.stack.pop();
                continue;
            };
            let path = frame.dir.child(&name);

            // Literal parent segment: descend without yielding.
            if let Some(next) = frame.pattern.sub_pattern() {
                if is_dir && frame.pattern.is_match(&name) {
                    let next = next.clone();
                    self.push(path, next);
                }
                continue;
            }

            let yielded = frame.pattern.is_match(&name) && self.filter.accepts(is_dir);
            if is_dir && self.search == SearchOption::AllDirectories {
                let pattern = frame.pattern.clone();
                self.push(path.clone(), pattern);
            }
            if yielded {
                return Some(path.to_string());
            }
        }
    }
}
