//! Forward-only cursor over the components of an [`AbsolutePath`].

use crate::path::AbsolutePath;

/// Walks a path one component at a time.
///
/// Tree lookups use the same cursor for files and directories, and an
/// operation can stop part-way (for instance after the parent) and carry on
/// from there.
#[derive(Clone, Debug)]
pub struct PathNavigator<'a> {
    path: &'a AbsolutePath,
    index: usize,
}

impl<'a> PathNavigator<'a> {
    pub fn new(path: &'a AbsolutePath) -> Self {
        Self { path, index: 0 }
    }

    /// The component under the cursor, or `None` past the end.
    pub fn current(&self) -> Option<&'a str> {
        self.path.components().get(self.index).map(String::as_str)
    }

    /// Advance; returns `false` once the cursor has moved past the last
    /// component.
    pub fn move_next(&mut self) -> bool {
        if self.index < self.path.components().len() {
            self.index += 1;
        }
        !self.is_at_end()
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.path.components().len()
    }

    /// Whether the cursor sits on the final component.
    pub fn is_at_leaf(&self) -> bool {
        self.index + 1 == self.path.components().len()
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &'a AbsolutePath {
        self.path
    }

    /// Path up to and including the current component.
    pub fn walked(&self) -> AbsolutePath {
        let end = (self.index + 1).min(self.path.components().len());
        AbsolutePath::from_components(self.path.components()[..end].to_vec())
    }
}
