//! Absolute drive-letter and UNC paths
//!
//! [`AbsolutePath`] is the only validation gate for path text. Once a path
//! has been parsed, the tree trusts its components.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{FsError, FsResult};
use crate::navigator::PathNavigator;

pub const SEPARATOR: char = '\\';
pub const ALT_SEPARATOR: char = '/';

/// Characters rejected anywhere in a path.
const INVALID_PATH_CHARS: [char; 6] = ['*', '?', '"', '<', '>', '|'];

pub(crate) fn is_separator(c: char) -> bool {
    c == SEPARATOR || c == ALT_SEPARATOR
}

/// Case-folded key used for every name comparison.
pub(crate) fn fold(name: &str) -> String {
    name.to_lowercase()
}

pub(crate) fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || fold(a) == fold(b)
}

/// Immutable, normalized absolute path.
///
/// The first component is the root token: a drive (`C:`), a UNC host
/// (`\\server`) or a UNC share (`\\server\share`). Equality and hashing
/// ignore case.
#[derive(Clone, Debug)]
pub struct AbsolutePath {
    components: Vec<String>,
}

impl AbsolutePath {
    /// Parse and normalize `text`.
    pub fn parse(text: &str) -> FsResult<Self> {
        if text.trim().is_empty() {
            return Err(FsError::EmptyPath);
        }
        let (root, rest) = split_root(text)?;
        if text.chars().any(|c| INVALID_PATH_CHARS.contains(&c)) {
            return Err(FsError::invalid_path(text));
        }
        if text.chars().any(|c| c.is_control()) {
            return Err(FsError::illegal_characters(text));
        }

        let mut components = vec![root];
        for segment in rest.split(is_separator) {
            match segment {
                "" | "." => {}
                ".." => {
                    if components.len() == 1 {
                        return Err(FsError::escapes_root(text));
                    }
                    components.pop();
                }
                name => {
                    if name.contains(':') {
                        return Err(FsError::invalid_path(text));
                    }
                    components.push(name.to_string());
                }
            }
        }

        Ok(Self { components })
    }

    /// Whether `text` starts with a drive or UNC prefix.
    pub fn is_rooted(text: &str) -> bool {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(a), Some(b)) if is_separator(a) && is_separator(b) => true,
            (Some(letter), Some(':')) => letter.is_ascii_alphabetic(),
            _ => false,
        }
    }

    pub(crate) fn from_components(components: Vec<String>) -> Self {
        debug_assert!(!components.is_empty());
        Self { components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Root token (`C:`, `\\server` or `\\server\share`).
    pub fn root(&self) -> &str {
        &self.components[0]
    }

    /// Root rendered as a path (`C:\` or `\\server\share`).
    pub fn root_path(&self) -> AbsolutePath {
        Self::from_components(vec![self.components[0].clone()])
    }

    /// Last component. For a root path this is the root token.
    pub fn name(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.components.len() == 1
    }

    pub fn is_unc(&self) -> bool {
        self.root().starts_with(SEPARATOR)
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn parent(&self) -> Option<AbsolutePath> {
        if self.is_root() {
            return None;
        }
        Some(Self::from_components(
            self.components[..self.components.len() - 1].to_vec(),
        ))
    }

    /// Append relative text (which may contain `.` and `..`).
    pub fn join(&self, relative: &str) -> FsResult<AbsolutePath> {
        let mut text = self.to_string();
        if !text.ends_with(SEPARATOR) {
            text.push(SEPARATOR);
        }
        text.push_str(relative);
        Self::parse(&text)
    }

    /// Append a single already-validated name.
    pub(crate) fn child(&self, name: &str) -> AbsolutePath {
        let mut components = self.components.clone();
        components.push(name.to_string());
        Self::from_components(components)
    }

    /// Whether `self` equals `ancestor` or lies below it.
    pub fn starts_with(&self, ancestor: &AbsolutePath) -> bool {
        ancestor.components.len() <= self.components.len()
            && ancestor
                .components
                .iter()
                .zip(&self.components)
                .all(|(a, b)| names_equal(a, b))
    }

    /// Components of `self` below `ancestor`, if `self` lies under it.
    pub(crate) fn relative_to(&self, ancestor: &AbsolutePath) -> Option<&[String]> {
        if self.starts_with(ancestor) {
            Some(&self.components[ancestor.components.len()..])
        } else {
            None
        }
    }

    pub fn navigator(&self) -> PathNavigator<'_> {
        PathNavigator::new(self)
    }
}

/// Split the drive or UNC prefix off `text`.
fn split_root(text: &str) -> FsResult<(String, &str)> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if is_separator(a) && is_separator(b) => {
            let rest = &text[2..];
            let mut parts = rest.splitn(3, is_separator);
            let host = parts.next().unwrap_or_default();
            if host.is_empty() || host == "." || host == ".." || host.contains(':') {
                return Err(FsError::invalid_path(text));
            }
            match parts.next() {
                Some(share) if !share.is_empty() => {
                    if share == "." || share == ".." {
                        return Err(FsError::invalid_path(text));
                    }
                    let root = format!("{SEPARATOR}{SEPARATOR}{host}{SEPARATOR}{share}");
                    Ok((root, parts.next().unwrap_or_default()))
                }
                _ => Ok((format!("{SEPARATOR}{SEPARATOR}{host}"), "")),
            }
        }
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            Ok((format!("{letter}:"), &text[2..]))
        }
        _ => Err(FsError::not_rooted(text)),
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root())?;
        if self.is_root() && !self.is_unc() {
            return f.write_str("\\");
        }
        for component in &self.components[1..] {
            write!(f, "{SEPARATOR}{component}")?;
        }
        Ok(())
    }
}

impl PartialEq for AbsolutePath {
    fn eq(&self, other: &Self) -> bool {
        self.components.len() == other.components.len() && self.starts_with(other)
    }
}

impl Eq for AbsolutePath {}

impl Hash for AbsolutePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for component in &self.components {
            fold(component).hash(state);
        }
    }
}

impl std::str::FromStr for AbsolutePath {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_drive_path() {
        let path = AbsolutePath::parse(r"C:\Some\Folder\file.txt").unwrap();
        assert_eq!(path.components(), &["C:", "Some", "Folder", "file.txt"]);
        assert_eq!(path.name(), "file.txt");
        assert_eq!(path.to_string(), r"C:\Some\Folder\file.txt");
        assert!(!path.is_unc());
    }

    #[test]
    fn test_parse_unc_path() {
        let path = AbsolutePath::parse(r"\\server\share\dir").unwrap();
        assert_eq!(path.root(), r"\\server\share");
        assert_eq!(path.components().len(), 2);
        assert!(path.is_unc());
        assert_eq!(path.to_string(), r"\\server\share\dir");

        let host = AbsolutePath::parse(r"\\server").unwrap();
        assert!(host.is_root());
        assert_eq!(host.to_string(), r"\\server");
    }

    #[test]
    fn test_dot_segments_resolved() {
        let path = AbsolutePath::parse(r"C:\a\.\b\..\c/d").unwrap();
        assert_eq!(path.to_string(), r"C:\a\c\d");
    }

    #[test]
    fn test_escape_above_root_rejected() {
        let err = AbsolutePath::parse(r"C:\a\..\..").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn test_wildcards_rejected_with_full_text() {
        let err = AbsolutePath::parse(r"C:\dir\*.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert_eq!(err.path(), r"C:\dir\*.txt");
        for bad in [r"C:\a?b", r#"C:\a"b"#, r"C:\a<b", r"C:\a>b", r"C:\a|b"] {
            assert!(AbsolutePath::parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_relative_and_empty_rejected() {
        assert_eq!(AbsolutePath::parse("   ").unwrap_err(), FsError::EmptyPath);
        let err = AbsolutePath::parse(r"relative\path").unwrap_err();
        assert!(err.to_string().contains("must start with a drive letter or a network share"));
        assert!(AbsolutePath::parse(r"\\").is_err());
    }

    #[test]
    fn test_case_insensitive_equality() {
        let a = AbsolutePath::parse(r"C:\Some\Folder").unwrap();
        let b = AbsolutePath::parse(r"c:\SOME\folder\").unwrap();
        assert_eq!(a, b);

        use std::collections::HashSet;
        let set: HashSet<_> = [a].into_iter().collect();
        assert!(set.contains(&b));
    }

    #[test]
    fn test_round_trip_rendering() {
        for text in [r"C:\", r"D:\x\y", r"\\srv\share", r"\\srv\share\a\b"] {
            let path = AbsolutePath::parse(text).unwrap();
            let again = AbsolutePath::parse(&path.to_string()).unwrap();
            assert_eq!(path, again);
            assert_eq!(again.to_string(), path.to_string());
        }
    }

    #[test]
    fn test_parent_join_and_starts_with() {
        let path = AbsolutePath::parse(r"C:\a\b").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), r"C:\a");
        assert!(path.root_path().parent().is_none());
        let joined = path.join(r"..\c").unwrap();
        assert_eq!(joined.to_string(), r"C:\a\c");
        assert!(joined.starts_with(&AbsolutePath::parse(r"c:\A").unwrap()));
        assert!(!joined.starts_with(&path));
    }
}
