//! Search patterns for directory enumeration
//!
//! A pattern is matched one path level at a time:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - matching ignores case and is anchored to the whole name
//!
//! A pattern such as `logs\2024\*.txt` is split into literal parent
//! segments followed by one leaf segment. Only the leaf may contain
//! wildcards; each parent segment is exposed through [`PathPattern::sub_pattern`]
//! so a recursive search can descend one level per step.

use crate::error::{FsError, FsResult};
use crate::path::{fold, is_separator, AbsolutePath};

const WILDCARDS: [char; 2] = ['*', '?'];
const ILLEGAL_PATTERN_CHARS: [char; 4] = ['"', '<', '>', '|'];

/// Compiled search pattern for one path level, plus the remainder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPattern {
    text: String,
    segment: Vec<char>,
    sub_pattern: Option<Box<PathPattern>>,
}

impl PathPattern {
    /// Compile `pattern`.
    ///
    /// Fails on an empty pattern, a rooted pattern, empty or `..`
    /// segments, and wildcards anywhere but the last segment.
    pub fn new(pattern: &str) -> FsResult<Self> {
        if pattern.is_empty() {
            return Err(FsError::invalid_path(pattern));
        }
        if pattern.chars().any(|c| ILLEGAL_PATTERN_CHARS.contains(&c) || c.is_control()) {
            return Err(FsError::illegal_characters(pattern));
        }
        if pattern.starts_with(is_separator) || AbsolutePath::is_rooted(pattern) {
            return Err(FsError::invalid_path(pattern));
        }

        let segments: Vec<&str> = pattern.split(is_separator).collect();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() || *segment == ".." {
                return Err(FsError::invalid_path(pattern));
            }
            if i < last && segment.contains(&WILDCARDS[..]) {
                return Err(FsError::invalid_path(pattern));
            }
        }

        Ok(Self::compile(pattern, &segments))
    }

    /// Pattern that accepts every name.
    pub fn match_all() -> Self {
        Self::compile("*", &["*"])
    }

    fn compile(text: &str, segments: &[&str]) -> Self {
        let Some((&first, rest)) = segments.split_first() else {
            return Self {
                text: text.to_string(),
                segment: vec!['*'],
                sub_pattern: None,
            };
        };
        // `*.*` also matches names without an extension
        let first = if first == "*.*" { "*" } else { first };
        let sub_pattern = if rest.is_empty() {
            None
        } else {
            let remainder = rest.join("\\");
            Some(Box::new(Self::compile(&remainder, rest)))
        };
        Self {
            text: text.to_string(),
            segment: fold(first).chars().collect(),
            sub_pattern,
        }
    }

    /// Source text of the whole pattern.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Pattern for the next path level, if this level is a parent segment.
    pub fn sub_pattern(&self) -> Option<&PathPattern> {
        self.sub_pattern.as_deref()
    }

    /// Literal text of this level, as written, when it is a parent segment.
    pub fn parent_segment(&self) -> Option<String> {
        self.sub_pattern.as_ref()?;
        self.text.split(is_separator).next().map(str::to_string)
    }

    /// Whether this level matches `name`.
    pub fn is_match(&self, name: &str) -> bool {
        let input: Vec<char> = fold(name).chars().collect();
        wildcard_match(&self.segment, &input)
    }
}

/// Iterative wildcard match with single-star backtracking. Linear in the
/// common case and never worse than `O(p * n)`.
fn wildcard_match(pattern: &[char], input: &[char]) -> bool {
    let (mut p, mut i) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_input = 0;

    while i < input.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some(p);
                star_input = i;
                p += 1;
            }
            Some('?') => {
                p += 1;
                i += 1;
            }
            Some(c) if *c == input[i] => {
                p += 1;
                i += 1;
            }
            _ => match star {
                Some(star_p) => {
                    p = star_p + 1;
                    star_input += 1;
                    i = star_input;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
