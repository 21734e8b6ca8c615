//! Path model.
//!
//! A [`FsPath`] is a normalized, root-anchored list of segment names. The
//! first segment is always [`ROOT_NAME`]; `/a/b` normalizes to
//! `[_SystemRoot_, a, b]`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{FsError, FsResult};

/// Name of the implicit root directory.
pub const ROOT_NAME: &str = "_SystemRoot_";

const SEPARATOR: char = '/';

/// A parsed filesystem path.
///
/// Equality and hashing consider the normalized segments only, so `a/b` and
/// `/a/b/` are the same path.
#[derive(Debug, Clone)]
pub struct FsPath {
    segments: Vec<String>,
    origin: String,
}

impl PartialEq for FsPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for FsPath {}

impl Hash for FsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl FsPath {
    /// Parse and normalize a path string.
    ///
    /// Whitespace around the path is trimmed. Paths containing `//`, `.` or
    /// `..` are rejected; there is no implicit traversal.
    pub fn parse(raw: &str) -> FsResult<Self> {
        let origin = raw.trim();
        if origin.contains("//") {
            return Err(FsError::invalid_path(raw));
        }

        let mut segments = vec![ROOT_NAME.to_string()];
        for token in origin.split(SEPARATOR).filter(|t| !t.is_empty()) {
            if token == "." || token == ".." {
                return Err(FsError::invalid_path(raw));
            }
            // An explicit leading root segment is the same as the implicit one.
            if segments.len() == 1 && token == ROOT_NAME {
                continue;
            }
            segments.push(token.to_string());
        }

        Ok(Self {
            segments,
            origin: origin.to_string(),
        })
    }

    /// The root path.
    pub fn root() -> Self {
        Self {
            segments: vec![ROOT_NAME.to_string()],
            origin: SEPARATOR.to_string(),
        }
    }

    /// The path as the caller wrote it (trimmed).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// All segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments including root.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Never true: a normalized path always holds the root segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments below root.
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_root(&self) -> bool {
        self.depth() == 0
    }

    /// Final segment (root's name for the root path).
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or(ROOT_NAME)
    }

    /// The path with its final segment removed. The parent of root is root.
    pub fn parent(&self) -> FsPath {
        if self.is_root() {
            return FsPath::root();
        }
        let segments = self.segments[..self.segments.len() - 1].to_vec();
        let origin = display(&segments);
        Self { segments, origin }
    }

    /// A child path one level below this one.
    pub fn join(&self, name: &str) -> FsResult<FsPath> {
        if name.is_empty() || name.contains(SEPARATOR) || name == "." || name == ".." {
            return Err(FsError::invalid_path(format!("{self}/{name}")));
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        let origin = display(&segments);
        Ok(Self { segments, origin })
    }

    /// Segments below root, in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().skip(1).map(String::as_str)
    }
}

fn display(segments: &[String]) -> String {
    if segments.len() <= 1 {
        return SEPARATOR.to_string();
    }
    let mut out = String::new();
    for segment in &segments[1..] {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    out
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display(&self.segments))
    }
}

impl FromStr for FsPath {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        FsPath::parse(s)
    }
}

impl TryFrom<&str> for FsPath {
    type Error = FsError;

    fn try_from(s: &str) -> FsResult<Self> {
        FsPath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(path: &FsPath) -> Vec<&str> {
        path.iter().collect()
    }

    #[test]
    fn test_normalization() {
        for raw in ["/a/b", "a/b", "/a/b/", "  /a/b  ", "/_SystemRoot_/a/b"] {
            let path = FsPath::parse(raw).unwrap();
            assert_eq!(names(&path), vec!["a", "b"], "{raw:?}");
            assert_eq!(path.segments()[0], ROOT_NAME);
            assert_eq!(path.len(), 3);
            assert_eq!(path.to_string(), "/a/b");
            assert_eq!(path, FsPath::parse("/a/b").unwrap());
        }
    }

    #[test]
    fn test_root_forms() {
        for raw in ["", "/", "   ", "_SystemRoot_"] {
            let path = FsPath::parse(raw).unwrap();
            assert!(path.is_root(), "{raw:?}");
            assert_eq!(path.len(), 1);
            assert_eq!(path.name(), ROOT_NAME);
            assert_eq!(path.to_string(), "/");
        }
    }

    #[test]
    fn test_invalid_paths() {
        for raw in ["//", "/a//b", "a/./b", "/a/..", "//a"] {
            let err = FsPath::parse(raw).unwrap_err();
            assert!(matches!(err, FsError::InvalidPath(_)), "{raw:?}");
        }
    }

    #[test]
    fn test_parent() {
        let path = FsPath::parse("/a/b/c").unwrap();
        assert_eq!(path.parent(), FsPath::parse("/a/b").unwrap());
        assert_eq!(path.parent().parent().parent(), FsPath::root());
        assert!(FsPath::root().parent().is_root());
    }

    #[test]
    fn test_name_and_depth() {
        let path = FsPath::parse("/docs/readme.md").unwrap();
        assert_eq!(path.name(), "readme.md");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.origin(), "/docs/readme.md");
    }

    #[test]
    fn test_join() {
        let dir = FsPath::parse("/docs").unwrap();
        let child = dir.join("a.txt").unwrap();
        assert_eq!(child.to_string(), "/docs/a.txt");
        assert_eq!(child.parent(), dir);
        assert!(dir.join("x/y").is_err());
        assert!(dir.join("").is_err());
    }
}
