//! Path resolution.
//!
//! [`resolve`] walks a path's segments against the catalog and returns the
//! longest existing prefix as a chain of nodes, starting at root. A missing
//! path is not an error at this level; callers compare the chain with the path
//! through [`Resolution::matches`].

use crate::catalog::Catalog;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::records::{DirectoryId, DirectoryRecord, FileRecord};

/// One resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionNode {
    Directory(DirectoryRecord),
    File(FileRecord),
}

impl ResolutionNode {
    pub fn name(&self) -> &str {
        match self {
            ResolutionNode::Directory(dir) => &dir.name,
            ResolutionNode::File(file) => &file.name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ResolutionNode::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&DirectoryRecord> {
        match self {
            ResolutionNode::Directory(dir) => Some(dir),
            ResolutionNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRecord> {
        match self {
            ResolutionNode::File(file) => Some(file),
            ResolutionNode::Directory(_) => None,
        }
    }
}

/// The chain of nodes found for a path. Always starts with root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    nodes: Vec<ResolutionNode>,
}

impl Resolution {
    pub fn nodes(&self) -> &[ResolutionNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true: the root node is always present.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn last(&self) -> &ResolutionNode {
        // The chain is seeded with root and only grows.
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn into_last(mut self) -> ResolutionNode {
        self.nodes
            .pop()
            .unwrap_or_else(|| ResolutionNode::Directory(DirectoryRecord::root()))
    }

    /// Fail with `Fatal` if a file node appears anywhere but last.
    pub fn validate(&self, path: &FsPath) -> FsResult<()> {
        let inner = &self.nodes[..self.nodes.len().saturating_sub(1)];
        if inner.iter().any(|node| !node.is_directory()) {
            return Err(FsError::fatal(format!(
                "file node inside resolution chain for {path}"
            )));
        }
        Ok(())
    }

    /// True when every segment of `path` resolved.
    pub fn matches(&self, path: &FsPath) -> FsResult<bool> {
        self.validate(path)?;
        Ok(self.nodes.len() == path.len()
            && self
                .nodes
                .iter()
                .zip(path.segments())
                .all(|(node, segment)| node.name() == segment))
    }

    /// The final node when the whole path resolved, else `NotFound`.
    pub fn into_match(self, path: &FsPath) -> FsResult<ResolutionNode> {
        if self.matches(path)? {
            Ok(self.into_last())
        } else {
            Err(FsError::not_found(path.to_string()))
        }
    }

    /// The directory that would contain `path`, if `path` is absent.
    ///
    /// The chain must cover every segment but the last and end at a directory;
    /// otherwise the parent is missing or is a file.
    pub fn create_parent(&self, path: &FsPath) -> FsResult<DirectoryId> {
        if self.matches(path)? {
            return Err(FsError::already_exists(path.to_string()));
        }
        match self.last() {
            ResolutionNode::Directory(dir) if self.nodes.len() + 1 == path.len() => Ok(dir.id),
            _ => Err(FsError::not_exists_parent(path.to_string())),
        }
    }
}

/// Resolve `path` against the catalog.
pub fn resolve(catalog: &mut Catalog<'_>, path: &FsPath) -> FsResult<Resolution> {
    let mut nodes = vec![ResolutionNode::Directory(DirectoryRecord::root())];
    let mut parent = DirectoryId::ROOT;
    let mut pending = None;

    for segment in path.iter() {
        let mut found = catalog.child_directories_named(parent, segment)?;
        match found.len() {
            0 => {
                pending = Some(segment);
                break;
            }
            1 => {
                let dir = found.remove(0);
                parent = dir.id;
                nodes.push(ResolutionNode::Directory(dir));
            }
            n => {
                return Err(FsError::fatal(format!(
                    "{n} directories named {segment:?} under directory {parent} ({path})"
                )));
            }
        }
    }

    if let Some(segment) = pending {
        let mut found: Vec<FileRecord> = catalog
            .files_named(segment)?
            .into_iter()
            .filter(|file| file.directory_id == parent)
            .collect();
        match found.len() {
            0 => {}
            1 => nodes.push(ResolutionNode::File(found.remove(0))),
            n => {
                return Err(FsError::fatal(format!(
                    "{n} files named {segment:?} under directory {parent} ({path})"
                )));
            }
        }
    }

    tracing::trace!(%path, resolved = nodes.len(), "resolved path");
    Ok(Resolution { nodes })
}
