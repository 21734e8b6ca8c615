//! Tree mutators: `mkdir`, `create_file` and `remove`.
//!
//! Each function runs inside the caller's catalog transaction.

use crate::catalog::Catalog;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::records::{DirectoryId, DirectoryRecord, FileDesc, FileRecord};
use crate::resolve::{ResolutionNode, resolve};

/// Counts of records deleted by a remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub directories: u64,
    pub files: u64,
    pub blocks: u64,
}

pub(crate) fn mkdir(catalog: &mut Catalog<'_>, path: &FsPath) -> FsResult<DirectoryRecord> {
    let parent = resolve(catalog, path)?.create_parent(path)?;
    let dir = catalog.insert_directory(parent, path.name())?;
    tracing::debug!(%path, id = %dir.id, "created directory");
    Ok(dir)
}

pub(crate) fn create_file(
    catalog: &mut Catalog<'_>,
    path: &FsPath,
    desc: &FileDesc,
) -> FsResult<FileRecord> {
    let parent = resolve(catalog, path)?.create_parent(path)?;
    let file = catalog.insert_file(parent, path.name(), &desc.mime_type)?;
    tracing::debug!(%path, id = %file.id, "created file");
    Ok(file)
}

pub(crate) fn remove(catalog: &mut Catalog<'_>, path: &FsPath, recursive: bool) -> FsResult<Removed> {
    if path.is_root() {
        return Err(FsError::invalid_path("cannot remove the root directory"));
    }

    let mut removed = Removed::default();
    match resolve(catalog, path)?.into_match(path)? {
        ResolutionNode::File(file) => {
            delete_file(catalog, &file, &mut removed)?;
        }
        ResolutionNode::Directory(dir) => {
            if !recursive && has_children(catalog, dir.id)? {
                return Err(FsError::directory_not_empty(path.to_string()));
            }
            // Walk the subtree with an explicit stack; nesting depth is
            // unbounded.
            let mut pending = vec![dir.id];
            while let Some(id) = pending.pop() {
                for file in catalog.files_in(id)? {
                    delete_file(catalog, &file, &mut removed)?;
                }
                pending.extend(catalog.child_directories(id)?.into_iter().map(|d| d.id));
                catalog.delete_directory(id)?;
                removed.directories += 1;
            }
        }
    }

    tracing::debug!(
        %path,
        directories = removed.directories,
        files = removed.files,
        blocks = removed.blocks,
        "removed"
    );
    Ok(removed)
}

fn has_children(catalog: &mut Catalog<'_>, id: DirectoryId) -> FsResult<bool> {
    Ok(!catalog.child_directories(id)?.is_empty() || !catalog.files_in(id)?.is_empty())
}

fn delete_file(catalog: &mut Catalog<'_>, file: &FileRecord, removed: &mut Removed) -> FsResult<()> {
    removed.blocks += catalog.delete_blocks(&file.block_ids)? as u64;
    catalog.delete_file(file.id)?;
    removed.files += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kura_store::{MemoryStore, NativeStore, TxMode};

    fn parse(raw: &str) -> FsPath {
        FsPath::parse(raw).unwrap()
    }

    #[test]
    fn test_mkdir() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let a = mkdir(&mut c, &parse("/a")).unwrap();
        assert_eq!(a.parent_id, DirectoryId::ROOT);
        let b = mkdir(&mut c, &parse("/a/b")).unwrap();
        assert_eq!(b.parent_id, a.id);

        assert!(matches!(
            mkdir(&mut c, &parse("/a")),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            mkdir(&mut c, &FsPath::root()),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mkdir_without_parent() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        assert!(matches!(
            mkdir(&mut c, &parse("/x/y")),
            Err(FsError::NotExistsParent(_))
        ));
        assert!(c.child_directories(DirectoryId::ROOT).unwrap().is_empty());
    }

    #[test]
    fn test_names_are_shared_between_kinds() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        create_file(&mut c, &parse("/n"), &FileDesc::default()).unwrap();
        assert!(matches!(
            mkdir(&mut c, &parse("/n")),
            Err(FsError::AlreadyExists(_))
        ));
        mkdir(&mut c, &parse("/d")).unwrap();
        assert!(matches!(
            create_file(&mut c, &parse("/d"), &FileDesc::default()),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            mkdir(&mut c, &parse("/n/child")),
            Err(FsError::NotExistsParent(_))
        ));
    }

    #[test]
    fn test_remove_recursive() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        mkdir(&mut c, &parse("/a")).unwrap();
        let b = mkdir(&mut c, &parse("/a/b")).unwrap();
        mkdir(&mut c, &parse("/a/b/c")).unwrap();
        let mut file = create_file(&mut c, &parse("/a/b/c/f"), &FileDesc::default()).unwrap();
        file.block_ids = vec![c.insert_block(b"xy").unwrap(), c.insert_block(b"z").unwrap()];
        file.size = 3;
        c.put_file(&file).unwrap();
        create_file(&mut c, &parse("/a/g"), &FileDesc::default()).unwrap();

        assert!(matches!(
            remove(&mut c, &parse("/a"), false),
            Err(FsError::DirectoryNotEmpty(_))
        ));
        assert!(c.directory(b.id).unwrap().is_some());

        let removed = remove(&mut c, &parse("/a"), true).unwrap();
        assert_eq!(
            removed,
            Removed {
                directories: 3,
                files: 2,
                blocks: 2
            }
        );
        let usage = c.usage().unwrap();
        assert_eq!((usage.directories, usage.files, usage.blocks), (0, 0, 0));
    }

    #[test]
    fn test_remove_errors() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        assert!(matches!(
            remove(&mut c, &FsPath::root(), true),
            Err(FsError::InvalidPath(_))
        ));
        assert!(matches!(
            remove(&mut c, &parse("/nope"), true),
            Err(FsError::NotFound(_))
        ));
        mkdir(&mut c, &parse("/empty")).unwrap();
        let removed = remove(&mut c, &parse("/empty"), false).unwrap();
        assert_eq!(removed.directories, 1);
    }
}
