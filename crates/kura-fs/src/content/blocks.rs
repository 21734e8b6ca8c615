//! Whole-file writes, appends and reads over the block layout.

use crate::catalog::Catalog;
use crate::content::policy::ChunkPolicy;
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::records::{BlockId, FileDesc, FileId, FileRecord, now_millis};
use crate::resolve::{ResolutionNode, resolve};

/// Resolve `path` to an existing file.
pub(crate) fn open_file(catalog: &mut Catalog<'_>, path: &FsPath) -> FsResult<FileRecord> {
    match resolve(catalog, path)?.into_match(path)? {
        ResolutionNode::File(file) => Ok(file),
        ResolutionNode::Directory(_) => Err(FsError::not_found(format!("{path} is a directory"))),
    }
}

/// Create or replace a file's content.
///
/// An existing file keeps its id and creation time; its previous blocks are
/// deleted in the same transaction.
pub(crate) fn write_file(
    catalog: &mut Catalog<'_>,
    policy: &ChunkPolicy,
    path: &FsPath,
    data: &[u8],
    desc: &FileDesc,
) -> FsResult<FileRecord> {
    let resolution = resolve(catalog, path)?;
    let mut file = if resolution.matches(path)? {
        match resolution.into_last() {
            ResolutionNode::File(file) => file,
            ResolutionNode::Directory(_) => {
                return Err(FsError::already_exists(format!("{path} is a directory")));
            }
        }
    } else {
        let parent = resolution.create_parent(path)?;
        catalog.insert_file(parent, path.name(), &desc.mime_type)?
    };

    let stale = std::mem::take(&mut file.block_ids);
    file.block_ids = store_blocks(catalog, policy.split(data))?;
    file.size = data.len() as u64;
    file.mime_type = desc.mime_type.clone();
    file.updated_at = now_millis();
    catalog.put_file(&file)?;
    catalog.delete_blocks(&stale)?;

    tracing::debug!(
        %path,
        size = file.size,
        blocks = file.block_ids.len(),
        replaced = stale.len(),
        "wrote file"
    );
    Ok(file)
}

/// Append `data` to a file, chunked by the policy applied to `data.len()`.
pub(crate) fn append(
    catalog: &mut Catalog<'_>,
    policy: &ChunkPolicy,
    id: FileId,
    data: &[u8],
) -> FsResult<FileRecord> {
    extend_file(catalog, id, policy.split(data), data.len() as u64)
}

/// Store `chunks` as new blocks at the end of file `id`.
///
/// The record is re-read inside the transaction, so a caller holding an older
/// copy never drops blocks appended since.
pub(crate) fn extend_file<'a>(
    catalog: &mut Catalog<'_>,
    id: FileId,
    chunks: impl IntoIterator<Item = &'a [u8]>,
    added: u64,
) -> FsResult<FileRecord> {
    let mut file = catalog.require_file(id, &format!("file {id}"))?;
    let new_blocks = store_blocks(catalog, chunks)?;
    tracing::debug!(file = %id, added, blocks = new_blocks.len(), "extending file");
    file.block_ids.extend(new_blocks);
    file.size += added;
    file.updated_at = now_millis();
    catalog.put_file(&file)?;
    Ok(file)
}

/// Concatenate a file's blocks in order.
pub(crate) fn read_all(catalog: &mut Catalog<'_>, file: &FileRecord) -> FsResult<Vec<u8>> {
    let parts = file
        .block_ids
        .iter()
        .map(|id| catalog.require_block(*id))
        .collect::<FsResult<Vec<_>>>()?;
    let out = parts.concat();
    if out.len() as u64 != file.size {
        return Err(FsError::fatal(format!(
            "file {} records size {} but its blocks hold {} bytes",
            file.id,
            file.size,
            out.len()
        )));
    }
    Ok(out)
}

/// Fetch one block of `file` for a reader that captured its block list
/// earlier.
///
/// The file may have been rewritten or removed since, freeing the block; that
/// is `NotFound`. A block the current record still lists is corruption.
pub(crate) fn read_listed_block(
    catalog: &mut Catalog<'_>,
    file: FileId,
    name: &str,
    id: BlockId,
) -> FsResult<Vec<u8>> {
    if let Some(block) = catalog.block(id)? {
        return Ok(block.bytes);
    }
    match catalog.file(file)? {
        Some(current) if current.block_ids.contains(&id) => catalog.require_block(id),
        _ => Err(FsError::not_found(format!(
            "{name}: block {id} was replaced while reading"
        ))),
    }
}

fn store_blocks<'a>(
    catalog: &mut Catalog<'_>,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> FsResult<Vec<BlockId>> {
    chunks
        .into_iter()
        .map(|chunk| catalog.insert_block(chunk))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::policy::BlockTier;
    use crate::tree;
    use kura_store::{MemoryStore, NativeStore, TxMode};

    fn parse(raw: &str) -> FsPath {
        FsPath::parse(raw).unwrap()
    }

    fn tiny_policy() -> ChunkPolicy {
        ChunkPolicy {
            tiers: vec![BlockTier {
                up_to: 4,
                block_size: None,
            }],
            fallback: 4,
        }
    }

    #[test]
    fn test_write_then_read() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let path = parse("/notes.txt");
        let file = write_file(&mut c, &tiny_policy(), &path, b"hello world", &FileDesc::new("text/plain"))
            .unwrap();
        assert_eq!(file.size, 11);
        assert_eq!(file.block_ids.len(), 3);
        assert_eq!(file.mime_type, "text/plain");

        let opened = open_file(&mut c, &path).unwrap();
        assert_eq!(read_all(&mut c, &opened).unwrap(), b"hello world");
    }

    #[test]
    fn test_rewrite_frees_old_blocks() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let path = parse("/f");
        let first = write_file(&mut c, &tiny_policy(), &path, b"0123456789", &FileDesc::default())
            .unwrap();
        let second = write_file(&mut c, &tiny_policy(), &path, b"ab", &FileDesc::new("text/plain"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.mime_type, "text/plain");
        assert_eq!(c.usage().unwrap().blocks, 1);
        assert_eq!(read_all(&mut c, &second).unwrap(), b"ab");
    }

    #[test]
    fn test_write_errors() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        tree::mkdir(&mut c, &parse("/d")).unwrap();
        let policy = ChunkPolicy::default();

        assert!(matches!(
            write_file(&mut c, &policy, &parse("/d"), b"x", &FileDesc::default()),
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            write_file(&mut c, &policy, &parse("/missing/f"), b"x", &FileDesc::default()),
            Err(FsError::NotExistsParent(_))
        ));
        assert!(matches!(
            open_file(&mut c, &parse("/d")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_append_rereads_record() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let policy = tiny_policy();
        let stale = tree::create_file(&mut c, &parse("/log"), &FileDesc::default()).unwrap();

        append(&mut c, &policy, stale.id, b"abc").unwrap();
        let file = append(&mut c, &policy, stale.id, b"defgh").unwrap();

        assert_eq!(file.size, 8);
        assert_eq!(file.block_ids.len(), 3);
        assert_eq!(read_all(&mut c, &file).unwrap(), b"abcdefgh");
    }

    #[test]
    fn test_missing_block_is_fatal() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let file = write_file(&mut c, &tiny_policy(), &parse("/f"), b"abcdef", &FileDesc::default())
            .unwrap();
        c.delete_blocks(&file.block_ids[1..]).unwrap();
        assert!(read_all(&mut c, &file).unwrap_err().is_fatal());
    }

    #[test]
    fn test_oversized_record_is_fatal() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let mut file = write_file(&mut c, &tiny_policy(), &parse("/f"), b"abc", &FileDesc::default())
            .unwrap();
        file.size = u64::MAX;
        assert!(read_all(&mut c, &file).unwrap_err().is_fatal());
    }

    #[test]
    fn test_listed_block_after_rewrite() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let path = parse("/f");
        let old = write_file(&mut c, &tiny_policy(), &path, b"abcdefgh", &FileDesc::default())
            .unwrap();
        assert_eq!(
            read_listed_block(&mut c, old.id, "/f", old.block_ids[1]).unwrap(),
            b"efgh"
        );

        let new = write_file(&mut c, &tiny_policy(), &path, b"xy", &FileDesc::default()).unwrap();
        let err = read_listed_block(&mut c, old.id, "/f", old.block_ids[1]).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert!(!err.is_fatal());

        // Still listed by the current record but gone from the store.
        c.delete_blocks(&new.block_ids).unwrap();
        assert!(
            read_listed_block(&mut c, new.id, "/f", new.block_ids[0])
                .unwrap_err()
                .is_fatal()
        );
    }

    #[test]
    fn test_listed_block_after_remove() {
        let store = MemoryStore::new();
        let mut c = Catalog::new(store.begin(TxMode::ReadWrite).unwrap());
        let path = parse("/f");
        let file = write_file(&mut c, &tiny_policy(), &path, b"abcd", &FileDesc::default())
            .unwrap();
        tree::remove(&mut c, &path, false).unwrap();
        assert!(matches!(
            read_listed_block(&mut c, file.id, "/f", file.block_ids[0]),
            Err(FsError::NotFound(_))
        ));
    }
}
