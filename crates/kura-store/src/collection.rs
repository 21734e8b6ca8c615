//! Collection and index naming.

use std::fmt;

/// Primary key of a stored record.
///
/// Keys handed out by [`crate::StoreTxn::allocate_key`] start at 1 and are
/// never reused within a collection, so zero and negative values are free for
/// sentinels.
pub type RecordKey = i64;

/// The logical record collections of a kura store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Directory records, indexed by `parentId` and `name`.
    Directories,
    /// File records, indexed by `directoryId` and `name`.
    Files,
    /// Raw content blocks. Primary key only.
    Blocks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Directories,
        Collection::Files,
        Collection::Blocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Directories => "Directories",
            Collection::Files => "Files",
            Collection::Blocks => "Blocks",
        }
    }

    /// Secondary indexes declared for this collection.
    pub fn indexes(&self) -> &'static [&'static str] {
        match self {
            Collection::Directories => &["parentId", "name"],
            Collection::Files => &["directoryId", "name"],
            Collection::Blocks => &[],
        }
    }

    /// Look up a declared index by name, returning its canonical static name.
    pub fn index(&self, name: &str) -> Option<&'static str> {
        self.indexes().iter().copied().find(|index| *index == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a secondary index entry.
///
/// Integer and text keys never compare equal to each other, even when the text
/// spells the integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexKey {
    Int(i64),
    Text(String),
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Text(value.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(value: String) -> Self {
        IndexKey::Text(value)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(v) => write!(f, "{v}"),
            IndexKey::Text(s) => write!(f, "{s:?}"),
        }
    }
}
