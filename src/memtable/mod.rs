//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and key listing
//!
//! ## Data Structure Choice
//! A plain BTreeMap. Locking is done one level up by the engine, which
//! guards the memtable and the SSTable list together so readers always see
//! both at the same commit point.

mod table;

pub use table::{MemTable, MemTableIter};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// The value, or `None` for a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            MemTableEntry::Value(v) => Some(v),
            MemTableEntry::Tombstone => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemTableEntry::Tombstone)
    }
}
