//! MemTable implementation
//!
//! BTreeMap-based memtable with approximate size tracking.

use std::collections::btree_map::{self, BTreeMap};

use crate::wal::Operation;
use super::MemTableEntry;

/// In-memory table for recent writes
#[derive(Debug, Default)]
pub struct MemTable {
    data: BTreeMap<Vec<u8>, MemTableEntry>,
    /// Approximate size in bytes (keys + live values)
    size: usize,
}

/// Sorted iterator over MemTable entries
pub type MemTableIter<'a> = btree_map::Iter<'a, Vec<u8>, MemTableEntry>;

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a key; a tombstone means "deleted here"
    pub fn get(&self, key: &[u8]) -> Option<&MemTableEntry> {
        self.data.get(key)
    }

    /// Put a key-value pair, returning the new approximate size
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Value(value))
    }

    /// Delete a key (inserts tombstone), returning the new approximate size
    pub fn delete(&mut self, key: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Tombstone)
    }

    /// Apply a logged operation
    pub fn apply(&mut self, operation: Operation) -> usize {
        match operation {
            Operation::Put { key, value } => self.put(key, value),
            Operation::Delete { key } => self.delete(key),
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size >= size_limit
    }

    /// Entries in sorted key order
    pub fn iter(&self) -> MemTableIter<'_> {
        self.data.iter()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&mut self) {
        self.data.clear();
        self.size = 0;
    }

    fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let key_len = key.len();
        let value_len = entry.value().map_or(0, <[u8]>::len);

        match self.data.insert(key, entry) {
            // key bytes already counted
            Some(old) => {
                let old_value_len = old.value().map_or(0, <[u8]>::len);
                self.size = self.size - old_value_len + value_len;
            }
            None => self.size += key_len + value_len,
        }
        self.size
    }
}
