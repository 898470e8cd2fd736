//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups through in-memory indexes
//! - Lazy merged iteration across memory and disk
//! - Full compaction into a single table
//!
//! ## Directory Layout
//! ```text
//! sstables/
//!   sstable_000001.sst      memtable flushes
//!   compacted_000007.sst    output of a compaction (supersedes ids < 7)
//!   sstable_000008.tmp      table still being written (removed on open)
//! ```

mod sstable;
mod manager;
mod merge;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
pub use merge::{MergeIterator, MergeSource};
