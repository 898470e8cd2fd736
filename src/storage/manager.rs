//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Merge all SSTables into one (compaction)
//! - Track SSTable lifecycle

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{KvError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::merge::{MergeIterator, MergeSource};
use super::sstable::{sync_dir, TMP_EXTENSION};
use super::{SSTable, SSTableBuilder, SSTableReader};

/// How a table file came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    /// Written by a memtable flush
    Flushed,
    /// Written by a full compaction; supersedes every table with a lower id
    Compacted,
}

impl TableKind {
    fn prefix(self) -> &'static str {
        match self {
            TableKind::Flushed => "sstable_",
            TableKind::Compacted => "compacted_",
        }
    }
}

/// Manages the storage layer
///
/// Not internally synchronized: the engine guards it together with the
/// memtable so both change at the same commit point.
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: Vec<SSTableReader>,

    /// Next ID for creating new SSTables
    next_sstable_id: u64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove unfinished `.tmp` tables
    /// 3. Remove tables superseded by the newest compaction
    /// 4. Open readers for the rest, newest first
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut tables: Vec<(u64, TableKind, PathBuf)> = Vec::new();

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }

            if file_path.extension().map_or(false, |ext| ext == TMP_EXTENSION) {
                tracing::debug!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }

            if let Some((id, kind)) = Self::parse_sstable_name(&file_path) {
                tables.push((id, kind, file_path));
            }
        }

        // Sort newest first (highest ID first)
        tables.sort_by(|a, b| b.0.cmp(&a.0));

        let next_id = tables.first().map(|(id, _, _)| id + 1).unwrap_or(1);

        let compacted_floor = tables
            .iter()
            .find(|(_, kind, _)| *kind == TableKind::Compacted)
            .map(|(id, _, _)| *id);

        let mut sstables = Vec::new();
        let mut removed_stale = false;
        for (id, _, file_path) in &tables {
            if compacted_floor.map_or(false, |floor| *id < floor) {
                tracing::debug!(path = %file_path.display(), "removing SSTable superseded by compaction");
                fs::remove_file(file_path)?;
                removed_stale = true;
                continue;
            }
            sstables.push(SSTableReader::open(file_path)?);
        }
        if removed_stale {
            sync_dir(path)?;
        }

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables,
            next_sstable_id: next_id,
        })
    }

    /// Look up a key across all SSTables, newest → oldest
    ///
    /// Returns:
    /// - `Ok(Some(Value(..)))`: key found with value
    /// - `Ok(Some(Tombstone))`: newest entry for the key is a delete
    /// - `Ok(None)`: key not in any SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        for reader in &self.sstables {
            // Skip SSTable if key is outside its range (O(1) check)
            if !reader.might_contain(key) {
                continue;
            }

            if let Some(entry) = reader.get(key)? {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    /// `last_lsn` is the newest commit the memtable holds and is stored in
    /// the table footer.
    pub fn flush(&mut self, memtable: &MemTable, last_lsn: u64) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(KvError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.allocate_id();
        let path = Self::sstable_path(&self.data_dir, id, TableKind::Flushed);

        // Entries already sorted from BTreeMap
        let mut builder = SSTableBuilder::new(&path)?;
        builder.set_last_lsn(last_lsn.max(self.last_lsn()));
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.insert(0, reader);

        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "flushed memtable to SSTable"
        );

        Ok(metadata)
    }

    /// Merge every SSTable into a single table
    ///
    /// Shadowed values and tombstones are dropped: the output is the only
    /// table left, so there is nothing older for a tombstone to hide.
    /// Returns `None` when there are no tables.
    pub fn compact(&mut self) -> Result<Option<SSTable>> {
        if self.sstables.is_empty() {
            return Ok(None);
        }

        let id = self.allocate_id();
        let path = Self::sstable_path(&self.data_dir, id, TableKind::Compacted);

        let mut builder = SSTableBuilder::new(&path)?;
        builder.set_last_lsn(self.last_lsn());
        for item in MergeIterator::new(self.sources()?) {
            let (key, value) = item?;
            builder.add(&key, &value)?;
        }
        let metadata = builder.finish()?;

        // The finished compacted table now supersedes the inputs on disk
        let reader = SSTableReader::open(&path)?;
        let inputs = std::mem::replace(&mut self.sstables, vec![reader]);
        let input_count = inputs.len();

        for old in inputs {
            let old_path = old.path().to_path_buf();
            drop(old);
            if let Err(e) = fs::remove_file(&old_path) {
                tracing::warn!(path = %old_path.display(), error = %e, "failed to remove compacted SSTable");
            }
        }
        sync_dir(&self.data_dir)?;

        tracing::debug!(
            id,
            inputs = input_count,
            entries = metadata.entry_count,
            "compacted SSTables"
        );

        Ok(Some(metadata))
    }

    /// Sorted iterators over every table, newest first
    pub fn sources(&self) -> Result<Vec<MergeSource<'static>>> {
        self.sstables
            .iter()
            .map(|reader| reader.iter().map(MergeSource::Table))
            .collect()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.len()
    }

    /// Highest LSN recorded by any table (0 when there are none)
    pub fn last_lsn(&self) -> u64 {
        self.sstables.iter().map(SSTableReader::last_lsn).max().unwrap_or(0)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_sstable_id;
        self.next_sstable_id += 1;
        id
    }

    /// "sstable_000042.sst" / "compacted_000042.sst"
    fn sstable_path(dir: &Path, id: u64, kind: TableKind) -> PathBuf {
        dir.join(format!("{}{:06}.sst", kind.prefix(), id))
    }

    /// "sstable_000042.sst" → Some((42, Flushed))
    fn parse_sstable_name(path: &Path) -> Option<(u64, TableKind)> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_str()?;
        [TableKind::Flushed, TableKind::Compacted]
            .into_iter()
            .find_map(|kind| {
                let id = name.strip_prefix(kind.prefix())?.parse().ok()?;
                Some((id, kind))
            })
    }
}
