//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access (see `transaction`)
//! - Trigger flushes when MemTable is full, compaction when tables pile up
//! - Manage crash recovery on startup
//! - Close exactly once, on `close()` or drop

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{MergeSource, StorageManager};
use crate::wal::{WalRecovery, WalWriter};

/// Everything a reader needs for a consistent view
///
/// The memtable and the SSTable list change together under one lock, so a
/// flush never exposes a state where data is in neither or both.
pub(crate) struct Tables {
    pub(crate) memtable: MemTable,
    pub(crate) storage: StorageManager,
}

impl Tables {
    /// Newest entry for `key`: memtable first, then SSTables
    pub(crate) fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(Some(entry.clone()));
        }
        self.storage.get(key)
    }

    /// Merge sources, newest first
    pub(crate) fn sources(&self) -> Result<Vec<MergeSource<'_>>> {
        let mut sources = vec![MergeSource::Map(self.memtable.iter())];
        sources.extend(self.storage.sources()?);
        Ok(sources)
    }
}

/// The store handle
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Readers** (`view`, `get`): hold a shared read guard on `tables` for
///   the whole transaction, which pins a snapshot.
/// - **Writers** (`update`, `put`, `delete`): hold the upgradable read guard
///   for the whole transaction. Only one exists at a time, so writers are
///   serialized without blocking readers. The guard is upgraded to exclusive
///   only to apply a commit that is already durable in the WAL.
/// - **Maintenance** (`flush`, `compact`, `close`): take the exclusive lock.
///
/// Lock order is always `tables` → `wal`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// MemTable + SSTables
    pub(crate) tables: RwLock<Tables>,

    /// Write-ahead log for durability
    pub(crate) wal: Mutex<WalWriter>,

    /// Set once by `close`
    closed: AtomicBool,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if exists, flush the recovered writes
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let mut storage = StorageManager::open(&storage_dir)?;
        let mut memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    truncated = recovery.was_truncated,
                    "WAL recovery"
                );
            }

            for entry in entries {
                for operation in entry.operations {
                    memtable.apply(operation);
                }
            }

            // Recovered writes become durable in an SSTable before the WAL
            // that held them is emptied
            if !memtable.is_empty() {
                tracing::info!(
                    entries = memtable.entry_count(),
                    "flushing recovered entries to SSTable"
                );
                storage.flush(&memtable, recovery.last_lsn)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if !wal.is_empty() {
            wal.truncate()?;
        }
        wal.advance_to(storage.last_lsn());

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sstables = storage.sstable_count(),
            last_lsn = wal.current_lsn(),
            "store opened"
        );

        Ok(Self {
            config,
            storage_dir,
            tables: RwLock::new(Tables { memtable, storage }),
            wal: Mutex::new(wal),
            closed: AtomicBool::new(false),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Fails with `KeyNotFound` when the key is absent or deleted.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.view(|txn| txn.get(key))
    }

    /// Put a key-value pair (single-operation transaction)
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.set(key, value);
            Ok(())
        })
    }

    /// Delete a key (single-operation transaction)
    ///
    /// Deleting a key that does not exist is not an error.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.update(|txn| {
            txn.delete(key);
            Ok(())
        })
    }

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let mut tables = self.tables.write();
        self.ensure_open()?;
        self.flush_locked(&mut tables)
    }

    /// Merge all SSTables into one, dropping deleted and overwritten entries
    pub fn compact(&self) -> Result<()> {
        let mut tables = self.tables.write();
        self.ensure_open()?;
        tables.storage.compact()?;
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data, empties the WAL and syncs to disk. A second
    /// call, and every operation after the first, fails with `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut tables = self.tables.write();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(KvError::Closed);
        }

        self.flush_locked(&mut tables)?;
        self.wal.lock().sync()?;

        tracing::info!(data_dir = %self.config.data_dir.display(), "store closed");
        Ok(())
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Crate-internal helpers used by transactions
    // =========================================================================

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(KvError::Closed);
        }
        Ok(())
    }

    /// Threshold work after a commit has been applied
    ///
    /// The commit is already durable in the WAL, so a failure here is
    /// logged and left for the next flush, recovery or close to retry.
    pub(crate) fn after_commit(&self, tables: &mut Tables) {
        if !tables.memtable.should_flush(self.config.memtable_size_limit) {
            return;
        }
        if let Err(e) = self.flush_locked(tables) {
            tracing::warn!(error = %e, "background flush after commit failed");
        }
    }

    /// Flush with exclusive access to `tables` already held
    fn flush_locked(&self, tables: &mut Tables) -> Result<()> {
        if tables.memtable.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        tables.storage.flush(&tables.memtable, wal.current_lsn())?;
        tables.memtable.clear();

        // Entries are now durable in an SSTable
        wal.truncate()?;
        drop(wal);

        if tables.storage.sstable_count() > self.config.max_sstables {
            tables.storage.compact()?;
        }

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.tables.read().memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.tables.read().memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.tables.read().storage.sstable_count()
    }

    /// LSN of the most recent commit
    pub fn last_lsn(&self) -> u64 {
        self.wal.lock().current_lsn()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close store on drop");
        }
    }
}
