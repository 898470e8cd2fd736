//! Transaction Module
//!
//! Atomic read (`view`) and read-write (`update`) scopes over the engine.
//!
//! ## Isolation
//! - A `ReadTxn` holds the shared lock on the engine state for its lifetime.
//!   Commits cannot be applied while it is alive, so every read in it sees
//!   the same snapshot.
//! - A `WriteTxn` buffers its writes locally and holds the upgradable lock,
//!   which admits readers but no second writer. Nothing it writes is visible
//!   to anyone else until `commit`, which logs the whole write set as one
//!   WAL entry and then applies it under the exclusive lock.
//!
//! A thread that holds a `ReadTxn` must not commit a `WriteTxn`: the commit
//! waits for all readers to finish. Likewise, a write transaction must not
//! start another one on the same thread.

use std::collections::BTreeMap;

use parking_lot::{RwLockReadGuard, RwLockUpgradableReadGuard};

use crate::engine::{Engine, Tables};
use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;
use crate::storage::{MergeIterator, MergeSource};
use crate::wal::Operation;

// =============================================================================
// Read Transactions
// =============================================================================

/// Read-only transaction over a consistent snapshot
pub struct ReadTxn<'a> {
    tables: RwLockReadGuard<'a, Tables>,
}

impl<'a> ReadTxn<'a> {
    /// Get a value by key, failing with `KeyNotFound` if absent
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self.tables.get(key)? {
            Some(MemTableEntry::Value(value)) => Ok(value),
            Some(MemTableEntry::Tombstone) | None => Err(KvError::KeyNotFound),
        }
    }

    /// Whether the key holds a live value
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(matches!(self.tables.get(key)?, Some(MemTableEntry::Value(_))))
    }

    /// Lazy iteration over every live (key, value) in key order
    pub fn iter(&self) -> Result<MergeIterator<'_>> {
        Ok(MergeIterator::new(self.tables.sources()?))
    }
}

// =============================================================================
// Write Transactions
// =============================================================================

/// Read-write transaction; changes are private until `commit`
pub struct WriteTxn<'a> {
    engine: &'a Engine,
    tables: RwLockUpgradableReadGuard<'a, Tables>,
    /// Pending writes; a tombstone is a pending delete
    writes: BTreeMap<Vec<u8>, MemTableEntry>,
}

impl<'a> WriteTxn<'a> {
    /// Get a value, seeing this transaction's own pending writes
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let entry = match self.writes.get(key) {
            Some(pending) => Some(pending.clone()),
            None => self.tables.get(key)?,
        };
        match entry {
            Some(MemTableEntry::Value(value)) => Ok(value),
            Some(MemTableEntry::Tombstone) | None => Err(KvError::KeyNotFound),
        }
    }

    /// Stage an upsert
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes
            .insert(key.to_vec(), MemTableEntry::Value(value.to_vec()));
    }

    /// Stage a delete
    pub fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), MemTableEntry::Tombstone);
    }

    /// Lazy iteration including this transaction's pending writes
    pub fn iter(&self) -> Result<MergeIterator<'_>> {
        let mut sources = vec![MergeSource::Map(self.writes.iter())];
        sources.extend(self.tables.sources()?);
        Ok(MergeIterator::new(sources))
    }

    /// Number of keys with a pending write
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Make every pending write durable and visible, atomically
    ///
    /// If the WAL append fails the store is left as it was and the error is
    /// returned as `Commit`.
    pub fn commit(self) -> Result<()> {
        let WriteTxn {
            engine,
            tables,
            writes,
        } = self;

        if writes.is_empty() {
            return Ok(());
        }

        let operations: Vec<Operation> = writes
            .into_iter()
            .map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Operation::Put { key, value },
                MemTableEntry::Tombstone => Operation::Delete { key },
            })
            .collect();

        let lsn = engine
            .wal
            .lock()
            .append(&operations)
            .map_err(|e| KvError::Commit(Box::new(e)))?;

        let op_count = operations.len();
        let mut tables = RwLockUpgradableReadGuard::upgrade(tables);
        for operation in operations {
            tables.memtable.apply(operation);
        }
        tracing::debug!(lsn, operations = op_count, "committed transaction");

        engine.after_commit(&mut tables);
        Ok(())
    }

    /// Discard every pending write
    pub fn rollback(self) {
        if !self.writes.is_empty() {
            tracing::debug!(discarded = self.writes.len(), "rolled back transaction");
        }
    }
}

// =============================================================================
// Engine entry points
// =============================================================================

impl Engine {
    /// Start a read-only transaction
    pub fn begin_read(&self) -> Result<ReadTxn<'_>> {
        let tables = self.tables.read();
        self.ensure_open()?;
        Ok(ReadTxn { tables })
    }

    /// Start a read-write transaction, waiting for any other writer to finish
    pub fn begin_write(&self) -> Result<WriteTxn<'_>> {
        let tables = self.tables.upgradable_read();
        self.ensure_open()?;
        Ok(WriteTxn {
            engine: self,
            tables,
            writes: BTreeMap::new(),
        })
    }

    /// Run `f` inside a read-only transaction
    pub fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T>,
    {
        let txn = self.begin_read()?;
        f(&txn)
    }

    /// Run `f` inside a read-write transaction
    ///
    /// Commits if `f` succeeds; otherwise nothing `f` wrote takes effect and
    /// its error is returned.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }
}
