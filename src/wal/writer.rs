//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;
use super::entry::now_millis;
use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN of the last appended entry (0 = none yet)
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Length of the file in bytes (end of the last complete entry)
    len: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned to continue its LSN sequence. A torn tail
    /// left by an interrupted append is cut off so new entries follow the
    /// last complete one.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let existing = WalRecovery::verify(path)?;
        if existing.was_truncated {
            file.set_len(existing.valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(existing.valid_len))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_lsn: existing.last_lsn,
            sync_strategy,
            unsynced: 0,
            len: existing.valid_len,
        })
    }

    /// Append one entry holding `operations` and return its LSN
    ///
    /// If the write or the required fsync fails the file is cut back to its
    /// previous length and the LSN is not consumed.
    pub fn append(&mut self, operations: &[Operation]) -> Result<u64> {
        let lsn = self.current_lsn + 1;
        let bytes = WalEntry::encode_frame(lsn, now_millis(), operations)?;

        if let Err(e) = self.write_and_sync(&bytes) {
            self.rollback_tail();
            return Err(e);
        }

        self.current_lsn = lsn;
        self.len += bytes.len() as u64;
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (their effects are durable elsewhere)
    ///
    /// The LSN sequence keeps counting from where it was.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Continue numbering after `lsn` if it is ahead of this log
    ///
    /// An emptied WAL has no entries to take its LSN from, so the engine
    /// seeds it from the high-water mark stored in the SSTables.
    pub fn advance_to(&mut self, lsn: u64) {
        self.current_lsn = self.current_lsn.max(lsn);
    }

    /// Get the current LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Current file length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_and_sync(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        self.unsynced += 1;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }
        Ok(())
    }

    fn rollback_tail(&mut self) {
        let restored = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.seek(SeekFrom::Start(self.len)).map(|_| ()));
        if let Err(e) = restored {
            tracing::error!(path = %self.path.display(), error = %e, "failed to roll back WAL tail");
        }
    }
}
