//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{KvError, Result};
use super::{WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};

/// What the reader found at the current position
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete entry with a valid checksum
    Entry(WalEntry),

    /// A complete frame whose checksum or payload is bad
    Corrupted { lsn: u64, offset: u64 },

    /// A partial frame at the end of the file (interrupted write)
    TornTail { offset: u64 },
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last complete frame
    position: u64,
    file_len: u64,
    /// Set once a torn tail is seen; nothing after it is trusted
    finished: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
            finished: false,
        })
    }

    /// Read the next frame, classifying it
    ///
    /// Returns `Ok(None)` at a clean end of file or after a torn tail.
    pub fn next_record(&mut self) -> Result<Option<ReadOutcome>> {
        if self.finished {
            return Ok(None);
        }

        let remaining = self.file_len - self.position;
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Some(self.torn()));
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let (lsn, crc, len) = WalEntry::decode_header(&header);

        if len > MAX_ENTRY_SIZE || (HEADER_SIZE as u64 + len as u64) > remaining {
            return Ok(Some(self.torn()));
        }

        let mut data = vec![0u8; len as usize];
        self.reader.read_exact(&mut data)?;

        let offset = self.position;
        self.position += HEADER_SIZE as u64 + len as u64;

        match WalEntry::from_parts(lsn, crc, &data) {
            Ok(entry) => Ok(Some(ReadOutcome::Entry(entry))),
            Err(KvError::WalCorruption(reason)) => {
                tracing::warn!(lsn, offset, %reason, "corrupted WAL entry");
                Ok(Some(ReadOutcome::Corrupted { lsn, offset }))
            }
            Err(e) => Err(e),
        }
    }

    /// Read the next valid entry, skipping corrupted frames
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        while let Some(outcome) = self.next_record()? {
            if let ReadOutcome::Entry(entry) = outcome {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Byte offset just past the last complete frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Length of the file when it was opened
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self }
    }

    fn torn(&mut self) -> ReadOutcome {
        self.finished = true;
        ReadOutcome::TornTail {
            offset: self.position,
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}
