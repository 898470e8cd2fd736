//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{KvError, Result};
use crate::memtable::MemTableEntry;

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// Point lookups seek a shared file handle behind a mutex, so `get` takes
/// `&self` and a reader can be shared between threads.
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for point lookups
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Highest LSN this table covers
    last_lsn: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates the header and the data block checksum, then loads the
    /// entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, format!("file too small ({} bytes)", file_size)));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(corrupt(
                path,
                format!("invalid magic: expected KVSH, got {:?}", &header[0..4]),
            ));
        }

        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(corrupt(path, format!("unsupported version: {}", version)));
        }

        let entry_count = u64::from_le_bytes(header[6..14].try_into().unwrap());

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let last_lsn = u64::from_le_bytes(footer[8..16].try_into().unwrap());
        let data_crc = u32::from_le_bytes(footer[16..20].try_into().unwrap());

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(corrupt(path, format!("index offset {} out of range", index_offset)));
        }

        let actual_crc = Self::checksum_data(&mut file, index_offset)?;
        if actual_crc != data_crc {
            return Err(corrupt(
                path,
                format!(
                    "data checksum mismatch: expected {:#010x}, got {:#010x}",
                    data_crc, actual_crc
                ),
            ));
        }

        // Index block size = file_size - footer_size - index_offset
        file.seek(SeekFrom::Start(index_offset))?;
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        let index = Self::parse_index(path, &index_data)?;
        if index.len() as u64 != entry_count {
            return Err(corrupt(
                path,
                format!("header declares {} entries, index has {}", entry_count, index.len()),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            last_lsn,
            index_offset,
        })
    }

    /// Look up a key in O(log n) via the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Value(..)))`: key found with value
    /// - `Ok(Some(Tombstone))`: key deleted as of this table
    /// - `Ok(None)`: key not in this table
    pub fn get(&self, key: &[u8]) -> Result<Option<MemTableEntry>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;

        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let val_len = u32::from_le_bytes(header[4..8].try_into().unwrap());

        // Skip the key (we already know it matches)
        file.seek_relative(key_len as i64)?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(Some(MemTableEntry::Tombstone));
        }

        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;

        Ok(Some(MemTableEntry::Value(value)))
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Highest WAL LSN whose writes this table holds
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Iterate over all entries in key order
    ///
    /// Each iterator opens its own file handle, so iteration does not
    /// contend with point lookups.
    pub fn iter(&self) -> Result<SSTableIterator> {
        let file = File::open(&self.path)?;
        SSTableIterator::new(BufReader::new(file), self.index_offset)
    }

    fn checksum_data(file: &mut File, index_offset: u64) -> Result<u32> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut remaining = index_offset - HEADER_SIZE;
        let mut hasher = crc32fast::Hasher::new();
        let mut buf = vec![0u8; 64 * 1024];

        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..chunk])?;
            hasher.update(&buf[..chunk]);
            remaining -= chunk as u64;
        }

        Ok(hasher.finalize())
    }

    /// Parse index entries: [key_len(4)][offset(8)][key]
    fn parse_index(path: &Path, index_data: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
        let mut index = BTreeMap::new();
        let mut pos = 0;

        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(corrupt(path, "truncated index entry".to_string()));
            }
            let key_len =
                u32::from_le_bytes(index_data[pos..pos + 4].try_into().unwrap()) as usize;
            let offset = u64::from_le_bytes(index_data[pos + 4..pos + 12].try_into().unwrap());
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(corrupt(path, "truncated index key".to_string()));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        Ok(index)
    }
}

fn corrupt(path: &Path, reason: String) -> KvError {
    KvError::Storage(format!("SSTable {}: {}", path.display(), reason))
}
