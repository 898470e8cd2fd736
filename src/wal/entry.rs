//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry's data section (256 MB)
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL: the full write set of one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,

    /// The operations to apply, in order
    pub operations: Vec<Operation>,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// Key touched by this operation
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        Self {
            lsn,
            timestamp: now_millis(),
            operations,
        }
    }

    /// Encode into a framed record: [lsn][crc][len][data]
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Self::encode_frame(self.lsn, self.timestamp, &self.operations)
    }

    /// Frame borrowed operations without building an entry first
    pub(crate) fn encode_frame(
        lsn: u64,
        timestamp: u64,
        operations: &[Operation],
    ) -> Result<Vec<u8>> {
        let data = bincode::serialize(&(timestamp, operations))?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(KvError::Serialization(format!(
                "WAL entry too large: {} bytes (max {})",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let len = data.len() as u32;
        let crc = Self::compute_crc(lsn, len, &data);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
        buf.put_u64_le(lsn);
        buf.put_u32_le(crc);
        buf.put_u32_le(len);
        buf.put_slice(&data);

        Ok(buf.to_vec())
    }

    /// Decode a complete framed record, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(KvError::WalCorruption(format!(
                "entry shorter than header: {} bytes",
                bytes.len()
            )));
        }

        let (lsn, crc, len) = Self::decode_header(&bytes[..HEADER_SIZE]);
        let data = &bytes[HEADER_SIZE..];
        if data.len() != len as usize {
            return Err(KvError::WalCorruption(format!(
                "entry {} declares {} data bytes, found {}",
                lsn,
                len,
                data.len()
            )));
        }

        Self::from_parts(lsn, crc, data)
    }

    /// Split a header into (lsn, crc, len)
    pub(crate) fn decode_header(header: &[u8]) -> (u64, u32, u32) {
        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap());
        let len = u32::from_le_bytes(header[12..16].try_into().unwrap());
        (lsn, crc, len)
    }

    /// Verify the checksum and decode the data section
    pub(crate) fn from_parts(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, data.len() as u32, data);
        if actual != crc {
            return Err(KvError::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:#010x}, got {:#010x}",
                lsn, crc, actual
            )));
        }

        let (timestamp, operations): (u64, Vec<Operation>) = bincode::deserialize(data)
            .map_err(|e| KvError::WalCorruption(format!("undecodable entry {}: {}", lsn, e)))?;

        Ok(Self {
            lsn,
            timestamp,
            operations,
        })
    }

    fn compute_crc(lsn: u64, len: u32, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(&len.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }
}

/// Milliseconds since the unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
