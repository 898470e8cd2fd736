//! Tests for the WAL
//!
//! These tests verify:
//! - Entry framing and checksum validation
//! - LSN generation across appends, truncation and reopen
//! - Reading back batches in order
//! - Recovery from torn tails and corrupted entries
//! - Verify mode (stats only, no modification)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use kvshell::config::WalSyncStrategy;
use kvshell::wal::{
    Operation, ReadOutcome, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE,
};
use kvshell::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn del(key: &str) -> Operation {
    Operation::Delete {
        key: key.as_bytes().to_vec(),
    }
}

/// Write `count` single-put entries using WalWriter
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(&[put(&format!("key{}", i), &format!("value{}", i))])
            .unwrap();
    }
}

/// Write raw serialized entries directly to a file (for crafting corruption)
fn write_raw_entries(path: &Path, entries: &[WalEntry]) {
    let mut file = File::create(path).unwrap();
    for entry in entries {
        file.write_all(&entry.serialize().unwrap()).unwrap();
    }
    file.sync_all().unwrap();
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_serialize_layout() {
    let entry = WalEntry::new(7, vec![put("k", "v")]);
    let bytes = entry.serialize().unwrap();

    assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 7);
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
}

#[test]
fn test_entry_deserialize_keeps_batch_order() {
    let entry = WalEntry::new(3, vec![put("b", "2"), del("a"), put("c", "3")]);
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.operations[1].key(), b"a");
}

#[test]
fn test_entry_detects_flipped_bit() {
    let entry = WalEntry::new(1, vec![put("key", "value")]);
    let mut bytes = entry.serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let err = WalEntry::deserialize(&bytes).unwrap_err();
    assert!(matches!(err, KvError::WalCorruption(_)));
}

#[test]
fn test_entry_detects_changed_lsn() {
    let entry = WalEntry::new(1, vec![put("key", "value")]);
    let mut bytes = entry.serialize().unwrap();
    bytes[0] = 2;

    assert!(WalEntry::deserialize(&bytes).is_err());
}

#[test]
fn test_entry_rejects_short_input() {
    let err = WalEntry::deserialize(&[0u8; 5]).unwrap_err();
    assert!(matches!(err, KvError::WalCorruption(_)));
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_write_assigns_sequential_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 0);
    assert_eq!(writer.append(&[put("a", "1")]).unwrap(), 1);
    assert_eq!(writer.append(&[put("b", "2")]).unwrap(), 2);
    assert_eq!(writer.append(&[del("a")]).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_writer_tracks_file_length() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert!(writer.is_empty());

    writer.append(&[put("a", "1")]).unwrap();

    assert_eq!(writer.len(), fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(&[put("x", "y")]).unwrap(), 4);
}

#[test]
fn test_truncate_empties_file_but_keeps_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(&[put("a", "1")]).unwrap();
    writer.append(&[put("b", "2")]).unwrap();

    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(&[put("c", "3")]).unwrap(), 3);

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

#[test]
fn test_every_n_entries_strategy_writes_all() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer =
            WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
        for i in 0..25 {
            writer.append(&[put(&format!("k{}", i), "v")]).unwrap();
        }
        writer.sync().unwrap();
    }

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.entries_recovered, 25);
}

#[test]
fn test_open_cuts_torn_tail_before_appending() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let good_len = fs::metadata(&wal_path).unwrap().len();
    append_raw(&wal_path, &[0xAA; 7]);

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.len(), good_len);
    writer.append(&[put("after", "tear")]).unwrap();

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.entries_recovered, 3);
    assert!(!result.was_truncated);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_returns_batches_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(&[put("a", "1"), put("b", "2")]).unwrap();
        writer.append(&[del("a")]).unwrap();
    }

    let mut reader = WalReader::open(&wal_path).unwrap();
    let first = reader.next_entry().unwrap().unwrap();
    let second = reader.next_entry().unwrap().unwrap();

    assert_eq!(first.operations, vec![put("a", "1"), put("b", "2")]);
    assert_eq!(second.operations, vec![del("a")]);
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), reader.file_len());
}

#[test]
fn test_reader_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_reader_classifies_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let entry = WalEntry::new(1, vec![put("key", "value")]);
    let bytes = entry.serialize().unwrap();
    fs::write(&wal_path, &bytes[..bytes.len() - 3]).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(
        reader.next_record().unwrap(),
        Some(ReadOutcome::TornTail { offset: 0 })
    ));
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_reader_skips_corrupted_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries = vec![
        WalEntry::new(1, vec![put("a", "1")]),
        WalEntry::new(2, vec![put("b", "2")]),
        WalEntry::new(3, vec![put("c", "3")]),
    ];
    write_raw_entries(&wal_path, &entries);

    // Flip a byte in the data section of the middle entry
    let first_len = entries[0].serialize().unwrap().len();
    let mut bytes = fs::read(&wal_path).unwrap();
    bytes[first_len + HEADER_SIZE] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 3]);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 5);
    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.last_lsn, 5);
    assert!(!result.was_truncated);
    assert_eq!(result.valid_len, fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_recover_truncates_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let good_len = fs::metadata(&wal_path).unwrap().len();
    append_raw(&wal_path, &[1, 2, 3, 4, 5]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_truncates_partial_data() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let good_len = fs::metadata(&wal_path).unwrap().len();

    let partial = WalEntry::new(3, vec![put("partial", "write")]).serialize().unwrap();
    append_raw(&wal_path, &partial[..HEADER_SIZE + 2]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good_len);
}

#[test]
fn test_recover_counts_corrupted_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries = vec![
        WalEntry::new(1, vec![put("a", "1")]),
        WalEntry::new(2, vec![put("b", "2")]),
    ];
    write_raw_entries(&wal_path, &entries);

    // Corrupt the CRC of the first entry
    let mut bytes = fs::read(&wal_path).unwrap();
    bytes[8] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (recovered, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].lsn, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    append_raw(&wal_path, &[9; 3]);
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}
