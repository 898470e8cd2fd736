//! Merge Iterator
//!
//! Lazy k-way merge over sorted sources ordered newest first. For a key held
//! by several sources the newest entry wins, and a winning tombstone hides
//! the key entirely.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{KvError, Result};
use crate::memtable::{MemTableEntry, MemTableIter};

use super::SSTableIterator;

/// One sorted input to a merge
pub enum MergeSource<'a> {
    /// An in-memory map (memtable or a transaction's write set)
    Map(MemTableIter<'a>),
    /// An on-disk table
    Table(SSTableIterator),
}

impl Iterator for MergeSource<'_> {
    type Item = Result<(Vec<u8>, MemTableEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            MergeSource::Map(iter) => iter.next().map(|(k, e)| Ok((k.clone(), e.clone()))),
            MergeSource::Table(iter) => iter.next(),
        }
    }
}

/// Head of one source waiting in the heap
#[derive(Debug)]
struct MergeEntry {
    key: Vec<u8>,
    entry: MemTableEntry,
    source_idx: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source_idx == other.source_idx
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: smallest key first, and for equal keys
        // the lowest source index (newest) first
        match other.key.cmp(&self.key) {
            Ordering::Equal => other.source_idx.cmp(&self.source_idx),
            ord => ord,
        }
    }
}

/// Live (key, value) pairs across all sources in ascending key order
pub struct MergeIterator<'a> {
    sources: Vec<MergeSource<'a>>,
    heap: BinaryHeap<MergeEntry>,
    error: Option<KvError>,
    done: bool,
}

impl<'a> MergeIterator<'a> {
    /// Merge `sources`, where index 0 is the newest
    pub fn new(sources: Vec<MergeSource<'a>>) -> Self {
        let mut iter = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            error: None,
            done: false,
        };
        for idx in 0..iter.sources.len() {
            iter.advance(idx);
        }
        iter
    }

    /// Pull the next head of source `idx` into the heap
    fn advance(&mut self, idx: usize) {
        match self.sources[idx].next() {
            Some(Ok((key, entry))) => self.heap.push(MergeEntry {
                key,
                entry,
                source_idx: idx,
            }),
            Some(Err(e)) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
            None => {}
        }
    }

    fn fail(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>)>> {
        let e = self.error.take()?;
        self.done = true;
        self.heap.clear();
        Some(Err(e))
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.error.is_some() {
                return self.fail();
            }

            let top = self.heap.pop()?;

            // Older versions of the same key are shadowed
            while self.heap.peek().map_or(false, |next| next.key == top.key) {
                if let Some(shadowed) = self.heap.pop() {
                    self.advance(shadowed.source_idx);
                }
            }
            self.advance(top.source_idx);

            if self.error.is_some() {
                return self.fail();
            }

            match top.entry {
                MemTableEntry::Value(value) => return Some(Ok((top.key, value))),
                MemTableEntry::Tombstone => continue,
            }
        }
    }
}
