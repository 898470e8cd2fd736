//! # kvshell
//!
//! An interactive shell over a durable embedded key-value store with:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Snapshot read transactions and atomic, serialized write transactions
//! - SSTable flushes and full compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Command Shell                           │
//! │          (set / get / delete / ls / bye|exit|quit)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Transaction Coordinator                      │
//! │        (view: snapshot reads / update: single writer)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │ (BTreeMap)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use kvshell::Engine;
//!
//! let engine = Engine::open_path(std::path::Path::new("./db"))?;
//! engine.update(|txn| {
//!     txn.set(b"a", b"1");
//!     txn.set(b"b", b"2");
//!     Ok(())
//! })?;
//! let value = engine.view(|txn| txn.get(b"a"))?;
//! assert_eq!(value, b"1");
//! engine.close()?;
//! # Ok::<(), kvshell::KvError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod transaction;
pub mod shell;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::Engine;
pub use transaction::{ReadTxn, WriteTxn};
pub use shell::{Command, Shell, ShellExit};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvshell
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
