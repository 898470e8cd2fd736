//! kvshell binary
//!
//! Opens the store and runs the interactive shell on stdin/stdout.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use kvshell::{Config, Engine, KvError, Shell, WalSyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// Interactive shell for a durable key-value store
#[derive(Parser, Debug)]
#[command(name = "kvshell")]
#[command(about = "Interactive shell for a durable embedded key-value store")]
#[command(version)]
struct Args {
    /// Directory holding the store's data
    #[arg(short, long, default_value = "./db")]
    data_dir: String,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "4")]
    memtable_mb: usize,

    /// Number of SSTables that triggers a compaction
    #[arg(long, default_value = "8")]
    max_sstables: usize,

    /// fsync the WAL every N commits instead of after each one
    #[arg(long)]
    sync_every: Option<usize>,
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries command output only
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid arguments: {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open store at {}: {}", args.data_dir, e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("kvshell v{} ready", kvshell::VERSION);

    let stdin = io::stdin();
    let mut shell = Shell::new(&engine, stdin.lock(), io::stdout(), io::stderr());
    let outcome = shell.run();
    drop(shell);

    // Close before reporting so the store is released on every path
    let closed = engine.close();

    let mut code = ExitCode::SUCCESS;
    if let Err(e) = outcome {
        tracing::error!("shell stopped: {}", e);
        eprintln!("shell stopped: {}", e);
        code = ExitCode::FAILURE;
    }
    if let Err(e) = closed {
        tracing::error!("Failed to close store: {}", e);
        eprintln!("{}", e);
        code = ExitCode::FAILURE;
    }
    code
}

/// Map command-line arguments onto a validated store config
fn build_config(args: &Args) -> kvshell::Result<Config> {
    let sync_strategy = match args.sync_every {
        Some(count) => WalSyncStrategy::EveryNEntries { count },
        None => WalSyncStrategy::EveryWrite,
    };

    let memtable_bytes = args
        .memtable_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| {
            KvError::Config(format!("memtable size of {} MB is too large", args.memtable_mb))
        })?;

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .memtable_size_limit(memtable_bytes)
        .max_sstables(args.max_sstables)
        .wal_sync_strategy(sync_strategy)
        .build();
    config.validate()?;
    Ok(config)
}
