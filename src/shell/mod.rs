//! Shell Module
//!
//! Line-oriented command interface over the store.
//!
//! ## Commands
//! - `set <key> <value>`: upsert, no output
//! - `get <key>`: print the value
//! - `delete <key>`: remove, no output (missing keys are fine)
//! - `ls`: print every key, one per line, in key order
//! - `bye` | `exit` | `quit`: print a farewell and stop
//!
//! Tokens are separated by whitespace. Errors go to the error stream, one
//! line each, and never stop the loop.

mod command;
mod repl;

pub use command::{Command, EXIT_KEYWORDS};
pub use repl::{Shell, ShellExit, FAREWELL, PROMPT};
