//! Read-eval-print loop
//!
//! Drives the shell as a small state machine:
//!
//! ```text
//! Idle ──line──▶ ParsingLine ──command──▶ Dispatching ──▶ Idle
//!   │                 │ blank / error ──▶ Idle      │
//!   └─ end of input    exit keyword ──▶ Exiting ◀───┘
//! ```

use std::io::{BufRead, Write};

use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::Command;

/// Printed before each line is read
pub const PROMPT: &str = "> ";

/// Printed when the user leaves with an exit keyword
pub const FAREWELL: &str = "good bye";

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// An exit keyword was entered
    Quit,
    /// Input ran out
    EndOfInput,
}

#[derive(Debug)]
enum State {
    Idle,
    ParsingLine(Vec<u8>),
    Dispatching(Command),
    Exiting,
}

/// Interactive shell bound to one engine and a set of streams
pub struct Shell<'e, R, W, E> {
    engine: &'e Engine,
    input: R,
    out: W,
    err: E,
}

impl<'e, R, W, E> Shell<'e, R, W, E>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    pub fn new(engine: &'e Engine, input: R, out: W, err: E) -> Self {
        Self {
            engine,
            input,
            out,
            err,
        }
    }

    /// Run until an exit keyword or end of input
    ///
    /// Command failures are reported on the error stream and the loop goes
    /// on. Only a failure to read input or to write to the streams ends it
    /// with an error.
    pub fn run(&mut self) -> Result<ShellExit> {
        let mut state = State::Idle;

        loop {
            state = match state {
                State::Idle => {
                    self.prompt()?;
                    match self.read_line()? {
                        Some(line) => State::ParsingLine(line),
                        None => return Ok(ShellExit::EndOfInput),
                    }
                }
                State::ParsingLine(line) => match Command::parse(&line) {
                    Ok(Some(command)) => State::Dispatching(command),
                    Ok(None) => State::Idle,
                    Err(e) => {
                        self.report(&e)?;
                        State::Idle
                    }
                },
                State::Dispatching(Command::Exit) => State::Exiting,
                State::Dispatching(command) => {
                    if let Err(e) = self.execute(command) {
                        self.report(&e)?;
                    }
                    State::Idle
                }
                State::Exiting => {
                    writeln!(self.out, "{}", FAREWELL)?;
                    self.out.flush()?;
                    return Ok(ShellExit::Quit);
                }
            };
        }
    }

    /// Execute one command against the engine, writing its output
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let engine = self.engine;

        match command {
            Command::Get { key } => {
                let value = engine.view(|txn| txn.get(&key))?;
                self.out.write_all(&value)?;
                writeln!(self.out)?;
            }
            Command::Set { key, value } => {
                engine.update(|txn| {
                    txn.set(&key, &value);
                    Ok(())
                })?;
            }
            Command::Delete { key } => {
                engine.update(|txn| {
                    txn.delete(&key);
                    Ok(())
                })?;
            }
            Command::List => {
                let out = &mut self.out;
                engine.view(|txn| {
                    for item in txn.iter()? {
                        let (key, _) = item?;
                        out.write_all(&key)?;
                        writeln!(out)?;
                    }
                    Ok(())
                })?;
            }
            Command::Exit => {}
        }

        self.out.flush()?;
        Ok(())
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "{}", PROMPT)?;
        self.out.flush()?;
        Ok(())
    }

    /// Next raw line, or `None` at end of input
    ///
    /// The bytes are passed on untouched; the parser treats the line
    /// terminator as whitespace.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    fn report(&mut self, e: &KvError) -> Result<()> {
        tracing::debug!(error = %e, "command failed");
        writeln!(self.err, "{}", e)?;
        self.err.flush()?;
        Ok(())
    }
}
