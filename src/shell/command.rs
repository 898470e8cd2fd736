//! Command definitions
//!
//! Parses one input line into a command, checking argument counts. Lines
//! are split on ASCII whitespace at the byte level, so keys and values keep
//! their exact bytes whether or not they are valid UTF-8.

use crate::error::{KvError, Result};

/// Words that end the session
pub const EXIT_KEYWORDS: [&str; 3] = ["bye", "exit", "quit"];

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Set a key-value pair
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// List all keys
    List,

    /// Leave the shell
    Exit,
}

impl Command {
    /// Parse a line
    ///
    /// Returns `Ok(None)` for a blank line, `Usage` for a wrong argument
    /// count and `UnknownCommand` for an unrecognized first word.
    pub fn parse(line: impl AsRef<[u8]>) -> Result<Option<Command>> {
        let fields: Vec<&[u8]> = line
            .as_ref()
            .split(u8::is_ascii_whitespace)
            .filter(|field| !field.is_empty())
            .collect();
        let Some((&first, args)) = fields.split_first() else {
            return Ok(None);
        };

        let command = match first {
            word if EXIT_KEYWORDS.iter().any(|kw| kw.as_bytes() == word) => Command::Exit,
            b"get" => match args {
                [key] => Command::Get { key: key.to_vec() },
                _ => return Err(usage("get expects one key as parameter: 'get key'")),
            },
            b"set" => match args {
                [key, value] => Command::Set {
                    key: key.to_vec(),
                    value: value.to_vec(),
                },
                _ => {
                    return Err(usage(
                        "set expects one key and one value as parameters: 'set key value'",
                    ))
                }
            },
            b"delete" => match args {
                [key] => Command::Delete { key: key.to_vec() },
                _ => return Err(usage("delete expects one key as parameter: 'delete key'")),
            },
            b"ls" => match args {
                [] => Command::List,
                _ => return Err(usage("ls doesn't expect any parameters")),
            },
            other => {
                return Err(KvError::UnknownCommand(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        Ok(Some(command))
    }
}

fn usage(message: &str) -> KvError {
    KvError::Usage(message.to_string())
}
