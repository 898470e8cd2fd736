//! Tests for the interactive shell
//!
//! These tests verify:
//! - Scripted sessions produce the expected output and error lines
//! - Usage errors and unknown commands leave the store unchanged
//! - Exit keywords and end of input both end the session
//! - Data written in one session is there in the next

use std::io::Cursor;

use kvshell::config::Config;
use kvshell::engine::Engine;
use kvshell::shell::{Command, Shell, ShellExit, FAREWELL, PROMPT};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct Session {
    exit: ShellExit,
    out: String,
    err: String,
}

impl Session {
    /// Output with prompts removed, one entry per line
    fn lines(&self) -> Vec<&str> {
        self.out
            .split(PROMPT)
            .flat_map(str::lines)
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn err_lines(&self) -> Vec<&str> {
        self.err.lines().collect()
    }
}

fn open_engine(temp: &TempDir) -> Engine {
    Engine::open(Config::builder().data_dir(temp.path()).build()).unwrap()
}

fn run_script(engine: &Engine, script: &str) -> Session {
    let (exit, out, err) = run_raw(engine, script.as_bytes());
    Session {
        exit,
        out: String::from_utf8(out).unwrap(),
        err: String::from_utf8(err).unwrap(),
    }
}

/// Run a script that may hold arbitrary bytes, returning raw output
fn run_raw(engine: &Engine, script: &[u8]) -> (ShellExit, Vec<u8>, Vec<u8>) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let exit = Shell::new(engine, Cursor::new(script), &mut out, &mut err)
        .run()
        .unwrap();
    (exit, out, err)
}

// =============================================================================
// Sessions
// =============================================================================

#[test]
fn test_set_then_get() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set a 1\nget a\n");

    assert_eq!(session.exit, ShellExit::EndOfInput);
    assert_eq!(session.lines(), vec!["1"]);
    assert!(session.err.is_empty());
}

#[test]
fn test_set_prints_nothing() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set a 1\n");

    assert_eq!(session.out, format!("{}{}", PROMPT, PROMPT));
}

#[test]
fn test_get_missing_key_reports_not_found() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "get nothing\n");

    assert!(session.lines().is_empty());
    assert_eq!(session.err_lines(), vec!["Key not found"]);
}

#[test]
fn test_delete_then_get() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set a 1\ndelete a\nget a\n");

    assert!(session.lines().is_empty());
    assert_eq!(session.err_lines(), vec!["Key not found"]);
}

#[test]
fn test_delete_missing_key_is_silent() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "delete ghost\n");

    assert!(session.err.is_empty());
}

#[test]
fn test_ls_lists_keys_in_order() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set b 2\nset a 1\nls\ndelete a\nls\n");

    assert_eq!(session.lines(), vec!["a", "b", "b"]);
}

#[test]
fn test_ls_on_empty_store() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "ls\n");

    assert!(session.lines().is_empty());
    assert!(session.err.is_empty());
}

#[test]
fn test_overwrite_keeps_last_value() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set k first\nset k second\nget k\n");

    assert_eq!(session.lines(), vec!["second"]);
}

#[test]
fn test_non_utf8_keys_stay_distinct() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let (_, out, err) = run_raw(&engine, b"set \xff first\nset \xfe second\nget \xff\nls\n");

    assert!(err.is_empty());
    assert_eq!(engine.get(&[0xff]).unwrap(), b"first");
    assert_eq!(engine.get(&[0xfe]).unwrap(), b"second");

    let stored: Vec<Vec<u8>> = engine
        .view(|txn| txn.iter()?.map(|item| item.map(|(k, _)| k)).collect())
        .unwrap();
    assert_eq!(stored, vec![vec![0xfeu8], vec![0xffu8]]);

    // get prints the value, ls prints the raw key bytes in order
    let expected: &[u8] = b"> > > first\n> \xfe\n\xff\n> ";
    assert_eq!(out, expected);
}

#[test]
fn test_non_utf8_value_is_printed_verbatim() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let (_, out, _) = run_raw(&engine, b"set k \xc3\x28\nget k\n");

    assert_eq!(engine.get(b"k").unwrap(), vec![0xc3u8, 0x28]);
    assert!(out.windows(3).any(|w| w == [0xc3, 0x28, b'\n']));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_usage_errors_do_not_touch_store() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(
        &engine,
        "set a\nset a 1 2\nget\nget a b\ndelete\nls extra\nls\n",
    );

    assert!(session.lines().is_empty());
    assert_eq!(
        session.err_lines(),
        vec![
            "set expects one key and one value as parameters: 'set key value'",
            "set expects one key and one value as parameters: 'set key value'",
            "get expects one key as parameter: 'get key'",
            "get expects one key as parameter: 'get key'",
            "delete expects one key as parameter: 'delete key'",
            "ls doesn't expect any parameters",
        ]
    );
    assert_eq!(engine.last_lsn(), 0);
}

#[test]
fn test_unknown_command() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "put a 1\nget a\n");

    assert_eq!(
        session.err_lines(),
        vec!["unknown command \"put\"", "Key not found"]
    );
}

#[test]
fn test_blank_lines_are_ignored() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "\n   \nset a 1\n\t\nget a\n");

    assert_eq!(session.lines(), vec!["1"]);
    assert!(session.err.is_empty());
    // One prompt per line read, plus the final one at end of input
    assert_eq!(session.out.matches(PROMPT).count(), 6);
}

#[test]
fn test_session_continues_after_error() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "get x\nset x 1\nget x\n");

    assert_eq!(session.lines(), vec!["1"]);
    assert_eq!(session.err_lines(), vec!["Key not found"]);
}

// =============================================================================
// Leaving the shell
// =============================================================================

#[test]
fn test_exit_keywords_say_good_bye() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    for word in ["bye", "exit", "quit"] {
        let session = run_script(&engine, &format!("{}\nset never 1\n", word));

        assert_eq!(session.exit, ShellExit::Quit);
        assert_eq!(session.lines(), vec![FAREWELL]);
    }

    // Lines after the exit keyword were never read
    assert!(engine.get(b"never").unwrap_err().is_not_found());
}

#[test]
fn test_end_of_input_without_newline() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set a 1\nget a");

    assert_eq!(session.exit, ShellExit::EndOfInput);
    assert_eq!(session.lines(), vec!["1"]);
    assert!(!session.out.contains(FAREWELL));
}

#[test]
fn test_crlf_line_endings() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);

    let session = run_script(&engine, "set a 1\r\nget a\r\nexit\r\n");

    assert_eq!(session.lines(), vec!["1", FAREWELL]);
}

#[test]
fn test_values_persist_across_sessions() {
    let temp = TempDir::new().unwrap();
    {
        let engine = open_engine(&temp);
        run_script(&engine, "set name kv\nset tmp x\ndelete tmp\nexit\n");
        engine.close().unwrap();
    }

    let engine = open_engine(&temp);
    let session = run_script(&engine, "get name\nls\n");

    assert_eq!(session.lines(), vec!["kv", "name"]);
}

#[test]
fn test_execute_single_command() {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);
    let mut out = Vec::new();
    let mut err = Vec::new();

    {
        let mut shell = Shell::new(&engine, Cursor::new(Vec::<u8>::new()), &mut out, &mut err);
        shell
            .execute(Command::Set {
                key: "k".into(),
                value: "v".into(),
            })
            .unwrap();
        shell.execute(Command::Get { key: "k".into() }).unwrap();
    }

    assert_eq!(String::from_utf8(out).unwrap(), "v\n");
}
