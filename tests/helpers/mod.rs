//! Test helpers for sqbc integration tests
//!
//! This module provides helper functions and structs to simplify
//! writing end-to-end tests for the sqbc binary.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Represents a test case for sqbc
pub struct SqbcTestCase {
    /// The SQL statement to execute
    pub sql: String,
    /// Additional command line arguments, placed before the file spec
    pub args: Vec<String>,
    /// Table name to use (optional)
    pub table_name: Option<String>,
    /// Expected strings in stdout
    pub expected_stdout: Vec<String>,
    /// Strings that must not appear in stdout
    pub unexpected_stdout: Vec<String>,
    /// Expected strings in stderr
    pub expected_stderr: Vec<String>,
    /// Whether the command is expected to succeed
    pub should_succeed: bool,
    /// Whether to use verbose mode
    pub verbose: bool,
}

impl Default for SqbcTestCase {
    fn default() -> Self {
        SqbcTestCase {
            sql: String::new(),
            args: Vec::new(),
            table_name: None,
            expected_stdout: Vec::new(),
            unexpected_stdout: Vec::new(),
            expected_stderr: Vec::new(),
            should_succeed: true,
            verbose: false,
        }
    }
}

/// Run a test against a temporary copy of the standard people.csv file
pub fn run_test_case(test_case: SqbcTestCase) -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = create_temp_dir()?;
    let test_file = prepare_test_file(temp_dir.path())?;
    run_test_case_with_file(test_case, test_file)
}

/// Run a test against an existing file
pub fn run_test_case_with_file(
    test_case: SqbcTestCase,
    test_file: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("sqbc")?;
    cmd.arg("-s").arg(&test_case.sql);

    if test_case.verbose {
        cmd.arg("-v");
    }

    for arg in &test_case.args {
        cmd.arg(arg);
    }

    let file = test_file.to_string_lossy().to_string();
    match test_case.table_name {
        Some(table_name) => cmd.arg(format!("{}={}", table_name, file)),
        None => cmd.arg(file),
    };

    let mut assert = cmd.assert();
    if test_case.should_succeed {
        assert = assert.success();
    } else {
        assert = assert.failure();
    }

    for expected in test_case.expected_stdout {
        assert = assert.stdout(predicate::str::contains(expected));
    }
    for unexpected in test_case.unexpected_stdout {
        assert = assert.stdout(predicate::str::contains(unexpected).not());
    }
    for expected in test_case.expected_stderr {
        assert = assert.stderr(predicate::str::contains(expected));
    }

    Ok(())
}

/// Helper function to create a temp directory for tests, respecting CARGO_TARGET_TMPDIR if set
pub fn create_temp_dir() -> Result<TempDir, Box<dyn std::error::Error>> {
    if let Ok(cargo_target_tmpdir) = env::var("CARGO_TARGET_TMPDIR") {
        fs::create_dir_all(&cargo_target_tmpdir)?;
        Ok(TempDir::new_in(cargo_target_tmpdir)?)
    } else {
        Ok(TempDir::new()?)
    }
}

/// Helper function to create the standard people.csv test file
///
/// Bob's age is empty and loads as NULL.
pub fn prepare_test_file(dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    create_custom_file(
        dir,
        "people.csv",
        "id,name,age\n1,Alice,32\n2,Bob,\n3,Charlie,35\n",
    )
}

/// Helper function to create a test file with custom data
pub fn create_custom_file(
    dir: &Path,
    filename: &str,
    content: &str,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}
