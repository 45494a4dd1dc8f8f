//! Configuration module for sqbc
//!
//! This module provides a centralized configuration structure for the
//! command-line tool. Settings are built once from the parsed arguments and
//! passed down by reference.

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Whether to show verbose (debug-level) diagnostics
    verbose: bool,

    /// Custom field separator for input files
    field_separator: Option<String>,

    /// Whether to print each compiled program before running it
    explain: bool,
}

impl AppConfig {
    /// Create a new application configuration
    ///
    /// # Arguments
    /// * `verbose` - Whether to show verbose output
    /// * `field_separator` - Optional field separator character/string from command line
    /// * `explain` - Whether to print program listings
    pub fn new(verbose: bool, field_separator: Option<String>, explain: bool) -> Self {
        Self {
            verbose,
            field_separator,
            explain,
        }
    }

    /// Get the verbose flag
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Get the field separator
    pub fn field_separator(&self) -> Option<&str> {
        self.field_separator.as_deref()
    }

    /// Get whether program listings are printed
    pub fn explain(&self) -> bool {
        self.explain
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "sqbc=debug"
        } else {
            "warn"
        }
    }
}
