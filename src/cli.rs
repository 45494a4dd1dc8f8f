//! CLI argument parsing module for sqbc
//!
//! This module defines the command-line interface using clap's derive API.
//! Users load one or more delimited files as tables and supply SQL
//! statements, each of which is compiled to bytecode and executed.

use anyhow::Result;
use clap::Parser;

/// Command-line arguments for sqbc
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Compile SQL to bytecode and run it over delimiter-separated files"
)]
pub struct SqbcArgs {
    /// SQL statements to execute
    ///
    /// Multiple statements can be given; they run in order and each prints
    /// its own result set.
    /// Example: -s "SELECT name FROM people WHERE age > 30"
    #[clap(short, long, required = true, help = "SQL statement to execute")]
    pub sql: Vec<String>,

    /// Input files to load - format: [table_name=]file_path
    ///
    /// Without an explicit table name, the file name without extension is
    /// used. Example: users=data/people.csv or just data/products.csv
    #[clap(help = "Input files to load as [table_name=]file_path")]
    pub files: Vec<String>,

    /// Specify field separator character
    ///
    /// Similar to awk's -F option. Defaults to commas for .csv files and
    /// tabs for other file types. Examples: -F: or -F'\t'
    #[clap(short = 'F', help = "Field separator character")]
    pub field_separator: Option<String>,

    /// Enable verbose diagnostic output on stderr
    #[clap(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Print the bytecode listing of each statement before running it
    #[clap(long, help = "Print the compiled bytecode program")]
    pub explain: bool,
}

/// Parse command-line arguments into the SqbcArgs structure
pub fn parse_args() -> Result<SqbcArgs> {
    Ok(SqbcArgs::parse())
}
