//! sqbc - compile SQL to register bytecode and run it over delimited files
//!
//! This tool loads CSV and delimiter-separated files into memory as tables,
//! compiles each SQL statement into a bytecode program and executes the
//! program on the virtual machine.
//!
//! # Program Flow
//!
//! 1. Parse command-line arguments
//! 2. Load specified files into in-memory tables
//! 3. Compile each SQL statement against the loaded schemas
//! 4. Optionally print the program listing (`--explain`)
//! 5. Run the program and print its result rows to stdout

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sqbc::cli;
use sqbc::config::AppConfig;
use sqbc::csv_handler;
use sqbc::table::Table;
use sqbc::{BytecodeCompiler, Database, Program, VmEngine};

/// Main entry point for the sqbc utility
///
/// # Returns
/// * `Ok(())` if every statement compiled and ran
/// * `Err` with context naming the file or statement that failed
fn main() -> Result<()> {
    let args = cli::parse_args()?;
    let config = AppConfig::new(args.verbose, args.field_separator.clone(), args.explain);
    init_logging(&config);
    debug!(?args, "parsed arguments");

    let mut database = Database::new();
    for file_spec in &args.files {
        let table = csv_handler::load_table(file_spec, config.field_separator())
            .with_context(|| format!("Failed to load file: {file_spec}"))?;
        database
            .add_table(table.name().to_string(), table)
            .with_context(|| format!("Failed to register file: {file_spec}"))?;
    }
    info!(tables = database.table_count(), "loaded input files");

    let compiler = BytecodeCompiler::with_schema(&database);
    for sql in &args.sql {
        let programs = compiler
            .compile_sql(sql)
            .with_context(|| format!("Failed to compile SQL: {sql}"))?;
        for program in programs {
            run_program(program, &database, &config)
                .with_context(|| format!("Failed to execute SQL: {sql}"))?;
        }
    }

    Ok(())
}

/// Route `tracing` output to stderr
///
/// `RUST_LOG` wins when set; otherwise the level follows the `-v` flag.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Execute one compiled program and print its results
fn run_program(program: Program, database: &Database, config: &AppConfig) -> Result<()> {
    if config.explain() {
        print!("{program}");
    }

    let program = Arc::new(program);
    let mut engine = VmEngine::new(Arc::clone(&program), database);
    engine.run()?;

    let mut result = Table::new("result", program.column_names().to_vec(), None);
    for row in engine.result_rows() {
        result.add_row(row)?;
    }
    result.print_to_stdout()
}
