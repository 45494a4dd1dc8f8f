//! Delimited file loading for sqbc
//!
//! This module loads comma, tab or custom-delimited files into in-memory
//! [`Table`]s. It provides functionality for:
//!
//! - Parsing file specifications in the format `[table_name=]file_path`
//! - Choosing the field delimiter (explicit `-F` value, else by extension)
//! - Converting records into the internal [`Value`] type
//! - Inferring per-column declared types for the compiler's schema lookup

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SqbcError, SqbcResult};
use crate::table::{Table, Value};

/// Load a delimited file into a table
///
/// The first record is the header row. Cell values are converted with
/// [`Value::from`] and column types are inferred once all rows are read.
///
/// # Arguments
/// * `file_spec` - File specification in the format `[table_name=]file_path`.
///                 If table_name is not specified, the file name without extension is used.
/// * `field_separator` - Optional separator from the command line; `\t` is accepted
///                       as an escaped tab
///
/// # Returns
/// * `Ok(Table)` - The loaded table
/// * `Err` if the file spec or separator is invalid, or the file cannot be read or parsed
pub fn load_table(file_spec: &str, field_separator: Option<&str>) -> SqbcResult<Table> {
    let (table_name, file_path) = parse_file_spec(file_spec)?;
    let delimiter = resolve_delimiter(&file_path, field_separator)?;

    let file = File::open(&file_path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect::<Vec<_>>();

    let mut table = Table::new(&table_name, headers, Some(file_path.clone()));
    for result in reader.records() {
        let record = result?;
        let row = record.iter().map(Value::from).collect();
        table.add_row(row)?;
    }
    table.infer_column_types();

    debug!(
        table = %table_name,
        path = %file_path.display(),
        rows = table.row_count(),
        columns = table.column_count(),
        "loaded table"
    );
    Ok(table)
}

/// Parse a file specification into table name and file path
///
/// Handles two formats:
/// 1. `table_name=file_path` - Explicit table name and file path
/// 2. `file_path` - Table name derived from file name
///
/// # Returns
/// * `Ok((String, PathBuf))` - Tuple of (table_name, file_path)
/// * `Err(InvalidFileSpec)` - If no table name can be determined
pub fn parse_file_spec(file_spec: &str) -> SqbcResult<(String, PathBuf)> {
    if let Some((table_name, file_path)) = file_spec.split_once('=') {
        if table_name.is_empty() || file_path.is_empty() {
            return Err(SqbcError::InvalidFileSpec(format!(
                "Invalid file specification: {}",
                file_spec
            )));
        }
        return Ok((table_name.to_string(), PathBuf::from(file_path)));
    }

    let path = PathBuf::from(file_spec);
    let stem = path.file_stem().ok_or_else(|| {
        SqbcError::InvalidFileSpec(format!("Invalid file specification: {}", file_spec))
    })?;
    Ok((stem.to_string_lossy().to_string(), path))
}

/// Pick the delimiter byte for a file
///
/// An explicit separator must be a single byte (or the two-character
/// escape `\t`). Without one, `.csv` files use commas and everything else
/// uses tabs.
pub fn resolve_delimiter(path: &Path, field_separator: Option<&str>) -> SqbcResult<u8> {
    match field_separator {
        Some("\\t") => Ok(b'\t'),
        Some(sep) if sep.len() == 1 => Ok(sep.as_bytes()[0]),
        Some(sep) => Err(SqbcError::InvalidFileSpec(format!(
            "Invalid delimiter: {}. Must be a single character.",
            sep
        ))),
        None => {
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            Ok(if is_csv { b',' } else { b'\t' })
        }
    }
}
