//! Table module for sqbc
//!
//! This module provides the in-memory table representation that backs the
//! virtual machine's row source. It handles:
//!
//! - Dynamic type inference for cells loaded from delimiter-separated files
//! - Declared or inferred column types used for `SELECT *` expansion
//! - Row storage with a case-insensitive column map
//! - Conversion of rows into the name-keyed form cursors consume

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::error::{SqbcError, SqbcResult};

/// Represents a value in a table cell
///
/// This is the row representation shared with callers. The virtual machine
/// converts to its own compact scalar type when a value enters a register and
/// back again when a result row is emitted.
#[derive(Debug, Clone)]
pub enum Value {
    /// Represents a NULL or missing value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Implementation of equality comparison for Value
///
/// Integers and floats compare numerically; other mixed combinations are
/// never equal.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) => *a as f64 == *b,
            (Value::Float(a), Value::Integer(b)) => *a == *b as f64,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(float) => write!(f, "{}", float),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Blob(bytes) => write!(f, "X'{}'", hex::encode_upper(bytes)),
        }
    }
}

/// Implementation of string conversion to Value with automatic type inference
///
/// The string is tried, in order, as an integer, a float and a boolean word
/// (`true`/`yes`, `false`/`no`). Empty strings become NULL and anything else
/// is kept as a string.
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }

        if let Ok(fl) = s.parse::<f64>() {
            return Value::Float(fl);
        }

        match s.to_lowercase().as_str() {
            "true" | "yes" => return Value::Boolean(true),
            "false" | "no" => return Value::Boolean(false),
            "" => return Value::Null,
            _ => {}
        }

        Value::String(s.to_string())
    }
}

/// Represents a row in a table
pub type Row = Vec<Value>;

/// Represents an in-memory table
#[derive(Debug, Clone)]
pub struct Table {
    /// Name of the table
    name: String,

    /// Column names in declared order
    columns: Vec<String>,

    /// Declared type of each column, parallel to `columns`
    column_types: Vec<String>,

    /// Lowercased column names to their indices
    column_map: HashMap<String, usize>,

    /// Rows of data
    rows: Vec<Row>,

    /// Source file path, if loaded from a file
    source_file: Option<PathBuf>,
}

impl Table {
    /// Create a new table with the given name and columns
    ///
    /// Every column starts out typed as `TEXT`; call
    /// [`Table::set_column_types`] or [`Table::infer_column_types`] to refine.
    pub fn new(name: &str, columns: Vec<String>, source_file: Option<PathBuf>) -> Self {
        let column_map = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();
        let column_types = vec!["TEXT".to_string(); columns.len()];

        Table {
            name: name.to_string(),
            columns,
            column_types,
            column_map,
            rows: Vec::new(),
            source_file,
        }
    }

    /// Get the columns of the table
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the declared column types, parallel to [`Table::columns`]
    pub fn column_types(&self) -> &[String] {
        &self.column_types
    }

    /// Get the column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the rows of the table
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get the name of the table
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the row count
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the source file path, if the table was loaded from one
    pub fn source_file(&self) -> Option<&PathBuf> {
        self.source_file.as_ref()
    }

    /// Add a row to the table
    ///
    /// # Arguments
    /// * `row` - Vector of values to add as a new row
    ///
    /// # Returns
    /// * `Ok(())` if the row was successfully added
    /// * `Err` if the row doesn't match the table's column count
    pub fn add_row(&mut self, row: Row) -> SqbcResult<()> {
        if row.len() != self.columns.len() {
            return Err(SqbcError::InvalidSqlQuery(format!(
                "Row has {} columns, but table '{}' has {} columns",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }

        self.rows.push(row);
        Ok(())
    }

    /// Replace the declared column types
    ///
    /// # Returns
    /// * `Err` if the number of types doesn't match the number of columns
    pub fn set_column_types(&mut self, types: Vec<String>) -> SqbcResult<()> {
        if types.len() != self.columns.len() {
            return Err(SqbcError::InvalidSqlQuery(format!(
                "Table '{}' has {} columns but {} types were given",
                self.name,
                self.columns.len(),
                types.len()
            )));
        }
        self.column_types = types;
        Ok(())
    }

    /// Derive each column's type from the values currently stored in it
    ///
    /// NULL cells are ignored. A column holding only integers is `INTEGER`,
    /// integers mixed with floats give `REAL`, only booleans give `BOOLEAN`,
    /// only blobs give `BLOB`, and everything else (including an all-NULL
    /// column) is `TEXT`.
    pub fn infer_column_types(&mut self) {
        let types = (0..self.columns.len())
            .map(|idx| {
                let mut seen_int = false;
                let mut seen_float = false;
                let mut seen_bool = false;
                let mut seen_blob = false;
                let mut seen_text = false;
                for row in &self.rows {
                    match &row[idx] {
                        Value::Null => {}
                        Value::Integer(_) => seen_int = true,
                        Value::Float(_) => seen_float = true,
                        Value::Boolean(_) => seen_bool = true,
                        Value::Blob(_) => seen_blob = true,
                        Value::String(_) => seen_text = true,
                    }
                }
                let kind = match (seen_int, seen_float, seen_bool, seen_blob, seen_text) {
                    (true, false, false, false, false) => "INTEGER",
                    (_, true, false, false, false) => "REAL",
                    (false, false, true, false, false) => "BOOLEAN",
                    (false, false, false, true, false) => "BLOB",
                    _ => "TEXT",
                };
                kind.to_string()
            })
            .collect();
        self.column_types = types;
    }

    /// Get the index of a column by name, ignoring ASCII case
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map.get(&name.to_lowercase()).copied()
    }

    /// Column names paired with their declared types, in declared order
    pub fn schema(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .cloned()
            .zip(self.column_types.iter().cloned())
            .collect()
    }

    /// Rows keyed by column name, the shape cursors iterate over
    pub fn row_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Print the table to stdout
    ///
    /// Formats and prints the table contents to standard output in
    /// comma-delimited format, header first.
    pub fn print_to_stdout(&self) -> Result<()> {
        println!("{}", self.columns.join(","));

        for row in &self.rows {
            let line = row
                .iter()
                .map(|val| val.to_string())
                .collect::<Vec<_>>()
                .join(",");
            println!("{}", line);
        }

        Ok(())
    }
}
