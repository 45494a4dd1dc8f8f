//! Database module for sqbc
//!
//! This module provides the in-memory database that owns all loaded tables.
//! It is the row source the virtual machine reads through cursors and the
//! schema source the compiler consults for `SELECT *` expansion.

use std::collections::HashMap;

use crate::error::{SqbcError, SqbcResult};
use crate::table::Table;
use crate::vm::{RowSource, TableRows};

/// Central Database class that owns all tables in the system
#[derive(Debug)]
pub struct Database {
    /// Collection of tables by name
    tables: HashMap<String, Table>,
}

impl Database {
    /// Create a new empty database
    pub fn new() -> Self {
        Database {
            tables: HashMap::new(),
        }
    }

    /// Add a table to the database
    ///
    /// # Arguments
    /// * `name` - Name of the table
    /// * `table` - Table to add
    ///
    /// # Returns
    /// * `Ok(())` if the table was successfully added
    /// * `Err` if a table with that name already exists
    pub fn add_table(&mut self, name: String, table: Table) -> SqbcResult<()> {
        if self.tables.contains_key(&name) {
            return Err(SqbcError::TableAlreadyExists(name));
        }
        self.tables.insert(name, table);
        Ok(())
    }

    /// Get a reference to a table
    ///
    /// An exact name match wins; otherwise the lookup falls back to a
    /// case-insensitive scan so that `SELECT * FROM Nums` finds `nums`.
    ///
    /// # Returns
    /// * `Ok(&Table)` if the table exists
    /// * `Err` if the table doesn't exist
    pub fn get_table(&self, name: &str) -> SqbcResult<&Table> {
        if let Some(table) = self.tables.get(name) {
            return Ok(table);
        }
        self.tables
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, table)| table)
            .ok_or_else(|| SqbcError::TableNotFound(name.to_string()))
    }

    /// Check if a table exists
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_ok()
    }

    /// Get names of all tables in the database, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get number of tables in the database
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl RowSource for Database {
    fn table_rows(&self, table: &str) -> SqbcResult<TableRows> {
        let table = self.get_table(table)?;
        Ok(TableRows {
            rows: table.row_maps(),
            columns: table.columns().to_vec(),
        })
    }

    fn table_schema(&self, table: &str) -> Option<Vec<(String, String)>> {
        self.get_table(table).ok().map(Table::schema)
    }
}
