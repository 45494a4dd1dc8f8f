//! SQL to bytecode compiler
//!
//! [`BytecodeCompiler`] lowers parsed `sqlparser` statements into frozen
//! [`Program`]s for the virtual machine. It handles:
//!
//! - SELECT without FROM (constant projections)
//! - SELECT over a single table with an optional WHERE filter
//! - `SELECT *` and `table.*` expansion from known table schemas
//!
//! Joins, subqueries, grouping, ordering, limits, DISTINCT, HAVING and
//! aggregate projections are rejected with an unsupported-feature error.
//! INSERT, UPDATE and DELETE are recognised but not compiled yet.

pub mod expr;
mod select;


use std::collections::HashMap;

use sqlparser::ast::{Query, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::error::{SqbcError, SqbcResult};
use crate::vm::program::Program;
use crate::vm::row_source::RowSource;

/// Compiles statements against a set of known table schemas
///
/// Schemas come from tables registered with
/// [`BytecodeCompiler::register_table`] first, then from the optional
/// schema source.
#[derive(Default)]
pub struct BytecodeCompiler<'a> {
    /// Explicitly registered tables: name to ordered (column, type) pairs
    tables: HashMap<String, Vec<(String, String)>>,
    source: Option<&'a dyn RowSource>,
}

impl<'a> BytecodeCompiler<'a> {
    pub fn new() -> Self {
        BytecodeCompiler {
            tables: HashMap::new(),
            source: None,
        }
    }

    /// Create a compiler that looks table schemas up in `source`
    pub fn with_schema(source: &'a dyn RowSource) -> Self {
        BytecodeCompiler {
            tables: HashMap::new(),
            source: Some(source),
        }
    }

    /// Declare a table's columns (name, declared type) in order
    pub fn register_table(&mut self, name: &str, columns: Vec<(String, String)>) {
        self.tables.insert(name.to_string(), columns);
    }

    /// Ordered schema of `table`
    ///
    /// # Returns
    /// * `Err(TableNotFound)` if neither the registered tables nor the schema
    ///   source know the table
    pub fn table_schema(&self, table: &str) -> SqbcResult<Vec<(String, String)>> {
        if let Some(columns) = self.tables.get(table) {
            return Ok(columns.clone());
        }
        if let Some((_, columns)) = self
            .tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
        {
            return Ok(columns.clone());
        }
        self.source
            .and_then(|source| source.table_schema(table))
            .ok_or_else(|| SqbcError::TableNotFound(table.to_string()))
    }

    /// Parse `sql` with the generic dialect and compile every statement in it
    pub fn compile_sql(&self, sql: &str) -> SqbcResult<Vec<Program>> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql)?;
        if statements.is_empty() {
            return Err(SqbcError::InvalidSqlQuery("no SQL statement found".to_string()));
        }
        statements
            .iter()
            .map(|statement| self.compile_statement(statement))
            .collect()
    }

    /// Compile any parsed statement
    pub fn compile_statement(&self, statement: &Statement) -> SqbcResult<Program> {
        match statement {
            Statement::Query(query) => self.compile_select(query),
            Statement::Insert { .. } => self.compile_insert(statement),
            Statement::Update { .. } => self.compile_update(statement),
            Statement::Delete { .. } => self.compile_delete(statement),
            _ => Err(SqbcError::UnsupportedSqlFeature(
                "only SELECT statements are compiled to bytecode".to_string(),
            )),
        }
    }

    /// Compile a SELECT query
    ///
    /// # Returns
    /// * `Ok(Program)` for a constant SELECT or a single-table scan
    /// * `Err(UnsupportedSqlFeature)` for any construct outside those shapes
    /// * `Err(TableNotFound)` / `Err(ColumnNotFound)` for unknown names
    pub fn compile_select(&self, query: &Query) -> SqbcResult<Program> {
        let select = select::supported_select(query)?;
        if select.from.is_empty() {
            debug!("compiling SELECT without FROM");
            return select::compile_constant_select(select);
        }

        let (table, alias) = select::single_table(select)?;
        let schema = self.table_schema(&table)?;
        debug!(table = %table, columns = schema.len(), "compiling single-table SELECT");
        select::compile_table_select(select, &table, alias.as_deref(), &schema)
    }

    pub fn compile_insert(&self, _statement: &Statement) -> SqbcResult<Program> {
        Err(SqbcError::UnsupportedSqlFeature(
            "INSERT not yet supported in this bytecode path".to_string(),
        ))
    }

    pub fn compile_update(&self, _statement: &Statement) -> SqbcResult<Program> {
        Err(SqbcError::UnsupportedSqlFeature(
            "UPDATE not yet supported in this bytecode path".to_string(),
        ))
    }

    pub fn compile_delete(&self, _statement: &Statement) -> SqbcResult<Program> {
        Err(SqbcError::UnsupportedSqlFeature(
            "DELETE not yet supported in this bytecode path".to_string(),
        ))
    }
}
