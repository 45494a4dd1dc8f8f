//! The read-only interface between the VM and table storage

use std::collections::HashMap;

use crate::error::SqbcResult;
use crate::table::Value;

/// All rows of one table, materialized for a cursor
#[derive(Debug, Clone, Default)]
pub struct TableRows {
    /// Each row keyed by column name
    pub rows: Vec<HashMap<String, Value>>,
    /// Column names in declared order; `Column` operands index into this
    pub columns: Vec<String>,
}

/// Supplier of table data and schemas
///
/// The VM only calls [`RowSource::table_rows`], once per `OpenCursor`. The
/// compiler only calls [`RowSource::table_schema`], to expand `SELECT *` and
/// resolve column names. Errors from an implementation are passed through
/// to the caller unchanged.
pub trait RowSource {
    fn table_rows(&self, table: &str) -> SqbcResult<TableRows>;

    /// Column name and declared type pairs in declared order, or `None`
    /// when the table is unknown.
    fn table_schema(&self, table: &str) -> Option<Vec<(String, String)>>;
}
