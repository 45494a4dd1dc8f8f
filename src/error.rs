//! Error handling for sqbc
//!
//! This module defines the error type shared by the compiler, the virtual
//! machine and the surrounding file-loading code. Errors fall into four groups:
//!
//! - Unsupported constructs, which a caller can treat as "use another path"
//! - Malformed expressions the compiler cannot lower at all
//! - Runtime program errors raised while building or executing bytecode
//! - Row source errors (missing tables, I/O, CSV) propagated unchanged
//!
//! The module uses thiserror to keep the variants declarative.

use thiserror::Error;

/// SqbcError represents all possible errors that can occur in sqbc
#[derive(Error, Debug)]
pub enum SqbcError {
    /// Error during file system operations (reading files)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while parsing delimited file data
    #[error("File parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error during SQL query parsing with sqlparser
    #[error("SQL parsing error: {0}")]
    SqlParseError(#[from] sqlparser::parser::ParserError),

    /// Error when a referenced table doesn't exist
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// Error when adding a table whose name is taken
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Error when a referenced column doesn't exist in a table
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// Error for invalid [table=]file specifications
    #[error("Invalid file specification: {0}")]
    InvalidFileSpec(String),

    /// A statement shape the bytecode path does not handle.
    ///
    /// Callers that keep another evaluation path around can match on this
    /// (see [`SqbcError::is_unsupported`]) and retry there.
    #[error("Unsupported SQL feature: {0}")]
    UnsupportedSqlFeature(String),

    /// An expression node the compiler has no lowering for
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// Error for semantically invalid SQL queries
    #[error("Invalid SQL query: {0}")]
    InvalidSqlQuery(String),

    /// A label was allocated but never bound to an address
    #[error("Label {0} was never resolved")]
    UnresolvedLabel(usize),

    /// A label was bound twice
    #[error("Label {0} is already resolved")]
    LabelAlreadyResolved(usize),

    /// A label that this builder never allocated
    #[error("Unknown label {0}")]
    UnknownLabel(usize),

    /// The instruction at `pc` carries an opcode outside the defined range
    #[error("Unknown opcode {opcode} at address {pc}")]
    UnknownOpcode { opcode: u16, pc: usize },

    /// The handler table has no entry for the opcode at `pc`
    #[error("No handler installed for opcode {opcode} at address {pc}")]
    MissingHandler { opcode: String, pc: usize },

    /// An operand is out of range for the instruction using it
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// AggStep on a slot that was never initialised
    #[error("Aggregate slot {0} is not initialized")]
    AggregateNotInitialized(usize),

    /// AggInit with a function name that is not an aggregate
    #[error("Unknown aggregate function '{0}'")]
    UnknownAggregate(String),

    /// OpenCursor executed by an engine that has no row source attached
    #[error("No row source attached to the virtual machine")]
    NoRowSource,
}

impl SqbcError {
    /// Whether this error only means "the bytecode path cannot handle this".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SqbcError::UnsupportedSqlFeature(_))
    }
}

/// Result type alias for operations that can produce a SqbcError
pub type SqbcResult<T> = std::result::Result<T, SqbcError>;
