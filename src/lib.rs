//! sqbc library crate
//!
//! sqbc compiles SQL SELECT statements into register-machine bytecode and
//! executes that bytecode against in-memory tables. The library provides:
//!
//! - A compact value model with SQL NULL semantics ([`vm::Scalar`])
//! - A fixed-width instruction set and a label-patching program builder
//! - A compiler from `sqlparser` ASTs to bytecode programs
//! - A virtual machine with an opcode-indexed handler table, cursors,
//!   aggregate slots and built-in scalar functions
//! - CSV loading into an in-memory [`database::Database`] row source
//!
//! Statements outside the supported shapes (joins, subqueries, grouping,
//! ordering, limits, DISTINCT) are rejected with
//! [`error::SqbcError::UnsupportedSqlFeature`] so callers can route them to
//! another engine.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod csv_handler;
pub mod database;
pub mod error;
pub mod intern;
pub mod table;
pub mod vm;

pub use compiler::BytecodeCompiler;
pub use database::Database;
pub use error::{SqbcError, SqbcResult};
pub use vm::{Program, VmEngine};
