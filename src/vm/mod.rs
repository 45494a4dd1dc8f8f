//! SQL Virtual Machine (VM) bytecode execution engine
//!
//! This module implements a register-based bytecode engine in the style of
//! SQLite's VDBE. Statements are executed in two phases:
//! 1. The compiler lowers SQL into a [`Program`] using a [`ProgramBuilder`]
//! 2. A [`VmEngine`] executes the program against a [`RowSource`]
//!
//! For more information on this approach, see: https://www.sqlite.org/opcode.html

pub mod aggregate;
pub mod bytecode;
pub mod cursor;
pub mod engine;
pub mod functions;
mod handlers;
pub mod program;
pub mod row_source;
pub mod value;


pub use bytecode::{Instruction, OpCode};
pub use engine::{OpHandler, VmEngine};
pub use program::{Label, Program, ProgramBuilder};
pub use row_source::{RowSource, TableRows};
pub use value::{Scalar, ScalarTag};
