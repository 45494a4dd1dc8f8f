//! The register virtual machine
//!
//! A [`VmEngine`] executes one frozen [`Program`] at a time. Each step fetches
//! the instruction at the program counter, decodes its opcode, looks the
//! handler up in a dense opcode-indexed table and jumps to the address the
//! handler returns. Execution stops when the program counter runs past the
//! last instruction; `Halt` does exactly that.
//!
//! Registers, cursors and aggregate slots are private to the engine and are
//! reset at the start of every [`VmEngine::run`], so one engine can run its
//! program repeatedly. Independent engines can run the same `Arc<Program>`
//! on different threads.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{SqbcError, SqbcResult};
use crate::table::Value;
use crate::vm::aggregate::Accumulator;
use crate::vm::bytecode::{Instruction, OpCode};
use crate::vm::cursor::Cursor;
use crate::vm::handlers::install_handlers;
use crate::vm::program::Program;
use crate::vm::row_source::RowSource;
use crate::vm::value::Scalar;

/// Number of cursor slots per engine
pub const MAX_CURSORS: usize = 256;

/// Number of aggregate slots per engine
pub const MAX_AGG_SLOTS: usize = 256;

/// Smallest register file an engine allocates
pub const MIN_REGISTERS: usize = 16;

/// Largest register file an engine grows to
pub const MAX_REGISTERS: usize = 1 << 16;

/// Opcode handler: executes one instruction and returns the next address
pub type OpHandler = fn(&mut VmEngine<'_>, Instruction) -> SqbcResult<usize>;

static NULL: Scalar = Scalar::Null;

/// Bytecode interpreter bound to one program and an optional row source
pub struct VmEngine<'s> {
    program: Arc<Program>,
    source: Option<&'s dyn RowSource>,
    registers: Vec<Scalar>,
    cursors: Vec<Option<Cursor>>,
    aggregates: Vec<Option<Accumulator>>,
    handlers: [Option<OpHandler>; OpCode::COUNT],
    results: Vec<Vec<Scalar>>,
    pc: usize,
}

impl<'s> VmEngine<'s> {
    /// Create an engine that reads tables from `source`
    pub fn new(program: Arc<Program>, source: &'s dyn RowSource) -> Self {
        Self::build(program, Some(source))
    }

    /// Create an engine for programs that never open a cursor
    pub fn without_source(program: Arc<Program>) -> Self {
        Self::build(program, None)
    }

    fn build(program: Arc<Program>, source: Option<&'s dyn RowSource>) -> Self {
        let mut handlers = [None; OpCode::COUNT];
        install_handlers(&mut handlers);
        VmEngine {
            program,
            source,
            registers: Vec::new(),
            cursors: Vec::new(),
            aggregates: Vec::new(),
            handlers,
            results: Vec::new(),
            pc: 0,
        }
    }

    /// Replace (or with `None`, remove) the handler for one opcode
    pub fn set_handler(&mut self, op: OpCode, handler: Option<OpHandler>) {
        self.handlers[op as usize] = handler;
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    fn reset(&mut self) {
        let size = self.program.num_registers().max(MIN_REGISTERS);
        self.registers.clear();
        self.registers.resize(size, Scalar::Null);
        self.cursors.clear();
        self.cursors.resize_with(MAX_CURSORS, || None);
        self.aggregates.clear();
        self.aggregates.resize_with(MAX_AGG_SLOTS, || None);
        self.results.clear();
        self.pc = 0;
    }

    /// Execute the program from the first instruction
    ///
    /// # Returns
    /// * `Ok(())` once the program counter leaves the program
    /// * `Err` on the first failing instruction; the result rows are cleared,
    ///   so a failed run never exposes a partial result
    pub fn run(&mut self) -> SqbcResult<()> {
        self.reset();
        debug!(
            instructions = self.program.len(),
            registers = self.registers.len(),
            "running program"
        );

        if let Err(err) = self.step_all() {
            debug!(pc = self.pc, error = %err, "program failed");
            self.results.clear();
            return Err(err);
        }

        debug!(rows = self.results.len(), "program finished");
        Ok(())
    }

    fn step_all(&mut self) -> SqbcResult<()> {
        let program = Arc::clone(&self.program);
        let code = program.instructions();
        while self.pc < code.len() {
            let pc = self.pc;
            let ins = code[pc];
            let op = ins.op().ok_or(SqbcError::UnknownOpcode {
                opcode: ins.opcode,
                pc,
            })?;
            let handler = self.handlers[op as usize].ok_or_else(|| SqbcError::MissingHandler {
                opcode: op.name().to_string(),
                pc,
            })?;
            trace!(pc, instruction = %ins, "step");
            self.pc = handler(self, ins)?;
        }
        Ok(())
    }

    /// Result rows converted to the caller-facing [`Value`] type
    pub fn result_rows(&self) -> Vec<Vec<Value>> {
        self.results
            .iter()
            .map(|row| row.iter().map(Value::from).collect())
            .collect()
    }

    /// Result rows as raw scalars
    pub fn result_scalars(&self) -> &[Vec<Scalar>] {
        &self.results
    }

    pub fn column_names(&self) -> &[String] {
        self.program.column_names()
    }

    // Accessors used by the opcode handlers.

    pub(crate) fn pc(&self) -> usize {
        self.pc
    }

    pub(crate) fn source(&self) -> SqbcResult<&'s dyn RowSource> {
        self.source.ok_or(SqbcError::NoRowSource)
    }

    pub(crate) fn constant(&self, idx: i32) -> SqbcResult<&Scalar> {
        self.program
            .constant(idx)
            .ok_or_else(|| SqbcError::InvalidOperand(format!("constant index {} out of range", idx)))
    }

    /// Register contents; registers past the end of the file read as NULL
    pub(crate) fn reg(&self, idx: i32) -> SqbcResult<&Scalar> {
        let idx = register_index(idx)?;
        Ok(self.registers.get(idx).unwrap_or(&NULL))
    }

    /// Store into a register, growing the file up to [`MAX_REGISTERS`]
    pub(crate) fn set_reg(&mut self, idx: i32, value: Scalar) -> SqbcResult<()> {
        let idx = register_index(idx)?;
        if idx >= MAX_REGISTERS {
            return Err(SqbcError::InvalidOperand(format!(
                "register {} out of range 0..{}",
                idx, MAX_REGISTERS
            )));
        }
        if idx >= self.registers.len() {
            self.registers.resize(idx + 1, Scalar::Null);
        }
        self.registers[idx] = value;
        Ok(())
    }

    pub(crate) fn cursor(&self, idx: i32) -> SqbcResult<Option<&Cursor>> {
        let idx = slot_index(idx, MAX_CURSORS, "cursor")?;
        Ok(self.cursors[idx].as_ref())
    }

    pub(crate) fn cursor_mut(&mut self, idx: i32) -> SqbcResult<Option<&mut Cursor>> {
        let idx = slot_index(idx, MAX_CURSORS, "cursor")?;
        Ok(self.cursors[idx].as_mut())
    }

    pub(crate) fn open_cursor(&mut self, idx: i32, cursor: Cursor) -> SqbcResult<()> {
        let idx = slot_index(idx, MAX_CURSORS, "cursor")?;
        self.cursors[idx] = Some(cursor);
        Ok(())
    }

    pub(crate) fn aggregate_mut(&mut self, idx: i32) -> SqbcResult<&mut Option<Accumulator>> {
        let idx = slot_index(idx, MAX_AGG_SLOTS, "aggregate slot")?;
        Ok(&mut self.aggregates[idx])
    }

    pub(crate) fn push_result(&mut self, row: Vec<Scalar>) {
        self.results.push(row);
    }
}

fn register_index(idx: i32) -> SqbcResult<usize> {
    usize::try_from(idx)
        .map_err(|_| SqbcError::InvalidOperand(format!("negative register {}", idx)))
}

fn slot_index(idx: i32, limit: usize, what: &str) -> SqbcResult<usize> {
    match usize::try_from(idx) {
        Ok(i) if i < limit => Ok(i),
        _ => Err(SqbcError::InvalidOperand(format!(
            "{} {} out of range 0..{}",
            what, idx, limit
        ))),
    }
}
