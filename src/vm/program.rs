//! Program assembly
//!
//! [`ProgramBuilder`] accumulates instructions, constants and register
//! allocations while a statement is being compiled. Forward jumps go through
//! [`Label`]s: a jump to an unresolved label records a fixup, and resolving
//! the label patches every recorded fixup in place. [`ProgramBuilder::build`]
//! freezes the result into an immutable [`Program`] that engines share behind
//! an `Arc`.
//!
//! A program also records, per cursor, the column order its `Column`
//! operands were compiled against. The engine lays rows out in that order
//! when the cursor is opened, whatever order the row source reports.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::error::{SqbcError, SqbcResult};
use crate::vm::bytecode::{Instruction, OpCode};
use crate::vm::value::Scalar;

/// Source of builder identities, so labels cannot cross builders
static NEXT_BUILDER_ID: AtomicUsize = AtomicUsize::new(0);

/// Handle to a not-yet-known instruction address
///
/// Only valid on the builder that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    builder: usize,
    id: usize,
}

impl Label {
    pub fn id(self) -> usize {
        self.id
    }
}

/// Incremental program assembler
///
/// Not shareable between threads while building; `build` consumes it.
#[derive(Debug)]
pub struct ProgramBuilder {
    builder_id: usize,
    instructions: Vec<Instruction>,
    constants: Vec<Scalar>,
    num_registers: i32,
    /// Resolved address per label id, `None` while pending
    labels: Vec<Option<usize>>,
    /// (instruction index, label id) pairs waiting for their label
    fixups: Vec<(usize, usize)>,
    column_names: Vec<String>,
    cursor_columns: Vec<(i32, Vec<String>)>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        ProgramBuilder {
            builder_id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            instructions: Vec::new(),
            constants: Vec::new(),
            num_registers: 0,
            labels: Vec::new(),
            fixups: Vec::new(),
            column_names: Vec::new(),
            cursor_columns: Vec::new(),
        }
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh register. Registers are never reused.
    pub fn alloc_register(&mut self) -> i32 {
        let reg = self.num_registers;
        self.num_registers += 1;
        reg
    }

    /// Append a constant and return its pool index. No de-duplication.
    pub fn add_constant(&mut self, value: Scalar) -> i32 {
        self.constants.push(value);
        (self.constants.len() - 1) as i32
    }

    /// Append an instruction and return its address
    pub fn emit_instruction(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    pub fn emit(&mut self, op: OpCode) -> usize {
        self.emit_instruction(Instruction::new(op))
    }

    pub fn emit_a(&mut self, op: OpCode, a: i32) -> usize {
        self.emit_instruction(Instruction::a(op, a))
    }

    pub fn emit_ab(&mut self, op: OpCode, a: i32, b: i32) -> usize {
        self.emit_instruction(Instruction::ab(op, a, b))
    }

    pub fn emit_abc(&mut self, op: OpCode, a: i32, b: i32, c: i32) -> usize {
        self.emit_instruction(Instruction::abc(op, a, b, c))
    }

    pub fn alloc_label(&mut self) -> Label {
        self.labels.push(None);
        Label {
            builder: self.builder_id,
            id: self.labels.len() - 1,
        }
    }

    /// Index of `label` in this builder's arena
    fn label_slot(&self, label: Label) -> SqbcResult<usize> {
        if label.builder != self.builder_id || label.id() >= self.labels.len() {
            return Err(SqbcError::UnknownLabel(label.id()));
        }
        Ok(label.id())
    }

    /// Emit a jump-style instruction whose C operand targets `label`
    ///
    /// If the label is already bound the target is written immediately,
    /// otherwise a fixup is recorded and patched by [`Self::resolve_label`].
    pub fn emit_jump(&mut self, op: OpCode, a: i32, label: Label) -> SqbcResult<usize> {
        let slot = self.label_slot(label)?;
        let addr = match self.labels[slot] {
            Some(resolved) => self.emit_abc(op, a, 0, resolved as i32),
            None => {
                let addr = self.emit_a(op, a);
                self.fixups.push((addr, slot));
                addr
            }
        };
        Ok(addr)
    }

    /// Bind `label` to the current address and patch pending jumps to it
    pub fn resolve_label(&mut self, label: Label) -> SqbcResult<()> {
        let here = self.instructions.len();
        let slot = self.label_slot(label)?;
        if self.labels[slot].is_some() {
            return Err(SqbcError::LabelAlreadyResolved(slot));
        }
        self.labels[slot] = Some(here);

        let instructions = &mut self.instructions;
        self.fixups.retain(|&(addr, id)| {
            if id != slot {
                return true;
            }
            instructions[addr].c = here as i32;
            false
        });
        trace!(label = slot, address = here, "resolved label");
        Ok(())
    }

    /// Address the next emitted instruction will get
    pub fn current_address(&self) -> usize {
        self.instructions.len()
    }

    pub fn set_column_names(&mut self, names: Vec<String>) {
        self.column_names = names;
    }

    /// Record the column order `Column` reads on `cursor` were compiled for
    pub fn set_cursor_columns(&mut self, cursor: i32, columns: Vec<String>) {
        self.cursor_columns.retain(|(c, _)| *c != cursor);
        self.cursor_columns.push((cursor, columns));
    }

    /// Freeze the program
    ///
    /// # Returns
    /// * `Err(UnresolvedLabel)` if any allocated label was never bound
    /// * `Err(InvalidOperand)` if a jump targets an address past the end
    pub fn build(self) -> SqbcResult<Program> {
        if let Some(id) = self.labels.iter().position(Option::is_none) {
            return Err(SqbcError::UnresolvedLabel(id));
        }
        let len = self.instructions.len();
        for (addr, ins) in self.instructions.iter().enumerate() {
            let is_jump = ins.op().map_or(false, OpCode::is_jump);
            if is_jump && usize::try_from(ins.c).map_or(true, |target| target > len) {
                return Err(SqbcError::InvalidOperand(format!(
                    "jump at {} targets {}, past the end of the program",
                    addr, ins.c
                )));
            }
        }
        Ok(Program {
            instructions: self.instructions,
            constants: self.constants,
            num_registers: self.num_registers.max(0) as usize,
            column_names: self.column_names,
            cursor_columns: self.cursor_columns,
        })
    }
}

/// A compiled, immutable bytecode program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    constants: Vec<Scalar>,
    num_registers: usize,
    column_names: Vec<String>,
    /// Compiled column order per cursor
    cursor_columns: Vec<(i32, Vec<String>)>,
}

impl Program {
    /// Assemble a program directly from parts, bypassing label handling
    pub fn from_parts(
        instructions: Vec<Instruction>,
        constants: Vec<Scalar>,
        num_registers: usize,
        column_names: Vec<String>,
    ) -> Self {
        Program {
            instructions,
            constants,
            num_registers,
            column_names,
            cursor_columns: Vec::new(),
        }
    }

    /// Attach the compiled column order for `cursor`
    pub fn with_cursor_columns(mut self, cursor: i32, columns: Vec<String>) -> Self {
        self.cursor_columns.retain(|(c, _)| *c != cursor);
        self.cursor_columns.push((cursor, columns));
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn constants(&self) -> &[Scalar] {
        &self.constants
    }

    pub fn constant(&self, idx: i32) -> Option<&Scalar> {
        usize::try_from(idx).ok().and_then(|i| self.constants.get(i))
    }

    pub fn num_registers(&self) -> usize {
        self.num_registers
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Column order `Column` operands on `cursor` refer to, if recorded
    pub fn cursor_columns(&self, cursor: i32) -> Option<&[String]> {
        self.cursor_columns
            .iter()
            .find(|(c, _)| *c == cursor)
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Human-readable listing, one instruction per line
///
/// Instructions that reference the constant pool are annotated with the
/// constant they load.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "-- {} instructions, {} constants, {} registers",
            self.instructions.len(),
            self.constants.len(),
            self.num_registers
        )?;
        for (addr, ins) in self.instructions.iter().enumerate() {
            let const_idx = match ins.op() {
                Some(OpCode::LoadConst) | Some(OpCode::OpenCursor) | Some(OpCode::AggInit) => {
                    Some(ins.b)
                }
                Some(OpCode::Call) => Some(ins.a),
                _ => None,
            };
            match const_idx.and_then(|idx| self.constant(idx)) {
                Some(value) => writeln!(f, "{:3}: {}  ; {}", addr, ins, value)?,
                None => writeln!(f, "{:3}: {}", addr, ins)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<Instruction>(), 16);
    }

    #[test]
    fn test_registers_and_constants_are_monotonic() {
        let mut b = ProgramBuilder::new();
        assert_eq!(b.alloc_register(), 0);
        assert_eq!(b.alloc_register(), 1);
        assert_eq!(b.add_constant(Scalar::Integer(1)), 0);
        assert_eq!(b.add_constant(Scalar::Integer(1)), 1);
        let program = b.build().unwrap();
        assert_eq!(program.num_registers(), 2);
        assert_eq!(program.constants().len(), 2);
    }

    #[test]
    fn test_forward_jump_is_patched() {
        let mut b = ProgramBuilder::new();
        let end = b.alloc_label();
        let jump = b.emit_jump(OpCode::Jump, 0, end).unwrap();
        b.emit(OpCode::Noop);
        b.emit(OpCode::Noop);
        b.resolve_label(end).unwrap();
        b.emit(OpCode::Halt);
        let program = b.build().unwrap();
        assert_eq!(program.instructions()[jump].c, 3);
    }

    #[test]
    fn test_backward_jump_uses_resolved_address() {
        let mut b = ProgramBuilder::new();
        b.emit(OpCode::Noop);
        let top = b.alloc_label();
        b.resolve_label(top).unwrap();
        b.emit(OpCode::Noop);
        let jump = b.emit_jump(OpCode::JumpTrue, 4, top).unwrap();
        let program = b.build().unwrap();
        let ins = program.instructions()[jump];
        assert_eq!((ins.a, ins.c), (4, 1));
    }

    #[test]
    fn test_unresolved_label_fails_build() {
        let mut b = ProgramBuilder::new();
        let label = b.alloc_label();
        b.emit_jump(OpCode::Jump, 0, label).unwrap();
        assert!(matches!(b.build(), Err(SqbcError::UnresolvedLabel(0))));
    }

    #[test]
    fn test_double_resolve_is_rejected() {
        let mut b = ProgramBuilder::new();
        let label = b.alloc_label();
        b.resolve_label(label).unwrap();
        assert!(matches!(
            b.resolve_label(label),
            Err(SqbcError::LabelAlreadyResolved(0))
        ));
    }

    #[test]
    fn test_foreign_label_is_rejected() {
        let mut other = ProgramBuilder::new();
        other.alloc_label();
        let foreign = other.alloc_label();

        let mut b = ProgramBuilder::new();
        assert!(matches!(
            b.emit_jump(OpCode::Jump, 0, foreign),
            Err(SqbcError::UnknownLabel(1))
        ));
        assert!(matches!(
            b.resolve_label(foreign),
            Err(SqbcError::UnknownLabel(1))
        ));
    }

    #[test]
    fn test_foreign_label_with_local_id_is_rejected() {
        let mut other = ProgramBuilder::new();
        let foreign = other.alloc_label();

        let mut b = ProgramBuilder::new();
        let own = b.alloc_label();
        assert_eq!(own.id(), foreign.id());
        assert!(matches!(
            b.emit_jump(OpCode::Jump, 0, foreign),
            Err(SqbcError::UnknownLabel(0))
        ));
        assert!(matches!(
            b.resolve_label(foreign),
            Err(SqbcError::UnknownLabel(0))
        ));

        // The builder's own label is untouched and still resolvable
        b.emit_jump(OpCode::Jump, 0, own).unwrap();
        b.resolve_label(own).unwrap();
        assert_eq!(b.build().unwrap().instructions()[0].c, 1);
    }

    #[test]
    fn test_jump_past_end_fails_build() {
        let mut b = ProgramBuilder::new();
        b.emit_abc(OpCode::Jump, 0, 0, 5);
        b.emit(OpCode::Halt);
        assert!(matches!(b.build(), Err(SqbcError::InvalidOperand(_))));

        let mut b = ProgramBuilder::new();
        b.emit_abc(OpCode::JumpFalse, 0, 0, 1);
        assert!(b.build().is_ok());
    }

    #[test]
    fn test_cursor_columns_are_carried_into_program() {
        let mut b = ProgramBuilder::new();
        b.set_cursor_columns(0, vec!["a".to_string()]);
        b.set_cursor_columns(0, vec!["b".to_string(), "c".to_string()]);
        let program = b.build().unwrap();
        assert_eq!(
            program.cursor_columns(0),
            Some(&["b".to_string(), "c".to_string()][..])
        );
        assert_eq!(program.cursor_columns(1), None);
    }

    #[test]
    fn test_listing_annotates_constants() {
        let mut b = ProgramBuilder::new();
        let k = b.add_constant(Scalar::text("hello"));
        let r = b.alloc_register();
        b.emit_abc(OpCode::LoadConst, 0, k, r);
        b.emit_ab(OpCode::ResultRow, r, 1);
        b.emit(OpCode::Halt);
        let listing = b.build().unwrap().to_string();
        assert!(listing.contains("LoadConst"));
        assert!(listing.contains("'hello'"));
        assert!(listing.contains("  2: Halt"));
    }
}
