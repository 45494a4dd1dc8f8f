//! Bytecode definitions for the SQL VM
//!
//! This module defines the register-machine instruction set. Every instruction
//! is a fixed 16-byte record: a `u16` opcode followed by three signed 32-bit
//! operands A, B and C. Operands are register indices, constant-pool indices,
//! cursor/slot numbers, counts or jump targets depending on the opcode.
//! Variable-length data never lives inside an instruction; it goes in the
//! program's constant pool and is referenced by index.
//!
//! Operand layout per opcode:
//!
//! | opcode     | A            | B              | C                   |
//! |------------|--------------|----------------|---------------------|
//! | LoadConst  |              | const index    | dst                 |
//! | LoadReg    | src          |                | dst                 |
//! | arithmetic, compare, logic | lhs | rhs     | dst                 |
//! | Neg, Not, IsNull, NotNull | src |          | dst                 |
//! | Jump       |              |                | target              |
//! | JumpTrue/JumpFalse | cond |                | target              |
//! | OpenCursor | cursor       | table const    |                     |
//! | Rewind     | cursor       |                | target when empty   |
//! | Next       | cursor       |                | loop body           |
//! | Column     | cursor       | column index   | dst                 |
//! | Rowid      | cursor       |                | dst                 |
//! | ResultRow  | first reg    | count          |                     |
//! | AggInit    | slot         | name const     |                     |
//! | AggStep    | slot         | value reg      |                     |
//! | AggFinal   | slot         |                | dst                 |
//! | Call       | name const   | arg count      | dst (args before C) |

use std::fmt;

/// Opcodes for VM instructions
///
/// The discriminants are dense and start at zero, so an opcode doubles as an
/// index into the engine's handler table.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Noop = 0,
    LoadConst,
    LoadReg,

    // Arithmetic
    Add,
    AddInt,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Concat,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logic
    And,
    Or,
    Not,
    IsNull,
    NotNull,

    // Control flow
    Jump,
    JumpTrue,
    JumpFalse,

    // Cursors
    OpenCursor,
    Rewind,
    Next,
    Column,
    Rowid,

    // Output
    ResultRow,
    Halt,

    // Aggregates
    AggInit,
    AggStep,
    AggFinal,

    // Functions
    Call,
}

impl OpCode {
    /// Number of defined opcodes
    pub const COUNT: usize = 36;

    /// Every opcode, in discriminant order
    pub const ALL: [OpCode; OpCode::COUNT] = [
        OpCode::Noop,
        OpCode::LoadConst,
        OpCode::LoadReg,
        OpCode::Add,
        OpCode::AddInt,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Neg,
        OpCode::Concat,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::And,
        OpCode::Or,
        OpCode::Not,
        OpCode::IsNull,
        OpCode::NotNull,
        OpCode::Jump,
        OpCode::JumpTrue,
        OpCode::JumpFalse,
        OpCode::OpenCursor,
        OpCode::Rewind,
        OpCode::Next,
        OpCode::Column,
        OpCode::Rowid,
        OpCode::ResultRow,
        OpCode::Halt,
        OpCode::AggInit,
        OpCode::AggStep,
        OpCode::AggFinal,
        OpCode::Call,
    ];

    /// Decode a raw opcode, or `None` when it is out of range
    pub fn from_u16(raw: u16) -> Option<OpCode> {
        OpCode::ALL.get(usize::from(raw)).copied()
    }

    /// Mnemonic used in program listings
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Noop => "Noop",
            OpCode::LoadConst => "LoadConst",
            OpCode::LoadReg => "LoadReg",
            OpCode::Add => "Add",
            OpCode::AddInt => "AddInt",
            OpCode::Sub => "Sub",
            OpCode::Mul => "Mul",
            OpCode::Div => "Div",
            OpCode::Mod => "Mod",
            OpCode::Neg => "Neg",
            OpCode::Concat => "Concat",
            OpCode::Eq => "Eq",
            OpCode::Ne => "Ne",
            OpCode::Lt => "Lt",
            OpCode::Le => "Le",
            OpCode::Gt => "Gt",
            OpCode::Ge => "Ge",
            OpCode::And => "And",
            OpCode::Or => "Or",
            OpCode::Not => "Not",
            OpCode::IsNull => "IsNull",
            OpCode::NotNull => "NotNull",
            OpCode::Jump => "Jump",
            OpCode::JumpTrue => "JumpTrue",
            OpCode::JumpFalse => "JumpFalse",
            OpCode::OpenCursor => "OpenCursor",
            OpCode::Rewind => "Rewind",
            OpCode::Next => "Next",
            OpCode::Column => "Column",
            OpCode::Rowid => "Rowid",
            OpCode::ResultRow => "ResultRow",
            OpCode::Halt => "Halt",
            OpCode::AggInit => "AggInit",
            OpCode::AggStep => "AggStep",
            OpCode::AggFinal => "AggFinal",
            OpCode::Call => "Call",
        }
    }

    /// Whether operand C of this opcode is a jump target
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpTrue | OpCode::JumpFalse | OpCode::Rewind | OpCode::Next
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single VM instruction
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Raw opcode; decoded with [`OpCode::from_u16`] at dispatch time
    pub opcode: u16,
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self {
        Self::abc(op, 0, 0, 0)
    }

    pub fn a(op: OpCode, a: i32) -> Self {
        Self::abc(op, a, 0, 0)
    }

    pub fn ab(op: OpCode, a: i32, b: i32) -> Self {
        Self::abc(op, a, b, 0)
    }

    pub fn abc(op: OpCode, a: i32, b: i32, c: i32) -> Self {
        Instruction {
            opcode: op as u16,
            a,
            b,
            c,
        }
    }

    /// Decoded opcode, if it is in range
    pub fn op(&self) -> Option<OpCode> {
        OpCode::from_u16(self.opcode)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op() {
            Some(op) => write!(f, "{:<10} {:>4} {:>4} {:>4}", op.name(), self.a, self.b, self.c),
            None => write!(
                f,
                "?{:<9} {:>4} {:>4} {:>4}",
                self.opcode, self.a, self.b, self.c
            ),
        }
    }
}
