//! Opcode handlers
//!
//! One free function per opcode, all with the [`OpHandler`] signature.
//! [`install_handlers`] fills the engine's dispatch table.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{SqbcError, SqbcResult};
use crate::vm::aggregate::{Accumulator, AggregateFunction};
use crate::vm::bytecode::{Instruction, OpCode};
use crate::vm::cursor::Cursor;
use crate::vm::engine::{OpHandler, VmEngine};
use crate::vm::functions::ScalarFunction;
use crate::vm::value::Scalar;

/// Populate `table` with the built-in handler for every opcode
pub(crate) fn install_handlers(table: &mut [Option<OpHandler>; OpCode::COUNT]) {
    for op in OpCode::ALL {
        let handler: OpHandler = match op {
            OpCode::Noop => op_noop,
            OpCode::LoadConst => op_load_const,
            OpCode::LoadReg => op_load_reg,
            OpCode::Add => |e, i| binary(e, i, Scalar::add),
            OpCode::AddInt => op_add_int,
            OpCode::Sub => |e, i| binary(e, i, Scalar::sub),
            OpCode::Mul => |e, i| binary(e, i, Scalar::mul),
            OpCode::Div => |e, i| binary(e, i, Scalar::div),
            OpCode::Mod => |e, i| binary(e, i, Scalar::rem),
            OpCode::Concat => |e, i| binary(e, i, Scalar::concat),
            OpCode::Neg => op_neg,
            OpCode::Eq => |e, i| compare(e, i, |o| o == Ordering::Equal),
            OpCode::Ne => |e, i| compare(e, i, |o| o != Ordering::Equal),
            OpCode::Lt => |e, i| compare(e, i, |o| o == Ordering::Less),
            OpCode::Le => |e, i| compare(e, i, |o| o != Ordering::Greater),
            OpCode::Gt => |e, i| compare(e, i, |o| o == Ordering::Greater),
            OpCode::Ge => |e, i| compare(e, i, |o| o != Ordering::Less),
            OpCode::And => op_and,
            OpCode::Or => op_or,
            OpCode::Not => op_not,
            OpCode::IsNull => |e, i| null_test(e, i, true),
            OpCode::NotNull => |e, i| null_test(e, i, false),
            OpCode::Jump => op_jump,
            OpCode::JumpTrue => |e, i| conditional_jump(e, i, true),
            OpCode::JumpFalse => |e, i| conditional_jump(e, i, false),
            OpCode::OpenCursor => op_open_cursor,
            OpCode::Rewind => op_rewind,
            OpCode::Next => op_next,
            OpCode::Column => op_column,
            OpCode::Rowid => op_rowid,
            OpCode::ResultRow => op_result_row,
            OpCode::Halt => op_halt,
            OpCode::AggInit => op_agg_init,
            OpCode::AggStep => op_agg_step,
            OpCode::AggFinal => op_agg_final,
            OpCode::Call => op_call,
        };
        table[op as usize] = Some(handler);
    }
}

fn jump_target(c: i32) -> SqbcResult<usize> {
    usize::try_from(c).map_err(|_| SqbcError::InvalidOperand(format!("jump target {}", c)))
}

fn op_noop(e: &mut VmEngine<'_>, _: Instruction) -> SqbcResult<usize> {
    Ok(e.pc() + 1)
}

fn op_load_const(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e.constant(ins.b)?.clone();
    e.set_reg(ins.c, value)?;
    Ok(e.pc() + 1)
}

fn op_load_reg(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e.reg(ins.a)?.clone();
    e.set_reg(ins.c, value)?;
    Ok(e.pc() + 1)
}

fn binary(
    e: &mut VmEngine<'_>,
    ins: Instruction,
    f: fn(&Scalar, &Scalar) -> Scalar,
) -> SqbcResult<usize> {
    let result = f(e.reg(ins.a)?, e.reg(ins.b)?);
    e.set_reg(ins.c, result)?;
    Ok(e.pc() + 1)
}

/// Integer fast path of Add; anything but two in-range integers takes the
/// general route.
fn op_add_int(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let (lhs, rhs) = (e.reg(ins.a)?, e.reg(ins.b)?);
    let result = match (lhs, rhs) {
        (Scalar::Integer(x), Scalar::Integer(y)) => match x.checked_add(*y) {
            Some(sum) => Scalar::Integer(sum),
            None => lhs.add(rhs),
        },
        _ => lhs.add(rhs),
    };
    e.set_reg(ins.c, result)?;
    Ok(e.pc() + 1)
}

fn op_neg(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let result = e.reg(ins.a)?.neg();
    e.set_reg(ins.c, result)?;
    Ok(e.pc() + 1)
}

/// Comparisons produce a boolean, or NULL when either side is NULL
fn compare(
    e: &mut VmEngine<'_>,
    ins: Instruction,
    test: fn(Ordering) -> bool,
) -> SqbcResult<usize> {
    let (lhs, rhs) = (e.reg(ins.a)?, e.reg(ins.b)?);
    let result = if lhs.is_null() || rhs.is_null() {
        Scalar::Null
    } else {
        Scalar::Boolean(test(lhs.compare(rhs)))
    };
    e.set_reg(ins.c, result)?;
    Ok(e.pc() + 1)
}

/// Three-valued truth: `None` is unknown
fn truth(v: &Scalar) -> Option<bool> {
    if v.is_null() {
        None
    } else {
        Some(v.is_truthy())
    }
}

fn from_truth(t: Option<bool>) -> Scalar {
    t.map_or(Scalar::Null, Scalar::Boolean)
}

fn op_and(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let result = match (truth(e.reg(ins.a)?), truth(e.reg(ins.b)?)) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    };
    e.set_reg(ins.c, from_truth(result))?;
    Ok(e.pc() + 1)
}

fn op_or(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let result = match (truth(e.reg(ins.a)?), truth(e.reg(ins.b)?)) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    };
    e.set_reg(ins.c, from_truth(result))?;
    Ok(e.pc() + 1)
}

fn op_not(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let result = truth(e.reg(ins.a)?).map(|t| !t);
    e.set_reg(ins.c, from_truth(result))?;
    Ok(e.pc() + 1)
}

fn null_test(e: &mut VmEngine<'_>, ins: Instruction, want_null: bool) -> SqbcResult<usize> {
    let result = e.reg(ins.a)?.is_null() == want_null;
    e.set_reg(ins.c, Scalar::Boolean(result))?;
    Ok(e.pc() + 1)
}

fn op_jump(_: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    jump_target(ins.c)
}

fn conditional_jump(e: &mut VmEngine<'_>, ins: Instruction, when: bool) -> SqbcResult<usize> {
    if e.reg(ins.a)?.is_truthy() == when {
        jump_target(ins.c)
    } else {
        Ok(e.pc() + 1)
    }
}

/// Open cursor A on table consts[B]
///
/// When the program recorded the column order its `Column` reads were
/// compiled against, the cursor uses that order instead of the source's.
fn op_open_cursor(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let source = e.source()?;
    let table = e.constant(ins.b)?.to_text();
    let mut rows = source.table_rows(&table)?;
    if let Some(compiled) = e.program().cursor_columns(ins.a) {
        rows.columns = align_columns(compiled, &rows.columns)?;
    }
    debug!(cursor = ins.a, table = %table, rows = rows.rows.len(), "opened cursor");
    e.open_cursor(ins.a, Cursor::new(rows))?;
    Ok(e.pc() + 1)
}

/// Map each compiled column name onto the row key the source uses for it
///
/// Exact matches win over case-insensitive ones. A compiled column the
/// source does not have is an error.
fn align_columns(compiled: &[String], source: &[String]) -> SqbcResult<Vec<String>> {
    compiled
        .iter()
        .map(|name| {
            source
                .iter()
                .find(|col| *col == name)
                .or_else(|| source.iter().find(|col| col.eq_ignore_ascii_case(name)))
                .cloned()
                .ok_or_else(|| SqbcError::ColumnNotFound(name.clone()))
        })
        .collect()
}

/// Position on the first row, or jump to C when there is none
fn op_rewind(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let has_row = match e.cursor_mut(ins.a)? {
        Some(cursor) => cursor.rewind(),
        None => false,
    };
    if has_row {
        Ok(e.pc() + 1)
    } else {
        jump_target(ins.c)
    }
}

/// Advance; jump back to the loop body at C while rows remain
fn op_next(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let has_row = match e.cursor_mut(ins.a)? {
        Some(cursor) => cursor.advance(),
        None => false,
    };
    if has_row {
        jump_target(ins.c)
    } else {
        Ok(e.pc() + 1)
    }
}

fn op_column(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e
        .cursor(ins.a)?
        .map_or(Scalar::Null, |cursor| cursor.column(ins.b));
    e.set_reg(ins.c, value)?;
    Ok(e.pc() + 1)
}

fn op_rowid(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e.cursor(ins.a)?.map_or(Scalar::Null, Cursor::rowid);
    e.set_reg(ins.c, value)?;
    Ok(e.pc() + 1)
}

fn op_result_row(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let end = match ins.a.checked_add(ins.b) {
        Some(end) if ins.a >= 0 && ins.b >= 0 => end,
        _ => {
            return Err(SqbcError::InvalidOperand(format!(
                "result row registers {}..+{}",
                ins.a, ins.b
            )))
        }
    };
    let row = (ins.a..end)
        .map(|r| e.reg(r).map(Scalar::clone))
        .collect::<SqbcResult<Vec<_>>>()?;
    e.push_result(row);
    Ok(e.pc() + 1)
}

fn op_halt(e: &mut VmEngine<'_>, _: Instruction) -> SqbcResult<usize> {
    Ok(e.program().len())
}

fn op_agg_init(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let name = e.constant(ins.b)?.to_text();
    let function =
        AggregateFunction::from_name(&name).ok_or(SqbcError::UnknownAggregate(name))?;
    *e.aggregate_mut(ins.a)? = Some(Accumulator::new(function));
    Ok(e.pc() + 1)
}

fn op_agg_step(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e.reg(ins.b)?.clone();
    match e.aggregate_mut(ins.a)? {
        Some(acc) => acc.step(&value),
        None => return Err(SqbcError::AggregateNotInitialized(ins.a.max(0) as usize)),
    }
    Ok(e.pc() + 1)
}

/// Final value into C; the slot is emptied. An empty slot yields NULL.
fn op_agg_final(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let value = e
        .aggregate_mut(ins.a)?
        .take()
        .map_or(Scalar::Null, |acc| acc.finish());
    e.set_reg(ins.c, value)?;
    Ok(e.pc() + 1)
}

/// Arguments live in the B registers immediately below the destination C
fn op_call(e: &mut VmEngine<'_>, ins: Instruction) -> SqbcResult<usize> {
    let first = match ins.c.checked_sub(ins.b) {
        Some(first) if ins.b >= 0 && first >= 0 => first,
        _ => {
            return Err(SqbcError::InvalidOperand(format!(
                "call with {} arguments into register {}",
                ins.b, ins.c
            )))
        }
    };
    let name = e.constant(ins.a)?.to_text();
    let args = (first..ins.c)
        .map(|r| e.reg(r).map(Scalar::clone))
        .collect::<SqbcResult<Vec<_>>>()?;
    let result = match ScalarFunction::from_name(&name) {
        Some(function) => function.apply(&args),
        None => {
            warn!(function = %name, pc = e.pc(), "unknown function, result is NULL");
            Scalar::Null
        }
    };
    e.set_reg(ins.c, result)?;
    Ok(e.pc() + 1)
}
