//! SELECT lowering
//!
//! Two statement shapes are compiled:
//!
//! - `SELECT <exprs>` with no FROM clause: one result row, then Halt
//! - `SELECT <exprs> FROM <table> [WHERE <cond>]`: a cursor scan loop
//!
//! Everything else is rejected up front with
//! [`SqbcError::UnsupportedSqlFeature`] so callers can fall back to another
//! evaluation path.

use sqlparser::ast::{Expr, Ident, ObjectName, Query, Select, SelectItem, SetExpr, TableFactor};
use tracing::debug;

use crate::compiler::expr::{contains_aggregate, contains_subquery, ExprCompiler, TableScope};
use crate::error::{SqbcError, SqbcResult};
use crate::intern::intern;
use crate::vm::bytecode::OpCode;
use crate::vm::program::{Program, ProgramBuilder};
use crate::vm::value::Scalar;

/// Cursor used by the single-table scan
const SCAN_CURSOR: i32 = 0;

fn unsupported<T>(what: impl Into<String>) -> SqbcResult<T> {
    let what = what.into();
    debug!(construct = %what, "rejecting statement");
    Err(SqbcError::UnsupportedSqlFeature(what))
}

/// Reject every query-level and select-level clause the VM cannot run, and
/// return the plain SELECT body.
pub(crate) fn supported_select(query: &Query) -> SqbcResult<&Select> {
    if query.with.is_some() {
        return unsupported("WITH (common table expressions)");
    }
    let select = match query.body.as_ref() {
        SetExpr::Select(select) => select.as_ref(),
        SetExpr::SetOperation { op, .. } => return unsupported(format!("{} set operations", op)),
        SetExpr::Query(_) => return unsupported("nested query bodies"),
        SetExpr::Values(_) => return unsupported("VALUES lists"),
        _ => return unsupported("this query body"),
    };
    if !query.order_by.is_empty() {
        return unsupported("ORDER BY");
    }
    if query.limit.is_some() || query.offset.is_some() || query.fetch.is_some() {
        return unsupported("LIMIT/OFFSET/FETCH");
    }
    if !query.locks.is_empty() {
        return unsupported("locking clauses");
    }
    if select.distinct.is_some() {
        return unsupported("DISTINCT");
    }
    if select.top.is_some() {
        return unsupported("TOP");
    }
    if select.into.is_some() {
        return unsupported("SELECT INTO");
    }
    if !select.group_by.is_empty() {
        return unsupported("GROUP BY");
    }
    if select.having.is_some() {
        return unsupported("HAVING");
    }
    if !select.lateral_views.is_empty() {
        return unsupported("LATERAL VIEW");
    }
    if !select.cluster_by.is_empty()
        || !select.distribute_by.is_empty()
        || !select.sort_by.is_empty()
    {
        return unsupported("CLUSTER BY/DISTRIBUTE BY/SORT BY");
    }
    if !select.named_window.is_empty() || select.qualify.is_some() {
        return unsupported("window clauses");
    }
    let has_aggregate = select.projection.iter().any(|item| match item {
        SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
            contains_aggregate(e)
        }
        _ => false,
    });
    if has_aggregate {
        return unsupported("aggregate functions");
    }
    Ok(select)
}

/// One output column: the expression to evaluate and its result name
struct OutputColumn {
    expr: Expr,
    name: String,
}

/// Result column name for a projection item without an expanded name
fn output_name(item: &SelectItem, position: usize) -> String {
    let expr = match item {
        SelectItem::ExprWithAlias { alias, .. } => return alias.value.clone(),
        SelectItem::UnnamedExpr(expr) => expr,
        _ => return format!("col{}", position),
    };
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => match parts.last() {
            Some(ident) => ident.value.clone(),
            None => format!("col{}", position),
        },
        Expr::Value(sqlparser::ast::Value::Null) => "NULL".to_string(),
        Expr::Value(sqlparser::ast::Value::Number(text, _)) => text.clone(),
        Expr::Value(sqlparser::ast::Value::SingleQuotedString(text)) => text.clone(),
        Expr::Value(sqlparser::ast::Value::Boolean(b)) => b.to_string(),
        _ => format!("col{}", position),
    }
}

/// Emit the projection into a fresh contiguous register run followed by a
/// ResultRow.
fn emit_projection(
    builder: &mut ProgramBuilder,
    scope: Option<&TableScope>,
    columns: &[OutputColumn],
) -> SqbcResult<()> {
    let targets: Vec<i32> = columns.iter().map(|_| builder.alloc_register()).collect();
    for (column, target) in columns.iter().zip(&targets) {
        ExprCompiler::new(builder, scope).compile_into(&column.expr, *target)?;
    }
    let first = targets.first().copied().unwrap_or(0);
    builder.emit_ab(OpCode::ResultRow, first, columns.len() as i32);
    Ok(())
}

fn finish(mut builder: ProgramBuilder, columns: Vec<OutputColumn>) -> SqbcResult<Program> {
    builder.set_column_names(columns.into_iter().map(|c| c.name).collect());
    let program = builder.build()?;
    debug!(
        instructions = program.len(),
        constants = program.constants().len(),
        registers = program.num_registers(),
        "compiled SELECT"
    );
    Ok(program)
}

/// `SELECT <exprs>` with no FROM clause
pub(crate) fn compile_constant_select(select: &Select) -> SqbcResult<Program> {
    let columns = select
        .projection
        .iter()
        .enumerate()
        .map(|(position, item)| match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                Ok(OutputColumn {
                    expr: expr.clone(),
                    name: output_name(item, position),
                })
            }
            _ => unsupported("SELECT * without a FROM clause"),
        })
        .collect::<SqbcResult<Vec<_>>>()?;

    let mut builder = ProgramBuilder::new();
    emit_projection(&mut builder, None, &columns)?;
    builder.emit(OpCode::Halt);
    finish(builder, columns)
}

/// The table a single-table SELECT reads: (name, alias)
pub(crate) fn single_table(select: &Select) -> SqbcResult<(String, Option<String>)> {
    if select.from.len() != 1 {
        return unsupported("multiple tables in FROM");
    }
    let from = &select.from[0];
    if !from.joins.is_empty() {
        return unsupported("JOIN");
    }
    match &from.relation {
        TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                return unsupported("table-valued functions");
            }
            Ok((
                object_name(name),
                alias.as_ref().map(|a| a.name.value.clone()),
            ))
        }
        TableFactor::Derived { .. } => unsupported("subqueries in FROM"),
        _ => unsupported("this FROM clause"),
    }
}

/// `SELECT <exprs> FROM <table> [WHERE <cond>]`
///
/// Program shape:
///
/// ```text
///        OpenCursor 0, <table>
///        Rewind     0 -> end
/// top:   <where> ; JumpFalse -> skip
///        <projection> ; ResultRow
/// skip:  Next       0 -> top
/// end:   Halt
/// ```
pub(crate) fn compile_table_select(
    select: &Select,
    table: &str,
    alias: Option<&str>,
    schema: &[(String, String)],
) -> SqbcResult<Program> {
    if let Some(selection) = &select.selection {
        if contains_subquery(selection) {
            return unsupported("subqueries in WHERE");
        }
    }

    let scope = TableScope::new(
        SCAN_CURSOR,
        table,
        alias,
        schema.iter().map(|(name, _)| name.clone()).collect(),
    );

    let mut columns = Vec::new();
    for (position, item) in select.projection.iter().enumerate() {
        match item {
            SelectItem::Wildcard(_) => columns.extend(expand_star(&scope)),
            SelectItem::QualifiedWildcard(qualifier, _) => {
                let qualifier = object_name(qualifier);
                if !scope.is_named(&qualifier) {
                    return Err(SqbcError::TableNotFound(qualifier));
                }
                columns.extend(expand_star(&scope));
            }
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                columns.push(OutputColumn {
                    expr: expr.clone(),
                    name: output_name(item, position),
                })
            }
        }
    }

    let mut builder = ProgramBuilder::new();
    builder.set_cursor_columns(SCAN_CURSOR, scope.columns.clone());
    let table_const = builder.add_constant(Scalar::Text(intern(table)));
    let end = builder.alloc_label();
    let top = builder.alloc_label();
    let skip = builder.alloc_label();

    builder.emit_ab(OpCode::OpenCursor, SCAN_CURSOR, table_const);
    builder.emit_jump(OpCode::Rewind, SCAN_CURSOR, end)?;
    builder.resolve_label(top)?;

    if let Some(selection) = &select.selection {
        let cond = ExprCompiler::new(&mut builder, Some(&scope)).compile(selection)?;
        builder.emit_jump(OpCode::JumpFalse, cond, skip)?;
    }
    emit_projection(&mut builder, Some(&scope), &columns)?;

    builder.resolve_label(skip)?;
    builder.emit_jump(OpCode::Next, SCAN_CURSOR, top)?;
    builder.resolve_label(end)?;
    builder.emit(OpCode::Halt);
    finish(builder, columns)
}

/// Unquoted dotted form of a possibly qualified name
fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn expand_star(scope: &TableScope) -> impl Iterator<Item = OutputColumn> + '_ {
    scope.columns.iter().map(|name| OutputColumn {
        expr: Expr::Identifier(Ident::new(name.clone())),
        name: name.clone(),
    })
}
