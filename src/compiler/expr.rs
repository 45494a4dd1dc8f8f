//! Expression lowering
//!
//! [`ExprCompiler`] turns one `sqlparser` expression tree into instructions
//! that leave the expression's value in a freshly allocated register. Column
//! references resolve against an optional [`TableScope`]; without a scope
//! (a SELECT with no FROM clause) they evaluate to NULL.

use std::collections::HashMap;

use sqlparser::ast::{
    BinaryOperator, DataType, Expr, Function, FunctionArg, FunctionArgExpr, Ident,
    UnaryOperator, Value as SqlValue,
};

use crate::error::{SqbcError, SqbcResult};
use crate::intern::intern;
use crate::vm::bytecode::OpCode;
use crate::vm::functions::ScalarFunction;
use crate::vm::program::ProgramBuilder;
use crate::vm::value::Scalar;

/// Function names that only make sense as aggregates
const AGGREGATE_NAMES: &[&str] = &["count", "sum", "avg", "min", "max", "group_concat", "total"];

/// The single table a SELECT reads from
#[derive(Debug, Clone)]
pub struct TableScope {
    /// Cursor the scan loop opened the table on
    pub cursor: i32,
    pub table: String,
    pub alias: Option<String>,
    /// Column names in declared order
    pub columns: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl TableScope {
    pub fn new(cursor: i32, table: &str, alias: Option<&str>, columns: Vec<String>) -> Self {
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_lowercase(), idx))
            .collect();
        TableScope {
            cursor,
            table: table.to_string(),
            alias: alias.map(str::to_string),
            columns,
            by_name,
        }
    }

    /// Index of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_lowercase()).copied().or_else(|| {
            self.columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
        })
    }

    /// Whether `qualifier` names this table, directly or through its alias
    pub fn is_named(&self, qualifier: &str) -> bool {
        self.table.eq_ignore_ascii_case(qualifier)
            || self
                .alias
                .as_deref()
                .map_or(false, |a| a.eq_ignore_ascii_case(qualifier))
    }
}

/// Split a column reference into (qualifier, column)
pub(crate) fn column_ref(expr: &Expr) -> Option<(Option<&Ident>, &Ident)> {
    match expr {
        Expr::Identifier(ident) => Some((None, ident)),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [] => None,
            [column] => Some((None, column)),
            [.., qualifier, column] => Some((Some(qualifier), column)),
        },
        _ => None,
    }
}

/// Whether `pred` holds for `expr` or any expression nested inside it
pub(crate) fn any_subexpr(expr: &Expr, pred: &dyn Fn(&Expr) -> bool) -> bool {
    if pred(expr) {
        return true;
    }
    let walk = |e: &Expr| any_subexpr(e, pred);
    match expr {
        Expr::BinaryOp { left, right, .. } => walk(left) || walk(right),
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::Cast { expr, .. }
        | Expr::Collate { expr, .. }
        | Expr::InSubquery { expr, .. } => walk(expr),
        Expr::Between {
            expr, low, high, ..
        } => walk(expr) || walk(low) || walk(high),
        Expr::InList { expr, list, .. } => walk(expr) || list.iter().any(walk),
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            operand.as_deref().map_or(false, walk)
                || conditions.iter().any(walk)
                || results.iter().any(walk)
                || else_result.as_deref().map_or(false, walk)
        }
        Expr::Function(f) => function_args(f).any(|arg| match arg {
            FunctionArgExpr::Expr(e) => walk(e),
            _ => false,
        }),
        _ => false,
    }
}

fn function_args(f: &Function) -> impl Iterator<Item = &FunctionArgExpr> {
    f.args.iter().map(|arg| match arg {
        FunctionArg::Named { arg, .. } => arg,
        FunctionArg::Unnamed(arg) => arg,
    })
}

/// Whether the expression calls an aggregate function anywhere
pub(crate) fn contains_aggregate(expr: &Expr) -> bool {
    any_subexpr(expr, &|e| match e {
        Expr::Function(f) => {
            let name = f.name.to_string().to_lowercase();
            AGGREGATE_NAMES.contains(&name.as_str())
        }
        _ => false,
    })
}

/// Whether the expression contains a subquery anywhere
pub(crate) fn contains_subquery(expr: &Expr) -> bool {
    any_subexpr(expr, &|e| {
        matches!(
            e,
            Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. }
        )
    })
}

/// Name used for `CAST(x AS T)`: `cast_` followed by the lowercased base
/// type name, e.g. `VARCHAR(20)` becomes `cast_varchar`.
pub(crate) fn cast_function_name(data_type: &DataType) -> String {
    let rendered = data_type.to_string();
    let base = rendered.split('(').next().unwrap_or_default().trim();
    format!("cast_{}", base.to_lowercase().replace(' ', "_"))
}

/// Convert a literal to a constant
fn literal(value: &SqlValue) -> SqbcResult<Scalar> {
    let scalar = match value {
        SqlValue::Number(text, _) => match text.parse::<i64>() {
            Ok(i) => Scalar::Integer(i),
            Err(_) => text.parse::<f64>().map(Scalar::Float).map_err(|_| {
                SqbcError::MalformedExpression(format!("invalid numeric literal {}", text))
            })?,
        },
        SqlValue::SingleQuotedString(s)
        | SqlValue::DoubleQuotedString(s)
        | SqlValue::NationalStringLiteral(s)
        | SqlValue::EscapedStringLiteral(s) => {
            if s.eq_ignore_ascii_case("true") {
                Scalar::Boolean(true)
            } else if s.eq_ignore_ascii_case("false") {
                Scalar::Boolean(false)
            } else {
                Scalar::Text(intern(s))
            }
        }
        SqlValue::HexStringLiteral(digits) => {
            let bytes = hex::decode(digits).map_err(|e| {
                SqbcError::MalformedExpression(format!("invalid blob literal X'{}': {}", digits, e))
            })?;
            Scalar::blob(&bytes)
        }
        SqlValue::Boolean(b) => Scalar::Boolean(*b),
        SqlValue::Null => Scalar::Null,
        other => {
            return Err(SqbcError::UnsupportedSqlFeature(format!(
                "literal {}",
                other
            )))
        }
    };
    Ok(scalar)
}

/// Opcode for a binary operator, if the VM has one
fn binary_opcode(op: &BinaryOperator) -> Option<OpCode> {
    let opcode = match op {
        BinaryOperator::Plus => OpCode::Add,
        BinaryOperator::Minus => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::StringConcat => OpCode::Concat,
        BinaryOperator::Eq => OpCode::Eq,
        BinaryOperator::NotEq => OpCode::Ne,
        BinaryOperator::Lt => OpCode::Lt,
        BinaryOperator::LtEq => OpCode::Le,
        BinaryOperator::Gt => OpCode::Gt,
        BinaryOperator::GtEq => OpCode::Ge,
        BinaryOperator::And => OpCode::And,
        BinaryOperator::Or => OpCode::Or,
        _ => return None,
    };
    Some(opcode)
}

/// Lowers expressions into a [`ProgramBuilder`]
pub struct ExprCompiler<'a> {
    builder: &'a mut ProgramBuilder,
    scope: Option<&'a TableScope>,
}

impl<'a> ExprCompiler<'a> {
    pub fn new(builder: &'a mut ProgramBuilder, scope: Option<&'a TableScope>) -> Self {
        ExprCompiler { builder, scope }
    }

    /// Compile `expr` and return the register holding its value
    pub fn compile(&mut self, expr: &Expr) -> SqbcResult<i32> {
        match expr {
            Expr::Value(value) => {
                let constant = literal(value)?;
                Ok(self.load_constant(constant))
            }
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                let dst = self.builder.alloc_register();
                self.compile_into(expr, dst)?;
                Ok(dst)
            }
            Expr::Nested(inner) | Expr::Collate { expr: inner, .. } => self.compile(inner),
            Expr::IsNull(inner) => self.unary(OpCode::IsNull, inner),
            Expr::IsNotNull(inner) => self.unary(OpCode::NotNull, inner),
            Expr::BinaryOp { left, op, right } => {
                let opcode = binary_opcode(op).ok_or_else(|| {
                    SqbcError::UnsupportedSqlFeature(format!("binary operator {}", op))
                })?;
                let lhs = self.compile(left)?;
                let rhs = self.compile(right)?;
                let dst = self.builder.alloc_register();
                self.builder.emit_abc(opcode, lhs, rhs, dst);
                Ok(dst)
            }
            Expr::UnaryOp { op, expr: inner } => match op {
                UnaryOperator::Minus => self.unary(OpCode::Neg, inner),
                UnaryOperator::Not => self.unary(OpCode::Not, inner),
                _ => self.unary(OpCode::LoadReg, inner),
            },
            Expr::Function(function) => self.function(function),
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => self.case(
                operand.as_deref(),
                conditions,
                results,
                else_result.as_deref(),
            ),
            Expr::Cast { expr: inner, data_type } => {
                self.call(&cast_function_name(data_type), &[inner.as_ref()])
            }
            Expr::Subquery(_) | Expr::Exists { .. } | Expr::InSubquery { .. } => Err(
                SqbcError::UnsupportedSqlFeature("subqueries".to_string()),
            ),
            other => Err(SqbcError::MalformedExpression(other.to_string())),
        }
    }

    /// Compile `expr` so that its value ends up in `target`
    ///
    /// Column references read straight into the target; everything else is
    /// computed into a scratch register and copied.
    pub fn compile_into(&mut self, expr: &Expr, target: i32) -> SqbcResult<()> {
        if let Some((qualifier, column)) = column_ref(expr) {
            return self.column_into(qualifier, column, target);
        }
        let src = self.compile(expr)?;
        self.builder.emit_abc(OpCode::LoadReg, src, 0, target);
        Ok(())
    }

    fn load_constant(&mut self, value: Scalar) -> i32 {
        let constant = self.builder.add_constant(value);
        let dst = self.builder.alloc_register();
        self.builder.emit_abc(OpCode::LoadConst, 0, constant, dst);
        dst
    }

    fn unary(&mut self, op: OpCode, inner: &Expr) -> SqbcResult<i32> {
        let src = self.compile(inner)?;
        let dst = self.builder.alloc_register();
        self.builder.emit_abc(op, src, 0, dst);
        Ok(dst)
    }

    fn column_into(
        &mut self,
        qualifier: Option<&Ident>,
        column: &Ident,
        target: i32,
    ) -> SqbcResult<()> {
        let Some(scope) = self.scope else {
            let constant = self.builder.add_constant(Scalar::Null);
            self.builder.emit_abc(OpCode::LoadConst, 0, constant, target);
            return Ok(());
        };
        if let Some(q) = qualifier {
            if !scope.is_named(&q.value) {
                return Err(SqbcError::TableNotFound(q.value.clone()));
            }
        }
        match scope.column_index(&column.value) {
            Some(idx) => {
                self.builder
                    .emit_abc(OpCode::Column, scope.cursor, idx as i32, target);
            }
            None if column.value.eq_ignore_ascii_case("rowid")
                || column.value.eq_ignore_ascii_case("_rowid_") =>
            {
                self.builder.emit_abc(OpCode::Rowid, scope.cursor, 0, target);
            }
            None => return Err(SqbcError::ColumnNotFound(column.value.clone())),
        }
        Ok(())
    }

    fn function(&mut self, function: &Function) -> SqbcResult<i32> {
        let name = function.name.to_string().to_lowercase();
        if function.over.is_some() {
            return Err(SqbcError::UnsupportedSqlFeature(format!(
                "window function {}()",
                name
            )));
        }
        if function.distinct || !function.order_by.is_empty() {
            return Err(SqbcError::UnsupportedSqlFeature(format!(
                "DISTINCT or ORDER BY inside {}()",
                name
            )));
        }
        let builtin = ScalarFunction::from_name(&name)
            .ok_or_else(|| SqbcError::UnsupportedSqlFeature(format!("function {}()", name)))?;

        let args = function
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Ok(e),
                _ => Err(SqbcError::UnsupportedSqlFeature(format!(
                    "named or wildcard arguments to {}()",
                    name
                ))),
            })
            .collect::<SqbcResult<Vec<&Expr>>>()?;

        let (min, max) = builtin.arity();
        if args.len() < min || max.map_or(false, |max| args.len() > max) {
            return Err(SqbcError::InvalidSqlQuery(format!(
                "wrong number of arguments to {}(): {}",
                name,
                args.len()
            )));
        }
        self.call(&name, &args)
    }

    /// Emit a Call whose arguments are copied into the registers directly
    /// below the destination.
    fn call(&mut self, name: &str, args: &[&Expr]) -> SqbcResult<i32> {
        let values = args
            .iter()
            .map(|arg| self.compile(arg))
            .collect::<SqbcResult<Vec<i32>>>()?;
        let name_const = self.builder.add_constant(Scalar::Text(intern(name)));

        let slots: Vec<i32> = values.iter().map(|_| self.builder.alloc_register()).collect();
        let dst = self.builder.alloc_register();
        for (src, slot) in values.iter().zip(&slots) {
            self.builder.emit_abc(OpCode::LoadReg, *src, 0, *slot);
        }
        self.builder
            .emit_abc(OpCode::Call, name_const, values.len() as i32, dst);
        Ok(dst)
    }

    fn case(
        &mut self,
        operand: Option<&Expr>,
        conditions: &[Expr],
        results: &[Expr],
        else_result: Option<&Expr>,
    ) -> SqbcResult<i32> {
        let dst = self.builder.alloc_register();
        let end = self.builder.alloc_label();
        let operand = operand.map(|e| self.compile(e)).transpose()?;

        for (condition, result) in conditions.iter().zip(results) {
            let next = self.builder.alloc_label();
            let mut test = self.compile(condition)?;
            if let Some(subject) = operand {
                let eq = self.builder.alloc_register();
                self.builder.emit_abc(OpCode::Eq, subject, test, eq);
                test = eq;
            }
            self.builder.emit_jump(OpCode::JumpFalse, test, next)?;
            self.compile_into(result, dst)?;
            self.builder.emit_jump(OpCode::Jump, 0, end)?;
            self.builder.resolve_label(next)?;
        }

        match else_result {
            Some(e) => self.compile_into(e, dst)?,
            None => {
                let constant = self.builder.add_constant(Scalar::Null);
                self.builder.emit_abc(OpCode::LoadConst, 0, constant, dst);
            }
        }
        self.builder.resolve_label(end)?;
        Ok(dst)
    }
}
