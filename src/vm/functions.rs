//! Built-in scalar functions reachable through the `Call` opcode
//!
//! Functions are looked up by lowercase name. `CAST(x AS T)` is compiled to a
//! call of `cast_<t>`, whose target affinity is derived from the type name
//! with the usual SQL substring rules (see [`Affinity::from_type_name`]).
//!
//! Missing trailing arguments are treated as NULL at run time; arity is
//! checked by the compiler before a call is emitted.

use std::sync::Arc;

use crate::vm::value::Scalar;

/// Target storage class of a CAST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    Numeric,
}

impl Affinity {
    /// Derive an affinity from a declared type name such as `varchar(10)`
    pub fn from_type_name(type_name: &str) -> Self {
        let t = type_name.to_lowercase();
        if t.contains("int") {
            Affinity::Integer
        } else if t.contains("char") || t.contains("clob") || t.contains("text") {
            Affinity::Text
        } else if t.contains("blob") {
            Affinity::Blob
        } else if t.contains("real") || t.contains("floa") || t.contains("doub") {
            Affinity::Real
        } else if t.contains("bool") {
            Affinity::Boolean
        } else {
            Affinity::Numeric
        }
    }

    /// Convert `value` to this affinity. NULL stays NULL.
    pub fn apply(self, value: &Scalar) -> Scalar {
        if value.is_null() {
            return Scalar::Null;
        }
        match self {
            Affinity::Integer => Scalar::Integer(value.to_int()),
            Affinity::Real => Scalar::Float(value.to_float()),
            Affinity::Text => match value {
                Scalar::Text(_) => value.clone(),
                other => Scalar::Text(Arc::from(other.to_text())),
            },
            Affinity::Blob => match value {
                Scalar::Blob(_) => value.clone(),
                other => Scalar::blob(other.to_text().as_bytes()),
            },
            Affinity::Boolean => Scalar::Boolean(value.is_truthy()),
            Affinity::Numeric => match value {
                Scalar::Integer(_) | Scalar::Float(_) => value.clone(),
                Scalar::Boolean(b) => Scalar::Integer(i64::from(*b)),
                other => {
                    let text = other.to_text();
                    let text = text.trim();
                    if let Ok(i) = text.parse::<i64>() {
                        Scalar::Integer(i)
                    } else if let Ok(f) = text.parse::<f64>() {
                        Scalar::Float(f)
                    } else {
                        Scalar::Integer(0)
                    }
                }
            },
        }
    }
}

/// Built-in scalar function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Abs,
    Length,
    Upper,
    Lower,
    /// TRIM(str[, chars])
    Trim,
    /// SUBSTR(str, start[, length]), 1-based
    Substr,
    /// REPLACE(str, search, replacement)
    Replace,
    Coalesce,
    IfNull,
    TypeOf,
    NullIf,
    Cast(Affinity),
}

impl ScalarFunction {
    /// Look a function up by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if let Some(type_name) = name.strip_prefix("cast_") {
            return Some(ScalarFunction::Cast(Affinity::from_type_name(type_name)));
        }
        let f = match name.as_str() {
            "abs" => ScalarFunction::Abs,
            "length" => ScalarFunction::Length,
            "upper" => ScalarFunction::Upper,
            "lower" => ScalarFunction::Lower,
            "trim" => ScalarFunction::Trim,
            "substr" | "substring" => ScalarFunction::Substr,
            "replace" => ScalarFunction::Replace,
            "coalesce" => ScalarFunction::Coalesce,
            "ifnull" => ScalarFunction::IfNull,
            "typeof" => ScalarFunction::TypeOf,
            "nullif" => ScalarFunction::NullIf,
            _ => return None,
        };
        Some(f)
    }

    /// Accepted argument counts as (min, max); `None` means unbounded
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            ScalarFunction::Abs
            | ScalarFunction::Length
            | ScalarFunction::Upper
            | ScalarFunction::Lower
            | ScalarFunction::TypeOf
            | ScalarFunction::Cast(_) => (1, Some(1)),
            ScalarFunction::Trim => (1, Some(2)),
            ScalarFunction::Substr => (2, Some(3)),
            ScalarFunction::Replace => (3, Some(3)),
            ScalarFunction::IfNull | ScalarFunction::NullIf => (2, Some(2)),
            ScalarFunction::Coalesce => (1, None),
        }
    }

    /// Evaluate the function
    pub fn apply(self, args: &[Scalar]) -> Scalar {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        match self {
            ScalarFunction::Abs => abs(&arg(0)),
            ScalarFunction::Length => match arg(0) {
                Scalar::Null => Scalar::Null,
                Scalar::Blob(b) => Scalar::Integer(b.len() as i64),
                other => Scalar::Integer(other.to_text().chars().count() as i64),
            },
            ScalarFunction::Upper => map_text(&arg(0), |s| s.to_uppercase()),
            ScalarFunction::Lower => map_text(&arg(0), |s| s.to_lowercase()),
            ScalarFunction::Trim => trim(&arg(0), args.get(1)),
            ScalarFunction::Substr => substr(&arg(0), &arg(1), args.get(2)),
            ScalarFunction::Replace => replace(&arg(0), &arg(1), &arg(2)),
            ScalarFunction::Coalesce | ScalarFunction::IfNull => args
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or_default(),
            ScalarFunction::TypeOf => Scalar::text(arg(0).tag().type_name()),
            ScalarFunction::NullIf => {
                let (a, b) = (arg(0), arg(1));
                if !a.is_null() && !b.is_null() && a == b {
                    Scalar::Null
                } else {
                    a
                }
            }
            ScalarFunction::Cast(affinity) => affinity.apply(&arg(0)),
        }
    }
}

fn abs(v: &Scalar) -> Scalar {
    match v {
        Scalar::Null => Scalar::Null,
        Scalar::Integer(i) => match i.checked_abs() {
            Some(a) => Scalar::Integer(a),
            None => Scalar::Float((*i as f64).abs()),
        },
        Scalar::Boolean(b) => Scalar::Integer(i64::from(*b)),
        other => Scalar::Float(other.to_float().abs()),
    }
}

fn map_text(v: &Scalar, f: impl Fn(&str) -> String) -> Scalar {
    if v.is_null() {
        return Scalar::Null;
    }
    Scalar::Text(Arc::from(f(&v.to_text())))
}

fn trim(v: &Scalar, chars: Option<&Scalar>) -> Scalar {
    match chars {
        None => map_text(v, |s| s.trim().to_string()),
        Some(c) if c.is_null() => Scalar::Null,
        Some(c) => {
            let set: Vec<char> = c.to_text().chars().collect();
            map_text(v, |s| s.trim_matches(|ch: char| set.contains(&ch)).to_string())
        }
    }
}

/// SQL SUBSTR with 1-based positions. A negative start counts from the end;
/// a start of 0 consumes one unit of the requested length.
fn substr(v: &Scalar, start: &Scalar, length: Option<&Scalar>) -> Scalar {
    if v.is_null() || start.is_null() || length.map_or(false, Scalar::is_null) {
        return Scalar::Null;
    }
    let chars: Vec<char> = v.to_text().chars().collect();
    let n = chars.len() as i64;
    let mut start = start.to_int();
    let mut len = length.map_or(n, Scalar::to_int);
    if len < 0 {
        return Scalar::text("");
    }
    // Positions saturate; extreme operands only ever clamp to the string.
    if start < 0 {
        start = start.saturating_add(n + 1);
        if start < 1 {
            len = len.saturating_add(start.saturating_sub(1));
            start = 1;
        }
    } else if start == 0 {
        len -= 1;
        start = 1;
    }
    let offset = start.saturating_sub(1);
    let begin = offset.clamp(0, n) as usize;
    let end = offset.saturating_add(len.max(0)).clamp(0, n) as usize;
    if begin >= end {
        return Scalar::text("");
    }
    Scalar::Text(Arc::from(chars[begin..end].iter().collect::<String>()))
}

fn replace(v: &Scalar, from: &Scalar, to: &Scalar) -> Scalar {
    if v.is_null() || from.is_null() || to.is_null() {
        return Scalar::Null;
    }
    let (s, pat) = (v.to_text(), from.to_text());
    if pat.is_empty() {
        return Scalar::Text(Arc::from(s));
    }
    Scalar::Text(Arc::from(s.replace(&pat, &to.to_text())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Scalar]) -> Scalar {
        ScalarFunction::from_name(name)
            .unwrap_or_else(|| panic!("unknown function {}", name))
            .apply(args)
    }

    #[test]
    fn test_lookup() {
        assert_eq!(ScalarFunction::from_name("UPPER"), Some(ScalarFunction::Upper));
        assert_eq!(
            ScalarFunction::from_name("substring"),
            Some(ScalarFunction::Substr)
        );
        assert_eq!(
            ScalarFunction::from_name("cast_varchar"),
            Some(ScalarFunction::Cast(Affinity::Text))
        );
        assert_eq!(ScalarFunction::from_name("frobnicate"), None);
    }

    #[test]
    fn test_affinity_from_type_name() {
        assert_eq!(Affinity::from_type_name("BIGINT"), Affinity::Integer);
        assert_eq!(Affinity::from_type_name("varchar(20)"), Affinity::Text);
        assert_eq!(Affinity::from_type_name("double"), Affinity::Real);
        assert_eq!(Affinity::from_type_name("blob"), Affinity::Blob);
        assert_eq!(Affinity::from_type_name("boolean"), Affinity::Boolean);
        assert_eq!(Affinity::from_type_name("decimal"), Affinity::Numeric);
    }

    #[test]
    fn test_casts() {
        assert_eq!(call("cast_integer", &[Scalar::Float(3.9)]).as_int(), 3);
        assert_eq!(call("cast_integer", &[Scalar::text("42")]).as_int(), 42);
        assert_eq!(call("cast_real", &[Scalar::Integer(2)]).as_float(), 2.0);
        assert_eq!(call("cast_text", &[Scalar::Integer(2)]).as_text(), "2");
        assert_eq!(call("cast_numeric", &[Scalar::text("2.5")]).as_float(), 2.5);
        assert!(call("cast_integer", &[Scalar::Null]).is_null());
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(call("upper", &[Scalar::text("abc")]).as_text(), "ABC");
        assert_eq!(call("lower", &[Scalar::text("AbC")]).as_text(), "abc");
        assert_eq!(call("length", &[Scalar::text("héllo")]).as_int(), 5);
        assert_eq!(call("length", &[Scalar::Integer(1234)]).as_int(), 4);
        assert_eq!(call("trim", &[Scalar::text("  x ")]).as_text(), "x");
        assert_eq!(
            call("trim", &[Scalar::text("xxhixx"), Scalar::text("x")]).as_text(),
            "hi"
        );
        assert_eq!(
            call(
                "replace",
                &[Scalar::text("a-b-c"), Scalar::text("-"), Scalar::text("+")]
            )
            .as_text(),
            "a+b+c"
        );
        assert!(call("upper", &[Scalar::Null]).is_null());
    }

    #[test]
    fn test_substr() {
        let s = Scalar::text("hello");
        assert_eq!(call("substr", &[s.clone(), Scalar::Integer(2)]).as_text(), "ello");
        assert_eq!(
            call("substr", &[s.clone(), Scalar::Integer(2), Scalar::Integer(3)]).as_text(),
            "ell"
        );
        assert_eq!(
            call("substr", &[s.clone(), Scalar::Integer(-3), Scalar::Integer(2)]).as_text(),
            "ll"
        );
        assert_eq!(
            call("substr", &[s.clone(), Scalar::Integer(0), Scalar::Integer(2)]).as_text(),
            "h"
        );
        assert_eq!(call("substr", &[s, Scalar::Integer(9)]).as_text(), "");
    }

    #[test]
    fn test_substr_extreme_positions() {
        let s = Scalar::text("abc");
        let max = Scalar::Integer(i64::MAX);
        let min = Scalar::Integer(i64::MIN);
        assert_eq!(
            call("substr", &[s.clone(), Scalar::Integer(2), max.clone()]).as_text(),
            "bc"
        );
        assert_eq!(call("substr", &[s.clone(), max.clone()]).as_text(), "");
        assert_eq!(call("substr", &[s.clone(), max.clone(), max.clone()]).as_text(), "");
        assert_eq!(
            call("substr", &[s.clone(), min.clone(), Scalar::Integer(5)]).as_text(),
            ""
        );
        assert_eq!(call("substr", &[s.clone(), min.clone()]).as_text(), "");
        assert_eq!(call("substr", &[s, Scalar::Integer(-2), max]).as_text(), "bc");
    }

    #[test]
    fn test_null_handling_functions() {
        assert_eq!(
            call("coalesce", &[Scalar::Null, Scalar::Null, Scalar::Integer(3)]).as_int(),
            3
        );
        assert!(call("coalesce", &[Scalar::Null]).is_null());
        assert_eq!(call("ifnull", &[Scalar::Null, Scalar::text("d")]).as_text(), "d");
        assert!(call("nullif", &[Scalar::Integer(1), Scalar::Integer(1)]).is_null());
        assert_eq!(call("nullif", &[Scalar::Integer(1), Scalar::Integer(2)]).as_int(), 1);
    }

    #[test]
    fn test_abs_and_typeof() {
        assert_eq!(call("abs", &[Scalar::Integer(-4)]).as_int(), 4);
        assert_eq!(call("abs", &[Scalar::Float(-1.5)]).as_float(), 1.5);
        assert!(call("abs", &[Scalar::Null]).is_null());
        assert_eq!(call("typeof", &[Scalar::Boolean(true)]).as_text(), "integer");
        assert_eq!(call("typeof", &[Scalar::Null]).as_text(), "null");
        assert_eq!(call("typeof", &[Scalar::Float(1.0)]).as_text(), "real");
    }
}
