//! Register values for the virtual machine
//!
//! [`Scalar`] is the value type held in registers and in the constant pool.
//! Numeric, boolean and NULL values are stored inline; text and blob payloads
//! sit behind reference-counted buffers so that copying a register never
//! copies the payload.
//!
//! Arithmetic and comparison follow SQL rules:
//! - NULL absorbs every arithmetic operation
//! - Division or modulo by zero yields NULL instead of failing
//! - Integers (and booleans) stay integral unless the operation overflows
//!   or the other operand is REAL
//! - Comparison is numeric between numeric tags and bytewise otherwise

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::table::Value;

/// Storage class of a [`Scalar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarTag {
    Null,
    Integer,
    Float,
    Text,
    Blob,
    Boolean,
}

impl ScalarTag {
    /// Name reported by `typeof()`
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarTag::Null => "null",
            ScalarTag::Integer | ScalarTag::Boolean => "integer",
            ScalarTag::Float => "real",
            ScalarTag::Text => "text",
            ScalarTag::Blob => "blob",
        }
    }
}

/// A single SQL value as seen by the virtual machine
#[derive(Debug, Clone, Default)]
pub enum Scalar {
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    Text(Arc<str>),
    Blob(Arc<[u8]>),
    Boolean(bool),
}

/// Result of classifying an operand for arithmetic
enum Numeric {
    Int(i64),
    Real(f64),
}

impl Scalar {
    pub fn text(s: &str) -> Self {
        Scalar::Text(Arc::from(s))
    }

    pub fn blob(bytes: &[u8]) -> Self {
        Scalar::Blob(Arc::from(bytes))
    }

    pub fn tag(&self) -> ScalarTag {
        match self {
            Scalar::Null => ScalarTag::Null,
            Scalar::Integer(_) => ScalarTag::Integer,
            Scalar::Float(_) => ScalarTag::Float,
            Scalar::Text(_) => ScalarTag::Text,
            Scalar::Blob(_) => ScalarTag::Blob,
            Scalar::Boolean(_) => ScalarTag::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Integer payload; 0 for any other tag
    pub fn as_int(&self) -> i64 {
        match self {
            Scalar::Integer(i) => *i,
            _ => 0,
        }
    }

    /// Float payload; 0.0 for any other tag
    pub fn as_float(&self) -> f64 {
        match self {
            Scalar::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Text payload; empty for any other tag
    pub fn as_text(&self) -> &str {
        match self {
            Scalar::Text(s) => s,
            _ => "",
        }
    }

    /// Blob payload; empty for any other tag
    pub fn as_blob(&self) -> &[u8] {
        match self {
            Scalar::Blob(b) => b,
            _ => &[],
        }
    }

    /// Boolean payload; false for any other tag
    pub fn as_bool(&self) -> bool {
        matches!(self, Scalar::Boolean(true))
    }

    /// Numeric view of any value. Text is parsed, falling back to 0.
    pub fn to_float(&self) -> f64 {
        match self {
            Scalar::Null => 0.0,
            Scalar::Integer(i) => *i as f64,
            Scalar::Float(f) => *f,
            Scalar::Boolean(b) => f64::from(u8::from(*b)),
            Scalar::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            Scalar::Blob(b) => String::from_utf8_lossy(b)
                .trim()
                .parse::<f64>()
                .unwrap_or(0.0),
        }
    }

    /// Integer view of any value. Floats truncate toward zero.
    pub fn to_int(&self) -> i64 {
        match self {
            Scalar::Integer(i) => *i,
            Scalar::Boolean(b) => i64::from(*b),
            Scalar::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => i,
                Err(_) => self.to_float() as i64,
            },
            _ => self.to_float() as i64,
        }
    }

    /// Textual form used by concatenation, text functions and mixed compares
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.to_string(),
            Scalar::Blob(b) => String::from_utf8_lossy(b).into_owned(),
            Scalar::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
        }
    }

    /// Truth value used by conditional jumps and logical operators
    ///
    /// Text counts as false when it is empty, `"0"` or `"false"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Integer(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Boolean(b) => *b,
            Scalar::Text(s) => !(s.is_empty() || &**s == "0" || s.eq_ignore_ascii_case("false")),
            Scalar::Blob(b) => !b.is_empty(),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            Scalar::Integer(_) | Scalar::Float(_) | Scalar::Boolean(_)
        )
    }

    fn numeric(&self) -> Numeric {
        match self {
            Scalar::Integer(i) => Numeric::Int(*i),
            Scalar::Boolean(b) => Numeric::Int(i64::from(*b)),
            _ => Numeric::Real(self.to_float()),
        }
    }

    /// Shared arithmetic skeleton. `int_op` returns None on overflow.
    fn arith(
        &self,
        other: &Scalar,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Scalar {
        if self.is_null() || other.is_null() {
            return Scalar::Null;
        }
        match (self.numeric(), other.numeric()) {
            (Numeric::Int(a), Numeric::Int(b)) => match int_op(a, b) {
                Some(v) => Scalar::Integer(v),
                None => Scalar::Float(float_op(a as f64, b as f64)),
            },
            _ => Scalar::Float(float_op(self.to_float(), other.to_float())),
        }
    }

    pub fn add(&self, other: &Scalar) -> Scalar {
        self.arith(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, other: &Scalar) -> Scalar {
        self.arith(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Scalar) -> Scalar {
        self.arith(other, i64::checked_mul, |a, b| a * b)
    }

    /// Division; a zero divisor yields NULL
    pub fn div(&self, other: &Scalar) -> Scalar {
        if !other.is_null() && other.to_float() == 0.0 {
            return Scalar::Null;
        }
        self.arith(other, i64::checked_div, |a, b| a / b)
    }

    /// Remainder; a zero divisor yields NULL
    pub fn rem(&self, other: &Scalar) -> Scalar {
        if !other.is_null() && other.to_float() == 0.0 {
            return Scalar::Null;
        }
        self.arith(other, i64::checked_rem, |a, b| a % b)
    }

    /// Unary minus. Text and blob operands yield NULL.
    pub fn neg(&self) -> Scalar {
        match self {
            Scalar::Integer(i) => match i.checked_neg() {
                Some(v) => Scalar::Integer(v),
                None => Scalar::Float(-(*i as f64)),
            },
            Scalar::Float(f) => Scalar::Float(-f),
            Scalar::Boolean(b) => Scalar::Integer(-i64::from(*b)),
            _ => Scalar::Null,
        }
    }

    /// `||` operator
    pub fn concat(&self, other: &Scalar) -> Scalar {
        if self.is_null() || other.is_null() {
            return Scalar::Null;
        }
        let mut joined = self.to_text();
        joined.push_str(&other.to_text());
        Scalar::Text(Arc::from(joined))
    }

    /// Three-way comparison with NULL ordered first
    ///
    /// Numeric tags compare as floats, two text or two blob values compare
    /// bytewise, and any other mix compares the textual forms.
    pub fn compare(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => Ordering::Equal,
            (Scalar::Null, _) => Ordering::Less,
            (_, Scalar::Null) => Ordering::Greater,
            (Scalar::Integer(a), Scalar::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => a
                .to_float()
                .partial_cmp(&b.to_float())
                .unwrap_or(Ordering::Equal),
            (Scalar::Text(a), Scalar::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Scalar::Blob(a), Scalar::Blob(b)) => a.cmp(b),
            (a, b) => a.to_text().cmp(&b.to_text()),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Text(s) => write!(f, "'{}'", s),
            Scalar::Blob(b) => write!(f, "X'{}'", hex::encode_upper(b)),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Integer(i) => Scalar::Integer(*i),
            Value::Float(f) => Scalar::Float(*f),
            Value::String(s) => Scalar::text(s),
            Value::Boolean(b) => Scalar::Boolean(*b),
            Value::Blob(b) => Scalar::blob(b),
        }
    }
}

impl From<&Scalar> for Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Null => Value::Null,
            Scalar::Integer(i) => Value::Integer(*i),
            Scalar::Float(f) => Value::Float(*f),
            Scalar::Text(s) => Value::String(s.to_string()),
            Scalar::Blob(b) => Value::Blob(b.to_vec()),
            Scalar::Boolean(b) => Value::Boolean(*b),
        }
    }
}
