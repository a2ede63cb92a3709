//! Dynamically typed values for factory arguments, properties and labels.

use crate::dtype::DType;
use crate::error::{BlockError, Result};
use num_complex::Complex64;

/// A loosely typed parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(Complex64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    fn mismatch(&self, wanted: &str) -> BlockError {
        BlockError::invalid(format!("expected {wanted}, got {self:?}"))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::UInt(u) => Ok(*u != 0),
            other => Err(other.mismatch("a boolean")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Float(f) => Ok(*f),
            other => Err(other.mismatch("a real number")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u).map_err(|_| self.mismatch("a signed integer")),
            Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            other => Err(other.mismatch("an integer")),
        }
    }

    pub fn as_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            other => u64::try_from(other.as_i64()?).map_err(|_| other.mismatch("a non-negative integer")),
        }
    }

    pub fn as_usize(&self) -> Result<usize> {
        let i = self.as_i64()?;
        usize::try_from(i).map_err(|_| self.mismatch("a non-negative integer"))
    }

    pub fn as_complex(&self) -> Result<Complex64> {
        match self {
            Value::Complex(c) => Ok(*c),
            other => other.as_f64().map(|re| Complex64::new(re, 0.0)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("a string")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch("a list")),
        }
    }

    /// A list of real numbers, e.g. filter taps.
    pub fn as_f64_list(&self) -> Result<Vec<f64>> {
        self.as_list()?.iter().map(Value::as_f64).collect()
    }

    /// Whether this value is numerically zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::UInt(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Complex(c) => c.re == 0.0 && c.im == 0.0,
            _ => false,
        }
    }

    /// Parses a dtype name held in a string value.
    pub fn as_dtype(&self) -> Result<DType> {
        self.as_str()?.parse()
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Complex64> for Value {
    fn from(v: Complex64) -> Self {
        Value::Complex(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DType> for Value {
    fn from(v: DType) -> Self {
        Value::Str(v.name().to_owned())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::List(v.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}
