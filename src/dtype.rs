//! Element types.
//!
//! The closed set of element types a block can carry, the support masks used
//! by the registration tables, and the [`Element`] trait that ties each Rust
//! scalar type to its [`DType`] tag.

use crate::array::ArrayData;
use crate::error::{BlockError, Result};
use crate::value::Value;
use core::fmt;
use core::ops::BitOr;
use core::str::FromStr;
use num_complex::{Complex32, Complex64};

/// Element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DType {
    Int8 = 0,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    ComplexFloat32,
    ComplexFloat64,
}

impl DType {
    /// Every tag, in code order.
    pub const ALL: [DType; 12] = [
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::UInt16,
        DType::UInt32,
        DType::UInt64,
        DType::Float32,
        DType::Float64,
        DType::ComplexFloat32,
        DType::ComplexFloat64,
    ];

    /// Canonical lowercase name, e.g. `"complex_float32"`.
    pub fn name(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::ComplexFloat32 => "complex_float32",
            DType::ComplexFloat64 => "complex_float64",
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 | DType::ComplexFloat32 => 8,
            DType::ComplexFloat64 => 16,
        }
    }

    pub fn is_signed_int(self) -> bool {
        matches!(self, DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, DType::UInt8 | DType::UInt16 | DType::UInt32 | DType::UInt64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DType::ComplexFloat32 | DType::ComplexFloat64)
    }

    /// The real type underlying a complex type; other types map to themselves.
    pub fn to_real(self) -> DType {
        match self {
            DType::ComplexFloat32 => DType::Float32,
            DType::ComplexFloat64 => DType::Float64,
            other => other,
        }
    }

    /// The complex type matching a float type's precision.
    ///
    /// Integer types promote to `complex_float64`.
    pub fn to_complex(self) -> DType {
        match self {
            DType::Float32 | DType::ComplexFloat32 => DType::ComplexFloat32,
            _ => DType::ComplexFloat64,
        }
    }
}

impl TryFrom<u8> for DType {
    type Error = BlockError;

    fn try_from(value: u8) -> Result<Self> {
        DType::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| BlockError::DataFormat(format!("unknown dtype code {value}")))
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let canonical = match lower.as_str() {
            "float" => "float64",
            "complex" | "complex_float" => "complex_float64",
            other => other,
        };
        DType::ALL
            .into_iter()
            .find(|d| d.name() == canonical)
            .ok_or_else(|| BlockError::invalid(format!("unknown dtype \"{s}\"")))
    }
}

/// Which families of element types an operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DTypeSupport {
    pub int: bool,
    pub uint: bool,
    pub float: bool,
    pub complex: bool,
}

impl DTypeSupport {
    pub const NONE: Self = Self { int: false, uint: false, float: false, complex: false };
    pub const INT: Self = Self { int: true, ..Self::NONE };
    pub const UINT: Self = Self { uint: true, ..Self::NONE };
    pub const FLOAT: Self = Self { float: true, ..Self::NONE };
    pub const COMPLEX: Self = Self { complex: true, ..Self::NONE };
    pub const INTEGER: Self = Self { int: true, uint: true, ..Self::NONE };
    pub const REAL: Self = Self { int: true, uint: true, float: true, complex: false };
    pub const ALL: Self = Self { int: true, uint: true, float: true, complex: true };

    /// Whether `dtype` belongs to one of the enabled families.
    ///
    /// `int8` is never supported as a block input.
    pub fn supports(self, dtype: DType) -> bool {
        if dtype == DType::Int8 {
            return false;
        }
        (self.int && dtype.is_signed_int())
            || (self.uint && dtype.is_unsigned_int())
            || (self.float && dtype.is_float())
            || (self.complex && dtype.is_complex())
    }

    /// Every concrete type accepted by this mask.
    pub fn types(self) -> Vec<DType> {
        DType::ALL.into_iter().filter(|&d| self.supports(d)).collect()
    }
}

impl BitOr for DTypeSupport {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            int: self.int || rhs.int,
            uint: self.uint || rhs.uint,
            float: self.float || rhs.float,
            complex: self.complex || rhs.complex,
        }
    }
}

/// Checks a requested block type against an operation's support mask.
pub fn validate_dtype(dtype: DType, support: DTypeSupport) -> Result<()> {
    if dtype == DType::Int8 {
        return Err(BlockError::invalid("blocks do not support this type: int8"));
    }
    if support.supports(dtype) {
        Ok(())
    } else {
        Err(BlockError::invalid(format!("unsupported type: {dtype}")))
    }
}

/// Checks a requested block type against an explicit list.
pub fn validate_dtype_in(dtype: DType, allowed: &[DType]) -> Result<()> {
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(BlockError::invalid(format!("unsupported type: {dtype}")))
    }
}

/// A Rust scalar type that can live inside an [`ArrayData`].
pub trait Element: bytemuck::Pod + Send + Sync + fmt::Debug + PartialEq + 'static {
    const DTYPE: DType;

    fn wrap(data: Vec<Self>) -> ArrayData;
    fn slice(data: &ArrayData) -> Option<&[Self]>;
    fn from_value(value: &Value) -> Result<Self>;
    fn to_value(self) -> Value;
}

fn cast_failure(value: &Value, dtype: DType) -> BlockError {
    BlockError::invalid(format!("cannot convert {value:?} to {dtype}"))
}

macro_rules! impl_real_element {
    ($($ty:ty => $variant:ident, $to_value:expr;)*) => {$(
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(data: Vec<Self>) -> ArrayData {
                ArrayData::$variant(data)
            }

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value(value: &Value) -> Result<Self> {
                let converted: Option<Self> = match value {
                    Value::Bool(b) => Some(if *b { 1 as $ty } else { 0 as $ty }),
                    Value::Int(i) => num_traits::NumCast::from(*i),
                    Value::UInt(u) => num_traits::NumCast::from(*u),
                    Value::Float(f) => num_traits::NumCast::from(*f),
                    _ => None,
                };
                converted.ok_or_else(|| cast_failure(value, Self::DTYPE))
            }

            fn to_value(self) -> Value {
                ($to_value)(self)
            }
        }
    )*};
}

impl_real_element! {
    i8 => Int8, |x: i8| Value::Int(i64::from(x));
    i16 => Int16, |x: i16| Value::Int(i64::from(x));
    i32 => Int32, |x: i32| Value::Int(i64::from(x));
    i64 => Int64, Value::Int;
    u8 => UInt8, |x: u8| Value::UInt(u64::from(x));
    u16 => UInt16, |x: u16| Value::UInt(u64::from(x));
    u32 => UInt32, |x: u32| Value::UInt(u64::from(x));
    u64 => UInt64, Value::UInt;
    f32 => Float32, |x: f32| Value::Float(f64::from(x));
    f64 => Float64, Value::Float;
}

macro_rules! impl_complex_element {
    ($($ty:ty, $part:ty => $variant:ident;)*) => {$(
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(data: Vec<Self>) -> ArrayData {
                ArrayData::$variant(data)
            }

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::Complex(c) => Ok(Self::new(c.re as $part, c.im as $part)),
                    other => {
                        let re = <$part as Element>::from_value(other)
                            .map_err(|_| cast_failure(other, Self::DTYPE))?;
                        Ok(Self::new(re, 0.0))
                    }
                }
            }

            fn to_value(self) -> Value {
                Value::Complex(Complex64::new(f64::from(self.re), f64::from(self.im)))
            }
        }
    )*};
}

impl_complex_element! {
    Complex32, f32 => ComplexFloat32;
    Complex64, f64 => ComplexFloat64;
}
