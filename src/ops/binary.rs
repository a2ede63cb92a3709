//! Element-wise two-operand kernels.
//!
//! Both operands must share element type and device. The second operand may
//! hold a single element, which is then applied against every element of
//! the first (scalar blocks rely on this).

use super::unary::OutputKind;
use super::{IntElement, RealElement, common_device};
use crate::array::{Array, ArrayData};
use crate::dtype::{DType, DTypeSupport};
use crate::error::{BlockError, Result};
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;

const FC: DTypeSupport = DTypeSupport {
    int: false,
    uint: false,
    float: true,
    complex: true,
};

macro_rules! binary_ops {
    ($($variant:ident => $name:literal, $category:literal, $support:expr, $kind:ident;)*) => {
        /// Element-wise two-operand operations.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BinaryOp {
            $($variant,)*
        }

        impl BinaryOp {
            pub const ALL: &'static [BinaryOp] = &[$(BinaryOp::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(BinaryOp::$variant => $name,)*
                }
            }

            pub fn category(self) -> &'static str {
                match self {
                    $(BinaryOp::$variant => $category,)*
                }
            }

            pub fn support(self) -> DTypeSupport {
                match self {
                    $(BinaryOp::$variant => $support,)*
                }
            }

            pub fn kind(self) -> OutputKind {
                match self {
                    $(BinaryOp::$variant => OutputKind::$kind,)*
                }
            }
        }
    };
}

binary_ops! {
    Add => "add", "arith", DTypeSupport::ALL, Same;
    Sub => "sub", "arith", DTypeSupport::ALL, Same;
    Mul => "mul", "arith", DTypeSupport::ALL, Same;
    Div => "div", "arith", DTypeSupport::ALL, Same;
    Rem => "rem", "arith", DTypeSupport::REAL, Same;
    Pow => "pow", "arith", FC, Same;
    Root => "root", "arith", DTypeSupport::FLOAT, Same;
    Atan2 => "atan2", "arith", DTypeSupport::FLOAT, Same;
    Hypot => "hypot", "arith", DTypeSupport::FLOAT, Same;
    Min => "min", "arith", DTypeSupport::REAL, Same;
    Max => "max", "arith", DTypeSupport::REAL, Same;
    BitAnd => "bitand", "array", DTypeSupport::INTEGER, Same;
    BitOr => "bitor", "array", DTypeSupport::INTEGER, Same;
    BitXor => "bitxor", "array", DTypeSupport::INTEGER, Same;
    ShiftLeft => "shift_left", "array", DTypeSupport::INTEGER, Same;
    ShiftRight => "shift_right", "array", DTypeSupport::INTEGER, Same;
    Lt => "lt", "array", DTypeSupport::REAL, Int8;
    Le => "le", "array", DTypeSupport::REAL, Int8;
    Gt => "gt", "array", DTypeSupport::REAL, Int8;
    Ge => "ge", "array", DTypeSupport::REAL, Int8;
    Eq => "eq", "array", DTypeSupport::REAL, Int8;
    Ne => "ne", "array", DTypeSupport::REAL, Int8;
    LogicalAnd => "logical_and", "array", DTypeSupport::REAL, Int8;
    LogicalOr => "logical_or", "array", DTypeSupport::REAL, Int8;
    Combine => "combine_complex", "arith", DTypeSupport::FLOAT, RealToComplex;
}

impl BinaryOp {
    pub fn output_dtype(self, input: DType) -> DType {
        self.kind().output_dtype(input)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// Parses a comparator symbol such as `"<="` or `"!="`.
    pub fn from_comparator(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "<" => Some(BinaryOp::Lt),
            "<=" => Some(BinaryOp::Le),
            ">" => Some(BinaryOp::Gt),
            ">=" => Some(BinaryOp::Ge),
            "==" => Some(BinaryOp::Eq),
            "!=" => Some(BinaryOp::Ne),
            _ => None,
        }
    }

    /// Whether a zero second operand is an error for integer types.
    pub fn rejects_zero_divisor(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Rem)
    }

    fn unsupported(self, dtype: DType) -> BlockError {
        BlockError::invalid(format!("{} does not support {dtype}", self.name()))
    }
}

fn zero_divisor() -> BlockError {
    BlockError::invalid("Denominator cannot contain zeros.")
}

fn predicate<T: PartialOrd + Zero + Copy>(op: BinaryOp) -> Option<fn(T, T) -> bool> {
    let f: fn(T, T) -> bool = match op {
        BinaryOp::Lt => |a: T, b: T| a < b,
        BinaryOp::Le => |a: T, b: T| a <= b,
        BinaryOp::Gt => |a: T, b: T| a > b,
        BinaryOp::Ge => |a: T, b: T| a >= b,
        BinaryOp::Eq => |a: T, b: T| a == b,
        BinaryOp::Ne => |a: T, b: T| a != b,
        BinaryOp::LogicalAnd => |a: T, b: T| !a.is_zero() && !b.is_zero(),
        BinaryOp::LogicalOr => |a: T, b: T| !a.is_zero() || !b.is_zero(),
        _ => return None,
    };
    Some(f)
}

fn real_fn<F: RealElement>(op: BinaryOp) -> Option<fn(F, F) -> F> {
    let f: fn(F, F) -> F = match op {
        BinaryOp::Add => |a: F, b: F| a + b,
        BinaryOp::Sub => |a: F, b: F| a - b,
        BinaryOp::Mul => |a: F, b: F| a * b,
        BinaryOp::Div => |a: F, b: F| a / b,
        BinaryOp::Rem => |a: F, b: F| a % b,
        BinaryOp::Pow => |a: F, b: F| a.powf(b),
        // b-th root of a
        BinaryOp::Root => |a: F, b: F| a.powf(b.recip()),
        BinaryOp::Atan2 => |a: F, b: F| a.atan2(b),
        BinaryOp::Hypot => |a: F, b: F| a.hypot(b),
        BinaryOp::Min => |a: F, b: F| a.min(b),
        BinaryOp::Max => |a: F, b: F| a.max(b),
        _ => return None,
    };
    Some(f)
}

fn complex_fn<F: RealElement>(op: BinaryOp) -> Option<fn(Complex<F>, Complex<F>) -> Complex<F>> {
    let f: fn(Complex<F>, Complex<F>) -> Complex<F> = match op {
        BinaryOp::Add => |a: Complex<F>, b: Complex<F>| a + b,
        BinaryOp::Sub => |a: Complex<F>, b: Complex<F>| a - b,
        BinaryOp::Mul => |a: Complex<F>, b: Complex<F>| a * b,
        BinaryOp::Div => |a: Complex<F>, b: Complex<F>| a / b,
        BinaryOp::Pow => |a: Complex<F>, b: Complex<F>| a.powc(b),
        _ => return None,
    };
    Some(f)
}

fn zip_map<A, B, R, G>(a: &[A], b: &[B], f: G) -> Vec<R>
where
    A: Copy + Sync,
    B: Copy + Sync,
    R: Send,
    G: Fn(A, B) -> R + Sync + Send,
{
    let n = b.len();
    (0..a.len()).into_par_iter().map(|i| f(a[i], b[i % n])).collect()
}

fn real_kernel<F: RealElement>(op: BinaryOp, a: &[F], b: &[F]) -> Result<ArrayData> {
    match op.kind() {
        OutputKind::Int8 => {
            let p = predicate::<F>(op).ok_or_else(|| op.unsupported(F::DTYPE))?;
            Ok(ArrayData::Int8(zip_map(a, b, |x, y| i8::from(p(x, y)))))
        }
        OutputKind::RealToComplex => Ok(F::wrap_complex(zip_map(a, b, Complex::new))),
        OutputKind::Same | OutputKind::ComplexToReal => {
            let f = real_fn::<F>(op).ok_or_else(|| op.unsupported(F::DTYPE))?;
            Ok(F::wrap(zip_map(a, b, f)))
        }
    }
}

fn complex_kernel<F: RealElement>(
    op: BinaryOp,
    a: &[Complex<F>],
    b: &[Complex<F>],
    dtype: DType,
) -> Result<ArrayData> {
    let f = complex_fn::<F>(op).ok_or_else(|| op.unsupported(dtype))?;
    Ok(F::wrap_complex(zip_map(a, b, f)))
}

fn int_kernel<T: IntElement>(op: BinaryOp, a: &[T], b: &[T]) -> Result<ArrayData> {
    if op.kind() == OutputKind::Int8 {
        let p = predicate::<T>(op).ok_or_else(|| op.unsupported(T::DTYPE))?;
        return Ok(ArrayData::Int8(zip_map(a, b, |x, y| i8::from(p(x, y)))));
    }
    if op.rejects_zero_divisor() && b.contains(&T::zero()) {
        return Err(zero_divisor());
    }
    // negative or over-wide amounts shift every bit out
    let shift = |s: T| s.to_u32().unwrap_or(u32::MAX);
    let sign_fill = |x: T| if x < T::zero() { !T::zero() } else { T::zero() };
    let out: Vec<T> = match op {
        BinaryOp::Add => zip_map(a, b, |x: T, y: T| x.wrapping_add(&y)),
        BinaryOp::Sub => zip_map(a, b, |x: T, y: T| x.wrapping_sub(&y)),
        BinaryOp::Mul => zip_map(a, b, |x: T, y: T| x.wrapping_mul(&y)),
        // only MIN / -1 overflows, and wraps back to MIN
        BinaryOp::Div => zip_map(a, b, |x: T, y: T| x.checked_div(&y).unwrap_or(x)),
        BinaryOp::Rem => zip_map(a, b, |x: T, y: T| x.checked_rem(&y).unwrap_or_else(T::zero)),
        BinaryOp::Min => zip_map(a, b, |x: T, y: T| x.min(y)),
        BinaryOp::Max => zip_map(a, b, |x: T, y: T| x.max(y)),
        BinaryOp::BitAnd => zip_map(a, b, |x: T, y: T| x & y),
        BinaryOp::BitOr => zip_map(a, b, |x: T, y: T| x | y),
        BinaryOp::BitXor => zip_map(a, b, |x: T, y: T| x ^ y),
        BinaryOp::ShiftLeft => zip_map(a, b, |x: T, y: T| x.checked_shl(shift(y)).unwrap_or_else(T::zero)),
        BinaryOp::ShiftRight => zip_map(a, b, |x: T, y: T| x.checked_shr(shift(y)).unwrap_or_else(|| sign_fill(x))),
        _ => return Err(op.unsupported(T::DTYPE)),
    };
    Ok(T::wrap(out))
}

/// Applies `op` element-wise on the CPU.
///
/// # Errors
/// - operands of different type, length or device
/// - `op` does not accept the element type
/// - integer division by zero
pub fn binary(op: BinaryOp, a: &Array, b: &Array) -> Result<Array> {
    let device = common_device(&[a, b])?;
    let dtype = a.dtype();
    if b.dtype() != dtype {
        return Err(BlockError::invalid(format!(
            "{} operands differ in type: {dtype} and {}",
            op.name(),
            b.dtype()
        )));
    }
    if b.elements() != a.elements() && b.elements() != 1 {
        return Err(BlockError::invalid(format!(
            "{} operands differ in length: {} and {}",
            op.name(),
            a.elements(),
            b.elements()
        )));
    }
    if !op.support().supports(dtype) && dtype != DType::Int8 {
        return Err(op.unsupported(dtype));
    }
    if a.elements() == 0 {
        return Array::new(ArrayData::zeros(op.output_dtype(dtype), 0), a.dims().to_vec(), device);
    }

    let data = match (a.data(), b.data()) {
        (ArrayData::Float32(x), ArrayData::Float32(y)) => real_kernel(op, x, y)?,
        (ArrayData::Float64(x), ArrayData::Float64(y)) => real_kernel(op, x, y)?,
        (ArrayData::ComplexFloat32(x), ArrayData::ComplexFloat32(y)) => complex_kernel(op, x, y, dtype)?,
        (ArrayData::ComplexFloat64(x), ArrayData::ComplexFloat64(y)) => complex_kernel(op, x, y, dtype)?,
        (ArrayData::Int8(x), ArrayData::Int8(y)) => int_kernel(op, x, y)?,
        (ArrayData::Int16(x), ArrayData::Int16(y)) => int_kernel(op, x, y)?,
        (ArrayData::Int32(x), ArrayData::Int32(y)) => int_kernel(op, x, y)?,
        (ArrayData::Int64(x), ArrayData::Int64(y)) => int_kernel(op, x, y)?,
        (ArrayData::UInt8(x), ArrayData::UInt8(y)) => int_kernel(op, x, y)?,
        (ArrayData::UInt16(x), ArrayData::UInt16(y)) => int_kernel(op, x, y)?,
        (ArrayData::UInt32(x), ArrayData::UInt32(y)) => int_kernel(op, x, y)?,
        (ArrayData::UInt64(x), ArrayData::UInt64(y)) => int_kernel(op, x, y)?,
        _ => return Err(op.unsupported(dtype)),
    };
    Array::new(data, a.dims().to_vec(), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeviceId;

    fn arr<T: crate::dtype::Element>(v: Vec<T>) -> Array {
        Array::from_vec(v, DeviceId::CPU)
    }

    #[test]
    fn comparators_emit_int8() {
        let a = arr(vec![1.0f64, 2.0, 3.0]);
        let b = arr(vec![2.0f64, 2.0, 2.0]);
        let lt = binary(BinaryOp::Lt, &a, &b).unwrap();
        assert_eq!(lt.dtype(), DType::Int8);
        assert_eq!(lt.to_vec::<i8>().unwrap(), vec![1, 0, 0]);
        let ne = binary(BinaryOp::Ne, &a, &b).unwrap();
        assert_eq!(ne.to_vec::<i8>().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn scalar_broadcast() {
        let a = arr(vec![1i32, 2, 3]);
        let s = arr(vec![10i32]);
        assert_eq!(binary(BinaryOp::Mul, &a, &s).unwrap().to_vec::<i32>().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn integer_division_by_zero() {
        let a = arr(vec![4u16, 6]);
        let b = arr(vec![2u16, 0]);
        assert!(matches!(binary(BinaryOp::Div, &a, &b), Err(BlockError::InvalidArgument(_))));
        let c = arr(vec![i8::MIN]);
        let d = arr(vec![-1i8]);
        assert_eq!(binary(BinaryOp::Div, &c, &d).unwrap().to_vec::<i8>().unwrap(), vec![i8::MIN]);
    }

    #[test]
    fn shifts_and_bits() {
        let a = arr(vec![1u32, 0b1010]);
        let b = arr(vec![3u32, 1]);
        assert_eq!(binary(BinaryOp::ShiftLeft, &a, &b).unwrap().to_vec::<u32>().unwrap(), vec![8, 20]);
        assert_eq!(binary(BinaryOp::ShiftRight, &a, &b).unwrap().to_vec::<u32>().unwrap(), vec![0, 5]);
        assert_eq!(binary(BinaryOp::BitXor, &a, &b).unwrap().to_vec::<u32>().unwrap(), vec![2, 0b1011]);
    }

    #[test]
    fn over_wide_shifts_clear_or_sign_fill() {
        let u = arr(vec![0b11u8, 0x80]);
        let wide = arr(vec![9u8, 8]);
        assert_eq!(binary(BinaryOp::ShiftLeft, &u, &wide).unwrap().to_vec::<u8>().unwrap(), vec![0, 0]);
        assert_eq!(binary(BinaryOp::ShiftRight, &u, &wide).unwrap().to_vec::<u8>().unwrap(), vec![0, 0]);

        let s = arr(vec![-8i16, 8, -8]);
        let amounts = arr(vec![16i16, 40, 2]);
        assert_eq!(binary(BinaryOp::ShiftRight, &s, &amounts).unwrap().to_vec::<i16>().unwrap(), vec![-1, 0, -2]);
        assert_eq!(binary(BinaryOp::ShiftLeft, &s, &arr(vec![-1i16])).unwrap().to_vec::<i16>().unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn combine_and_complex_math() {
        let re = arr(vec![1.0f32]);
        let im = arr(vec![-1.0f32]);
        let c = binary(BinaryOp::Combine, &re, &im).unwrap();
        assert_eq!(c.to_vec::<Complex<f32>>().unwrap(), vec![Complex::new(1.0, -1.0)]);
        let sq = binary(BinaryOp::Mul, &c, &c).unwrap();
        assert_eq!(sq.to_vec::<Complex<f32>>().unwrap(), vec![Complex::new(0.0, -2.0)]);
        assert!(binary(BinaryOp::Lt, &c, &c).is_err());
    }

    #[test]
    fn mismatched_operands() {
        assert!(binary(BinaryOp::Add, &arr(vec![1.0f64, 2.0]), &arr(vec![1.0f32, 2.0])).is_err());
        assert!(binary(BinaryOp::Add, &arr(vec![1.0f64, 2.0]), &arr(vec![1.0f64, 2.0, 3.0])).is_err());
    }
}
