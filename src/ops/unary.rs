//! Element-wise one-operand kernels.
//!
//! The operation set is declared once in the table at the bottom of the
//! `unary_ops!` invocation: variant, registration name, block category,
//! accepted element types, and how the output type relates to the input.
//! The registry walks [`UnaryOp::ALL`] to emit one block factory per entry.

use super::{IntElement, RealElement};
use crate::array::{Array, ArrayData};
use crate::dtype::{DType, DTypeSupport};
use crate::error::{BlockError, Result};
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;

/// How an operation's output type follows from its input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Output type equals input type.
    Same,
    /// Complex inputs produce their real type; real inputs are unchanged.
    ComplexToReal,
    /// Real inputs produce the complex type of matching precision.
    RealToComplex,
    /// Boolean result stored as `int8` 0/1.
    Int8,
}

impl OutputKind {
    pub fn output_dtype(self, input: DType) -> DType {
        match self {
            OutputKind::Same => input,
            OutputKind::ComplexToReal => input.to_real(),
            OutputKind::RealToComplex => input.to_complex(),
            OutputKind::Int8 => DType::Int8,
        }
    }
}

const FC: DTypeSupport = DTypeSupport {
    int: false,
    uint: false,
    float: true,
    complex: true,
};

macro_rules! unary_ops {
    ($($variant:ident => $name:literal, $category:literal, $support:expr, $kind:ident;)*) => {
        /// Element-wise one-operand operations.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum UnaryOp {
            $($variant,)*
        }

        impl UnaryOp {
            pub const ALL: &'static [UnaryOp] = &[$(UnaryOp::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(UnaryOp::$variant => $name,)*
                }
            }

            pub fn category(self) -> &'static str {
                match self {
                    $(UnaryOp::$variant => $category,)*
                }
            }

            pub fn support(self) -> DTypeSupport {
                match self {
                    $(UnaryOp::$variant => $support,)*
                }
            }

            pub fn kind(self) -> OutputKind {
                match self {
                    $(UnaryOp::$variant => OutputKind::$kind,)*
                }
            }
        }
    };
}

unary_ops! {
    Abs => "abs", "arith", DTypeSupport::ALL, ComplexToReal;
    Acos => "acos", "arith", FC, Same;
    Acosh => "acosh", "arith", FC, Same;
    Acot => "acot", "arith", FC, Same;
    Acoth => "acoth", "arith", FC, Same;
    Acsc => "acsc", "arith", FC, Same;
    Acsch => "acsch", "arith", FC, Same;
    Arg => "arg", "arith", DTypeSupport::COMPLEX, ComplexToReal;
    Asec => "asec", "arith", FC, Same;
    Asech => "asech", "arith", FC, Same;
    Asin => "asin", "arith", FC, Same;
    Asinh => "asinh", "arith", FC, Same;
    Atan => "atan", "arith", FC, Same;
    Atanh => "atanh", "arith", FC, Same;
    BitwiseNot => "bitwise_not", "array", DTypeSupport::INTEGER, Same;
    Cbrt => "cbrt", "arith", DTypeSupport::FLOAT, Same;
    Ceil => "ceil", "arith", DTypeSupport::FLOAT, Same;
    Conjg => "conjg", "arith", DTypeSupport::COMPLEX, Same;
    Cos => "cos", "arith", FC, Same;
    Cosh => "cosh", "arith", FC, Same;
    Cot => "cot", "arith", FC, Same;
    Coth => "coth", "arith", FC, Same;
    Csc => "csc", "arith", FC, Same;
    Csch => "csch", "arith", FC, Same;
    Erf => "erf", "arith", DTypeSupport::FLOAT, Same;
    Erfc => "erfc", "arith", DTypeSupport::FLOAT, Same;
    Exp => "exp", "arith", FC, Same;
    Expm1 => "expm1", "arith", DTypeSupport::FLOAT, Same;
    Factorial => "factorial", "arith", DTypeSupport::FLOAT, Same;
    Floor => "floor", "arith", DTypeSupport::FLOAT, Same;
    Imag => "imag", "arith", DTypeSupport::COMPLEX, ComplexToReal;
    IsInf => "isinf", "arith", DTypeSupport::FLOAT, Int8;
    IsNan => "isnan", "arith", DTypeSupport::FLOAT, Int8;
    IsZero => "iszero", "arith", DTypeSupport::ALL, Int8;
    Lgamma => "lgamma", "arith", DTypeSupport::FLOAT, Same;
    Log => "log", "arith", FC, Same;
    Log10 => "log10", "arith", DTypeSupport::FLOAT, Same;
    Log1p => "log1p", "arith", DTypeSupport::FLOAT, Same;
    Log2 => "log2", "arith", DTypeSupport::FLOAT, Same;
    Real => "real", "arith", DTypeSupport::COMPLEX, ComplexToReal;
    Round => "round", "arith", DTypeSupport::FLOAT, Same;
    Rsqrt => "rsqrt", "arith", DTypeSupport::FLOAT, Same;
    Sec => "sec", "arith", FC, Same;
    Sech => "sech", "arith", FC, Same;
    Sigmoid => "sigmoid", "arith", DTypeSupport::FLOAT, Same;
    Sign => "sign", "arith", DTypeSupport::FLOAT, Same;
    Sin => "sin", "arith", FC, Same;
    Sinc => "sinc", "signal", DTypeSupport::FLOAT, Same;
    Sinh => "sinh", "arith", FC, Same;
    Sqrt => "sqrt", "arith", FC, Same;
    Tan => "tan", "arith", FC, Same;
    Tanh => "tanh", "arith", FC, Same;
    Tgamma => "tgamma", "arith", DTypeSupport::FLOAT, Same;
    ToComplex => "complex", "arith", DTypeSupport::FLOAT, RealToComplex;
    Trunc => "trunc", "arith", DTypeSupport::FLOAT, Same;
}

impl UnaryOp {
    /// Output element type for a given input type.
    pub fn output_dtype(self, input: DType) -> DType {
        self.kind().output_dtype(input)
    }

    /// Looks an operation up by its registration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    fn unsupported(self, dtype: DType) -> BlockError {
        BlockError::invalid(format!("{} does not support {dtype}", self.name()))
    }
}

fn real_fn<F: RealElement>(op: UnaryOp) -> Option<fn(F) -> F> {
    let f: fn(F) -> F = match op {
        UnaryOp::Abs => |x: F| x.abs(),
        UnaryOp::Acos => |x: F| x.acos(),
        UnaryOp::Acosh => |x: F| x.acosh(),
        UnaryOp::Acot => |x: F| x.recip().atan(),
        UnaryOp::Acoth => |x: F| x.recip().atanh(),
        UnaryOp::Acsc => |x: F| x.recip().asin(),
        UnaryOp::Acsch => |x: F| x.recip().asinh(),
        UnaryOp::Arg => |x: F| if x < F::zero() { F::PI() } else { F::zero() },
        UnaryOp::Asec => |x: F| x.recip().acos(),
        UnaryOp::Asech => |x: F| x.recip().acosh(),
        UnaryOp::Asin => |x: F| x.asin(),
        UnaryOp::Asinh => |x: F| x.asinh(),
        UnaryOp::Atan => |x: F| x.atan(),
        UnaryOp::Atanh => |x: F| x.atanh(),
        UnaryOp::Cbrt => |x: F| x.cbrt(),
        UnaryOp::Ceil => |x: F| x.ceil(),
        UnaryOp::Conjg | UnaryOp::Real => |x: F| x,
        UnaryOp::Cos => |x: F| x.cos(),
        UnaryOp::Cosh => |x: F| x.cosh(),
        UnaryOp::Cot => |x: F| x.tan().recip(),
        UnaryOp::Coth => |x: F| x.tanh().recip(),
        UnaryOp::Csc => |x: F| x.sin().recip(),
        UnaryOp::Csch => |x: F| x.sinh().recip(),
        UnaryOp::Erf => |x: F| x.erf(),
        UnaryOp::Erfc => |x: F| x.erfc(),
        UnaryOp::Exp => |x: F| x.exp(),
        UnaryOp::Expm1 => |x: F| x.exp_m1(),
        UnaryOp::Factorial => |x: F| (x + F::one()).tgamma(),
        UnaryOp::Floor => |x: F| x.floor(),
        UnaryOp::Imag => |_: F| F::zero(),
        UnaryOp::Lgamma => |x: F| x.lgamma(),
        UnaryOp::Log => |x: F| x.ln(),
        UnaryOp::Log10 => |x: F| x.log10(),
        UnaryOp::Log1p => |x: F| x.ln_1p(),
        UnaryOp::Log2 => |x: F| x.log2(),
        UnaryOp::Round => |x: F| x.round(),
        UnaryOp::Rsqrt => |x: F| x.sqrt().recip(),
        UnaryOp::Sec => |x: F| x.cos().recip(),
        UnaryOp::Sech => |x: F| x.cosh().recip(),
        UnaryOp::Sigmoid => |x: F| (F::one() + (-x).exp()).recip(),
        // 1 for negative inputs, 0 otherwise
        UnaryOp::Sign => |x: F| if x < F::zero() { F::one() } else { F::zero() },
        UnaryOp::Sin => |x: F| x.sin(),
        UnaryOp::Sinc => |x: F| {
            if x == F::zero() {
                F::one()
            } else {
                let px = x * F::PI();
                px.sin() / px
            }
        },
        UnaryOp::Sinh => |x: F| x.sinh(),
        UnaryOp::Sqrt => |x: F| x.sqrt(),
        UnaryOp::Tan => |x: F| x.tan(),
        UnaryOp::Tanh => |x: F| x.tanh(),
        UnaryOp::Tgamma => |x: F| x.tgamma(),
        UnaryOp::Trunc => |x: F| x.trunc(),
        UnaryOp::BitwiseNot
        | UnaryOp::IsInf
        | UnaryOp::IsNan
        | UnaryOp::IsZero
        | UnaryOp::ToComplex => return None,
    };
    Some(f)
}

fn complex_fn<F: RealElement>(op: UnaryOp) -> Option<fn(Complex<F>) -> Complex<F>> {
    let f: fn(Complex<F>) -> Complex<F> = match op {
        UnaryOp::Acos => |z: Complex<F>| z.acos(),
        UnaryOp::Acosh => |z: Complex<F>| z.acosh(),
        UnaryOp::Acot => |z: Complex<F>| z.inv().atan(),
        UnaryOp::Acoth => |z: Complex<F>| z.inv().atanh(),
        UnaryOp::Acsc => |z: Complex<F>| z.inv().asin(),
        UnaryOp::Acsch => |z: Complex<F>| z.inv().asinh(),
        UnaryOp::Asec => |z: Complex<F>| z.inv().acos(),
        UnaryOp::Asech => |z: Complex<F>| z.inv().acosh(),
        UnaryOp::Asin => |z: Complex<F>| z.asin(),
        UnaryOp::Asinh => |z: Complex<F>| z.asinh(),
        UnaryOp::Atan => |z: Complex<F>| z.atan(),
        UnaryOp::Atanh => |z: Complex<F>| z.atanh(),
        UnaryOp::Conjg => |z: Complex<F>| z.conj(),
        UnaryOp::Cos => |z: Complex<F>| z.cos(),
        UnaryOp::Cosh => |z: Complex<F>| z.cosh(),
        UnaryOp::Cot => |z: Complex<F>| z.tan().inv(),
        UnaryOp::Coth => |z: Complex<F>| z.tanh().inv(),
        UnaryOp::Csc => |z: Complex<F>| z.sin().inv(),
        UnaryOp::Csch => |z: Complex<F>| z.sinh().inv(),
        UnaryOp::Exp => |z: Complex<F>| z.exp(),
        UnaryOp::Log => |z: Complex<F>| z.ln(),
        UnaryOp::Sec => |z: Complex<F>| z.cos().inv(),
        UnaryOp::Sech => |z: Complex<F>| z.cosh().inv(),
        UnaryOp::Sin => |z: Complex<F>| z.sin(),
        UnaryOp::Sinh => |z: Complex<F>| z.sinh(),
        UnaryOp::Sqrt => |z: Complex<F>| z.sqrt(),
        UnaryOp::Tan => |z: Complex<F>| z.tan(),
        UnaryOp::Tanh => |z: Complex<F>| z.tanh(),
        _ => return None,
    };
    Some(f)
}

fn complex_to_real_fn<F: RealElement>(op: UnaryOp) -> Option<fn(Complex<F>) -> F> {
    let f: fn(Complex<F>) -> F = match op {
        UnaryOp::Abs => |z: Complex<F>| z.norm(),
        UnaryOp::Arg => |z: Complex<F>| z.arg(),
        UnaryOp::Real => |z: Complex<F>| z.re,
        UnaryOp::Imag => |z: Complex<F>| z.im,
        _ => return None,
    };
    Some(f)
}

fn real_kernel<F: RealElement>(op: UnaryOp, v: &[F]) -> Result<ArrayData> {
    match op.kind() {
        OutputKind::Int8 => {
            let pred: fn(F) -> bool = match op {
                UnaryOp::IsInf => |x: F| x.is_infinite(),
                UnaryOp::IsNan => |x: F| x.is_nan(),
                UnaryOp::IsZero => |x: F| x == F::zero(),
                _ => return Err(op.unsupported(F::DTYPE)),
            };
            Ok(ArrayData::Int8(v.par_iter().map(|&x| i8::from(pred(x))).collect()))
        }
        OutputKind::RealToComplex => Ok(F::wrap_complex(
            v.par_iter().map(|&x| Complex::new(x, F::zero())).collect(),
        )),
        OutputKind::Same | OutputKind::ComplexToReal => {
            let f = real_fn::<F>(op).ok_or_else(|| op.unsupported(F::DTYPE))?;
            Ok(F::wrap(v.par_iter().map(|&x| f(x)).collect()))
        }
    }
}

fn complex_kernel<F: RealElement>(op: UnaryOp, v: &[Complex<F>], dtype: DType) -> Result<ArrayData> {
    match op.kind() {
        OutputKind::Int8 if op == UnaryOp::IsZero => {
            Ok(ArrayData::Int8(v.par_iter().map(|z| i8::from(z.is_zero())).collect()))
        }
        OutputKind::ComplexToReal => {
            let f = complex_to_real_fn::<F>(op).ok_or_else(|| op.unsupported(dtype))?;
            Ok(F::wrap(v.par_iter().map(|&z| f(z)).collect()))
        }
        OutputKind::Same => {
            let f = complex_fn::<F>(op).ok_or_else(|| op.unsupported(dtype))?;
            Ok(F::wrap_complex(v.par_iter().map(|&z| f(z)).collect()))
        }
        _ => Err(op.unsupported(dtype)),
    }
}

fn int_kernel<T: IntElement>(op: UnaryOp, v: &[T]) -> Result<ArrayData> {
    match op {
        UnaryOp::Abs => Ok(T::wrap(
            v.par_iter()
                .map(|&x| if x < T::zero() { T::zero().wrapping_sub(&x) } else { x })
                .collect(),
        )),
        UnaryOp::BitwiseNot => Ok(T::wrap(v.par_iter().map(|&x| !x).collect())),
        UnaryOp::IsZero => Ok(ArrayData::Int8(
            v.par_iter().map(|&x| i8::from(x == T::zero())).collect(),
        )),
        _ => Err(op.unsupported(T::DTYPE)),
    }
}

/// Applies `op` to every element on the CPU.
///
/// # Errors
/// - [`BlockError::InvalidArgument`] if `op` does not accept the input type
pub fn unary(op: UnaryOp, input: &Array) -> Result<Array> {
    let dtype = input.dtype();
    if !op.support().supports(dtype) && dtype != DType::Int8 {
        return Err(op.unsupported(dtype));
    }
    let data = match input.data() {
        ArrayData::Float32(v) => real_kernel(op, v)?,
        ArrayData::Float64(v) => real_kernel(op, v)?,
        ArrayData::ComplexFloat32(v) => complex_kernel(op, v, dtype)?,
        ArrayData::ComplexFloat64(v) => complex_kernel(op, v, dtype)?,
        ArrayData::Int8(v) => int_kernel(op, v)?,
        ArrayData::Int16(v) => int_kernel(op, v)?,
        ArrayData::Int32(v) => int_kernel(op, v)?,
        ArrayData::Int64(v) => int_kernel(op, v)?,
        ArrayData::UInt8(v) => int_kernel(op, v)?,
        ArrayData::UInt16(v) => int_kernel(op, v)?,
        ArrayData::UInt32(v) => int_kernel(op, v)?,
        ArrayData::UInt64(v) => int_kernel(op, v)?,
    };
    input.with_data(data)
}

fn pow_real<F: RealElement>(base: f64, v: &[F]) -> ArrayData {
    if base == 2.0 {
        return F::wrap(v.par_iter().map(|&x| x.exp2()).collect());
    }
    let b = F::from_double(base);
    F::wrap(v.par_iter().map(|&x| b.powf(x)).collect())
}

/// `base` raised to every element.
///
/// # Errors
/// - [`BlockError::InvalidArgument`] for integer input
pub fn pow_base(base: f64, input: &Array) -> Result<Array> {
    let data = match input.data() {
        ArrayData::Float32(v) => pow_real(base, v),
        ArrayData::Float64(v) => pow_real(base, v),
        ArrayData::ComplexFloat32(v) => {
            let b = base as f32;
            ArrayData::ComplexFloat32(v.par_iter().map(|z| z.expf(b)).collect())
        }
        ArrayData::ComplexFloat64(v) => ArrayData::ComplexFloat64(v.par_iter().map(|z| z.expf(base)).collect()),
        other => return Err(BlockError::invalid(format!("powN does not support {}", other.dtype()))),
    };
    input.with_data(data)
}

fn log_real<F: RealElement>(base: f64, v: &[F]) -> ArrayData {
    let ln_base = F::from_double(base.ln());
    F::wrap(
        v.par_iter()
            .map(|&x| {
                if base == 2.0 {
                    x.log2()
                } else if base == 10.0 {
                    x.log10()
                } else {
                    x.ln() / ln_base
                }
            })
            .collect(),
    )
}

/// Logarithm of every element in `base`.
///
/// # Errors
/// - [`BlockError::InvalidArgument`] for a base that is not positive or is 1
/// - [`BlockError::InvalidArgument`] for non-float input
pub fn log_base(base: f64, input: &Array) -> Result<Array> {
    if base <= 0.0 || base == 1.0 || base.is_nan() {
        return Err(BlockError::invalid(format!("Invalid logarithm base: {base}")));
    }
    let data = match input.data() {
        ArrayData::Float32(v) => log_real(base, v),
        ArrayData::Float64(v) => log_real(base, v),
        other => return Err(BlockError::invalid(format!("logN does not support {}", other.dtype()))),
    };
    input.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeviceId;
    use num_complex::Complex64;

    fn run_f64(op: UnaryOp, xs: &[f64]) -> Vec<f64> {
        let a = Array::from_vec(xs.to_vec(), DeviceId::CPU);
        unary(op, &a).unwrap().to_vec::<f64>().unwrap()
    }

    #[test]
    fn table_is_consistent() {
        for &op in UnaryOp::ALL {
            assert_eq!(UnaryOp::from_name(op.name()), Some(op));
            assert!(!op.support().types().is_empty(), "{} accepts nothing", op.name());
        }
    }

    #[test]
    fn abs_of_negative_zero() {
        let out = run_f64(UnaryOp::Abs, &[-3.0, 4.0, -0.0]);
        assert_eq!(out, vec![3.0, 4.0, 0.0]);
        assert!(out[2].is_sign_positive());
    }

    #[test]
    fn reciprocal_trig() {
        let x = 0.7f64;
        let out = run_f64(UnaryOp::Sec, &[x]);
        assert!((out[0] - 1.0 / x.cos()).abs() < 1e-12);
        let out = run_f64(UnaryOp::Acot, &[x]);
        assert!((out[0] - (1.0 / x).atan()).abs() < 1e-12);
    }

    #[test]
    fn sign_marks_negatives() {
        assert_eq!(run_f64(UnaryOp::Sign, &[-2.0, 0.0, 5.0]), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn special_functions() {
        let out = run_f64(UnaryOp::Factorial, &[4.0]);
        assert!((out[0] - 24.0).abs() < 1e-9);
        let out = run_f64(UnaryOp::Sinc, &[0.0, 1.0]);
        assert_eq!(out[0], 1.0);
        assert!(out[1].abs() < 1e-12);
    }

    #[test]
    fn predicates_are_int8() {
        let a = Array::from_vec(vec![f32::NAN, 1.0, f32::INFINITY], DeviceId::CPU);
        let out = unary(UnaryOp::IsNan, &a).unwrap();
        assert_eq!(out.to_vec::<i8>().unwrap(), vec![1, 0, 0]);
        let out = unary(UnaryOp::IsInf, &a).unwrap();
        assert_eq!(out.to_vec::<i8>().unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn complex_to_real() {
        let a = Array::from_vec(vec![Complex64::new(3.0, 4.0)], DeviceId::CPU);
        assert_eq!(unary(UnaryOp::Abs, &a).unwrap().to_vec::<f64>().unwrap(), vec![5.0]);
        assert_eq!(unary(UnaryOp::Imag, &a).unwrap().to_vec::<f64>().unwrap(), vec![4.0]);
        let conj = unary(UnaryOp::Conjg, &a).unwrap();
        assert_eq!(conj.to_vec::<Complex64>().unwrap(), vec![Complex64::new(3.0, -4.0)]);
    }

    #[test]
    fn integer_ops() {
        let a = Array::from_vec(vec![-5i16, 0, i16::MIN], DeviceId::CPU);
        assert_eq!(unary(UnaryOp::Abs, &a).unwrap().to_vec::<i16>().unwrap(), vec![5, 0, i16::MIN]);
        let b = Array::from_vec(vec![0u8, 0xF0], DeviceId::CPU);
        assert_eq!(unary(UnaryOp::BitwiseNot, &b).unwrap().to_vec::<u8>().unwrap(), vec![0xFF, 0x0F]);
        assert!(unary(UnaryOp::Sin, &b).is_err());
    }

    #[test]
    fn arbitrary_bases() {
        assert_eq!(run_pow(2.0, &[3.0, -1.0]), vec![8.0, 0.5]);
        let tens = run_pow(10.0, &[2.0]);
        assert!((tens[0] - 100.0).abs() < 1e-9);
        let a = Array::from_vec(vec![8.0f64, 1000.0, 81.0], DeviceId::CPU);
        let l2 = log_base(2.0, &a).unwrap().to_vec::<f64>().unwrap();
        assert_eq!(l2[0], 3.0);
        let l3 = log_base(3.0, &a).unwrap().to_vec::<f64>().unwrap();
        assert!((l3[2] - 4.0).abs() < 1e-12);
        assert!(log_base(1.0, &a).is_err());
        assert!(log_base(-2.0, &a).is_err());

        let z = Array::from_vec(vec![Complex64::new(0.0, std::f64::consts::PI / 2.0f64.ln())], DeviceId::CPU);
        let out = pow_base(2.0, &z).unwrap().to_vec::<Complex64>().unwrap();
        assert!((out[0] - Complex64::new(-1.0, 0.0)).norm() < 1e-12);
        let ints = Array::from_vec(vec![1i32], DeviceId::CPU);
        assert!(pow_base(2.0, &ints).is_err());
    }

    fn run_pow(base: f64, xs: &[f64]) -> Vec<f64> {
        pow_base(base, &Array::from_vec(xs.to_vec(), DeviceId::CPU)).unwrap().to_vec::<f64>().unwrap()
    }

    #[test]
    fn to_complex_pattern() {
        let a = Array::from_vec(vec![1.5f32], DeviceId::CPU);
        let out = unary(UnaryOp::ToComplex, &a).unwrap();
        assert_eq!(out.dtype(), DType::ComplexFloat32);
        assert_eq!(UnaryOp::ToComplex.output_dtype(DType::Float64), DType::ComplexFloat64);
    }
}
