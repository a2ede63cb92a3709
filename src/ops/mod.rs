//! # Numeric kernels
//!
//! Every kernel consumes and produces [`Array`]s and keeps its result on the
//! device of its operands.
//!
//! ## Submodules
//!
//! - [`unary`]: element-wise one-operand functions (trigonometry, rounding, …)
//! - [`binary`]: element-wise two-operand functions, comparators, bit shifts
//! - [`reduce`]: reductions over the channel axis and per-row statistics
//! - [`signal`]: FFT, FIR and IIR filtering
//! - [`random`]: seeded uniform and normal generators
//! - [`data`]: clamp, replace, sort, set-unique
//! - [`dispatch`]: picks a GPU kernel when one applies, otherwise the CPU one
//! - [`wgpu`] *(opt-in)*: GPU compute shader pipelines and adapter discovery
//!
//! CPU kernels parallelise with `rayon`.

pub mod binary;
pub mod data;
pub mod dispatch;
pub mod random;
pub mod reduce;
pub mod signal;
pub mod unary;
#[cfg(feature = "wgpu")]
pub mod wgpu;

use crate::array::{Array, ArrayData};
use crate::backend::DeviceId;
use crate::dtype::Element;
use crate::error::{BlockError, Result};
use num_complex::Complex;
use num_traits::{
    CheckedDiv, CheckedRem, CheckedShl, CheckedShr, Float, FloatConst, PrimInt, WrappingAdd, WrappingMul,
    WrappingSub,
};

/// Floating-point element types, with the special functions `libm` provides.
pub trait RealElement: Element + Float + FloatConst {
    fn from_double(v: f64) -> Self;
    fn to_double(self) -> f64;
    fn erf(self) -> Self;
    fn erfc(self) -> Self;
    fn tgamma(self) -> Self;
    fn lgamma(self) -> Self;
    fn wrap_complex(data: Vec<Complex<Self>>) -> ArrayData;
    fn complex_slice(data: &ArrayData) -> Option<&[Complex<Self>]>;
}

impl RealElement for f32 {
    fn from_double(v: f64) -> Self {
        v as f32
    }

    fn to_double(self) -> f64 {
        f64::from(self)
    }

    fn erf(self) -> Self {
        libm::erff(self)
    }

    fn erfc(self) -> Self {
        libm::erfcf(self)
    }

    fn tgamma(self) -> Self {
        libm::tgammaf(self)
    }

    fn lgamma(self) -> Self {
        libm::lgammaf(self)
    }

    fn wrap_complex(data: Vec<Complex<Self>>) -> ArrayData {
        ArrayData::ComplexFloat32(data)
    }

    fn complex_slice(data: &ArrayData) -> Option<&[Complex<Self>]> {
        match data {
            ArrayData::ComplexFloat32(v) => Some(v),
            _ => None,
        }
    }
}

impl RealElement for f64 {
    fn from_double(v: f64) -> Self {
        v
    }

    fn to_double(self) -> f64 {
        self
    }

    fn erf(self) -> Self {
        libm::erf(self)
    }

    fn erfc(self) -> Self {
        libm::erfc(self)
    }

    fn tgamma(self) -> Self {
        libm::tgamma(self)
    }

    fn lgamma(self) -> Self {
        libm::lgamma(self)
    }

    fn wrap_complex(data: Vec<Complex<Self>>) -> ArrayData {
        ArrayData::ComplexFloat64(data)
    }

    fn complex_slice(data: &ArrayData) -> Option<&[Complex<Self>]> {
        match data {
            ArrayData::ComplexFloat64(v) => Some(v),
            _ => None,
        }
    }
}

/// Primitive integer element types.
pub trait IntElement:
    Element
    + PrimInt
    + WrappingAdd
    + WrappingSub
    + WrappingMul
    + CheckedShl
    + CheckedShr
    + CheckedDiv
    + CheckedRem
{
}

impl<T> IntElement for T where
    T: Element
        + PrimInt
        + WrappingAdd
        + WrappingSub
        + WrappingMul
        + CheckedShl
        + CheckedShr
        + CheckedDiv
        + CheckedRem
{
}

/// The device shared by every operand.
///
/// # Errors
/// - [`BlockError::DeviceMismatch`] when operands were produced on different devices
pub fn common_device(arrays: &[&Array]) -> Result<DeviceId> {
    let Some(first) = arrays.first() else {
        return Err(BlockError::assertion("kernel called without operands"));
    };
    let device = first.device();
    if let Some(other) = arrays.iter().find(|a| a.device() != device) {
        return Err(BlockError::DeviceMismatch(format!(
            "operands live on {device} and {}",
            other.device()
        )));
    }
    Ok(device)
}

/// Float comparison used by value matching: NaN equals NaN, infinities match
/// by sign, finite values within `1e-6`.
pub fn approx_eq<F: RealElement>(a: F, b: F) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= F::from_double(1e-6)
}
