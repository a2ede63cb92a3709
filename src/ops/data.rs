//! Value-level data manipulation: clamping, replacement, sorting and
//! order statistics.

use super::{RealElement, approx_eq};
use crate::array::{Array, ArrayData};
use crate::dtype::Element;
use crate::error::{BlockError, Result};
use crate::value::Value;
use core::cmp::Ordering;
use num_complex::Complex;
use rayon::prelude::*;

/// Evaluates `$body` for every real variant; complex input is an error.
macro_rules! real_only {
    ($data:expr, $what:literal, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Int8($v) => Ok($body),
            ArrayData::Int16($v) => Ok($body),
            ArrayData::Int32($v) => Ok($body),
            ArrayData::Int64($v) => Ok($body),
            ArrayData::UInt8($v) => Ok($body),
            ArrayData::UInt16($v) => Ok($body),
            ArrayData::UInt32($v) => Ok($body),
            ArrayData::UInt64($v) => Ok($body),
            ArrayData::Float32($v) => Ok($body),
            ArrayData::Float64($v) => Ok($body),
            other => Err(BlockError::invalid(format!("{} does not support {}", $what, other.dtype()))),
        }
    };
}

fn clamp_slice<T: Element + PartialOrd>(v: &[T], lo: &Value, hi: &Value) -> Result<ArrayData> {
    let lo = T::from_value(lo)?;
    let hi = T::from_value(hi)?;
    Ok(T::wrap(
        v.par_iter()
            .map(|&x| if x < lo { lo } else if x > hi { hi } else { x })
            .collect(),
    ))
}

/// Limits every element to `[lo, hi]`.
///
/// # Errors
/// - complex input
/// - bounds not representable in the array's type
pub fn clamp(input: &Array, lo: &Value, hi: &Value) -> Result<Array> {
    let data = real_only!(input.data(), "clamp", v => clamp_slice(v, lo, hi)?)?;
    input.with_data(data)
}

fn replace_exact<T: Element>(v: &[T], find: &Value, with: &Value) -> Result<ArrayData> {
    let find = T::from_value(find)?;
    let with = T::from_value(with)?;
    Ok(T::wrap(v.par_iter().map(|&x| if x == find { with } else { x }).collect()))
}

fn replace_float<F: RealElement>(v: &[F], find: &Value, with: &Value) -> Result<ArrayData> {
    let find = F::from_value(find)?;
    let with = F::from_value(with)?;
    Ok(F::wrap(v.par_iter().map(|&x| if approx_eq(x, find) { with } else { x }).collect()))
}

fn replace_complex<F: RealElement>(v: &[Complex<F>], find: &Value, with: &Value) -> Result<ArrayData>
where
    Complex<F>: Element,
{
    let find = <Complex<F> as Element>::from_value(find)?;
    let with = <Complex<F> as Element>::from_value(with)?;
    Ok(F::wrap_complex(
        v.par_iter()
            .map(|&x| if approx_eq(x.re, find.re) && approx_eq(x.im, find.im) { with } else { x })
            .collect(),
    ))
}

/// Substitutes `with` for every element equal to `find`.
///
/// Integers match exactly; floats and complex parts match within `1e-6`,
/// with NaN matching NaN.
pub fn replace(input: &Array, find: &Value, with: &Value) -> Result<Array> {
    let data = match input.data() {
        ArrayData::Int8(v) => replace_exact(v, find, with)?,
        ArrayData::Int16(v) => replace_exact(v, find, with)?,
        ArrayData::Int32(v) => replace_exact(v, find, with)?,
        ArrayData::Int64(v) => replace_exact(v, find, with)?,
        ArrayData::UInt8(v) => replace_exact(v, find, with)?,
        ArrayData::UInt16(v) => replace_exact(v, find, with)?,
        ArrayData::UInt32(v) => replace_exact(v, find, with)?,
        ArrayData::UInt64(v) => replace_exact(v, find, with)?,
        ArrayData::Float32(v) => replace_float(v, find, with)?,
        ArrayData::Float64(v) => replace_float(v, find, with)?,
        ArrayData::ComplexFloat32(v) => replace_complex(v, find, with)?,
        ArrayData::ComplexFloat64(v) => replace_complex(v, find, with)?,
    };
    input.with_data(data)
}

fn ordered<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

fn sort_rows<T: Element + PartialOrd>(v: &[T], cols: usize, ascending: bool) -> ArrayData {
    let mut out = v.to_vec();
    if cols > 0 {
        out.par_chunks_mut(cols).for_each(|row| {
            if ascending {
                row.sort_by(ordered);
            } else {
                row.sort_by(|a, b| ordered(b, a));
            }
        });
    }
    T::wrap(out)
}

/// Sorts each row independently.
pub fn sort(input: &Array, ascending: bool) -> Result<Array> {
    let cols = input.cols();
    let data = real_only!(input.data(), "sort", v => sort_rows(v, cols, ascending))?;
    input.with_data(data)
}

fn unique<T: Element + PartialOrd>(v: &[T]) -> ArrayData {
    let mut out = v.to_vec();
    out.sort_by(ordered);
    out.dedup();
    T::wrap(out)
}

/// The distinct values of the whole array, ascending, as a 1-D array.
pub fn set_unique(input: &Array) -> Result<Array> {
    let data = real_only!(input.data(), "set_unique", v => unique(v))?;
    Ok(Array::from_data(data, input.device()))
}

fn extremum_of<T: Element + PartialOrd>(v: &[T], largest: bool) -> Option<(Value, usize)> {
    let (&first, rest) = v.split_first()?;
    let (best, index) = rest.iter().enumerate().fold((first, 0), |(best, at), (i, &x)| {
        let better = if largest { x > best } else { x < best };
        if better { (x, i + 1) } else { (best, at) }
    });
    Some((best.to_value(), index))
}

/// The largest (or smallest) element of the whole array and its flat index.
///
/// NaN never replaces a value; it is only reported when it comes first.
/// Returns `None` for an empty array.
pub fn extremum(input: &Array, largest: bool) -> Result<Option<(Value, usize)>> {
    real_only!(input.data(), "extremum", v => extremum_of(v, largest))
}

fn top<T: Element + PartialOrd>(v: &[T], k: usize, largest: bool) -> Vec<Value> {
    let mut sorted = v.to_vec();
    if largest {
        sorted.sort_by(|a, b| ordered(b, a));
    } else {
        sorted.sort_by(ordered);
    }
    sorted.into_iter().take(k).map(Element::to_value).collect()
}

/// The `k` largest (or smallest) elements of the whole array, best first.
pub fn top_k(input: &Array, k: usize, largest: bool) -> Result<Vec<Value>> {
    real_only!(input.data(), "top_k", v => top(v, k, largest))
}
