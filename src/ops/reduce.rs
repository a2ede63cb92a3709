//! Reductions over the channel axis and per-row statistics.

use super::{IntElement, RealElement};
use crate::array::{Array, ArrayData};
use crate::dtype::{DType, DTypeSupport};
use crate::error::{BlockError, Result};
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;

/// A true reduction across the rows of a `[rows, cols]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Sum,
    Product,
    /// 1 where every row is nonzero.
    AllTrue,
    /// 1 where any row is nonzero.
    AnyTrue,
}

impl Reduction {
    pub fn support(self) -> DTypeSupport {
        match self {
            Reduction::Sum | Reduction::Product => DTypeSupport::ALL,
            Reduction::AllTrue | Reduction::AnyTrue => DTypeSupport::REAL,
        }
    }

    pub fn output_dtype(self, input: DType) -> DType {
        match self {
            Reduction::Sum | Reduction::Product => input,
            Reduction::AllTrue | Reduction::AnyTrue => DType::Int8,
        }
    }
}

fn column_fold<T, R, G>(data: &[T], rows: usize, cols: usize, init: R, f: G) -> Vec<R>
where
    T: Copy + Sync,
    R: Copy + Send + Sync,
    G: Fn(R, T) -> R + Sync + Send,
{
    (0..cols)
        .into_par_iter()
        .map(|c| (0..rows).fold(init, |acc, r| f(acc, data[r * cols + c])))
        .collect()
}

fn truth<T: Copy + Sync + Zero>(r: Reduction, data: &[T], rows: usize, cols: usize) -> Vec<i8> {
    match r {
        Reduction::AllTrue => column_fold(data, rows, cols, 1i8, |acc, x: T| acc & i8::from(!x.is_zero())),
        _ => column_fold(data, rows, cols, 0i8, |acc, x: T| acc | i8::from(!x.is_zero())),
    }
}

fn reduce_real<F: RealElement>(r: Reduction, v: &[F], rows: usize, cols: usize) -> ArrayData {
    match r {
        Reduction::Sum => F::wrap(column_fold(v, rows, cols, F::zero(), |a, x| a + x)),
        Reduction::Product => F::wrap(column_fold(v, rows, cols, F::one(), |a, x| a * x)),
        _ => ArrayData::Int8(truth(r, v, rows, cols)),
    }
}

fn reduce_int<T: IntElement>(r: Reduction, v: &[T], rows: usize, cols: usize) -> ArrayData {
    match r {
        Reduction::Sum => T::wrap(column_fold(v, rows, cols, T::zero(), |a: T, x: T| a.wrapping_add(&x))),
        Reduction::Product => T::wrap(column_fold(v, rows, cols, T::one(), |a: T, x: T| a.wrapping_mul(&x))),
        _ => ArrayData::Int8(truth(r, v, rows, cols)),
    }
}

fn reduce_complex<F: RealElement>(r: Reduction, v: &[Complex<F>], rows: usize, cols: usize) -> Result<ArrayData> {
    match r {
        Reduction::Sum => Ok(F::wrap_complex(column_fold(v, rows, cols, Complex::zero(), |a, x| a + x))),
        Reduction::Product => Ok(F::wrap_complex(column_fold(
            v,
            rows,
            cols,
            Complex::new(F::one(), F::zero()),
            |a, x| a * x,
        ))),
        _ => Err(BlockError::invalid("logical reductions do not support complex types")),
    }
}

/// Reduces a `[rows, cols]` array to a 1-D array of `cols` elements.
///
/// A 1-D input is a single row and reduces to itself (or its truth values).
pub fn reduce_rows(r: Reduction, input: &Array) -> Result<Array> {
    let rows = input.rows();
    let cols = input.cols();
    let data = match input.data() {
        ArrayData::Float32(v) => reduce_real(r, v, rows, cols),
        ArrayData::Float64(v) => reduce_real(r, v, rows, cols),
        ArrayData::ComplexFloat32(v) => reduce_complex(r, v, rows, cols)?,
        ArrayData::ComplexFloat64(v) => reduce_complex(r, v, rows, cols)?,
        ArrayData::Int8(v) => reduce_int(r, v, rows, cols),
        ArrayData::Int16(v) => reduce_int(r, v, rows, cols),
        ArrayData::Int32(v) => reduce_int(r, v, rows, cols),
        ArrayData::Int64(v) => reduce_int(r, v, rows, cols),
        ArrayData::UInt8(v) => reduce_int(r, v, rows, cols),
        ArrayData::UInt16(v) => reduce_int(r, v, rows, cols),
        ArrayData::UInt32(v) => reduce_int(r, v, rows, cols),
        ArrayData::UInt64(v) => reduce_int(r, v, rows, cols),
    };
    Ok(Array::from_data(data, input.device()))
}

/// Per-row summary statistics over float arrays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Mean,
    Var { biased: bool },
    Stdev,
    Median,
    MedAbsDev,
}

impl Statistic {
    /// Label identifier posted by statistics blocks.
    pub fn label(self) -> &'static str {
        match self {
            Statistic::Mean => "MEAN",
            Statistic::Var { .. } => "VAR",
            Statistic::Stdev => "STDDEV",
            Statistic::Median => "MEDIAN",
            Statistic::MedAbsDev => "MEDABSDEV",
        }
    }
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 }
}

fn variance(v: &[f64], biased: bool) -> f64 {
    let n = v.len();
    if n == 0 || (!biased && n < 2) {
        return 0.0;
    }
    let m = mean(v);
    let ss: f64 = v.iter().map(|x| (x - m) * (x - m)).sum();
    ss / if biased { n as f64 } else { (n - 1) as f64 }
}

fn median(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let mut sorted = v.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] }
}

/// Computes `stat` over one slice of values.
pub fn statistic(stat: Statistic, v: &[f64]) -> f64 {
    match stat {
        Statistic::Mean => mean(v),
        Statistic::Var { biased } => variance(v, biased),
        Statistic::Stdev => variance(v, true).sqrt(),
        Statistic::Median => median(v),
        Statistic::MedAbsDev => {
            let m = median(v);
            let dev: Vec<f64> = v.iter().map(|x| (x - m).abs()).collect();
            median(&dev)
        }
    }
}

fn centred_products(x: &[f64], y: &[f64]) -> f64 {
    let (mx, my) = (mean(x), mean(y));
    x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum()
}

/// Covariance of two equal-length series; `biased` divides by `N`,
/// otherwise by `N - 1`.
pub fn covariance(x: &[f64], y: &[f64], biased: bool) -> Result<f64> {
    if x.len() != y.len() {
        return Err(BlockError::invalid(format!("series lengths differ: {} and {}", x.len(), y.len())));
    }
    let n = x.len();
    if n == 0 || (!biased && n < 2) {
        return Ok(0.0);
    }
    Ok(centred_products(x, y) / if biased { n as f64 } else { (n - 1) as f64 })
}

/// Pearson correlation coefficient. A constant series gives NaN.
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(BlockError::invalid(format!("series lengths differ: {} and {}", x.len(), y.len())));
    }
    if x.is_empty() {
        return Ok(f64::NAN);
    }
    let denom = (centred_products(x, x) * centred_products(y, y)).sqrt();
    Ok(if denom == 0.0 { f64::NAN } else { centred_products(x, y) / denom })
}

/// Copies a real array's elements out as `f64`.
pub fn as_f64_vec(input: &Array) -> Result<Vec<f64>> {
    if input.dtype().is_complex() {
        return Err(BlockError::invalid(format!("expected real input, got {}", input.dtype())));
    }
    input.cast(DType::Float64).to_vec::<f64>()
}

fn rows_as_f64<F: RealElement>(v: &[F], rows: usize, cols: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|r| v[r * cols..(r + 1) * cols].iter().map(|&x| x.to_double()).collect())
        .collect()
}

/// Computes `stat` independently for each row of a float array.
pub fn row_statistics(stat: Statistic, input: &Array) -> Result<Vec<f64>> {
    let rows = input.rows();
    let cols = input.cols();
    let per_row = match input.data() {
        ArrayData::Float32(v) => rows_as_f64(v, rows, cols),
        ArrayData::Float64(v) => rows_as_f64(v, rows, cols),
        other => {
            return Err(BlockError::invalid(format!(
                "statistics require float input, got {}",
                other.dtype()
            )));
        }
    };
    Ok(per_row.par_iter().map(|row| statistic(stat, row)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeviceId;

    #[test]
    fn sums_down_columns() {
        let a = Array::from_rows(vec![vec![1i32, 2, 3], vec![10, 20, 30]], DeviceId::CPU).unwrap();
        let s = reduce_rows(Reduction::Sum, &a).unwrap();
        assert_eq!(s.to_vec::<i32>().unwrap(), vec![11, 22, 33]);
        let p = reduce_rows(Reduction::Product, &a).unwrap();
        assert_eq!(p.to_vec::<i32>().unwrap(), vec![10, 40, 90]);
    }

    #[test]
    fn logical_reductions() {
        let a = Array::from_rows(vec![vec![1.0f64, 0.0, 1.0], vec![1.0, 0.0, 0.0]], DeviceId::CPU).unwrap();
        let all = reduce_rows(Reduction::AllTrue, &a).unwrap();
        assert_eq!(all.to_vec::<i8>().unwrap(), vec![1, 0, 0]);
        let any = reduce_rows(Reduction::AnyTrue, &a).unwrap();
        assert_eq!(any.to_vec::<i8>().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn statistics() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(statistic(Statistic::Mean, &v), 5.0);
        assert_eq!(statistic(Statistic::Var { biased: true }, &v), 4.0);
        assert!((statistic(Statistic::Var { biased: false }, &v) - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(statistic(Statistic::Stdev, &v), 2.0);
        assert_eq!(statistic(Statistic::Median, &v), 4.5);
        assert_eq!(statistic(Statistic::MedAbsDev, &[1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0]), 1.0);
    }

    #[test]
    fn paired_statistics() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_eq!(covariance(&x, &y, true).unwrap(), 2.5);
        assert!((covariance(&x, &y, false).unwrap() - 10.0 / 3.0).abs() < 1e-12);
        assert!((correlation(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let down = [4.0, 3.0, 2.0, 1.0];
        assert!((correlation(&x, &down).unwrap() + 1.0).abs() < 1e-12);
        assert!(correlation(&x, &[1.0; 4]).unwrap().is_nan());
        assert!(covariance(&x, &y[..3], true).is_err());
    }

    #[test]
    fn statistics_per_row() {
        let a = Array::from_rows(vec![vec![1.0f32, 3.0], vec![10.0, 20.0]], DeviceId::CPU).unwrap();
        assert_eq!(row_statistics(Statistic::Mean, &a).unwrap(), vec![2.0, 15.0]);
        let ints = Array::from_vec(vec![1i32], DeviceId::CPU);
        assert!(row_statistics(Statistic::Mean, &ints).is_err());
    }
}
