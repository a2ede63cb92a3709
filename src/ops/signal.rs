//! FFT and linear filtering kernels.
//!
//! All kernels work row by row: a 2-D input is treated as one independent
//! signal per channel.

use super::RealElement;
use crate::array::{Array, ArrayData};
use crate::backend::DeviceId;
use crate::dtype::{DType, Element};
use crate::error::{BlockError, Result};
use core::ops::{Div, Mul, Sub};
use core::str::FromStr;
use lazy_static::lazy_static;
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftNum, FftPlanner};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type PlanCache<F> = Mutex<HashMap<(usize, bool), Arc<dyn Fft<F>>>>;

lazy_static! {
    static ref PLANS_F32: PlanCache<f32> = Mutex::new(HashMap::new());
    static ref PLANS_F64: PlanCache<f64> = Mutex::new(HashMap::new());
}

/// Float types with a process-wide FFT plan cache keyed by size and
/// direction.
pub trait FftElement: RealElement + FftNum {
    fn plans() -> &'static PlanCache<Self>;
}

impl FftElement for f32 {
    fn plans() -> &'static PlanCache<f32> {
        &PLANS_F32
    }
}

impl FftElement for f64 {
    fn plans() -> &'static PlanCache<f64> {
        &PLANS_F64
    }
}

/// The cached `n`-point plan for one direction, planned on first use.
pub fn plan<F: FftElement>(n: usize, inverse: bool) -> Result<Arc<dyn Fft<F>>> {
    let direction = if inverse { FftDirection::Inverse } else { FftDirection::Forward };
    let mut plans = F::plans()
        .lock()
        .map_err(|_| BlockError::Environment("FFT plan cache poisoned".into()))?;
    let plan = plans.entry((n, inverse)).or_insert_with(|| {
        log::debug!("planning {n}-point {direction:?} FFT");
        FftPlanner::new().plan_fft(n, direction)
    });
    Ok(Arc::clone(plan))
}

/// Runs `plan` in place over `buf`; unnormalized.
fn transform<F: FftElement>(plan: &dyn Fft<F>, mut buf: Vec<Complex<F>>) -> Vec<Complex<F>> {
    if !buf.is_empty() {
        plan.process(&mut buf);
    }
    buf
}

fn resized<T: Copy + Zero>(row: &[T], n: usize) -> Vec<T> {
    let mut out: Vec<T> = row.iter().take(n).copied().collect();
    out.resize(n, T::zero());
    out
}

fn per_row<T, R, G>(v: &[T], rows: usize, cols: usize, one_d: bool, device: DeviceId, f: G) -> Result<Array>
where
    T: Sync,
    R: Element,
    G: Fn(&[T]) -> Vec<R> + Sync + Send,
{
    let results: Vec<Vec<R>> = (0..rows)
        .into_par_iter()
        .map(|r| f(&v[r * cols..(r + 1) * cols]))
        .collect();
    if one_d {
        Ok(Array::from_vec(results.concat(), device))
    } else {
        Array::from_rows(results, device)
    }
}

fn complex_fft<F: FftElement>(input: &Array, v: &[Complex<F>], bins: usize, norm: f64, inverse: bool) -> Result<Array>
where
    Complex<F>: Element,
{
    let scale = F::from_double(norm);
    let plan = plan::<F>(bins, inverse)?;
    per_row(v, input.rows(), input.cols(), input.numdims() == 1, input.device(), |row| {
        transform(plan.as_ref(), resized(row, bins))
            .into_iter()
            .map(|z| z * scale)
            .collect()
    })
}

/// Complex-to-complex FFT of `bins` points per row, scaled by `norm`.
///
/// Rows are zero-padded or truncated to `bins` elements.
pub fn fft(input: &Array, bins: usize, norm: f64, inverse: bool) -> Result<Array> {
    if bins == 0 {
        return Err(BlockError::invalid("numBins must be positive"));
    }
    match input.data() {
        ArrayData::ComplexFloat32(v) => complex_fft(input, v, bins, norm, inverse),
        ArrayData::ComplexFloat64(v) => complex_fft(input, v, bins, norm, inverse),
        other => Err(BlockError::invalid(format!("fft requires complex input, got {}", other.dtype()))),
    }
}

fn real_fft<F: FftElement>(input: &Array, v: &[F], bins: usize, norm: f64) -> Result<Array>
where
    Complex<F>: Element,
{
    let scale = F::from_double(norm);
    let plan = plan::<F>(bins, false)?;
    per_row(v, input.rows(), input.cols(), input.numdims() == 1, input.device(), |row| {
        let signal: Vec<Complex<F>> = resized(row, bins).into_iter().map(|x| Complex::new(x, F::zero())).collect();
        transform(plan.as_ref(), signal)
            .into_iter()
            .take(bins / 2 + 1)
            .map(|z| z * scale)
            .collect()
    })
}

/// Real-to-complex FFT: `bins` real samples give `bins / 2 + 1` bins per row.
pub fn rfft(input: &Array, bins: usize, norm: f64) -> Result<Array> {
    if bins == 0 {
        return Err(BlockError::invalid("numBins must be positive"));
    }
    match input.data() {
        ArrayData::Float32(v) => real_fft(input, v, bins, norm),
        ArrayData::Float64(v) => real_fft(input, v, bins, norm),
        other => Err(BlockError::invalid(format!("rfft requires float input, got {}", other.dtype()))),
    }
}

fn real_ifft<F: FftElement>(input: &Array, v: &[Complex<F>], bins: usize, norm: f64) -> Result<Array> {
    let scale = F::from_double(norm);
    let half = bins / 2 + 1;
    let plan = plan::<F>(bins, true)?;
    per_row(v, input.rows(), input.cols(), input.numdims() == 1, input.device(), |row| {
        let given = resized(row, half);
        // rebuild the full spectrum from its Hermitian half
        let spectrum: Vec<Complex<F>> = (0..bins)
            .map(|k| if k < half { given[k] } else { given[bins - k].conj() })
            .collect();
        transform(plan.as_ref(), spectrum).into_iter().map(|z| z.re * scale).collect()
    })
}

/// Complex-to-real inverse FFT: `bins / 2 + 1` bins give `bins` real samples per row.
pub fn irfft(input: &Array, bins: usize, norm: f64) -> Result<Array> {
    if bins == 0 {
        return Err(BlockError::invalid("numBins must be positive"));
    }
    match input.data() {
        ArrayData::ComplexFloat32(v) => real_ifft(input, v, bins, norm),
        ArrayData::ComplexFloat64(v) => real_ifft(input, v, bins, norm),
        other => Err(BlockError::invalid(format!("irfft requires complex input, got {}", other.dtype()))),
    }
}

/// Output length of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvMode {
    /// As many samples as the input, centred on the full result.
    Default,
    /// The full result: `input + taps - 1` samples.
    Expand,
}

/// Where a convolution is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvDomain {
    /// Spatial for short tap sets, frequency otherwise.
    Auto,
    Spatial,
    Freq,
}

/// Tap count above which [`ConvDomain::Auto`] switches to the FFT path.
pub const AUTO_FREQ_TAPS: usize = 64;

impl ConvMode {
    pub fn name(self) -> &'static str {
        match self {
            ConvMode::Default => "Default",
            ConvMode::Expand => "Expand",
        }
    }
}

impl FromStr for ConvMode {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Default" => Ok(ConvMode::Default),
            "Expand" => Ok(ConvMode::Expand),
            other => Err(BlockError::invalid(format!("Invalid convolution mode: {other}"))),
        }
    }
}

impl ConvDomain {
    pub fn name(self) -> &'static str {
        match self {
            ConvDomain::Auto => "Auto",
            ConvDomain::Spatial => "Spatial",
            ConvDomain::Freq => "Freq",
        }
    }

    fn use_fft(self, taps: usize) -> bool {
        match self {
            ConvDomain::Auto => taps > AUTO_FREQ_TAPS,
            ConvDomain::Spatial => false,
            ConvDomain::Freq => true,
        }
    }
}

impl FromStr for ConvDomain {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Auto" => Ok(ConvDomain::Auto),
            "Spatial" => Ok(ConvDomain::Spatial),
            "Freq" => Ok(ConvDomain::Freq),
            other => Err(BlockError::invalid(format!("Invalid convolution domain: {other}"))),
        }
    }
}

fn direct_full<T, F>(taps: &[F], x: &[T]) -> Vec<T>
where
    T: Copy + Zero + Mul<F, Output = T>,
    F: Copy,
{
    if x.is_empty() {
        return Vec::new();
    }
    (0..x.len() + taps.len() - 1)
        .map(|i| {
            let lo = i.saturating_sub(x.len() - 1);
            let hi = i.min(taps.len() - 1);
            (lo..=hi).fold(T::zero(), |acc, k| acc + x[i - k] * taps[k])
        })
        .collect()
}

fn fft_full<F: FftElement>(
    h: &[Complex<F>],
    x: Vec<Complex<F>>,
    forward: &dyn Fft<F>,
    inverse: &dyn Fft<F>,
    n: usize,
) -> Vec<Complex<F>> {
    let scale = F::from_double(1.0 / n as f64);
    let product: Vec<Complex<F>> = transform(forward, resized(&x, n))
        .into_iter()
        .zip(transform(forward, resized(h, n)))
        .map(|(a, b)| a * b)
        .collect();
    transform(inverse, product).into_iter().map(|z| z * scale).collect()
}

fn trimmed<T: Copy>(full: Vec<T>, n: usize, taps: usize, mode: ConvMode) -> Vec<T> {
    match mode {
        ConvMode::Expand => full,
        ConvMode::Default if n == 0 => Vec::new(),
        ConvMode::Default => {
            let start = (taps - 1) / 2;
            full[start..start + n].to_vec()
        }
    }
}

fn convolve_rows<F, T>(
    input: &Array,
    v: &[T],
    taps: &[F],
    mode: ConvMode,
    freq: bool,
    lift: fn(T) -> Complex<F>,
    lower: fn(Complex<F>) -> T,
) -> Result<Array>
where
    F: FftElement,
    T: Element + Zero + Mul<F, Output = T>,
{
    let (rows, cols, one_d, device) = (input.rows(), input.cols(), input.numdims() == 1, input.device());
    if !freq {
        return per_row(v, rows, cols, one_d, device, |x| trimmed(direct_full(taps, x), cols, taps.len(), mode));
    }
    let n = cols + taps.len() - 1;
    let (forward, inverse) = (plan::<F>(n, false)?, plan::<F>(n, true)?);
    let h: Vec<Complex<F>> = taps.iter().map(|&t| Complex::new(t, F::zero())).collect();
    per_row(v, rows, cols, one_d, device, |x| {
        let lifted = x.iter().map(|&s| lift(s)).collect();
        let full = fft_full(&h, lifted, forward.as_ref(), inverse.as_ref(), n);
        trimmed(full.into_iter().map(lower).collect(), cols, taps.len(), mode)
    })
}

/// Convolves every row with real `taps`.
///
/// Integer inputs are convolved in `float64` and rounded back to their
/// own type.
pub fn convolve(taps: &[f64], input: &Array, mode: ConvMode, domain: ConvDomain) -> Result<Array> {
    if taps.is_empty() {
        return Err(BlockError::invalid("Taps cannot be empty."));
    }
    let freq = domain.use_fft(taps.len());
    match input.data() {
        ArrayData::Float32(v) => {
            convolve_rows(input, v, &taps_as::<f32>(taps), mode, freq, |x| Complex::new(x, 0.0), |z| z.re)
        }
        ArrayData::Float64(v) => convolve_rows(input, v, taps, mode, freq, |x| Complex::new(x, 0.0), |z| z.re),
        ArrayData::ComplexFloat32(v) => convolve_rows(input, v, &taps_as::<f32>(taps), mode, freq, |z| z, |z| z),
        ArrayData::ComplexFloat64(v) => convolve_rows(input, v, taps, mode, freq, |z| z, |z| z),
        other if other.dtype().is_integer() => {
            let wide = convolve(taps, &input.cast(DType::Float64), mode, domain)?;
            let rounded = wide.to_vec::<f64>()?.into_iter().map(f64::round).collect();
            Ok(wide.with_data(ArrayData::Float64(rounded))?.cast(other.dtype()))
        }
        other => Err(BlockError::invalid(format!("convolve does not support {}", other.dtype()))),
    }
}

fn fir_row<T, F>(taps: &[F], x: &[T]) -> Vec<T>
where
    T: Copy + Zero + Mul<F, Output = T>,
    F: RealElement,
{
    (0..x.len())
        .map(|n| {
            taps.iter()
                .take(n + 1)
                .enumerate()
                .fold(T::zero(), |acc, (k, &h)| acc + x[n - k] * h)
        })
        .collect()
}

fn iir_row<T, F>(b: &[F], a: &[F], x: &[T]) -> Vec<T>
where
    T: Copy + Zero + Mul<F, Output = T> + Sub<Output = T> + Div<F, Output = T>,
    F: RealElement,
{
    let mut y: Vec<T> = Vec::with_capacity(x.len());
    for n in 0..x.len() {
        let forward = b
            .iter()
            .take(n + 1)
            .enumerate()
            .fold(T::zero(), |acc, (k, &bk)| acc + x[n - k] * bk);
        let feedback = a
            .iter()
            .enumerate()
            .skip(1)
            .take(n)
            .fold(T::zero(), |acc, (k, &ak)| acc + y[n - k] * ak);
        y.push((forward - feedback) / a[0]);
    }
    y
}

fn taps_as<F: RealElement>(taps: &[f64]) -> Vec<F> {
    taps.iter().map(|&t| F::from_double(t)).collect()
}

/// Causal FIR filter: `y[n] = Σ taps[k] · x[n-k]`, same length as the input.
pub fn fir(taps: &[f64], input: &Array) -> Result<Array> {
    if taps.is_empty() {
        return Err(BlockError::invalid("Taps cannot be empty."));
    }
    let (rows, cols, one_d, device) = (input.rows(), input.cols(), input.numdims() == 1, input.device());
    match input.data() {
        ArrayData::Float32(v) => {
            let h = taps_as::<f32>(taps);
            per_row(v, rows, cols, one_d, device, |x| fir_row(&h, x))
        }
        ArrayData::Float64(v) => per_row(v, rows, cols, one_d, device, |x| fir_row(taps, x)),
        ArrayData::ComplexFloat32(v) => {
            let h = taps_as::<f32>(taps);
            per_row(v, rows, cols, one_d, device, |x| fir_row(&h, x))
        }
        ArrayData::ComplexFloat64(v) => per_row(v, rows, cols, one_d, device, |x| fir_row(taps, x)),
        other => Err(BlockError::invalid(format!("fir does not support {}", other.dtype()))),
    }
}

/// Direct-form IIR filter with feed-forward `b` and feedback `a` coefficients.
pub fn iir(b: &[f64], a: &[f64], input: &Array) -> Result<Array> {
    if b.is_empty() || a.is_empty() {
        return Err(BlockError::invalid("Taps cannot be empty."));
    }
    if a[0] == 0.0 {
        return Err(BlockError::invalid("the first feedback coefficient cannot be zero"));
    }
    let (rows, cols, one_d, device) = (input.rows(), input.cols(), input.numdims() == 1, input.device());
    match input.data() {
        ArrayData::Float32(v) => {
            let (bf, af) = (taps_as::<f32>(b), taps_as::<f32>(a));
            per_row(v, rows, cols, one_d, device, |x| iir_row(&bf, &af, x))
        }
        ArrayData::Float64(v) => per_row(v, rows, cols, one_d, device, |x| iir_row(b, a, x)),
        ArrayData::ComplexFloat32(v) => {
            let (bf, af) = (taps_as::<f32>(b), taps_as::<f32>(a));
            per_row(v, rows, cols, one_d, device, |x| iir_row(&bf, &af, x))
        }
        ArrayData::ComplexFloat64(v) => per_row(v, rows, cols, one_d, device, |x| iir_row(b, a, x)),
        other => Err(BlockError::invalid(format!("iir does not support {}", other.dtype()))),
    }
}
