//! Frame-based FFT blocks.
//!
//! Both blocks work on whole frames: each `work()` transforms as many
//! complete frames as every input can supply and leaves the remainder
//! queued.

use crate::array::Array;
use crate::block::{ArrayBlock, Block, setup_ports, single_arg, unknown_call};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::signal;
use crate::value::Value;

fn check_bins(name: &str, bins: usize) -> Result<()> {
    if bins == 0 {
        return Err(BlockError::invalid("numBins must be positive"));
    }
    if !bins.is_power_of_two() {
        log::warn!("{name}: this block is most efficient when numBins is a power of 2 (got {bins})");
    }
    Ok(())
}

/// Runs `transform` over every complete input frame and posts each result
/// row to the matching output.
fn run_frames(
    base: &mut ArrayBlock,
    frame_in: usize,
    transform: impl Fn(&Array) -> Result<Array>,
) -> Result<()> {
    let elems = base.begin_work()?;
    for _ in 0..elems / frame_in {
        let input = base.numbered_inputs_as_2d(frame_in)?;
        let output = transform(&input)?;
        base.consume_all(frame_in)?;
        base.post_2d_array_to_numbered_outputs(&output)?;
    }
    Ok(())
}

fn norm_call(base: &ArrayBlock, norm: &mut f64, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "getNormalizationFactor" => Ok(Value::Float(*norm)),
        "setNormalizationFactor" => {
            *norm = single_arg(name, args)?.as_f64()?;
            Ok(Value::Null)
        }
        _ => Err(unknown_call(base, name)),
    }
}

/// Complex-to-complex FFT of `numBins` points per channel.
pub struct FftBlock {
    base: ArrayBlock,
    num_bins: usize,
    norm: f64,
    inverse: bool,
}

impl FftBlock {
    pub fn new(device: &str, dtype: DType, num_bins: usize, norm: f64, inverse: bool, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::COMPLEX)?;
        let name = if inverse { "ifft" } else { "fft" };
        check_bins(name, num_bins)?;
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, dtype, dtype, nchans, nchans);
        Ok(Self { base, num_bins, norm, inverse })
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn normalization_factor(&self) -> f64 {
        self.norm
    }

    pub fn set_normalization_factor(&mut self, norm: f64) {
        self.norm = norm;
    }
}

impl Block for FftBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        let (bins, norm, inverse) = (self.num_bins, self.norm, self.inverse);
        run_frames(&mut self.base, bins, |a| signal::fft(a, bins, norm, inverse))
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "numBins" => Ok(Value::from(self.num_bins)),
            _ => norm_call(&self.base, &mut self.norm, name, args),
        }
    }
}

/// Real FFT: forward maps `numBins` real samples to `numBins / 2 + 1`
/// complex bins; inverse maps the bins back to `numBins` samples.
pub struct RfftBlock {
    base: ArrayBlock,
    num_bins: usize,
    norm: f64,
    inverse: bool,
}

impl RfftBlock {
    /// `dtype` is the real sample type on either direction.
    pub fn new(device: &str, dtype: DType, num_bins: usize, norm: f64, inverse: bool, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::FLOAT)?;
        let name = if inverse { "irfft" } else { "rfft" };
        check_bins(name, num_bins)?;
        let (input, output) = if inverse { (dtype.to_complex(), dtype) } else { (dtype, dtype.to_complex()) };
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, input, output, nchans, nchans);
        Ok(Self { base, num_bins, norm, inverse })
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    pub fn normalization_factor(&self) -> f64 {
        self.norm
    }

    pub fn set_normalization_factor(&mut self, norm: f64) {
        self.norm = norm;
    }

    /// Elements consumed per channel for one frame.
    fn frame_len(&self) -> usize {
        if self.inverse { self.num_bins / 2 + 1 } else { self.num_bins }
    }
}

impl Block for RfftBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        let (bins, norm, frame) = (self.num_bins, self.norm, self.frame_len());
        if self.inverse {
            run_frames(&mut self.base, frame, |a| signal::irfft(a, bins, norm))
        } else {
            run_frames(&mut self.base, frame, |a| signal::rfft(a, bins, norm))
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "numBins" => Ok(Value::from(self.num_bins)),
            _ => norm_call(&self.base, &mut self.norm, name, args),
        }
    }
}
