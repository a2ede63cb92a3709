//! FIR and IIR filters.
//!
//! Each `work()` filters the available samples as an independent segment:
//! no filter state carries over between calls.

use crate::block::{ArrayBlock, Block, OneToOneBlock, UnaryFn, single_arg};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::signal;
use crate::value::Value;

const SUPPORT: DTypeSupport = DTypeSupport { float: true, complex: true, ..DTypeSupport::NONE };

/// Default IIR feed-forward coefficients (second-order low-pass).
pub const DEFAULT_FEED_FORWARD: [f64; 3] = [0.0676, 0.135, 0.0676];
/// Default IIR feedback coefficients.
pub const DEFAULT_FEEDBACK: [f64; 3] = [1.0, -1.142, 0.412];

fn taps_value(taps: &[f64]) -> Value {
    Value::from(taps.to_vec())
}

/// Convolves every channel with a fixed set of taps.
pub struct FirBlock {
    inner: OneToOneBlock,
    taps: Vec<f64>,
}

fn bind_fir(taps: &[f64]) -> Result<UnaryFn> {
    if taps.is_empty() {
        return Err(BlockError::invalid("Taps cannot be empty."));
    }
    let taps = taps.to_vec();
    Ok(Box::new(move |a| signal::fir(&taps, a)))
}

impl FirBlock {
    pub fn new(device: &str, dtype: DType, taps: Vec<f64>, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, SUPPORT)?;
        let inner = OneToOneBlock::new(device, "fir", bind_fir(&taps)?, dtype, dtype, nchans)?;
        Ok(Self { inner, taps })
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn set_taps(&mut self, taps: Vec<f64>) -> Result<()> {
        self.inner.set_func(bind_fir(&taps)?);
        self.taps = taps;
        Ok(())
    }
}

impl Block for FirBlock {
    fn base(&self) -> &ArrayBlock {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        self.inner.base_mut()
    }

    fn work(&mut self) -> Result<()> {
        self.inner.work()
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getTaps" => Ok(taps_value(&self.taps)),
            "setTaps" => self.set_taps(single_arg(name, args)?.as_f64_list()?).map(|()| Value::Null),
            _ => self.inner.call(name, args),
        }
    }
}

/// Direct-form IIR filter with feed-forward (`b`) and feedback (`a`)
/// coefficients of equal length.
pub struct IirBlock {
    inner: OneToOneBlock,
    feed_forward: Vec<f64>,
    feedback: Vec<f64>,
}

fn bind_iir(b: &[f64], a: &[f64]) -> Result<UnaryFn> {
    if b.is_empty() || a.is_empty() {
        return Err(BlockError::invalid("Coefficients cannot be empty."));
    }
    if b.len() != a.len() {
        return Err(BlockError::invalid("Feed-forward and feedback coefficients must be the same size."));
    }
    if a[0] == 0.0 {
        return Err(BlockError::invalid("The first feedback coefficient cannot be zero."));
    }
    let (b, a) = (b.to_vec(), a.to_vec());
    Ok(Box::new(move |x| signal::iir(&b, &a, x)))
}

impl IirBlock {
    pub fn new(device: &str, dtype: DType, feed_forward: Vec<f64>, feedback: Vec<f64>, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, SUPPORT)?;
        let func = bind_iir(&feed_forward, &feedback)?;
        let inner = OneToOneBlock::new(device, "iir", func, dtype, dtype, nchans)?;
        Ok(Self { inner, feed_forward, feedback })
    }

    pub fn feed_forward(&self) -> &[f64] {
        &self.feed_forward
    }

    pub fn feedback(&self) -> &[f64] {
        &self.feedback
    }

    pub fn set_feed_forward(&mut self, b: Vec<f64>) -> Result<()> {
        self.set_coefficients(b, self.feedback.clone())
    }

    pub fn set_feedback(&mut self, a: Vec<f64>) -> Result<()> {
        self.set_coefficients(self.feed_forward.clone(), a)
    }

    pub fn set_coefficients(&mut self, b: Vec<f64>, a: Vec<f64>) -> Result<()> {
        self.inner.set_func(bind_iir(&b, &a)?);
        self.feed_forward = b;
        self.feedback = a;
        Ok(())
    }

    /// Both coefficient sets back to back: `b ++ a`.
    pub fn taps(&self) -> Vec<f64> {
        [self.feed_forward.as_slice(), self.feedback.as_slice()].concat()
    }

    /// Splits an even-length list into feed-forward and feedback halves.
    pub fn set_taps(&mut self, taps: Vec<f64>) -> Result<()> {
        if taps.len() % 2 != 0 {
            return Err(BlockError::invalid(
                "When passing in both sets of coefficients, the input must be of an even size.",
            ));
        }
        let (b, a) = taps.split_at(taps.len() / 2);
        self.set_coefficients(b.to_vec(), a.to_vec())
    }
}

impl Block for IirBlock {
    fn base(&self) -> &ArrayBlock {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        self.inner.base_mut()
    }

    fn work(&mut self) -> Result<()> {
        self.inner.work()
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let list = || single_arg(name, args).and_then(Value::as_f64_list);
        match name {
            "getFeedForwardCoeffs" => Ok(taps_value(&self.feed_forward)),
            "getFeedbackCoeffs" => Ok(taps_value(&self.feedback)),
            "getTaps" => Ok(taps_value(&self.taps())),
            "setFeedForwardCoeffs" => self.set_feed_forward(list()?).map(|()| Value::Null),
            "setFeedbackCoeffs" => self.set_feedback(list()?).map(|()| Value::Null),
            "setTaps" => self.set_taps(list()?).map(|()| Value::Null),
            _ => self.inner.call(name, args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn fir_moving_sum() {
        let mut block = FirBlock::new(AUTO_DEVICE, DType::Float64, vec![1.0, 1.0], 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64, 2.0, 3.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![1.0, 3.0, 5.0]);

        assert!(block.call("setTaps", &[Value::List(vec![])]).is_err());
        assert_eq!(block.taps(), &[1.0, 1.0]);
    }

    #[test]
    fn iir_coefficient_checks() {
        let err = IirBlock::new(AUTO_DEVICE, DType::Float32, vec![1.0], vec![1.0, 0.5], 1).err().unwrap();
        assert!(err.to_string().contains("same size"));
        assert!(IirBlock::new(AUTO_DEVICE, DType::Int32, vec![1.0], vec![1.0], 1).is_err());

        let mut block =
            IirBlock::new(AUTO_DEVICE, DType::Float64, DEFAULT_FEED_FORWARD.to_vec(), DEFAULT_FEEDBACK.to_vec(), 1)
                .unwrap();
        assert!(block.set_taps(vec![1.0, 2.0, 3.0]).is_err());
        block.set_taps(vec![0.5, 1.0]).unwrap();
        assert_eq!(block.feed_forward(), &[0.5]);
        assert_eq!(block.feedback(), &[1.0]);
        assert_eq!(block.call("getTaps", &[]).unwrap(), Value::from(vec![0.5, 1.0]));
    }

    #[test]
    fn iir_one_pole() {
        // y[n] = x[n] + 0.5 y[n-1]
        let mut block = IirBlock::new(AUTO_DEVICE, DType::Float64, vec![1.0, 0.0], vec![1.0, -0.5], 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64, 0.0, 0.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![1.0, 0.5, 0.25]);
    }
}
