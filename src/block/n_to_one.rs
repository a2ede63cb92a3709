//! N inputs folded into one output.

use super::two_to_one::zero_denominator;
use super::{ArrayBlock, Block, conform, setup_ports};
use crate::array::Array;
use crate::dtype::{DType, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;

/// A function combining every channel, in port order, into one array.
pub type FoldFn = Box<dyn Fn(&[Array]) -> Result<Array> + Send>;

/// Computes `((in0 op in1) op in2) …` element-wise.
pub struct NToOneBlock {
    base: ArrayBlock,
    func: FoldFn,
    output_dtype: DType,
    allow_zero_after_first: bool,
}

impl NToOneBlock {
    /// # Errors
    /// - [`BlockError::InvalidArgument`] when `nchans < 2`
    pub fn new(
        device: &str,
        name: &str,
        func: FoldFn,
        dtype: DType,
        output_dtype: DType,
        nchans: usize,
        allow_zero_after_first: bool,
    ) -> Result<Self> {
        if nchans < 2 {
            return Err(BlockError::invalid("numChannels must be >= 2."));
        }
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, dtype, output_dtype, nchans, 1);
        Ok(Self { base, func, output_dtype, allow_zero_after_first })
    }

    pub fn from_op(device: &str, op: BinaryOp, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, op.support())?;
        Self::new(
            device,
            op.name(),
            Box::new(move |arrays| dispatch::fold(op, arrays)),
            dtype,
            op.output_dtype(dtype),
            nchans,
            !op.rejects_zero_divisor(),
        )
    }
}

impl Block for NToOneBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        let elems = self.base.begin_work()?;
        if elems == 0 {
            return Ok(());
        }
        let nchans = self.base.inputs().len();
        let arrays = (0..nchans)
            .map(|port| self.base.input_as_array(port, Some(elems)))
            .collect::<Result<Vec<Array>>>()?;
        if !self.allow_zero_after_first && arrays[1..].iter().any(Array::any_zero) {
            return Err(zero_denominator());
        }
        let out = conform((self.func)(&arrays)?, self.output_dtype, elems)?;
        self.base.consume_all(elems)?;
        self.base.post_array(0, &out)
    }
}
