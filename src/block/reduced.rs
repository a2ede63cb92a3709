//! N inputs reduced over the channel axis.

use super::{ArrayBlock, Block, UnaryFn, conform, setup_ports};
use crate::dtype::{DType, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::reduce::{self, Reduction};

/// Stacks all inputs into `[nchans, elems]` and makes one reduction call.
pub struct ReducedBlock {
    base: ArrayBlock,
    func: UnaryFn,
    output_dtype: DType,
}

impl ReducedBlock {
    /// # Errors
    /// - [`BlockError::InvalidArgument`] when `nchans < 2`
    pub fn new(
        device: &str,
        name: &str,
        func: UnaryFn,
        dtype: DType,
        output_dtype: DType,
        nchans: usize,
    ) -> Result<Self> {
        if nchans < 2 {
            return Err(BlockError::invalid("numChannels must be >= 2."));
        }
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, dtype, output_dtype, nchans, 1);
        Ok(Self { base, func, output_dtype })
    }

    pub fn from_reduction(device: &str, name: &str, r: Reduction, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, r.support())?;
        Self::new(
            device,
            name,
            Box::new(move |a| reduce::reduce_rows(r, a)),
            dtype,
            r.output_dtype(dtype),
            nchans,
        )
    }
}

impl Block for ReducedBlock {
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
        let input = self.base.numbered_inputs_as_2d(elems)?;
        let out = conform((self.func)(&input)?, self.output_dtype, elems)?;
        self.base.consume_all(elems)?;
        self.base.post_array(0, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn sums_channels() {
        let mut block = ReducedBlock::from_reduction(AUTO_DEVICE, "add", Reduction::Sum, DType::Float32, 3).unwrap();
        block.activate().unwrap();
        for (port, v) in [[1.0f32, 2.0], [10.0, 20.0], [100.0, 200.0]].iter().enumerate() {
            block.input(port).unwrap().push(&BufferChunk::from_slice(&v[..])).unwrap();
        }
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![111.0, 222.0]);
    }

    #[test]
    fn logical_reduction_outputs_int8() {
        let mut block = ReducedBlock::from_reduction(AUTO_DEVICE, "and", Reduction::AllTrue, DType::Int32, 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1i32, 0, 3])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[1i32, 1, 0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<i8>().unwrap(), vec![1, 0, 0]);
    }

    #[test]
    fn wrong_output_size_is_an_assertion() {
        let func: UnaryFn = Box::new(|a: &Array| Ok(a.clone()));
        let mut block = ReducedBlock::new(AUTO_DEVICE, "bad", func, DType::Int32, DType::Int32, 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1i32])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[1i32])).unwrap();
        assert!(matches!(block.work(), Err(BlockError::AssertionViolation(_))));
    }

    #[test]
    fn failed_reduction_keeps_input() {
        let func: UnaryFn = Box::new(|_: &Array| Err(BlockError::invalid("kernel failed")));
        let mut block = ReducedBlock::new(AUTO_DEVICE, "fail", func, DType::Float64, DType::Float64, 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64, 2.0])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[3.0f64, 4.0])).unwrap();
        assert!(block.work().is_err());
        let left: Vec<usize> = block.base().inputs().iter().map(|p| p.elements()).collect();
        assert_eq!(left, vec![2, 2]);
    }
}
