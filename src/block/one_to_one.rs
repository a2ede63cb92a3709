//! N inputs, N outputs, one unary function.

use super::{ArrayBlock, Block, conform, setup_ports, single_arg, unknown_call};
use crate::array::Array;
use crate::dtype::{DType, validate_dtype};
use crate::error::Result;
use crate::ops::dispatch;
use crate::ops::unary::UnaryOp;
use crate::value::Value;

/// A function applied to one array at a time.
pub type UnaryFn = Box<dyn Fn(&Array) -> Result<Array> + Send>;

/// Applies a unary function to every channel.
///
/// With channel batching (the default) all channels are stacked into one
/// 2-D array and the function runs once per `work()`; otherwise it runs once
/// per port. Output element counts always equal input counts.
pub struct OneToOneBlock {
    base: ArrayBlock,
    func: UnaryFn,
    output_dtype: DType,
    batch_channels: bool,
}

impl OneToOneBlock {
    pub fn new(
        device: &str,
        name: &str,
        func: UnaryFn,
        input_dtype: DType,
        output_dtype: DType,
        nchans: usize,
    ) -> Result<Self> {
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, input_dtype, output_dtype, nchans, nchans);
        Ok(Self { base, func, output_dtype, batch_channels: true })
    }

    /// A block for a table-declared unary op.
    pub fn from_op(device: &str, op: UnaryOp, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, op.support())?;
        Self::new(
            device,
            op.name(),
            Box::new(move |a| dispatch::unary(op, a)),
            dtype,
            op.output_dtype(dtype),
            nchans,
        )
    }

    pub fn output_dtype(&self) -> DType {
        self.output_dtype
    }

    /// Replaces the bound function.
    pub fn set_func(&mut self, func: UnaryFn) {
        self.func = func;
    }

    pub fn batch_channels(&self) -> bool {
        self.batch_channels
    }

    pub fn set_batch_channels(&mut self, batch: bool) {
        self.batch_channels = batch;
    }

    fn apply(&self, input: &Array) -> Result<Array> {
        conform((self.func)(input)?, self.output_dtype, input.elements())
    }
}

impl Block for OneToOneBlock {
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
        if self.batch_channels && nchans > 1 {
            let input = self.base.numbered_inputs_as_2d(elems)?;
            let output = self.apply(&input)?;
            self.base.consume_all(elems)?;
            return self.base.post_2d_array_to_numbered_outputs(&output);
        }
        for port in 0..nchans {
            let input = self.base.input_as_array(port, Some(elems))?;
            let output = self.apply(&input)?;
            self.base.consume(port, elems)?;
            self.base.post_array(port, &output)?;
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "batchChannels" => Ok(Value::Bool(self.batch_channels)),
            "setBatchChannels" => {
                self.set_batch_channels(single_arg(name, args)?.as_bool()?);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;
    use crate::error::BlockError;

    #[test]
    fn runs_per_port_and_batched() {
        for batch in [true, false] {
            let mut block = OneToOneBlock::from_op(AUTO_DEVICE, UnaryOp::Floor, DType::Float32, 2).unwrap();
            block.set_batch_channels(batch);
            block.activate().unwrap();
            block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.5f32, -0.5, 9.0])).unwrap();
            block.input(1).unwrap().push(&BufferChunk::from_slice(&[2.7f32, 3.1])).unwrap();
            block.work().unwrap();
            assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![1.0, -1.0]);
            assert_eq!(block.output(1).unwrap().collect_vec::<f32>().unwrap(), vec![2.0, 3.0]);
            assert_eq!(block.input(0).unwrap().elements(), 1);
        }
    }

    #[test]
    fn rejects_unsupported_types() {
        assert!(OneToOneBlock::from_op(AUTO_DEVICE, UnaryOp::Erf, DType::Int32, 1).is_err());
        let err = OneToOneBlock::from_op(AUTO_DEVICE, UnaryOp::Abs, DType::Int8, 1).err().unwrap();
        assert!(err.to_string().contains("int8"));
    }

    #[test]
    fn size_mismatch_aborts_step() {
        let func: UnaryFn = Box::new(|a| Ok(Array::from_data(a.data().slice(0, 1)?, a.device())));
        let mut block = OneToOneBlock::new(AUTO_DEVICE, "shrink", func, DType::Float64, DType::Float64, 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64, 2.0])).unwrap();
        assert!(matches!(block.work(), Err(BlockError::AssertionViolation(_))));
    }

    #[test]
    fn failed_step_keeps_input() {
        for batch in [true, false] {
            let func: UnaryFn = Box::new(|_| Err(BlockError::invalid("kernel failed")));
            let mut block = OneToOneBlock::new(AUTO_DEVICE, "fail", func, DType::Int32, DType::Int32, 2).unwrap();
            block.set_batch_channels(batch);
            block.activate().unwrap();
            block.input(0).unwrap().push(&BufferChunk::from_slice(&[1i32, 2])).unwrap();
            block.input(1).unwrap().push(&BufferChunk::from_slice(&[3i32, 4])).unwrap();
            assert!(block.work().is_err());
            let left: Vec<usize> = block.base().inputs().iter().map(|p| p.elements()).collect();
            assert_eq!(left, vec![2, 2]);
        }
    }

    #[test]
    fn batch_property() {
        let mut block = OneToOneBlock::from_op(AUTO_DEVICE, UnaryOp::Sin, DType::Float64, 1).unwrap();
        block.call("setBatchChannels", &[Value::Bool(false)]).unwrap();
        assert_eq!(block.call("batchChannels", &[]).unwrap(), Value::Bool(false));
        assert!(matches!(block.call("nope", &[]), Err(BlockError::NotFound(_))));
    }
}
