//! Two inputs, one output.

use super::{ArrayBlock, Block, conform, setup_ports};
use crate::array::Array;
use crate::dtype::{DType, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;

/// A function of two equally sized arrays.
pub type BinaryFn = Box<dyn Fn(&Array, &Array) -> Result<Array> + Send>;

pub(crate) fn zero_denominator() -> BlockError {
    BlockError::invalid("Denominator cannot contain zeros.")
}

/// Combines input 0 and input 1 element-wise.
pub struct TwoToOneBlock {
    base: ArrayBlock,
    func: BinaryFn,
    output_dtype: DType,
    allow_zero_in_second: bool,
}

impl TwoToOneBlock {
    pub fn new(
        device: &str,
        name: &str,
        func: BinaryFn,
        input_dtype: DType,
        output_dtype: DType,
        allow_zero_in_second: bool,
    ) -> Result<Self> {
        let mut base = ArrayBlock::new(name, device)?;
        setup_ports(&mut base, input_dtype, output_dtype, 2, 1);
        Ok(Self { base, func, output_dtype, allow_zero_in_second })
    }

    /// A block for a table-declared binary op.
    pub fn from_op(device: &str, op: BinaryOp, dtype: DType) -> Result<Self> {
        validate_dtype(dtype, op.support())?;
        Self::new(
            device,
            op.name(),
            Box::new(move |a, b| dispatch::binary(op, a, b)),
            dtype,
            op.output_dtype(dtype),
            !op.rejects_zero_divisor(),
        )
    }

    /// A comparator block; `symbol` is one of `<`, `<=`, `>`, `>=`, `==`, `!=`.
    pub fn comparator(device: &str, symbol: &str, dtype: DType) -> Result<Self> {
        let op = BinaryOp::from_comparator(symbol)
            .ok_or_else(|| BlockError::invalid(format!("Invalid comparator: {symbol}")))?;
        Self::from_op(device, op, dtype)
    }

    pub fn output_dtype(&self) -> DType {
        self.output_dtype
    }
}

impl Block for TwoToOneBlock {
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
        let a = self.base.input_as_array(0, Some(elems))?;
        let b = self.base.input_as_array(1, Some(elems))?;
        if !self.allow_zero_in_second && b.any_zero() {
            return Err(zero_denominator());
        }
        let out = conform((self.func)(&a, &b)?, self.output_dtype, elems)?;
        self.base.consume(0, elems)?;
        self.base.consume(1, elems)?;
        self.base.post_array(0, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn divides_and_rejects_zeros() {
        let mut block = TwoToOneBlock::from_op(AUTO_DEVICE, BinaryOp::Div, DType::Float64).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[6.0f64, 9.0, 1.0])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[3.0f64, 3.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![2.0, 3.0]);

        block.input(1).unwrap().push(&BufferChunk::from_slice(&[0.0f64])).unwrap();
        let err = block.work().unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: Denominator cannot contain zeros.");
    }

    #[test]
    fn comparator_outputs_int8() {
        let mut block = TwoToOneBlock::comparator(AUTO_DEVICE, ">=", DType::UInt16).unwrap();
        assert_eq!(block.output_dtype(), DType::Int8);
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1u16, 5, 7])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[2u16, 5, 3])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<i8>().unwrap(), vec![0, 1, 1]);
        assert!(TwoToOneBlock::comparator(AUTO_DEVICE, "=<", DType::UInt16).is_err());
    }
}
