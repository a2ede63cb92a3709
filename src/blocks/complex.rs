//! Splitting complex streams apart and building them from polar parts.

use crate::array::Array;
use crate::block::{ArrayBlock, Block, TwoToOneBlock};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::Result;
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;
use crate::ops::unary::UnaryOp;

/// Splits each complex channel into two real outputs.
///
/// Channel `i` posts its first part on output `2i` and its second on
/// output `2i + 1`: `(re, im)` for [`SplitComplexBlock::new`] and
/// `(magnitude, phase)` for [`SplitComplexBlock::polar`].
pub struct SplitComplexBlock {
    base: ArrayBlock,
    parts: [UnaryOp; 2],
}

impl SplitComplexBlock {
    pub fn new(device: &str, dtype: DType, nchans: usize) -> Result<Self> {
        Self::with_parts(device, "split_complex", dtype, nchans, [UnaryOp::Real, UnaryOp::Imag])
    }

    pub fn polar(device: &str, dtype: DType, nchans: usize) -> Result<Self> {
        Self::with_parts(device, "complex_to_polar", dtype, nchans, [UnaryOp::Abs, UnaryOp::Arg])
    }

    fn with_parts(device: &str, name: &str, dtype: DType, nchans: usize, parts: [UnaryOp; 2]) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::COMPLEX)?;
        let mut base = ArrayBlock::new(name, device)?;
        for _ in 0..nchans {
            base.setup_input(dtype);
            base.setup_output(dtype.to_real());
            base.setup_output(dtype.to_real());
        }
        Ok(Self { base, parts })
    }
}

impl Block for SplitComplexBlock {
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
        for port in 0..self.base.inputs().len() {
            let input = self.base.input_as_array(port, Some(elems))?;
            let first = dispatch::unary(self.parts[0], &input)?;
            let second = dispatch::unary(self.parts[1], &input)?;
            self.base.consume(port, elems)?;
            self.base.post_array(2 * port, &first)?;
            self.base.post_array(2 * port + 1, &second)?;
        }
        Ok(())
    }
}

fn polar_to_complex(magnitude: &Array, phase: &Array) -> Result<Array> {
    let re = dispatch::binary(BinaryOp::Mul, magnitude, &dispatch::unary(UnaryOp::Cos, phase)?)?;
    let im = dispatch::binary(BinaryOp::Mul, magnitude, &dispatch::unary(UnaryOp::Sin, phase)?)?;
    dispatch::binary(BinaryOp::Combine, &re, &im)
}

/// A two-to-one block combining magnitude (input 0) and phase (input 1)
/// into `magnitude · e^(i·phase)`.
pub fn polar_to_complex_block(device: &str, dtype: DType) -> Result<TwoToOneBlock> {
    validate_dtype(dtype, DTypeSupport::FLOAT)?;
    TwoToOneBlock::new(
        device,
        "polar_to_complex",
        Box::new(polar_to_complex),
        dtype,
        dtype.to_complex(),
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;
    use core::f64::consts::FRAC_PI_2;
    use num_complex::Complex64;

    #[test]
    fn splits_real_and_imaginary() {
        let mut block = SplitComplexBlock::new(AUTO_DEVICE, DType::ComplexFloat64, 1).unwrap();
        block.activate().unwrap();
        let z = [Complex64::new(1.0, -2.0), Complex64::new(3.5, 0.0)];
        block.input(0).unwrap().push(&BufferChunk::from_slice(&z)).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![1.0, 3.5]);
        assert_eq!(block.output(1).unwrap().collect_vec::<f64>().unwrap(), vec![-2.0, 0.0]);
    }

    #[test]
    fn polar_round_trip() {
        let mut to_polar = SplitComplexBlock::polar(AUTO_DEVICE, DType::ComplexFloat64, 1).unwrap();
        to_polar.activate().unwrap();
        to_polar.input(0).unwrap().push(&BufferChunk::from_slice(&[Complex64::new(0.0, 2.0)])).unwrap();
        to_polar.work().unwrap();
        let mag = to_polar.output(0).unwrap().collect_vec::<f64>().unwrap();
        let phase = to_polar.output(1).unwrap().collect_vec::<f64>().unwrap();
        assert!((mag[0] - 2.0).abs() < 1e-12);
        assert!((phase[0] - FRAC_PI_2).abs() < 1e-12);

        let mut back = polar_to_complex_block(AUTO_DEVICE, DType::Float64).unwrap();
        back.activate().unwrap();
        back.input(0).unwrap().push(&BufferChunk::from_slice(&mag)).unwrap();
        back.input(1).unwrap().push(&BufferChunk::from_slice(&phase)).unwrap();
        back.work().unwrap();
        let z = back.output(0).unwrap().collect_vec::<Complex64>().unwrap();
        assert!((z[0] - Complex64::new(0.0, 2.0)).norm() < 1e-12);
    }
}
