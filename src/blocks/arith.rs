//! Arithmetic blocks with a rebindable base, and the fractional/integral
//! split.

use crate::block::{ArrayBlock, Block, OneToOneBlock, UnaryFn, setup_ports, single_arg};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;
use crate::ops::unary::{self, UnaryOp};
use crate::value::Value;

const FC: DTypeSupport = DTypeSupport { float: true, complex: true, ..DTypeSupport::NONE };

fn bind_pow(base: f64) -> UnaryFn {
    Box::new(move |a| unary::pow_base(base, a))
}

/// Raises a fixed base to every element: `out = base ^ x`.
pub struct PowNBlock {
    inner: OneToOneBlock,
    radix: f64,
}

impl PowNBlock {
    pub fn new(device: &str, name: &str, dtype: DType, base: f64, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, FC)?;
        let inner = OneToOneBlock::new(device, name, bind_pow(base), dtype, dtype, nchans)?;
        Ok(Self { inner, radix: base })
    }

    pub fn radix(&self) -> f64 {
        self.radix
    }

    pub fn set_base(&mut self, base: f64) {
        self.inner.set_func(bind_pow(base));
        self.radix = base;
    }
}

impl Block for PowNBlock {
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
            "base" | "getBase" => Ok(Value::Float(self.radix)),
            "setBase" => {
                self.set_base(single_arg(name, args)?.as_f64()?);
                Ok(Value::Null)
            }
            _ => self.inner.call(name, args),
        }
    }
}

fn bind_log(base: f64) -> Result<UnaryFn> {
    if base <= 0.0 || base == 1.0 || base.is_nan() {
        return Err(BlockError::invalid(format!("Invalid logarithm base: {base}")));
    }
    Ok(Box::new(move |a| unary::log_base(base, a)))
}

/// Logarithm of every element in a fixed base.
pub struct LogNBlock {
    inner: OneToOneBlock,
    radix: f64,
}

impl LogNBlock {
    pub fn new(device: &str, dtype: DType, base: f64, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::FLOAT)?;
        let inner = OneToOneBlock::new(device, "logN", bind_log(base)?, dtype, dtype, nchans)?;
        Ok(Self { inner, radix: base })
    }

    pub fn radix(&self) -> f64 {
        self.radix
    }

    /// Rebinds the base; the old one stays in place on error.
    pub fn set_base(&mut self, base: f64) -> Result<()> {
        self.inner.set_func(bind_log(base)?);
        self.radix = base;
        Ok(())
    }
}

impl Block for LogNBlock {
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
            "base" | "getBase" => Ok(Value::Float(self.radix)),
            "setBase" => self.set_base(single_arg(name, args)?.as_f64()?).map(|()| Value::Null),
            _ => self.inner.call(name, args),
        }
    }
}

/// Splits a float stream into its integral part (output 0) and fractional
/// part (output 1). Both parts keep the sign of the input.
pub struct ModfBlock {
    base: ArrayBlock,
}

impl ModfBlock {
    pub fn new(device: &str, dtype: DType) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::FLOAT)?;
        let mut base = ArrayBlock::new("modf", device)?;
        setup_ports(&mut base, dtype, dtype, 1, 2);
        Ok(Self { base })
    }
}

impl Block for ModfBlock {
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
        let input = self.base.input_as_array(0, Some(elems))?;
        let integral = dispatch::unary(UnaryOp::Trunc, &input)?;
        let fractional = dispatch::binary(BinaryOp::Sub, &input, &integral)?;
        self.base.consume(0, elems)?;
        self.base.post_array(0, &integral)?;
        self.base.post_array(1, &fractional)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;
    use num_complex::Complex32;

    #[test]
    fn modf_splits_with_sign() {
        let mut block = ModfBlock::new(AUTO_DEVICE, DType::Float64).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[2.75f64, -1.5, 3.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![2.0, -1.0, 3.0]);
        assert_eq!(block.output(1).unwrap().collect_vec::<f64>().unwrap(), vec![0.75, -0.5, 0.0]);
        assert!(ModfBlock::new(AUTO_DEVICE, DType::Int32).is_err());
    }

    #[test]
    fn pow_base_is_rebindable() {
        let mut block = PowNBlock::new(AUTO_DEVICE, "pow2", DType::Float32, 2.0, 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[0.0f32, 3.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![1.0, 8.0]);

        block.call("setBase", &[Value::Float(3.0)]).unwrap();
        assert_eq!(block.call("getBase", &[]).unwrap(), Value::Float(3.0));
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[2.0f32])).unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap().collect_vec::<f32>().unwrap();
        assert!((out[0] - 9.0).abs() < 1e-5);
    }

    #[test]
    fn pow_accepts_complex() {
        let mut block = PowNBlock::new(AUTO_DEVICE, "pow10", DType::ComplexFloat32, 10.0, 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[Complex32::new(1.0, 0.0)])).unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap().collect_vec::<Complex32>().unwrap();
        assert!((out[0] - Complex32::new(10.0, 0.0)).norm() < 1e-4);
        assert!(PowNBlock::new(AUTO_DEVICE, "powN", DType::UInt8, 2.0, 1).is_err());
    }

    #[test]
    fn log_rejects_degenerate_bases() {
        assert!(LogNBlock::new(AUTO_DEVICE, DType::Float64, 1.0, 1).is_err());
        let mut block = LogNBlock::new(AUTO_DEVICE, DType::Float64, 4.0, 1).unwrap();
        assert!(block.call("setBase", &[Value::Float(0.0)]).is_err());
        assert_eq!(block.radix(), 4.0);

        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[16.0f64, 2.0])).unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap().collect_vec::<f64>().unwrap();
        assert!((out[0] - 2.0).abs() < 1e-12 && (out[1] - 0.5).abs() < 1e-12);
    }
}
