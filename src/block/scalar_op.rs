//! One-to-one blocks applying a binary op against a scalar.

use super::{ArrayBlock, Block, OneToOneBlock, UnaryFn, single_arg};
use crate::array::Array;
use crate::backend::DeviceId;
use crate::dtype::{DType, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;
use crate::value::Value;

/// Computes `input op scalar` on every channel.
pub struct ScalarOpBlock {
    inner: OneToOneBlock,
    op: BinaryOp,
    dtype: DType,
    scalar: Value,
}

fn bind(op: BinaryOp, dtype: DType, scalar: &Value, device: DeviceId) -> Result<UnaryFn> {
    if op.rejects_zero_divisor() && scalar.is_zero() {
        return Err(BlockError::invalid("Scalar cannot be zero."));
    }
    let rhs = Array::full(scalar, dtype, vec![1], device)?;
    Ok(Box::new(move |a| dispatch::binary(op, a, &rhs)))
}

impl ScalarOpBlock {
    /// # Errors
    /// - `op` does not accept `dtype`
    /// - `scalar` is not representable as `dtype`
    /// - `scalar` is zero for division or modulus
    pub fn new(device: &str, op: BinaryOp, dtype: DType, scalar: Value, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, op.support())?;
        let mut inner = OneToOneBlock::new(
            device,
            op.name(),
            Box::new(|a| Ok(a.clone())),
            dtype,
            op.output_dtype(dtype),
            nchans,
        )?;
        inner.set_func(bind(op, dtype, &scalar, inner.base().device_id())?);
        Ok(Self { inner, op, dtype, scalar })
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn scalar(&self) -> &Value {
        &self.scalar
    }

    /// Rebinds the scalar; the old one stays in place on error.
    pub fn set_scalar(&mut self, scalar: Value) -> Result<()> {
        let func = bind(self.op, self.dtype, &scalar, self.inner.base().device_id())?;
        self.inner.set_func(func);
        self.scalar = scalar;
        Ok(())
    }
}

impl Block for ScalarOpBlock {
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
            "scalar" => Ok(self.scalar.clone()),
            "setScalar" => {
                self.set_scalar(single_arg(name, args)?.clone())?;
                Ok(Value::Null)
            }
            _ => self.inner.call(name, args),
        }
    }
}
