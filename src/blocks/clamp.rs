//! Clamping with rebindable bounds.

use crate::block::{ArrayBlock, Block, OneToOneBlock, UnaryFn, single_arg};
use crate::dtype::{DType, DTypeSupport, Element, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::data;
use crate::value::Value;

/// Limits every element of every channel to `[minValue, maxValue]`.
pub struct ClampBlock {
    inner: OneToOneBlock,
    dtype: DType,
    min: Value,
    max: Value,
}

fn bind(dtype: DType, min: &Value, max: &Value) -> Result<UnaryFn> {
    // both bounds must be representable in the stream type
    let lo = representable(dtype, min)?;
    let hi = representable(dtype, max)?;
    if lo > hi {
        return Err(BlockError::invalid("minValue must be < maxValue"));
    }
    let (min, max) = (min.clone(), max.clone());
    Ok(Box::new(move |a| data::clamp(a, &min, &max)))
}

fn representable(dtype: DType, value: &Value) -> Result<f64> {
    match dtype {
        DType::Int16 => i16::from_value(value).map(f64::from),
        DType::Int32 => i32::from_value(value).map(f64::from),
        DType::Int64 => i64::from_value(value).map(|x| x as f64),
        DType::UInt8 => u8::from_value(value).map(f64::from),
        DType::UInt16 => u16::from_value(value).map(f64::from),
        DType::UInt32 => u32::from_value(value).map(f64::from),
        DType::UInt64 => u64::from_value(value).map(|x| x as f64),
        DType::Float32 => f32::from_value(value).map(f64::from),
        _ => value.as_f64(),
    }
}

impl ClampBlock {
    /// # Errors
    /// - complex or `int8` streams
    /// - bounds not representable as `dtype`
    /// - `min > max`
    pub fn new(device: &str, dtype: DType, min: Value, max: Value, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let func = bind(dtype, &min, &max)?;
        let inner = OneToOneBlock::new(device, "clamp", func, dtype, dtype, nchans)?;
        Ok(Self { inner, dtype, min, max })
    }

    pub fn min_value(&self) -> &Value {
        &self.min
    }

    pub fn max_value(&self) -> &Value {
        &self.max
    }

    pub fn set_min_value(&mut self, min: Value) -> Result<()> {
        self.inner.set_func(bind(self.dtype, &min, &self.max)?);
        self.min = min;
        Ok(())
    }

    pub fn set_max_value(&mut self, max: Value) -> Result<()> {
        self.inner.set_func(bind(self.dtype, &self.min, &max)?);
        self.max = max;
        Ok(())
    }
}

impl Block for ClampBlock {
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
            "getMinValue" => Ok(self.min.clone()),
            "getMaxValue" => Ok(self.max.clone()),
            "setMinValue" => self.set_min_value(single_arg(name, args)?.clone()).map(|()| Value::Null),
            "setMaxValue" => self.set_max_value(single_arg(name, args)?.clone()).map(|()| Value::Null),
            _ => self.inner.call(name, args),
        }
    }
}
