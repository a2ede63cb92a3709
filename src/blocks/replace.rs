//! Find-and-replace on element values.

use crate::block::{ArrayBlock, Block, OneToOneBlock, UnaryFn, single_arg};
use crate::dtype::{DType, validate_dtype_in};
use crate::error::Result;
use crate::ops::data;
use crate::value::Value;

const SUPPORTED: [DType; 9] = [
    DType::Int16,
    DType::Int32,
    DType::UInt8,
    DType::UInt16,
    DType::UInt32,
    DType::Float32,
    DType::Float64,
    DType::ComplexFloat32,
    DType::ComplexFloat64,
];

/// Replaces every occurrence of `findValue` with `replaceValue`.
///
/// Float streams match within `1e-6`, treat NaN as equal to NaN and match
/// infinities of the same sign.
pub struct ReplaceBlock {
    inner: OneToOneBlock,
    find: Value,
    with: Value,
}

fn bind(find: &Value, with: &Value) -> UnaryFn {
    let (find, with) = (find.clone(), with.clone());
    Box::new(move |a| data::replace(a, &find, &with))
}

impl ReplaceBlock {
    pub fn new(device: &str, dtype: DType, find: Value, with: Value, nchans: usize) -> Result<Self> {
        validate_dtype_in(dtype, &SUPPORTED)?;
        let inner = OneToOneBlock::new(device, "replace", bind(&find, &with), dtype, dtype, nchans)?;
        Ok(Self { inner, find, with })
    }

    pub fn find_value(&self) -> &Value {
        &self.find
    }

    pub fn replace_value(&self) -> &Value {
        &self.with
    }

    pub fn set_find_value(&mut self, find: Value) {
        self.inner.set_func(bind(&find, &self.with));
        self.find = find;
    }

    pub fn set_replace_value(&mut self, with: Value) {
        self.inner.set_func(bind(&self.find, &with));
        self.with = with;
    }

    pub fn supported_types() -> &'static [DType] {
        &SUPPORTED
    }
}

impl Block for ReplaceBlock {
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
            "findValue" => Ok(self.find.clone()),
            "replaceValue" => Ok(self.with.clone()),
            "setFindValue" => {
                self.set_find_value(single_arg(name, args)?.clone());
                Ok(Value::Null)
            }
            "setReplaceValue" => {
                self.set_replace_value(single_arg(name, args)?.clone());
                Ok(Value::Null)
            }
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
    fn replaces_nan_and_near_matches() {
        let mut block = ReplaceBlock::new(AUTO_DEVICE, DType::Float64, Value::Float(f64::NAN), Value::Float(0.0), 1)
            .unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64, f64::NAN, 2.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![1.0, 0.0, 2.0]);

        block.call("setFindValue", &[Value::Float(2.0)]).unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[2.0000001f64, 3.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![0.0, 3.0]);
    }

    #[test]
    fn ints_match_exactly() {
        let mut block = ReplaceBlock::new(AUTO_DEVICE, DType::UInt16, Value::UInt(7), Value::UInt(8), 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[7u16, 6])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[1u16, 7])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<u16>().unwrap(), vec![8, 6]);
        assert_eq!(block.output(1).unwrap().collect_vec::<u16>().unwrap(), vec![1, 8]);
        assert!(ReplaceBlock::new(AUTO_DEVICE, DType::Int64, Value::Int(0), Value::Int(1), 1).is_err());
    }
}
