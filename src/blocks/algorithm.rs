//! Sorting, set extraction and order statistics.

use crate::block::{ArrayBlock, Block, Label, OneToOneBlock, UnaryFn, setup_ports, single_arg, unknown_call};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::data;
use crate::value::Value;

fn bind(ascending: bool) -> UnaryFn {
    Box::new(move |a| data::sort(a, ascending))
}

/// Sorts each buffer of each channel.
pub struct SortBlock {
    inner: OneToOneBlock,
    ascending: bool,
}

impl SortBlock {
    pub fn new(device: &str, dtype: DType, ascending: bool, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let inner = OneToOneBlock::new(device, "sort", bind(ascending), dtype, dtype, nchans)?;
        Ok(Self { inner, ascending })
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    pub fn set_is_ascending(&mut self, ascending: bool) {
        self.inner.set_func(bind(ascending));
        self.ascending = ascending;
    }
}

impl Block for SortBlock {
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
            "isAscending" => Ok(Value::Bool(self.ascending)),
            "setIsAscending" => {
                self.set_is_ascending(single_arg(name, args)?.as_bool()?);
                Ok(Value::Null)
            }
            _ => self.inner.call(name, args),
        }
    }
}

/// Posts the distinct values seen across all channels in one step, ascending.
pub struct SetUniqueBlock {
    base: ArrayBlock,
}

impl SetUniqueBlock {
    pub fn new(device: &str, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let mut base = ArrayBlock::new("set_unique", device)?;
        setup_ports(&mut base, dtype, dtype, nchans, 1);
        Ok(Self { base })
    }
}

impl Block for SetUniqueBlock {
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
        let unique = data::set_unique(&input)?;
        self.base.consume_all(elems)?;
        self.base.post_array(0, &unique)
    }
}

/// Forwards its input and labels each buffer with its minimum or maximum.
///
/// The label's index points at the first occurrence of the extreme value.
pub struct ExtremumBlock {
    base: ArrayBlock,
    largest: bool,
}

impl ExtremumBlock {
    pub fn new(device: &str, dtype: DType, largest: bool) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let mut base = ArrayBlock::new(if largest { "max" } else { "min" }, device)?;
        setup_ports(&mut base, dtype, dtype, 1, 1);
        Ok(Self { base, largest })
    }

    fn label_id(&self) -> &'static str {
        if self.largest { "MAX" } else { "MIN" }
    }
}

impl Block for ExtremumBlock {
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
        let (value, index) = data::extremum(&input, self.largest)?
            .ok_or_else(|| BlockError::assertion("extremum of an empty buffer"))?;
        let chunk = self.base.inputs()[0].buffer().slice(0, elems)?;
        self.base.consume(0, elems)?;
        self.base.post_label(0, Label::new(self.label_id(), value, index))?;
        self.base.post_buffer(0, chunk)
    }
}

/// Which end of the ordering [`TopKBlock`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopKOrder {
    Max,
    Min,
}

impl TopKOrder {
    pub fn name(self) -> &'static str {
        match self {
            TopKOrder::Max => "Max",
            TopKOrder::Min => "Min",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "Max" => Ok(TopKOrder::Max),
            "Min" => Ok(TopKOrder::Min),
            other => Err(BlockError::invalid(format!("Invalid TopK order: {other}"))),
        }
    }
}

/// Forwards its input and keeps the `k` best values of the most recent
/// buffer as `lastValue`.
pub struct TopKBlock {
    base: ArrayBlock,
    k: usize,
    order: TopKOrder,
    last_value: Vec<Value>,
}

impl TopKBlock {
    pub fn new(device: &str, dtype: DType, k: usize, order: TopKOrder) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let mut base = ArrayBlock::new("topk", device)?;
        setup_ports(&mut base, dtype, dtype, 1, 1);
        let mut block = Self { base, k: 0, order, last_value: Vec::new() };
        block.set_k(k)?;
        Ok(block)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn set_k(&mut self, k: usize) -> Result<()> {
        if k == 0 {
            return Err(BlockError::invalid("K must be positive."));
        }
        self.k = k;
        Ok(())
    }

    pub fn order(&self) -> TopKOrder {
        self.order
    }

    pub fn set_order(&mut self, order: TopKOrder) {
        self.order = order;
    }
}

impl Block for TopKBlock {
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
        self.last_value = data::top_k(&input, self.k, self.order == TopKOrder::Max)?;
        let chunk = self.base.inputs()[0].buffer().slice(0, elems)?;
        self.base.consume(0, elems)?;
        self.base.post_buffer(0, chunk)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "K" | "getK" => Ok(Value::from(self.k)),
            "setK" => {
                self.set_k(single_arg(name, args)?.as_usize()?)?;
                Ok(Value::Null)
            }
            "getOrder" => Ok(Value::from(self.order.name())),
            "setOrder" => {
                self.set_order(TopKOrder::from_name(single_arg(name, args)?.as_str()?)?);
                Ok(Value::Null)
            }
            "lastValue" | "getLastValue" => Ok(Value::List(self.last_value.clone())),
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn sorts_each_channel() {
        let mut block = SortBlock::new(AUTO_DEVICE, DType::Int32, true, 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[3i32, 1, 2])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[0i32, -4, 9])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<i32>().unwrap(), vec![1, 2, 3]);
        assert_eq!(block.output(1).unwrap().collect_vec::<i32>().unwrap(), vec![-4, 0, 9]);

        block.call("setIsAscending", &[Value::Bool(false)]).unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1i32, 5])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[2i32, 2])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<i32>().unwrap(), vec![5, 1]);
    }

    #[test]
    fn unique_across_channels() {
        let mut block = SetUniqueBlock::new(AUTO_DEVICE, DType::Float32, 2).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[3.0f32, 1.0, 3.0])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[1.0f32, 2.0, 7.0])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 7.0]);
        assert!(SetUniqueBlock::new(AUTO_DEVICE, DType::ComplexFloat32, 1).is_err());
    }

    #[test]
    fn max_label_precedes_buffer() {
        let mut block = ExtremumBlock::new(AUTO_DEVICE, DType::UInt16, true).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[4u16, 11, 2, 11])).unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap();
        assert_eq!(out.drain_labels(), vec![Label::new("MAX", Value::UInt(11), 1)]);
        assert_eq!(out.collect_vec::<u16>().unwrap(), vec![4, 11, 2, 11]);

        let mut min = ExtremumBlock::new(AUTO_DEVICE, DType::Float64, false).unwrap();
        min.activate().unwrap();
        min.input(0).unwrap().push(&BufferChunk::from_slice(&[0.5f64, -3.0])).unwrap();
        min.work().unwrap();
        assert_eq!(min.output(0).unwrap().drain_labels()[0], Label::new("MIN", -3.0, 1));
    }

    #[test]
    fn top_k_tracks_last_buffer() {
        let mut block = TopKBlock::new(AUTO_DEVICE, DType::Int16, 2, TopKOrder::Max).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[3i16, 9, -1, 7])).unwrap();
        block.work().unwrap();
        assert_eq!(
            block.call("lastValue", &[]).unwrap(),
            Value::List(vec![Value::Int(9), Value::Int(7)])
        );
        assert_eq!(block.output(0).unwrap().collect_vec::<i16>().unwrap(), vec![3, 9, -1, 7]);

        block.call("setOrder", &[Value::from("Min")]).unwrap();
        block.call("setK", &[Value::from(1usize)]).unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[3i16, 9, -1])).unwrap();
        block.work().unwrap();
        assert_eq!(block.call("lastValue", &[]).unwrap(), Value::List(vec![Value::Int(-1)]));
        assert!(block.call("setK", &[Value::from(0usize)]).is_err());
        assert!(block.call("setOrder", &[Value::from("Median")]).is_err());
    }
}
