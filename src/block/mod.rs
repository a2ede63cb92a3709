//! # Block framework
//!
//! A block is a dataflow node with typed input and output ports. The host
//! pushes [`BufferChunk`]s into inputs, calls [`Block::work`], and drains
//! what the block posted to its outputs.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed ──activate()──▶ Active ──work()──▶ Running ──deactivate()──▶ Inactive
//!                                                  ▲   │
//!                                                  └───┘ work()
//! ```
//!
//! The device is resolved once when the block is built and never changes.
//! Calling `work()` outside `Active`/`Running` is an
//! [`AssertionViolation`](BlockError::AssertionViolation).
//!
//! ## Shapes
//!
//! - [`OneToOneBlock`]: N inputs, N outputs, one unary function
//! - [`TwoToOneBlock`]: two inputs, one output, one binary function
//! - [`NToOneBlock`]: left fold of a binary function over N inputs
//! - [`ReducedBlock`]: a true reduction over the channel axis
//! - [`ScalarOpBlock`]: a binary function against a rebindable scalar

pub mod args;
pub mod n_to_one;
pub mod one_to_one;
pub mod port;
pub mod reduced;
pub mod scalar_op;
pub mod two_to_one;

pub use args::BlockArgs;
pub use n_to_one::{FoldFn, NToOneBlock};
pub use one_to_one::{OneToOneBlock, UnaryFn};
pub use port::{InputPort, Label, OutputPort, WorkInfo};
pub use reduced::ReducedBlock;
pub use scalar_op::ScalarOpBlock;
pub use two_to_one::{BinaryFn, TwoToOneBlock};

use crate::array::Array;
use crate::backend::DeviceId;
use crate::buffer::{self, BufferChunk};
use crate::device::{self, DeviceCacheEntry};
use crate::dtype::DType;
use crate::error::{BlockError, Result};
use crate::value::Value;

/// Lifecycle state of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Constructed,
    Active,
    Running,
    Inactive,
}

/// A dataflow node.
pub trait Block: Send {
    fn base(&self) -> &ArrayBlock;

    fn base_mut(&mut self) -> &mut ArrayBlock;

    fn activate(&mut self) -> Result<()> {
        self.base_mut().activate()
    }

    fn deactivate(&mut self) -> Result<()> {
        self.base_mut().deactivate();
        Ok(())
    }

    /// Processes whatever input is available.
    fn work(&mut self) -> Result<()>;

    /// Invokes a named property getter or setter.
    fn call(&mut self, name: &str, _args: &[Value]) -> Result<Value> {
        Err(unknown_call(self.base(), name))
    }

    fn input(&mut self, index: usize) -> Result<&mut InputPort> {
        self.base_mut().input_mut(index)
    }

    fn output(&mut self, index: usize) -> Result<&mut OutputPort> {
        self.base_mut().output_mut(index)
    }
}

pub(crate) fn unknown_call(base: &ArrayBlock, name: &str) -> BlockError {
    BlockError::NotFound(format!("{} has no call \"{name}\"", base.name()))
}

/// Exactly one argument of a property call.
pub(crate) fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value> {
    match args {
        [v] => Ok(v),
        _ => Err(BlockError::invalid(format!("{name} takes one argument, got {}", args.len()))),
    }
}

/// State shared by every block: device, lifecycle and ports.
#[derive(Debug)]
pub struct ArrayBlock {
    name: String,
    device: &'static DeviceCacheEntry,
    state: BlockState,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl ArrayBlock {
    /// Resolves `device_name` against the device cache.
    ///
    /// # Errors
    /// - [`BlockError::InvalidArgument`] for an unknown device name
    /// - [`BlockError::Environment`] when no device is available
    pub fn new(name: &str, device_name: &str) -> Result<Self> {
        let device = device::resolve_device(device_name)?;
        log::debug!("{name}: using {} [{}]", device.name, device.backend);
        Ok(Self {
            name: name.to_owned(),
            device,
            state: BlockState::Constructed,
            inputs: Vec::new(),
            outputs: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &'static DeviceCacheEntry {
        self.device
    }

    pub fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn setup_input(&mut self, dtype: DType) -> usize {
        let index = self.inputs.len();
        self.inputs.push(InputPort::new(index, dtype));
        index
    }

    pub fn setup_output(&mut self, dtype: DType) -> usize {
        let index = self.outputs.len();
        self.outputs.push(OutputPort::new(index, dtype));
        index
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn input_mut(&mut self, index: usize) -> Result<&mut InputPort> {
        let count = self.inputs.len();
        self.inputs
            .get_mut(index)
            .ok_or_else(|| BlockError::NotFound(format!("input {index} of {count}")))
    }

    pub fn output_mut(&mut self, index: usize) -> Result<&mut OutputPort> {
        let count = self.outputs.len();
        self.outputs
            .get_mut(index)
            .ok_or_else(|| BlockError::NotFound(format!("output {index} of {count}")))
    }

    /// Re-checks that the bound device is still cached.
    pub fn activate(&mut self) -> Result<()> {
        if device::entry_for(self.device_id()).is_none() {
            return Err(BlockError::Environment(format!(
                "device \"{}\" is no longer available",
                self.device.name
            )));
        }
        self.state = BlockState::Active;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.state = BlockState::Inactive;
    }

    pub fn work_info(&self) -> WorkInfo {
        WorkInfo { min_in_elements: self.inputs.iter().map(InputPort::elements).min().unwrap_or(0) }
    }

    fn ensure_running(&mut self) -> Result<()> {
        match self.state {
            BlockState::Active | BlockState::Running => {
                self.state = BlockState::Running;
                Ok(())
            }
            state => Err(BlockError::assertion(format!(
                "{}: work() called while {state:?}",
                self.name
            ))),
        }
    }

    /// Checks the lifecycle state and returns the elements available on
    /// every input.
    pub fn begin_work(&mut self) -> Result<usize> {
        self.ensure_running()?;
        Ok(self.work_info().min_in_elements)
    }

    /// Copies an input's pending elements, optionally only the first
    /// `truncate`, into an array on this block's device.
    pub fn input_as_array(&self, port: usize, truncate: Option<usize>) -> Result<Array> {
        let input = self
            .inputs
            .get(port)
            .ok_or_else(|| BlockError::NotFound(format!("input {port}")))?;
        let chunk = match truncate {
            Some(n) => input.buffer().slice(0, n)?,
            None => input.buffer().clone(),
        };
        buffer::to_array(&chunk, self.device_id())
    }

    pub fn consume(&mut self, port: usize, elements: usize) -> Result<()> {
        self.input_mut(port)?.consume(elements)
    }

    /// Stacks the first `elements` of every input into a `[inputs, elements]`
    /// array. Nothing is consumed; see [`consume_all`](Self::consume_all).
    pub fn numbered_inputs_as_2d(&self, elements: usize) -> Result<Array> {
        let rows = (0..self.inputs.len())
            .map(|port| self.input_as_array(port, Some(elements)))
            .collect::<Result<Vec<Array>>>()?;
        Array::stack_rows(&rows)
    }

    /// Consumes `elements` from every input.
    pub fn consume_all(&mut self, elements: usize) -> Result<()> {
        for port in 0..self.inputs.len() {
            self.consume(port, elements)?;
        }
        Ok(())
    }

    /// Stages `array` and posts it on output `port`.
    pub fn post_array(&mut self, port: usize, array: &Array) -> Result<()> {
        let chunk = buffer::to_buffer_chunk(array)?;
        self.post_buffer(port, chunk)
    }

    pub fn post_buffer(&mut self, port: usize, chunk: BufferChunk) -> Result<()> {
        self.output_mut(port)?.post_buffer(chunk)
    }

    /// Posts row `i` of a 2-D array on output `i`.
    pub fn post_2d_array_to_numbered_outputs(&mut self, array: &Array) -> Result<()> {
        if array.rows() != self.outputs.len() {
            return Err(BlockError::assertion(format!(
                "{} rows for {} outputs",
                array.rows(),
                self.outputs.len()
            )));
        }
        for (port, row) in array.row_arrays()?.iter().enumerate() {
            self.post_array(port, row)?;
        }
        Ok(())
    }

    pub fn post_label(&mut self, port: usize, label: Label) -> Result<()> {
        self.output_mut(port)?.post_label(label);
        Ok(())
    }
}

/// Declares `inputs` ports of type `input` and `outputs` ports of type `output`.
pub(crate) fn setup_ports(base: &mut ArrayBlock, input: DType, output: DType, inputs: usize, outputs: usize) {
    for _ in 0..inputs {
        base.setup_input(input);
    }
    for _ in 0..outputs {
        base.setup_output(output);
    }
}

/// Casts a kernel result to the declared output type and checks its size.
pub(crate) fn conform(out: Array, dtype: DType, expected: usize) -> Result<Array> {
    if out.elements() != expected {
        return Err(BlockError::assertion(format!(
            "Unexpected output size: expected {expected}, got {}",
            out.elements()
        )));
    }
    Ok(if out.dtype() == dtype { out } else { out.cast(dtype) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn lifecycle_gates_work() {
        let mut base = ArrayBlock::new("test", AUTO_DEVICE).unwrap();
        base.setup_input(DType::Float64);
        assert_eq!(base.state(), BlockState::Constructed);
        assert!(matches!(base.begin_work(), Err(BlockError::AssertionViolation(_))));
        base.activate().unwrap();
        assert_eq!(base.begin_work().unwrap(), 0);
        assert_eq!(base.state(), BlockState::Running);
        base.deactivate();
        assert!(base.begin_work().is_err());
    }

    #[test]
    fn unknown_device_is_rejected() {
        assert!(matches!(
            ArrayBlock::new("test", "no such device"),
            Err(BlockError::InvalidArgument(_))
        ));
    }

    #[test]
    fn stacks_and_posts_rows() {
        let mut base = ArrayBlock::new("test", AUTO_DEVICE).unwrap();
        setup_ports(&mut base, DType::Int16, DType::Int16, 2, 2);
        base.input_mut(0).unwrap().push(&BufferChunk::from_slice(&[1i16, 2, 3])).unwrap();
        base.input_mut(1).unwrap().push(&BufferChunk::from_slice(&[4i16, 5])).unwrap();
        assert_eq!(base.work_info().min_in_elements, 2);

        let stacked = base.numbered_inputs_as_2d(2).unwrap();
        assert_eq!(stacked.dims(), &[2, 2]);
        assert_eq!(base.inputs()[0].elements(), 3);
        base.consume_all(2).unwrap();
        assert_eq!(base.inputs()[0].elements(), 1);
        assert_eq!(base.inputs()[1].elements(), 0);

        base.post_2d_array_to_numbered_outputs(&stacked).unwrap();
        assert_eq!(base.output_mut(1).unwrap().collect_vec::<i16>().unwrap(), vec![4, 5]);
    }
}
