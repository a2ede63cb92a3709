//! Typed input and output ports.

use crate::buffer::BufferChunk;
use crate::dtype::{DType, Element};
use crate::error::{BlockError, Result};
use crate::value::Value;
use std::collections::VecDeque;

/// Metadata attached to a position in an output stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: String,
    pub data: Value,
    /// Element offset relative to the next posted buffer.
    pub index: usize,
}

impl Label {
    pub fn new(id: impl Into<String>, data: impl Into<Value>, index: usize) -> Self {
        Self { id: id.into(), data: data.into(), index }
    }
}

/// Buffered input of one element type.
#[derive(Debug)]
pub struct InputPort {
    index: usize,
    dtype: DType,
    buffer: BufferChunk,
    labels: Vec<Label>,
}

impl InputPort {
    pub(crate) fn new(index: usize, dtype: DType) -> Self {
        Self { index, dtype, buffer: BufferChunk::empty(dtype), labels: Vec::new() }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Elements waiting to be consumed.
    pub fn elements(&self) -> usize {
        self.buffer.elements()
    }

    pub fn buffer(&self) -> &BufferChunk {
        &self.buffer
    }

    /// Queues `chunk` behind any unconsumed input.
    pub fn push(&mut self, chunk: &BufferChunk) -> Result<()> {
        if chunk.dtype() != self.dtype {
            return Err(BlockError::invalid(format!(
                "input {} expects {}, got {}",
                self.index,
                self.dtype,
                chunk.dtype()
            )));
        }
        if self.buffer.is_empty() {
            self.buffer = chunk.clone();
            return Ok(());
        }
        self.buffer.append(chunk)
    }

    /// Attaches `label` to the queued stream; its index counts from the
    /// first unconsumed element.
    pub fn push_label(&mut self, label: Label) {
        let at = self.labels.partition_point(|l| l.index <= label.index);
        self.labels.insert(at, label);
    }

    /// Pending labels in stream order.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Drops the first `n` elements and the labels attached to them.
    pub fn consume(&mut self, n: usize) -> Result<()> {
        let left = self.elements().checked_sub(n).ok_or_else(|| {
            BlockError::assertion(format!(
                "input {} cannot consume {n} of {} elements",
                self.index,
                self.elements()
            ))
        })?;
        self.buffer = self.buffer.slice(n, left)?;
        self.labels.retain_mut(|label| match label.index.checked_sub(n) {
            Some(index) => {
                label.index = index;
                true
            }
            None => false,
        });
        Ok(())
    }
}

/// Output of one element type, holding what the block posted.
#[derive(Debug)]
pub struct OutputPort {
    index: usize,
    dtype: DType,
    posted: VecDeque<BufferChunk>,
    labels: Vec<Label>,
    elements_posted: usize,
}

impl OutputPort {
    pub(crate) fn new(index: usize, dtype: DType) -> Self {
        Self { index, dtype, posted: VecDeque::new(), labels: Vec::new(), elements_posted: 0 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Total elements ever posted on this port.
    pub fn elements_posted(&self) -> usize {
        self.elements_posted
    }

    pub fn post_buffer(&mut self, chunk: BufferChunk) -> Result<()> {
        if chunk.dtype() != self.dtype {
            return Err(BlockError::assertion(format!(
                "output {} carries {}, got {}",
                self.index,
                self.dtype,
                chunk.dtype()
            )));
        }
        self.elements_posted += chunk.elements();
        self.posted.push_back(chunk);
        Ok(())
    }

    pub fn post_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn drain_buffers(&mut self) -> Vec<BufferChunk> {
        self.posted.drain(..).collect()
    }

    pub fn drain_labels(&mut self) -> Vec<Label> {
        std::mem::take(&mut self.labels)
    }

    /// Drains every posted buffer into one vector of `T`.
    pub fn collect_vec<T: Element>(&mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for chunk in self.drain_buffers() {
            out.extend(chunk.to_vec::<T>()?);
        }
        Ok(out)
    }
}

/// Element availability for one `work()` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkInfo {
    /// Smallest element count over all inputs; 0 when there are no inputs.
    pub min_in_elements: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_queue_and_consume() {
        let mut port = InputPort::new(0, DType::Int32);
        port.push(&BufferChunk::from_slice(&[1i32, 2])).unwrap();
        port.push(&BufferChunk::from_slice(&[3i32])).unwrap();
        assert_eq!(port.elements(), 3);
        port.consume(2).unwrap();
        assert_eq!(port.buffer().to_vec::<i32>().unwrap(), vec![3]);
        assert!(port.consume(5).is_err());
        assert!(port.push(&BufferChunk::from_slice(&[1.0f32])).is_err());
    }

    #[test]
    fn labels_move_with_consumption() {
        let mut port = InputPort::new(0, DType::Float32);
        port.push(&BufferChunk::from_slice(&[0.0f32; 8])).unwrap();
        port.push_label(Label::new("b", 2.0, 5));
        port.push_label(Label::new("a", 1.0, 1));
        assert_eq!(port.labels()[0].id, "a");

        port.consume(3).unwrap();
        assert_eq!(port.labels(), &[Label::new("b", 2.0, 2)]);
        port.consume(3).unwrap();
        assert!(port.labels().is_empty());
    }

    #[test]
    fn output_collects() {
        let mut port = OutputPort::new(1, DType::UInt8);
        port.post_buffer(BufferChunk::from_slice(&[1u8, 2])).unwrap();
        port.post_buffer(BufferChunk::from_slice(&[3u8])).unwrap();
        assert_eq!(port.elements_posted(), 3);
        assert_eq!(port.collect_vec::<u8>().unwrap(), vec![1, 2, 3]);
        assert!(port.drain_buffers().is_empty());
        assert!(port.post_buffer(BufferChunk::from_slice(&[1i8])).is_err());
    }
}
