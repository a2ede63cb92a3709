//! Host streaming buffers and the buffer adapter.
//!
//! A [`BufferChunk`] is a typed view into a shared host allocation. The two
//! adapter functions move data across the host/array boundary and always
//! copy, so a buffer and an [`Array`] never alias:
//!
//! - [`to_array`] copies a buffer's bytes into a fresh array on a device.
//! - [`to_buffer_chunk`] stages an array into pinned memory taken from the
//!   pool of the array's backend. The memory goes back to that pool when the
//!   last buffer referencing it is dropped.

use crate::array::{Array, ArrayData};
use crate::backend::{Backend, DeviceId};
use crate::config;
use crate::dtype::{DType, Element};
use crate::error::{BlockError, Result};
use std::sync::{Arc, Mutex};

/// Recycles pinned staging allocations for one backend.
#[derive(Debug)]
pub struct PinnedPool {
    backend: Backend,
    free: Mutex<Vec<Vec<u8>>>,
}

impl PinnedPool {
    fn new(backend: Backend) -> Self {
        Self { backend, free: Mutex::new(Vec::new()) }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// An empty vector with at least `capacity` bytes reserved.
    pub fn take(&self, capacity: usize) -> Vec<u8> {
        if let Ok(mut free) = self.free.lock() {
            if let Some(pos) = free.iter().position(|v| v.capacity() >= capacity) {
                let mut bytes = free.swap_remove(pos);
                bytes.clear();
                return bytes;
            }
        }
        Vec::with_capacity(capacity)
    }

    /// Returns an allocation to the pool. Never panics.
    pub fn recycle(&self, mut bytes: Vec<u8>) {
        let limit = config::global().pinned_pool_limit;
        if let Ok(mut free) = self.free.lock() {
            let retained: usize = free.iter().map(Vec::capacity).sum();
            if retained + bytes.capacity() <= limit {
                bytes.clear();
                free.push(bytes);
            }
        }
    }

    /// Bytes currently held for reuse.
    pub fn retained_bytes(&self) -> usize {
        self.free.lock().map_or(0, |free| free.iter().map(Vec::capacity).sum())
    }
}

lazy_static::lazy_static! {
    static ref PINNED_POOLS: [PinnedPool; 3] = Backend::ALL.map(PinnedPool::new);
}

/// The process-wide pinned pool of a backend.
pub fn pinned_pool(backend: Backend) -> &'static PinnedPool {
    &PINNED_POOLS[backend as usize]
}

#[derive(Debug)]
enum AllocationKind {
    Generic,
    Pinned(Backend),
}

/// Backing storage shared between buffer views.
#[derive(Debug)]
struct Allocation {
    bytes: Vec<u8>,
    kind: AllocationKind,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let AllocationKind::Pinned(backend) = self.kind {
            pinned_pool(backend).recycle(std::mem::take(&mut self.bytes));
        }
    }
}

/// A typed, contiguous region of host memory.
#[derive(Debug, Clone)]
pub struct BufferChunk {
    alloc: Arc<Allocation>,
    offset: usize,
    length: usize,
    dtype: DType,
}

impl BufferChunk {
    fn from_allocation(alloc: Allocation, dtype: DType) -> Self {
        let length = alloc.bytes.len();
        Self { alloc: Arc::new(alloc), offset: 0, length, dtype }
    }

    /// An empty buffer of the given type.
    pub fn empty(dtype: DType) -> Self {
        Self::from_allocation(Allocation { bytes: Vec::new(), kind: AllocationKind::Generic }, dtype)
    }

    /// A zero-filled buffer of `elements` elements.
    pub fn zeros(dtype: DType, elements: usize) -> Self {
        let bytes = vec![0u8; elements * dtype.size()];
        Self::from_allocation(Allocation { bytes, kind: AllocationKind::Generic }, dtype)
    }

    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        let bytes = bytemuck::cast_slice::<T, u8>(data).to_vec();
        Self::from_allocation(Allocation { bytes, kind: AllocationKind::Generic }, T::DTYPE)
    }

    /// Wraps raw bytes; the length must be a whole number of elements.
    pub fn from_bytes(dtype: DType, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() % dtype.size() != 0 {
            return Err(BlockError::assertion(format!(
                "{} bytes is not a whole number of {dtype} elements",
                bytes.len()
            )));
        }
        Ok(Self::from_allocation(Allocation { bytes, kind: AllocationKind::Generic }, dtype))
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn elements(&self) -> usize {
        self.length / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.alloc.bytes[self.offset..self.offset + self.length]
    }

    /// The backend whose pinned pool owns this buffer's memory, if any.
    pub fn pinned_backend(&self) -> Option<Backend> {
        match self.alloc.kind {
            AllocationKind::Pinned(b) => Some(b),
            AllocationKind::Generic => None,
        }
    }

    /// Copies the elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(BlockError::invalid(format!(
                "buffer holds {}, not {}",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(self.as_bytes()))
    }

    /// A view of `count` elements starting at element `start`, sharing memory.
    pub fn slice(&self, start: usize, count: usize) -> Result<Self> {
        let size = self.dtype.size();
        if start.checked_add(count).is_none_or(|end| end > self.elements()) {
            return Err(BlockError::assertion(format!(
                "slice {start}+{count} out of {} elements",
                self.elements()
            )));
        }
        Ok(Self {
            alloc: Arc::clone(&self.alloc),
            offset: self.offset + start * size,
            length: count * size,
            dtype: self.dtype,
        })
    }

    /// Appends another buffer of the same type, reallocating.
    pub fn append(&mut self, other: &BufferChunk) -> Result<()> {
        if other.dtype != self.dtype {
            return Err(BlockError::invalid(format!(
                "cannot append {} to {}",
                other.dtype, self.dtype
            )));
        }
        let mut bytes = Vec::with_capacity(self.length + other.length);
        bytes.extend_from_slice(self.as_bytes());
        bytes.extend_from_slice(other.as_bytes());
        *self = Self::from_allocation(Allocation { bytes, kind: AllocationKind::Generic }, self.dtype);
        Ok(())
    }
}

impl PartialEq for BufferChunk {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.as_bytes() == other.as_bytes()
    }
}

/// Copies a host buffer into a new 1-D array on `device`.
pub fn to_array(buffer: &BufferChunk, device: DeviceId) -> Result<Array> {
    let data = ArrayData::from_bytes(buffer.dtype(), buffer.as_bytes())?;
    log::trace!("buffer -> array: {} x {} on {device}", data.len(), buffer.dtype());
    Ok(Array::from_data(data, device))
}

/// Stages an array into pinned host memory.
///
/// # Errors
/// - [`BlockError::AssertionViolation`] if the array has no elements
pub fn to_buffer_chunk(array: &Array) -> Result<BufferChunk> {
    if array.elements() == 0 {
        return Err(BlockError::assertion("cannot convert an empty array to a buffer"));
    }
    let backend = array.device().backend;
    let src = array.data().as_bytes();
    let mut bytes = pinned_pool(backend).take(src.len());
    bytes.extend_from_slice(src);
    log::trace!("array -> buffer: {} x {} from {}", array.elements(), array.dtype(), array.device());
    Ok(BufferChunk::from_allocation(
        Allocation { bytes, kind: AllocationKind::Pinned(backend) },
        array.dtype(),
    ))
}
