//! arrayflow: array-compute dataflow blocks on GPU and CPU backends.
//!
//! Element-wise math, reductions, signal processing and data manipulation,
//! each wrapped as a block with typed input and output ports. A block is
//! bound to one compute device when it is built. The host feeds it
//! [`buffer::BufferChunk`]s, calls [`block::Block::work`] and drains its
//! outputs.
//!
//! # Features
//!
//! - Device discovery across GPU compute APIs (`wgpu` feature) with a CPU
//!   fallback that is always present.
//! - A zero-surprise buffer adapter: every supported element type round-trips
//!   bit-exactly between buffers and arrays.
//! - Shape-specific block variants (one-to-one, two-to-one, N-to-one,
//!   reduced, scalar) generated from declarative op tables.
//! - A keyed array archive format for file sources and sinks.
//!
//! # Modules
//!
//! - [`backend`] / [`device`]: backends, device cache and device selection
//! - [`dtype`] / [`value`]: element types and loosely typed parameters
//! - [`array`] / [`buffer`]: device-tagged arrays and stream buffers
//! - [`ops`]: numeric kernels
//! - [`block`]: block base, ports and shape variants
//! - [`blocks`]: concrete parameterized blocks
//! - [`registry`]: registration paths and factories
//! - [`archive`]: the on-disk array format
//! - [`config`] / [`error`]: process configuration and the error type
//!
//! # Example
//!
//! ```rust
//! use arrayflow::block::BlockArgs;
//! use arrayflow::buffer::BufferChunk;
//! use arrayflow::registry;
//!
//! let args = BlockArgs::new().with("dtype", "float64");
//! let mut block = registry::make("/gpu/arith/abs", &args).unwrap();
//! block.activate().unwrap();
//! block.input(0).unwrap().push(&BufferChunk::from_slice(&[-3.0f64, 4.0])).unwrap();
//! block.work().unwrap();
//! assert_eq!(block.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![3.0, 4.0]);
//! ```

#![deny(unsafe_code)]

pub mod archive;
pub mod array;
pub mod backend;
pub mod block;
pub mod blocks;
pub mod buffer;
pub mod config;
pub mod device;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod registry;
pub mod value;

pub use error::{BlockError, Result};
