//! # Concrete blocks
//!
//! Blocks that need more than a table entry: extra parameters, runtime
//! properties, custom port layouts or their own `work()` step. The
//! table-driven ops are built directly from the shape variants in
//! [`crate::block`] by the [`crate::registry`].
//!
//! - [`arith`]: powers and logarithms of a rebindable base, and `modf`
//! - [`cast`]: element type conversion
//! - [`clamp`] / [`replace`]: value-level rewrites with rebindable bounds
//! - [`filter`]: FIR and IIR filters
//! - [`convolve`]: spatial and FFT convolution with selectable output length
//! - [`fft`]: complex and real FFTs
//! - [`statistics`]: labels carrying per-channel summary values, and
//!   covariance and correlation of a channel pair
//! - [`sources`]: constant and random sources
//! - [`file`]: archive-backed file source and sink
//! - [`complex`]: splitting and polar conversion of complex streams
//! - [`algorithm`]: sorting, set extraction, extremes and top-k
//! - [`comms`]: label-driven scaling and rotation, waveform generation
//! - [`flat`]: channel concatenation

pub mod algorithm;
pub mod arith;
pub mod cast;
pub mod clamp;
pub mod comms;
pub mod complex;
pub mod convolve;
pub mod fft;
pub mod file;
pub mod filter;
pub mod flat;
pub mod replace;
pub mod sources;
pub mod statistics;

pub use algorithm::{ExtremumBlock, SetUniqueBlock, SortBlock, TopKBlock, TopKOrder};
pub use arith::{LogNBlock, ModfBlock, PowNBlock};
pub use cast::cast_block;
pub use clamp::ClampBlock;
pub use comms::{RotateBlock, ScaleBlock, Waveform, WaveformSource};
pub use complex::{SplitComplexBlock, polar_to_complex_block};
pub use convolve::ConvolveBlock;
pub use fft::{FftBlock, RfftBlock};
pub use file::{FileSinkBlock, FileSourceBlock};
pub use filter::{FirBlock, IirBlock};
pub use flat::FlatBlock;
pub use replace::ReplaceBlock;
pub use sources::{ConstantSource, RandomSource};
pub use statistics::{PairStatistic, PairStatisticBlock, StatisticsBlock};
