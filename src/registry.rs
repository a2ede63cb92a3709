//! # Block registry
//!
//! Maps registration paths of the form `/gpu/<category>/<name>` to block
//! factories. Each factory takes a [`BlockArgs`] map and validates the
//! requested element type before building anything.
//!
//! Table-declared ops ([`UnaryOp::ALL`], [`BinaryOp::ALL`]) are registered by
//! walking the tables; everything with extra parameters is registered by
//! hand below.
//!
//! ```text
//! registry().make("/gpu/arith/sin", &BlockArgs::new().with("dtype", "float32"))
//!     └─▶ OneToOneBlock bound to UnaryOp::Sin, float32 in and out
//! ```

use crate::block::{Block, BlockArgs, NToOneBlock, OneToOneBlock, ReducedBlock, ScalarOpBlock, TwoToOneBlock};
use crate::blocks::{
    ClampBlock, ConstantSource, ConvolveBlock, ExtremumBlock, FftBlock, FileSinkBlock, FileSourceBlock, FirBlock,
    FlatBlock, IirBlock, LogNBlock, ModfBlock, PairStatistic, PairStatisticBlock, PowNBlock, RandomSource,
    ReplaceBlock, RfftBlock, RotateBlock, ScaleBlock, SetUniqueBlock, SortBlock, SplitComplexBlock, StatisticsBlock,
    TopKBlock, TopKOrder, Waveform, WaveformSource, cast_block, filter, polar_to_complex_block,
};
use crate::dtype::{DType, DTypeSupport};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::random::Distribution;
use crate::ops::reduce::{Reduction, Statistic};
use crate::ops::signal::{ConvDomain, ConvMode};
use crate::ops::unary::UnaryOp;
use crate::value::Value;
use lazy_static::lazy_static;
use std::collections::BTreeMap;

/// Builds a block from its arguments.
pub type Factory = Box<dyn Fn(&BlockArgs) -> Result<Box<dyn Block>> + Send + Sync>;

struct Registration {
    factory: Factory,
    types: Vec<DType>,
}

/// Registration paths and their factories.
#[derive(Default)]
pub struct BlockRegistry {
    entries: BTreeMap<String, Registration>,
}

lazy_static! {
    static ref REGISTRY: BlockRegistry = BlockRegistry::builtin();
}

/// The process-wide registry of every built-in block.
pub fn registry() -> &'static BlockRegistry {
    &REGISTRY
}

/// Shorthand for `registry().make(path, args)`.
pub fn make(path: &str, args: &BlockArgs) -> Result<Box<dyn Block>> {
    registry().make(path, args)
}

fn boxed<B: Block + 'static>(block: Result<B>) -> Result<Box<dyn Block>> {
    Ok(Box::new(block?))
}

/// Looks `args[key]` up in a fixed set of operation names.
fn choice<T: Copy>(args: &BlockArgs, key: &str, choices: &[(&str, T)]) -> Result<T> {
    let name = args.value(key)?.as_str()?;
    choices
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, v)| v)
        .ok_or_else(|| BlockError::invalid(format!("Invalid {key}: {name}")))
}

const ARITHMETIC: [(&str, BinaryOp); 5] = [
    ("Add", BinaryOp::Add),
    ("Subtract", BinaryOp::Sub),
    ("Multiply", BinaryOp::Mul),
    ("Divide", BinaryOp::Div),
    ("Modulus", BinaryOp::Rem),
];
const BITWISE: [(&str, BinaryOp); 3] = [("And", BinaryOp::BitAnd), ("Or", BinaryOp::BitOr), ("XOr", BinaryOp::BitXor)];
const BITSHIFT: [(&str, BinaryOp); 2] = [("Left", BinaryOp::ShiftLeft), ("Right", BinaryOp::ShiftRight)];
const LOGICAL: [(&str, BinaryOp); 2] = [("And", BinaryOp::LogicalAnd), ("Or", BinaryOp::LogicalOr)];
const COMMS_ARITHMETIC: [(&str, BinaryOp); 4] = [
    ("ADD", BinaryOp::Add),
    ("SUB", BinaryOp::Sub),
    ("MUL", BinaryOp::Mul),
    ("DIV", BinaryOp::Div),
];
/// Unary ops re-exposed under the comms category.
const COMMS_UNARY: [(&str, UnaryOp); 4] = [
    ("abs", UnaryOp::Abs),
    ("angle", UnaryOp::Arg),
    ("conjugate", UnaryOp::Conjg),
    ("log10", UnaryOp::Log10),
];

/// Channels for blocks that need at least two inputs.
fn multi_channels(args: &BlockArgs) -> Result<usize> {
    args.usize_or("numChannels", 2)
}

/// Sum and product reduce in one call; the other ops fold left to right.
fn arithmetic_block(device: &str, op: BinaryOp, dtype: DType, nchans: usize) -> Result<Box<dyn Block>> {
    match op {
        BinaryOp::Add => boxed(ReducedBlock::from_reduction(device, "add", Reduction::Sum, dtype, nchans)),
        BinaryOp::Mul => boxed(ReducedBlock::from_reduction(device, "mul", Reduction::Product, dtype, nchans)),
        op => boxed(NToOneBlock::from_op(device, op, dtype, nchans)),
    }
}

fn convolve_args(args: &BlockArgs) -> Result<(Vec<f64>, ConvMode)> {
    Ok((args.f64_list_or("taps", &[1.0])?, args.str_or("mode", "Default")?.parse()?))
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `path`, replacing any previous entry.
    pub fn register(
        &mut self,
        path: &str,
        support: DTypeSupport,
        factory: impl Fn(&BlockArgs) -> Result<Box<dyn Block>> + Send + Sync + 'static,
    ) {
        self.register_types(path, support.types(), factory);
    }

    /// Like [`register`](Self::register) with an explicit type list.
    pub fn register_types(
        &mut self,
        path: &str,
        types: Vec<DType>,
        factory: impl Fn(&BlockArgs) -> Result<Box<dyn Block>> + Send + Sync + 'static,
    ) {
        let registration = Registration { factory: Box::new(factory), types };
        if self.entries.insert(path.to_owned(), registration).is_some() {
            log::warn!("re-registered {path}");
        }
    }

    /// Builds the block registered under `path`.
    ///
    /// # Errors
    /// - [`BlockError::NotFound`] for an unknown path
    /// - whatever the factory rejects
    pub fn make(&self, path: &str, args: &BlockArgs) -> Result<Box<dyn Block>> {
        let registration = self
            .entries
            .get(path)
            .ok_or_else(|| BlockError::NotFound(format!("no block registered at {path}")))?;
        (registration.factory)(args)
    }

    /// Every registered path, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Element types the block at `path` can be built for.
    pub fn supported_types(&self, path: &str) -> Option<&[DType]> {
        self.entries.get(path).map(|r| r.types.as_slice())
    }

    /// A registry holding every built-in block.
    pub fn builtin() -> Self {
        let mut r = Self::new();
        r.register_tables();
        r.register_array_ops();
        r.register_scalar_ops();
        r.register_parameterized();
        r.register_comms();
        r.register_io();
        log::debug!("registered {} blocks", r.entries.len());
        r
    }

    fn register_tables(&mut self) {
        for &op in UnaryOp::ALL {
            self.register(&format!("/gpu/{}/{}", op.category(), op.name()), op.support(), move |args| {
                boxed(OneToOneBlock::from_op(args.device()?, op, args.dtype()?, args.num_channels()?))
            });
        }
        // "array" binary ops are reached through the parameterized blocks
        for &op in BinaryOp::ALL.iter().filter(|op| op.category() == "arith") {
            self.register(&format!("/gpu/arith/{}", op.name()), op.support(), move |args| {
                boxed(TwoToOneBlock::from_op(args.device()?, op, args.dtype()?))
            });
        }
    }

    fn register_array_ops(&mut self) {
        self.register("/gpu/array/arithmetic", DTypeSupport::ALL, |args| {
            let op = choice(args, "operation", &ARITHMETIC)?;
            arithmetic_block(args.device()?, op, args.dtype()?, multi_channels(args)?)
        });
        self.register("/gpu/array/bitwise", DTypeSupport::INTEGER, |args| {
            let op = choice(args, "operation", &BITWISE)?;
            boxed(NToOneBlock::from_op(args.device()?, op, args.dtype()?, multi_channels(args)?))
        });
        self.register("/gpu/array/logical", DTypeSupport::REAL, |args| {
            let reduction = match choice(args, "operation", &LOGICAL)? {
                BinaryOp::LogicalAnd => Reduction::AllTrue,
                _ => Reduction::AnyTrue,
            };
            let name = if reduction == Reduction::AllTrue { "logical_and" } else { "logical_or" };
            boxed(ReducedBlock::from_reduction(args.device()?, name, reduction, args.dtype()?, multi_channels(args)?))
        });
        self.register("/gpu/array/comparator", DTypeSupport::REAL, |args| {
            let symbol = args.value("comparator")?.as_str()?;
            boxed(TwoToOneBlock::comparator(args.device()?, symbol, args.dtype()?))
        });
        self.register("/gpu/array/bitshift", DTypeSupport::INTEGER, |args| {
            let op = choice(args, "operation", &BITSHIFT)?;
            boxed(TwoToOneBlock::from_op(args.device()?, op, args.dtype()?))
        });
    }

    fn register_scalar_ops(&mut self) {
        let families: [(&str, DTypeSupport, &'static [(&'static str, BinaryOp)]); 4] = [
            ("arithmetic", DTypeSupport::ALL, &ARITHMETIC),
            ("bitwise", DTypeSupport::INTEGER, &BITWISE),
            ("bitshift", DTypeSupport::INTEGER, &BITSHIFT),
            ("logical", DTypeSupport::REAL, &LOGICAL),
        ];
        for (family, support, choices) in families {
            self.register(&format!("/gpu/scalar/{family}"), support, move |args| {
                let op = choice(args, "operation", choices)?;
                let scalar = args.value("scalar")?.clone();
                boxed(ScalarOpBlock::new(args.device()?, op, args.dtype()?, scalar, args.num_channels()?))
            });
        }
        self.register("/gpu/scalar/comparator", DTypeSupport::REAL, |args| {
            let symbol = args.value("comparator")?.as_str()?;
            let op = BinaryOp::from_comparator(symbol)
                .ok_or_else(|| BlockError::invalid(format!("Invalid comparator: {symbol}")))?;
            let scalar = args.value("scalar")?.clone();
            boxed(ScalarOpBlock::new(args.device()?, op, args.dtype()?, scalar, args.num_channels()?))
        });
    }

    fn register_parameterized(&mut self) {
        self.register("/gpu/array/cast", DTypeSupport::ALL, |args| {
            let input = args.dtype_or("inputDType", DType::Float64)?;
            let output = args.dtype_or("outputDType", DType::Float64)?;
            boxed(cast_block(args.device()?, input, output, args.num_channels()?))
        });
        self.register("/gpu/arith/clamp", DTypeSupport::REAL, |args| {
            let min = args.value("minValue")?.clone();
            let max = args.value("maxValue")?.clone();
            boxed(ClampBlock::new(args.device()?, args.dtype()?, min, max, args.num_channels()?))
        });
        self.register_types("/gpu/data/replace", ReplaceBlock::supported_types().to_vec(), |args| {
            let find = args.value("findValue")?.clone();
            let with = args.value("replaceValue")?.clone();
            boxed(ReplaceBlock::new(args.device()?, args.dtype()?, find, with, args.num_channels()?))
        });
        self.register("/gpu/algorithm/sort", DTypeSupport::REAL, |args| {
            let ascending = args.bool_or("isAscending", true)?;
            boxed(SortBlock::new(args.device()?, args.dtype()?, ascending, args.num_channels()?))
        });
        self.register("/gpu/algorithm/set_unique", DTypeSupport::REAL, |args| {
            boxed(SetUniqueBlock::new(args.device()?, args.dtype()?, args.num_channels()?))
        });
        for (name, largest) in [("min", false), ("max", true)] {
            self.register(&format!("/gpu/algorithm/{name}"), DTypeSupport::REAL, move |args| {
                boxed(ExtremumBlock::new(args.device()?, args.dtype()?, largest))
            });
        }
        self.register("/gpu/algorithm/topk", DTypeSupport::REAL, |args| {
            let order = TopKOrder::from_name(args.str_or("order", "Max")?)?;
            boxed(TopKBlock::new(args.device()?, args.dtype()?, args.usize_or("K", 1)?, order))
        });
        self.register("/gpu/data/flat", DTypeSupport::ALL, |args| {
            boxed(FlatBlock::new(args.device()?, args.dtype()?, multi_channels(args)?))
        });

        self.register("/gpu/arith/modf", DTypeSupport::FLOAT, |args| {
            boxed(ModfBlock::new(args.device()?, args.dtype()?))
        });
        let powers = DTypeSupport::FLOAT | DTypeSupport::COMPLEX;
        for (name, base) in [("powN", None), ("pow2", Some(2.0)), ("pow10", Some(10.0))] {
            self.register(&format!("/gpu/arith/{name}"), powers, move |args| {
                let base = match base {
                    Some(b) => b,
                    None => args.f64_or("base", 2.0)?,
                };
                boxed(PowNBlock::new(args.device()?, name, args.dtype()?, base, args.num_channels()?))
            });
        }
        self.register("/gpu/arith/logN", DTypeSupport::FLOAT, |args| {
            boxed(LogNBlock::new(args.device()?, args.dtype()?, args.f64_or("base", 10.0)?, args.num_channels()?))
        });

        let filters = DTypeSupport::FLOAT | DTypeSupport::COMPLEX;
        self.register("/gpu/signal/fir", filters, |args| {
            let taps = args.f64_list_or("taps", &[1.0])?;
            boxed(FirBlock::new(args.device()?, args.dtype()?, taps, args.num_channels()?))
        });
        self.register("/gpu/signal/iir", filters, |args| {
            let b = args.f64_list_or("feedForward", &filter::DEFAULT_FEED_FORWARD)?;
            let a = args.f64_list_or("feedback", &filter::DEFAULT_FEEDBACK)?;
            boxed(IirBlock::new(args.device()?, args.dtype()?, b, a, args.num_channels()?))
        });
        self.register("/gpu/signal/fft", DTypeSupport::COMPLEX, |args| {
            boxed(FftBlock::new(
                args.device()?,
                args.dtype_or("dtype", DType::ComplexFloat64)?,
                args.usize_or("numBins", 1024)?,
                args.f64_or("norm", 1.0)?,
                args.bool_or("inverse", false)?,
                args.num_channels()?,
            ))
        });
        self.register("/gpu/signal/rfft", DTypeSupport::FLOAT, |args| {
            boxed(RfftBlock::new(
                args.device()?,
                args.dtype()?,
                args.usize_or("numBins", 1024)?,
                args.f64_or("norm", 1.0)?,
                args.bool_or("inverse", false)?,
                args.num_channels()?,
            ))
        });
        self.register_types("/gpu/signal/convolve", ConvolveBlock::supported_types().to_vec(), |args| {
            let (taps, mode) = convolve_args(args)?;
            let domain: ConvDomain = args.str_or("domain", "Auto")?.parse()?;
            boxed(ConvolveBlock::new(args.device()?, args.dtype()?, taps, mode, domain, args.num_channels()?))
        });
        self.register_types("/gpu/signal/fftconvolve", ConvolveBlock::supported_types().to_vec(), |args| {
            let (taps, mode) = convolve_args(args)?;
            boxed(ConvolveBlock::fft_convolve(args.device()?, args.dtype()?, taps, mode, args.num_channels()?))
        });

        let complex_in = |args: &BlockArgs| args.dtype_or("dtype", DType::ComplexFloat64);
        self.register("/gpu/arith/split_complex", DTypeSupport::COMPLEX, move |args| {
            boxed(SplitComplexBlock::new(args.device()?, complex_in(args)?, args.num_channels()?))
        });
        self.register("/gpu/arith/complex_to_polar", DTypeSupport::COMPLEX, move |args| {
            boxed(SplitComplexBlock::polar(args.device()?, complex_in(args)?, args.num_channels()?))
        });
        self.register("/gpu/arith/polar_to_complex", DTypeSupport::FLOAT, |args| {
            boxed(polar_to_complex_block(args.device()?, args.dtype()?))
        });

        let stats = [
            ("mean", Statistic::Mean),
            ("stdev", Statistic::Stdev),
            ("median", Statistic::Median),
            ("medabsdev", Statistic::MedAbsDev),
        ];
        for (name, stat) in stats {
            self.register(&format!("/gpu/statistics/{name}"), DTypeSupport::FLOAT, move |args| {
                boxed(StatisticsBlock::new(args.device()?, stat, args.dtype()?, args.num_channels()?))
            });
        }
        self.register("/gpu/statistics/var", DTypeSupport::FLOAT, |args| {
            let stat = Statistic::Var { biased: args.bool_or("isBiased", false)? };
            boxed(StatisticsBlock::new(args.device()?, stat, args.dtype()?, args.num_channels()?))
        });
        self.register("/gpu/statistics/cov", DTypeSupport::REAL, |args| {
            let stat = PairStatistic::Covariance { biased: args.bool_or("isBiased", false)? };
            boxed(PairStatisticBlock::new(args.device()?, stat, args.dtype()?))
        });
        self.register("/gpu/statistics/corrcoef", DTypeSupport::REAL, |args| {
            boxed(PairStatisticBlock::new(args.device()?, PairStatistic::Correlation, args.dtype()?))
        });
    }

    fn register_comms(&mut self) {
        for (name, op) in COMMS_UNARY {
            self.register(&format!("/gpu/comms/{name}"), op.support(), move |args| {
                boxed(OneToOneBlock::from_op(args.device()?, op, args.dtype()?, args.num_channels()?))
            });
        }
        self.register("/gpu/comms/arithmetic", DTypeSupport::ALL, |args| {
            let op = choice(args, "operation", &COMMS_ARITHMETIC)?;
            arithmetic_block(args.device()?, op, args.dtype()?, args.usize_or("numInputs", 2)?)
        });
        self.register("/gpu/comms/comparator", DTypeSupport::REAL, |args| {
            let symbol = args.value("comparator")?.as_str()?;
            boxed(TwoToOneBlock::comparator(args.device()?, symbol, args.dtype()?))
        });
        self.register("/gpu/comms/combine_complex", BinaryOp::Combine.support(), |args| {
            boxed(TwoToOneBlock::from_op(args.device()?, BinaryOp::Combine, args.dtype()?))
        });
        self.register("/gpu/comms/split_complex", DTypeSupport::COMPLEX, |args| {
            let dtype = args.dtype_or("dtype", DType::ComplexFloat64)?;
            boxed(SplitComplexBlock::new(args.device()?, dtype, args.num_channels()?))
        });

        let fc = DTypeSupport::FLOAT | DTypeSupport::COMPLEX;
        self.register("/gpu/comms/scale", fc, |args| {
            let factor = args.get("factor").cloned().unwrap_or(Value::Float(1.0));
            boxed(ScaleBlock::new(args.device()?, args.dtype()?, factor, args.str_or("labelId", "")?))
        });
        self.register("/gpu/comms/rotate", DTypeSupport::COMPLEX, |args| {
            let dtype = args.dtype_or("dtype", DType::ComplexFloat64)?;
            boxed(RotateBlock::new(args.device()?, dtype, args.f64_or("phase", 0.0)?, args.str_or("labelId", "")?))
        });
        self.register("/gpu/comms/waveform_source", fc, |args| {
            let mut source = WaveformSource::new(args.device()?, args.dtype()?)?;
            source.set_waveform(Waveform::from_name(args.str_or("waveform", "CONST")?)?);
            source.set_sample_rate(args.f64_or("rate", 1.0)?)?;
            source.set_frequency(args.f64_or("freq", 0.0)?);
            source.set_resolution(args.f64_or("res", 0.0)?);
            if let Some(ampl) = args.get("ampl") {
                source.set_amplitude(ampl.as_complex()?);
            }
            if let Some(offset) = args.get("offset") {
                source.set_offset(offset.as_complex()?);
            }
            boxed(Ok(source))
        });
    }

    fn register_io(&mut self) {
        self.register("/gpu/data/constant", DTypeSupport::REAL, |args| {
            let constant = args.get("constant").cloned().unwrap_or(Value::Int(0));
            boxed(ConstantSource::new(args.device()?, args.dtype()?, constant))
        });
        self.register("/gpu/random/source", DTypeSupport::FLOAT | DTypeSupport::COMPLEX, |args| {
            let distribution: Distribution = args.str_or("distribution", "UNIFORM")?.parse()?;
            boxed(RandomSource::new(args.device()?, args.dtype()?, distribution, args.usize_or("numOutputs", 1)?))
        });
        self.register("/gpu/array/file_source", DTypeSupport::ALL, |args| {
            let path = args.value("filepath")?.as_str()?;
            let key = args.value("key")?.as_str()?;
            boxed(FileSourceBlock::new(args.device()?, path, key, args.bool_or("repeat", false)?))
        });
        self.register("/gpu/array/file_sink", DTypeSupport::ALL, |args| {
            let path = args.value("filepath")?.as_str()?;
            let key = args.value("key")?.as_str()?;
            boxed(FileSinkBlock::new(
                args.device()?,
                path,
                key,
                args.dtype()?,
                args.num_channels()?,
                args.bool_or("append", false)?,
            ))
        });
    }
}
