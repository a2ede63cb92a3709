//! Sources: blocks with outputs only.
//!
//! A source posts a fixed-size buffer on every output each time `work()`
//! runs. Buffer lengths come from [`config::global`].

use crate::array::Array;
use crate::block::{ArrayBlock, Block, single_arg, unknown_call};
use crate::config;
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::Result;
use crate::ops::random::{Distribution, EngineType, RandomEngine};
use crate::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Posts a buffer filled with one value.
pub struct ConstantSource {
    base: ArrayBlock,
    dtype: DType,
    constant: Value,
    filled: Array,
}

impl ConstantSource {
    pub fn new(device: &str, dtype: DType, constant: Value) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let mut base = ArrayBlock::new("constant", device)?;
        base.setup_output(dtype);
        let filled = Self::fill(&base, dtype, &constant)?;
        Ok(Self { base, dtype, constant, filled })
    }

    fn fill(base: &ArrayBlock, dtype: DType, constant: &Value) -> Result<Array> {
        let len = config::global().constant_buffer_len;
        Array::full(constant, dtype, vec![len], base.device_id())
    }

    pub fn constant(&self) -> &Value {
        &self.constant
    }

    /// # Errors
    /// - `constant` is not representable in the output type
    pub fn set_constant(&mut self, constant: Value) -> Result<()> {
        self.filled = Self::fill(&self.base, self.dtype, &constant)?;
        self.constant = constant;
        Ok(())
    }
}

impl Block for ConstantSource {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        self.base.begin_work()?;
        self.base.post_array(0, &self.filled)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getConstant" => Ok(self.constant.clone()),
            "setConstant" => self.set_constant(single_arg(name, args)?.clone()).map(|()| Value::Null),
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_micros()).unwrap_or_else(|_| d.as_secs()))
}

/// Posts independent random streams on `numOutputs` outputs.
pub struct RandomSource {
    base: ArrayBlock,
    dtype: DType,
    distribution: Distribution,
    engine: RandomEngine,
}

impl RandomSource {
    /// The engine starts as [`EngineType::ChaCha`] seeded from the clock.
    pub fn new(device: &str, dtype: DType, distribution: Distribution, outputs: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::FLOAT | DTypeSupport::COMPLEX)?;
        let mut base = ArrayBlock::new("random", device)?;
        for _ in 0..outputs {
            base.setup_output(dtype);
        }
        let engine = RandomEngine::new(EngineType::ChaCha, time_seed());
        Ok(Self { base, dtype, distribution, engine })
    }

    pub fn distribution(&self) -> Distribution {
        self.distribution
    }

    pub fn set_distribution(&mut self, distribution: Distribution) {
        self.distribution = distribution;
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine.kind()
    }

    pub fn set_engine_type(&mut self, kind: EngineType) {
        self.engine.set_kind(kind);
    }

    /// Reseeds the engine; `None` seeds from the clock.
    pub fn reseed(&mut self, seed: Option<u64>) {
        self.engine.reseed(seed.unwrap_or_else(time_seed));
    }
}

impl Block for RandomSource {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        self.base.begin_work()?;
        let outputs = self.base.outputs().len();
        if outputs == 0 {
            return Ok(());
        }
        let len = config::global().source_buffer_len;
        let samples = self
            .engine
            .generate(self.distribution, self.dtype, outputs * len, self.base.device_id())?
            .reshape(vec![outputs, len])?;
        self.base.post_2d_array_to_numbered_outputs(&samples)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getDistribution" => Ok(Value::from(self.distribution.name())),
            "setDistribution" => {
                self.set_distribution(single_arg(name, args)?.as_str()?.parse()?);
                Ok(Value::Null)
            }
            "getRandomEngineType" => Ok(Value::from(self.engine.kind().name())),
            "setRandomEngineType" => {
                self.set_engine_type(single_arg(name, args)?.as_str()?.parse()?);
                Ok(Value::Null)
            }
            "reseedRandomEngine" => {
                let seed = match args {
                    [] => None,
                    _ => Some(single_arg(name, args)?.as_u64()?),
                };
                self.reseed(seed);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AUTO_DEVICE;
    use crate::error::BlockError;

    #[test]
    fn constant_fills_each_buffer() {
        let mut block = ConstantSource::new(AUTO_DEVICE, DType::UInt16, Value::UInt(9)).unwrap();
        block.activate().unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap().collect_vec::<u16>().unwrap();
        assert_eq!(out.len(), config::global().constant_buffer_len);
        assert!(out.iter().all(|&x| x == 9));

        assert!(block.call("setConstant", &[Value::Int(-1)]).is_err());
        assert_eq!(block.constant(), &Value::UInt(9));
        assert!(ConstantSource::new(AUTO_DEVICE, DType::ComplexFloat32, Value::Int(0)).is_err());
    }

    #[test]
    fn reseeding_repeats_the_stream() {
        let mut block = RandomSource::new(AUTO_DEVICE, DType::Float32, Distribution::Uniform, 2).unwrap();
        block.activate().unwrap();
        block.call("setRandomEngineType", &[Value::from("xoshiro")]).unwrap();
        block.call("reseedRandomEngine", &[Value::Int(42)]).unwrap();
        block.work().unwrap();
        let first = block.output(1).unwrap().collect_vec::<f32>().unwrap();
        assert_eq!(first.len(), config::global().source_buffer_len);

        block.call("reseedRandomEngine", &[Value::Int(42)]).unwrap();
        block.work().unwrap();
        block.output(0).unwrap().drain_buffers();
        assert_eq!(block.output(1).unwrap().collect_vec::<f32>().unwrap(), first);
    }

    #[test]
    fn distribution_property() {
        let mut block = RandomSource::new(AUTO_DEVICE, DType::Float64, Distribution::Uniform, 1).unwrap();
        block.call("setDistribution", &[Value::from("NORMAL")]).unwrap();
        assert_eq!(block.call("getDistribution", &[]).unwrap(), Value::from("NORMAL"));
        assert!(block.call("setDistribution", &[Value::from("POISSON")]).is_err());
        assert!(RandomSource::new(AUTO_DEVICE, DType::Int32, Distribution::Normal, 1).is_err());
    }

    #[test]
    fn negative_seed_is_rejected() {
        let mut block = RandomSource::new(AUTO_DEVICE, DType::Float64, Distribution::Uniform, 1).unwrap();
        let err = block.call("reseedRandomEngine", &[Value::Int(-7)]).unwrap_err();
        assert!(matches!(err, BlockError::InvalidArgument(_)));
        block.call("reseedRandomEngine", &[Value::UInt(u64::MAX)]).unwrap();
        block.call("reseedRandomEngine", &[]).unwrap();
    }
}
