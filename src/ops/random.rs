//! Seeded random number generation.

use super::RealElement;
use crate::array::{Array, ArrayData};
use crate::backend::DeviceId;
use crate::dtype::DType;
use crate::error::{BlockError, Result};
use core::fmt;
use core::str::FromStr;
use num_complex::Complex;
use rand::rngs::{SmallRng, StdRng};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Output distribution of a random source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Uniform on `[0, 1)`.
    Uniform,
    /// Standard normal, mean 0 and variance 1.
    Normal,
}

impl Distribution {
    pub fn name(self) -> &'static str {
        match self {
            Distribution::Uniform => "UNIFORM",
            Distribution::Normal => "NORMAL",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Distribution {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNIFORM" => Ok(Distribution::Uniform),
            "NORMAL" => Ok(Distribution::Normal),
            _ => Err(BlockError::invalid(format!("invalid distribution \"{s}\""))),
        }
    }
}

/// Pseudo-random engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    /// ChaCha-based, cryptographically strong (`StdRng`).
    ChaCha,
    /// Xoshiro-based, fast and small (`SmallRng`).
    Xoshiro,
}

impl EngineType {
    pub fn name(self) -> &'static str {
        match self {
            EngineType::ChaCha => "ChaCha",
            EngineType::Xoshiro => "Xoshiro",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineType {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chacha" => Ok(EngineType::ChaCha),
            "xoshiro" => Ok(EngineType::Xoshiro),
            _ => Err(BlockError::invalid(format!("invalid random engine type \"{s}\""))),
        }
    }
}

#[derive(Debug, Clone)]
enum Rngs {
    Std(StdRng),
    Small(SmallRng),
}

/// A seeded generator producing arrays of a given distribution.
#[derive(Debug, Clone)]
pub struct RandomEngine {
    kind: EngineType,
    seed: u64,
    rng: Rngs,
}

impl RandomEngine {
    pub fn new(kind: EngineType, seed: u64) -> Self {
        let rng = match kind {
            EngineType::ChaCha => Rngs::Std(StdRng::seed_from_u64(seed)),
            EngineType::Xoshiro => Rngs::Small(SmallRng::seed_from_u64(seed)),
        };
        Self { kind, seed, rng }
    }

    pub fn kind(&self) -> EngineType {
        self.kind
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restarts the stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(self.kind, seed);
    }

    /// Switches engine family, keeping the current seed.
    pub fn set_kind(&mut self, kind: EngineType) {
        *self = Self::new(kind, self.seed);
    }

    fn sample<F: RealElement>(&mut self, dist: Distribution) -> F
    where
        StandardNormal: rand_distr::Distribution<F>,
        rand::distr::StandardUniform: rand::distr::Distribution<F>,
    {
        match (&mut self.rng, dist) {
            (Rngs::Std(r), Distribution::Uniform) => r.random(),
            (Rngs::Std(r), Distribution::Normal) => r.sample(StandardNormal),
            (Rngs::Small(r), Distribution::Uniform) => r.random(),
            (Rngs::Small(r), Distribution::Normal) => r.sample(StandardNormal),
        }
    }

    fn fill<F: RealElement>(&mut self, dist: Distribution, n: usize) -> Vec<F>
    where
        StandardNormal: rand_distr::Distribution<F>,
        rand::distr::StandardUniform: rand::distr::Distribution<F>,
    {
        (0..n).map(|_| self.sample(dist)).collect()
    }

    fn fill_complex<F: RealElement>(&mut self, dist: Distribution, n: usize) -> Vec<Complex<F>>
    where
        StandardNormal: rand_distr::Distribution<F>,
        rand::distr::StandardUniform: rand::distr::Distribution<F>,
    {
        (0..n)
            .map(|_| {
                let re = self.sample(dist);
                let im = self.sample(dist);
                Complex::new(re, im)
            })
            .collect()
    }

    /// Draws `n` elements of `dtype` (float or complex).
    pub fn generate(&mut self, dist: Distribution, dtype: DType, n: usize, device: DeviceId) -> Result<Array> {
        let data = match dtype {
            DType::Float32 => ArrayData::Float32(self.fill(dist, n)),
            DType::Float64 => ArrayData::Float64(self.fill(dist, n)),
            DType::ComplexFloat32 => ArrayData::ComplexFloat32(self.fill_complex(dist, n)),
            DType::ComplexFloat64 => ArrayData::ComplexFloat64(self.fill_complex(dist, n)),
            other => return Err(BlockError::invalid(format!("random generation does not support {other}"))),
        };
        Ok(Array::from_data(data, device))
    }
}
