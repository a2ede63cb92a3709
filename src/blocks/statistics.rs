//! Pass-through blocks that label each channel with a summary statistic,
//! and two-channel blocks that track how a pair of streams co-vary.

use crate::block::{ArrayBlock, Block, Label, setup_ports, single_arg, unknown_call};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::reduce::{self, Statistic};
use crate::value::Value;

/// Forwards every input buffer unchanged to the matching output, preceded by
/// a label holding the channel's statistic.
///
/// For the median, the label points at the element closest to the median
/// value; every other statistic labels the first element of the buffer.
pub struct StatisticsBlock {
    base: ArrayBlock,
    stat: Statistic,
}

impl StatisticsBlock {
    pub fn new(device: &str, stat: Statistic, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::FLOAT)?;
        let mut base = ArrayBlock::new(&stat.label().to_ascii_lowercase(), device)?;
        setup_ports(&mut base, dtype, dtype, nchans, nchans);
        Ok(Self { base, stat })
    }

    pub fn statistic(&self) -> Statistic {
        self.stat
    }

    /// Only meaningful for variance blocks.
    pub fn set_is_biased(&mut self, biased: bool) -> Result<()> {
        match &mut self.stat {
            Statistic::Var { biased: b } => {
                *b = biased;
                Ok(())
            }
            other => Err(BlockError::invalid(format!("{} has no bias setting", other.label()))),
        }
    }
}

fn nearest_index(row: &[f64], target: f64) -> usize {
    row.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map_or(0, |(i, _)| i)
}

impl Block for StatisticsBlock {
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
        let nchans = self.base.inputs().len();
        for port in 0..nchans {
            let chunk = self.base.inputs()[port].buffer().slice(0, elems)?;
            let input = self.base.input_as_array(port, Some(elems))?;
            let value = reduce::row_statistics(self.stat, &input)?
                .first()
                .copied()
                .ok_or_else(|| BlockError::assertion("statistic produced no value"))?;
            let index = match self.stat {
                Statistic::Median => nearest_index(&input.cast(DType::Float64).to_vec::<f64>()?, value),
                _ => 0,
            };
            self.base.consume(port, elems)?;
            self.base.post_label(port, Label::new(self.stat.label(), value, index))?;
            self.base.post_buffer(port, chunk)?;
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match (name, self.stat) {
            ("getIsBiased", Statistic::Var { biased }) => Ok(Value::Bool(biased)),
            ("setIsBiased", Statistic::Var { .. }) => {
                self.set_is_biased(single_arg(name, args)?.as_bool()?)?;
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

/// A statistic over two equal-length series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairStatistic {
    Covariance { biased: bool },
    Correlation,
}

impl PairStatistic {
    pub fn name(self) -> &'static str {
        match self {
            PairStatistic::Covariance { .. } => "cov",
            PairStatistic::Correlation => "corrcoef",
        }
    }

    fn compute(self, x: &[f64], y: &[f64]) -> Result<f64> {
        match self {
            PairStatistic::Covariance { biased } => reduce::covariance(x, y, biased),
            PairStatistic::Correlation => reduce::correlation(x, y),
        }
    }
}

/// Forwards two channels unchanged and keeps the statistic of the most
/// recent step as `lastValue`.
pub struct PairStatisticBlock {
    base: ArrayBlock,
    stat: PairStatistic,
    last_value: f64,
}

impl PairStatisticBlock {
    pub fn new(device: &str, stat: PairStatistic, dtype: DType) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::REAL)?;
        let mut base = ArrayBlock::new(stat.name(), device)?;
        setup_ports(&mut base, dtype, dtype, 2, 2);
        Ok(Self { base, stat, last_value: 0.0 })
    }

    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    /// Only meaningful for covariance blocks.
    pub fn set_is_biased(&mut self, biased: bool) -> Result<()> {
        match &mut self.stat {
            PairStatistic::Covariance { biased: b } => {
                *b = biased;
                Ok(())
            }
            PairStatistic::Correlation => Err(BlockError::invalid("corrcoef has no bias setting")),
        }
    }
}

impl Block for PairStatisticBlock {
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
        let x = reduce::as_f64_vec(&self.base.input_as_array(0, Some(elems))?)?;
        let y = reduce::as_f64_vec(&self.base.input_as_array(1, Some(elems))?)?;
        self.last_value = self.stat.compute(&x, &y)?;
        for port in 0..2 {
            let chunk = self.base.inputs()[port].buffer().slice(0, elems)?;
            self.base.consume(port, elems)?;
            self.base.post_buffer(port, chunk)?;
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match (name, self.stat) {
            ("lastValue" | "getLastValue", _) => Ok(Value::Float(self.last_value)),
            ("isBiased" | "getIsBiased", PairStatistic::Covariance { biased }) => Ok(Value::Bool(biased)),
            ("setIsBiased", PairStatistic::Covariance { .. }) => {
                self.set_is_biased(single_arg(name, args)?.as_bool()?)?;
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    fn run(stat: Statistic, data: &[f64]) -> (Vec<Label>, Vec<f64>) {
        let mut block = StatisticsBlock::new(AUTO_DEVICE, stat, DType::Float64, 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(data)).unwrap();
        block.work().unwrap();
        let out = block.output(0).unwrap();
        (out.drain_labels(), out.collect_vec::<f64>().unwrap())
    }

    #[test]
    fn mean_label_and_passthrough() {
        let (labels, data) = run(Statistic::Mean, &[1.0, 2.0, 6.0]);
        assert_eq!(data, vec![1.0, 2.0, 6.0]);
        assert_eq!(labels, vec![Label::new("MEAN", 3.0, 0)]);
    }

    #[test]
    fn median_points_at_nearest_element() {
        let (labels, _) = run(Statistic::Median, &[9.0, 1.0, 4.0]);
        assert_eq!(labels[0].data, Value::Float(4.0));
        assert_eq!(labels[0].index, 2);
    }

    #[test]
    fn variance_bias_is_settable() {
        let mut block = StatisticsBlock::new(AUTO_DEVICE, Statistic::Var { biased: false }, DType::Float32, 2).unwrap();
        block.call("setIsBiased", &[Value::Bool(true)]).unwrap();
        assert_eq!(block.call("getIsBiased", &[]).unwrap(), Value::Bool(true));

        let mut mean = StatisticsBlock::new(AUTO_DEVICE, Statistic::Mean, DType::Float32, 1).unwrap();
        assert!(mean.call("setIsBiased", &[Value::Bool(true)]).is_err());
        assert!(StatisticsBlock::new(AUTO_DEVICE, Statistic::Mean, DType::Int32, 1).is_err());
    }

    fn run_pair(stat: PairStatistic, x: &[i32], y: &[i32]) -> PairStatisticBlock {
        let mut block = PairStatisticBlock::new(AUTO_DEVICE, stat, DType::Int32).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(x)).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(y)).unwrap();
        block.work().unwrap();
        block
    }

    #[test]
    fn covariance_forwards_both_channels() {
        let mut block = run_pair(PairStatistic::Covariance { biased: true }, &[1, 2, 3, 4], &[2, 4, 6, 8, 10]);
        assert_eq!(block.call("lastValue", &[]).unwrap(), Value::Float(2.5));
        assert_eq!(block.output(0).unwrap().collect_vec::<i32>().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(block.output(1).unwrap().collect_vec::<i32>().unwrap(), vec![2, 4, 6, 8]);
        assert_eq!(block.input(1).unwrap().elements(), 1);

        block.call("setIsBiased", &[Value::Bool(false)]).unwrap();
        assert_eq!(block.call("getIsBiased", &[]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn correlation_of_opposed_series() {
        let mut block = run_pair(PairStatistic::Correlation, &[1, 2, 3], &[3, 2, 1]);
        assert!((block.last_value() + 1.0).abs() < 1e-12);
        assert!(block.call("setIsBiased", &[Value::Bool(true)]).is_err());
        assert!(PairStatisticBlock::new(AUTO_DEVICE, PairStatistic::Correlation, DType::ComplexFloat32).is_err());
    }
}
