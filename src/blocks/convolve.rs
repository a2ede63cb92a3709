//! Convolution of every channel with a set of real taps.
//!
//! Unlike the FIR filter, the output length depends on the mode: `Expand`
//! posts `input + taps - 1` samples per step, `Default` posts as many as
//! it consumed.

use crate::block::{ArrayBlock, Block, setup_ports, single_arg, unknown_call};
use crate::dtype::{DType, validate_dtype_in};
use crate::error::{BlockError, Result};
use crate::ops::signal::{self, ConvDomain, ConvMode};
use crate::value::Value;

const SUPPORTED: [DType; 9] = [
    DType::Int16,
    DType::Int32,
    DType::UInt8,
    DType::UInt16,
    DType::UInt32,
    DType::Float32,
    DType::Float64,
    DType::ComplexFloat32,
    DType::ComplexFloat64,
];

pub struct ConvolveBlock {
    base: ArrayBlock,
    taps: Vec<f64>,
    mode: ConvMode,
    domain: ConvDomain,
    fixed_domain: bool,
}

impl ConvolveBlock {
    pub fn new(device: &str, dtype: DType, taps: Vec<f64>, mode: ConvMode, domain: ConvDomain, nchans: usize) -> Result<Self> {
        validate_dtype_in(dtype, &SUPPORTED)?;
        if taps.is_empty() {
            return Err(BlockError::invalid("Taps cannot be empty."));
        }
        let mut base = ArrayBlock::new("convolve", device)?;
        setup_ports(&mut base, dtype, dtype, nchans, nchans);
        Ok(Self { base, taps, mode, domain, fixed_domain: false })
    }

    pub fn supported_types() -> &'static [DType] {
        &SUPPORTED
    }

    /// Always convolves in the frequency domain; the domain cannot be changed.
    pub fn fft_convolve(device: &str, dtype: DType, taps: Vec<f64>, mode: ConvMode, nchans: usize) -> Result<Self> {
        let mut block = Self::new(device, dtype, taps, mode, ConvDomain::Freq, nchans)?;
        block.fixed_domain = true;
        Ok(block)
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn set_taps(&mut self, taps: Vec<f64>) -> Result<()> {
        if taps.is_empty() {
            return Err(BlockError::invalid("Taps cannot be empty."));
        }
        self.taps = taps;
        Ok(())
    }

    pub fn mode(&self) -> ConvMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ConvMode) {
        self.mode = mode;
    }

    pub fn domain(&self) -> ConvDomain {
        self.domain
    }

    pub fn set_domain(&mut self, domain: ConvDomain) -> Result<()> {
        if self.fixed_domain && domain != ConvDomain::Freq {
            return Err(BlockError::invalid("fftconvolve always uses the frequency domain"));
        }
        self.domain = domain;
        Ok(())
    }
}

impl Block for ConvolveBlock {
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
        let output = signal::convolve(&self.taps, &input, self.mode, self.domain)?;
        self.base.consume_all(elems)?;
        self.base.post_2d_array_to_numbered_outputs(&output)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getTaps" => Ok(Value::from(self.taps.clone())),
            "setTaps" => self.set_taps(single_arg(name, args)?.as_f64_list()?).map(|()| Value::Null),
            "getMode" => Ok(Value::from(self.mode.name())),
            "setMode" => {
                self.set_mode(single_arg(name, args)?.as_str()?.parse()?);
                Ok(Value::Null)
            }
            "getDomain" => Ok(Value::from(self.domain.name())),
            "setDomain" => self.set_domain(single_arg(name, args)?.as_str()?.parse()?).map(|()| Value::Null),
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    fn push(block: &mut ConvolveBlock, port: usize, data: &[f32]) {
        block.input(port).unwrap().push(&BufferChunk::from_slice(data)).unwrap();
    }

    #[test]
    fn expand_grows_each_channel() {
        let mut block =
            ConvolveBlock::new(AUTO_DEVICE, DType::Float32, vec![1.0, -1.0], ConvMode::Expand, ConvDomain::Auto, 2)
                .unwrap();
        block.activate().unwrap();
        push(&mut block, 0, &[1.0, 2.0, 4.0]);
        push(&mut block, 1, &[5.0, 5.0]);
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![1.0, 1.0, -2.0]);
        assert_eq!(block.output(1).unwrap().collect_vec::<f32>().unwrap(), vec![5.0, 0.0, -5.0]);
        assert_eq!(block.input(0).unwrap().elements(), 1);
    }

    #[test]
    fn default_mode_keeps_length() {
        let mut block =
            ConvolveBlock::new(AUTO_DEVICE, DType::Float32, vec![1.0; 3], ConvMode::Default, ConvDomain::Spatial, 1)
                .unwrap();
        block.activate().unwrap();
        push(&mut block, 0, &[1.0, 1.0, 1.0, 1.0]);
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<f32>().unwrap(), vec![2.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn properties_parse_names() {
        let mut block =
            ConvolveBlock::new(AUTO_DEVICE, DType::Int16, vec![1.0], ConvMode::Default, ConvDomain::Auto, 1).unwrap();
        block.call("setMode", &[Value::from("Expand")]).unwrap();
        block.call("setDomain", &[Value::from("Freq")]).unwrap();
        assert_eq!(block.call("getMode", &[]).unwrap(), Value::from("Expand"));
        assert_eq!(block.call("getDomain", &[]).unwrap(), Value::from("Freq"));
        assert!(block.call("setMode", &[Value::from("Valid")]).is_err());
        assert!(block.call("setTaps", &[Value::from(Vec::<f64>::new())]).is_err());
        assert!(ConvolveBlock::new(AUTO_DEVICE, DType::Int8, vec![1.0], ConvMode::Default, ConvDomain::Auto, 1).is_err());

        let mut fft = ConvolveBlock::fft_convolve(AUTO_DEVICE, DType::Float64, vec![0.5], ConvMode::Default, 1).unwrap();
        assert!(fft.set_domain(ConvDomain::Spatial).is_err());
        assert_eq!(fft.domain(), ConvDomain::Freq);
    }
}
