//! Communications blocks: label-driven gain and phase rotation, and a
//! table-lookup waveform generator.
//!
//! [`ScaleBlock`] and [`RotateBlock`] watch their input for labels whose id
//! matches `labelId`. A matching label at the head of the buffer replaces the
//! parameter before the step runs; one further in cuts the step short so the
//! new value applies from that element on.

use crate::array::Array;
use crate::block::{ArrayBlock, Block, setup_ports, single_arg, unknown_call};
use crate::config;
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::ops::binary::BinaryOp;
use crate::ops::dispatch;
use crate::value::Value;
use core::f64::consts::PI;
use num_complex::Complex64;

const FC: DTypeSupport = DTypeSupport { float: true, complex: true, ..DTypeSupport::NONE };

/// Scans input 0 for labels named `id` within the first `elems` elements.
///
/// Returns the value of a label at index 0 and the number of elements to
/// process before the next matching label.
fn labelled_span(base: &ArrayBlock, id: &str, elems: usize) -> (Option<Value>, usize) {
    if id.is_empty() {
        return (None, elems);
    }
    let mut update = None;
    for label in base.inputs()[0].labels().iter().filter(|l| l.id == id && l.index < elems) {
        if label.index == 0 {
            update = Some(label.data.clone());
        } else {
            return (update, label.index);
        }
    }
    (update, elems)
}

/// Multiplies a stream by a factor that labels can update.
pub struct ScaleBlock {
    base: ArrayBlock,
    dtype: DType,
    factor: Value,
    rhs: Array,
    label_id: String,
}

impl ScaleBlock {
    pub fn new(device: &str, dtype: DType, factor: Value, label_id: &str) -> Result<Self> {
        validate_dtype(dtype, FC)?;
        let mut base = ArrayBlock::new("scale", device)?;
        setup_ports(&mut base, dtype, dtype, 1, 1);
        let rhs = Array::full(&factor, dtype, vec![1], base.device_id())?;
        Ok(Self { base, dtype, factor, rhs, label_id: label_id.to_owned() })
    }

    pub fn factor(&self) -> &Value {
        &self.factor
    }

    /// # Errors
    /// - `factor` is not representable in the stream's type
    pub fn set_factor(&mut self, factor: Value) -> Result<()> {
        self.rhs = Array::full(&factor, self.dtype, vec![1], self.base.device_id())?;
        self.factor = factor;
        Ok(())
    }

    pub fn label_id(&self) -> &str {
        &self.label_id
    }

    /// An empty id disables label handling.
    pub fn set_label_id(&mut self, id: &str) {
        self.label_id = id.to_owned();
    }
}

impl Block for ScaleBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        let available = self.base.begin_work()?;
        if available == 0 {
            return Ok(());
        }
        let (update, elems) = labelled_span(&self.base, &self.label_id, available);
        if let Some(factor) = update {
            log::debug!("{}: factor {factor:?} from label", self.base.name());
            self.set_factor(factor)?;
        }
        let input = self.base.input_as_array(0, Some(elems))?;
        let output = dispatch::binary(BinaryOp::Mul, &input, &self.rhs)?;
        self.base.consume(0, elems)?;
        self.base.post_array(0, &output)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getFactor" => Ok(self.factor.clone()),
            "setFactor" => self.set_factor(single_arg(name, args)?.clone()).map(|()| Value::Null),
            "getLabelId" => Ok(Value::from(self.label_id.as_str())),
            "setLabelId" => {
                self.set_label_id(single_arg(name, args)?.as_str()?);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

/// Rotates a complex stream by a phase in radians that labels can update.
pub struct RotateBlock {
    base: ArrayBlock,
    dtype: DType,
    phase: f64,
    phasor: Array,
    label_id: String,
}

impl RotateBlock {
    pub fn new(device: &str, dtype: DType, phase: f64, label_id: &str) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::COMPLEX)?;
        let mut base = ArrayBlock::new("rotate", device)?;
        setup_ports(&mut base, dtype, dtype, 1, 1);
        let phasor = Self::phasor(&base, dtype, phase)?;
        Ok(Self { base, dtype, phase, phasor, label_id: label_id.to_owned() })
    }

    fn phasor(base: &ArrayBlock, dtype: DType, phase: f64) -> Result<Array> {
        let value = Value::Complex(Complex64::from_polar(1.0, phase));
        Array::full(&value, dtype, vec![1], base.device_id())
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: f64) -> Result<()> {
        self.phasor = Self::phasor(&self.base, self.dtype, phase)?;
        self.phase = phase;
        Ok(())
    }

    pub fn label_id(&self) -> &str {
        &self.label_id
    }

    pub fn set_label_id(&mut self, id: &str) {
        self.label_id = id.to_owned();
    }
}

impl Block for RotateBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        let available = self.base.begin_work()?;
        if available == 0 {
            return Ok(());
        }
        let (update, elems) = labelled_span(&self.base, &self.label_id, available);
        if let Some(phase) = update {
            self.set_phase(phase.as_f64()?)?;
        }
        let input = self.base.input_as_array(0, Some(elems))?;
        let output = dispatch::binary(BinaryOp::Mul, &input, &self.phasor)?;
        self.base.consume(0, elems)?;
        self.base.post_array(0, &output)
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getPhase" => Ok(Value::Float(self.phase)),
            "setPhase" => self.set_phase(single_arg(name, args)?.as_f64()?).map(|()| Value::Null),
            "getLabelId" => Ok(Value::from(self.label_id.as_str())),
            "setLabelId" => {
                self.set_label_id(single_arg(name, args)?.as_str()?);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

/// Shape of one period of a [`WaveformSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Const,
    Sine,
    Ramp,
    Square,
}

impl Waveform {
    pub fn name(self) -> &'static str {
        match self {
            Waveform::Const => "CONST",
            Waveform::Sine => "SINE",
            Waveform::Ramp => "RAMP",
            Waveform::Square => "SQUARE",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "CONST" => Ok(Waveform::Const),
            "SINE" => Ok(Waveform::Sine),
            "RAMP" => Ok(Waveform::Ramp),
            "SQUARE" => Ok(Waveform::Square),
            other => Err(BlockError::invalid(format!("Unknown waveform: {other}"))),
        }
    }

    /// Entry `i` of an `n`-entry table with unit amplitude and no offset.
    fn sample(self, i: usize, n: usize) -> Complex64 {
        match self {
            Waveform::Const => Complex64::new(1.0, 0.0),
            Waveform::Sine => Complex64::from_polar(1.0, 2.0 * PI * i as f64 / n as f64),
            Waveform::Ramp => {
                let q = (i + 3 * n / 4) % n;
                let span = (n - 1) as f64;
                Complex64::new(2.0 * i as f64 / span - 1.0, 2.0 * q as f64 / span - 1.0)
            }
            Waveform::Square => Complex64::new(
                if i >= n / 2 { 1.0 } else { 0.0 },
                if (i + 3 * n / 4) % n >= n / 2 { 1.0 } else { 0.0 },
            ),
        }
    }
}

const MIN_TABLE_LEN: usize = 4096;
const MAX_TABLE_LEN: usize = 1 << 20;
const MIN_TABLE_STEP: f64 = 16.0;

/// Smallest power-of-two table, at least [`MIN_TABLE_LEN`], in which one
/// output step advances by at least [`MIN_TABLE_STEP`] entries.
fn table_len(step_fraction: f64) -> usize {
    let mut n = MIN_TABLE_LEN;
    while step_fraction != 0.0
        && (step_fraction * n as f64).round().abs() < MIN_TABLE_STEP
        && n * 2 <= MAX_TABLE_LEN
    {
        n *= 2;
    }
    n
}

/// Generates a periodic waveform by stepping through a lookup table.
///
/// The phase carries over between `work()` calls.
pub struct WaveformSource {
    base: ArrayBlock,
    dtype: DType,
    wave: Waveform,
    rate: f64,
    freq: f64,
    resolution: f64,
    amplitude: Complex64,
    offset: Complex64,
    table: Vec<Complex64>,
    step: usize,
    index: usize,
}

impl WaveformSource {
    pub fn new(device: &str, dtype: DType) -> Result<Self> {
        validate_dtype(dtype, FC)?;
        let mut base = ArrayBlock::new("waveform_source", device)?;
        base.setup_output(dtype);
        let mut source = Self {
            base,
            dtype,
            wave: Waveform::Const,
            rate: 1.0,
            freq: 0.0,
            resolution: 0.0,
            amplitude: Complex64::new(1.0, 0.0),
            offset: Complex64::new(0.0, 0.0),
            table: Vec::new(),
            step: 0,
            index: 0,
        };
        source.update_table();
        Ok(source)
    }

    fn update_table(&mut self) {
        let fraction = if self.resolution != 0.0 { self.resolution } else { self.freq } / self.rate;
        let n = table_len(fraction);
        self.table = (0..n)
            .map(|i| self.wave.sample(i, n) * self.amplitude + self.offset)
            .collect();
        self.step = ((self.freq / self.rate) * n as f64).round() as i64 as usize;
        log::debug!("waveform_source: {} table of {n}, step {}", self.wave.name(), self.step as i64);
    }

    pub fn waveform(&self) -> Waveform {
        self.wave
    }

    pub fn set_waveform(&mut self, wave: Waveform) {
        self.wave = wave;
        self.update_table();
    }

    pub fn sample_rate(&self) -> f64 {
        self.rate
    }

    pub fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        if rate.is_nan() || rate <= 0.0 {
            return Err(BlockError::invalid(format!("Sample rate must be positive, got {rate}")));
        }
        self.rate = rate;
        self.update_table();
        Ok(())
    }

    pub fn frequency(&self) -> f64 {
        self.freq
    }

    pub fn set_frequency(&mut self, freq: f64) {
        self.freq = freq;
        self.update_table();
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Frequency resolution the table must resolve; 0 uses the frequency.
    pub fn set_resolution(&mut self, resolution: f64) {
        self.resolution = resolution;
        self.update_table();
    }

    pub fn amplitude(&self) -> Complex64 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: Complex64) {
        self.amplitude = amplitude;
        self.update_table();
    }

    pub fn offset(&self) -> Complex64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Complex64) {
        self.offset = offset;
        self.update_table();
    }

    fn next_samples(&mut self, len: usize) -> Vec<Complex64> {
        let mask = self.table.len() - 1;
        (0..len)
            .map(|_| {
                let z = self.table[self.index & mask];
                self.index = self.index.wrapping_add(self.step);
                z
            })
            .collect()
    }
}

impl Block for WaveformSource {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        self.base.begin_work()?;
        let samples = self.next_samples(config::global().source_buffer_len);
        let device = self.base.device_id();
        let wide = if self.dtype.is_complex() {
            Array::from_vec(samples, device)
        } else {
            Array::from_vec(samples.into_iter().map(|z| z.re).collect::<Vec<f64>>(), device)
        };
        self.base.post_array(0, &wide.cast(self.dtype))
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getWaveform" => Ok(Value::from(self.wave.name())),
            "setWaveform" => {
                self.set_waveform(Waveform::from_name(single_arg(name, args)?.as_str()?)?);
                Ok(Value::Null)
            }
            "getOffset" => Ok(Value::Complex(self.offset)),
            "setOffset" => {
                self.set_offset(single_arg(name, args)?.as_complex()?);
                Ok(Value::Null)
            }
            "getAmplitude" => Ok(Value::Complex(self.amplitude)),
            "setAmplitude" => {
                self.set_amplitude(single_arg(name, args)?.as_complex()?);
                Ok(Value::Null)
            }
            "getFrequency" => Ok(Value::Float(self.freq)),
            "setFrequency" => {
                self.set_frequency(single_arg(name, args)?.as_f64()?);
                Ok(Value::Null)
            }
            "getSampleRate" => Ok(Value::Float(self.rate)),
            "setSampleRate" => self.set_sample_rate(single_arg(name, args)?.as_f64()?).map(|()| Value::Null),
            "getResolution" => Ok(Value::Float(self.resolution)),
            "setResolution" => {
                self.set_resolution(single_arg(name, args)?.as_f64()?);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}
