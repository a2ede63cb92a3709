mod common;

use arrayflow::block::{BlockArgs, Label};
use arrayflow::buffer::BufferChunk;
use arrayflow::config;
use arrayflow::dtype::DType;
use arrayflow::registry::{self, registry};
use arrayflow::value::Value;
use num_complex::Complex64;

#[test]
fn test_registry_paths_are_namespaced() {
    let paths: Vec<&str> = registry().paths().collect();
    assert!(paths.len() > 60);
    assert!(paths.iter().all(|p| p.starts_with("/gpu/")));
    for path in ["/gpu/arith/abs", "/gpu/signal/fft", "/gpu/statistics/var", "/gpu/array/file_sink"] {
        assert!(paths.contains(&path), "{path} missing");
    }
    assert_eq!(
        registry().supported_types("/gpu/data/replace").unwrap(),
        &[
            DType::Int16,
            DType::Int32,
            DType::UInt8,
            DType::UInt16,
            DType::UInt32,
            DType::Float32,
            DType::Float64,
            DType::ComplexFloat32,
            DType::ComplexFloat64,
        ]
    );
}

#[test]
fn test_array_arithmetic_and_logical() {
    let args = BlockArgs::new().with("dtype", "float32").with("operation", "Add").with("numChannels", 3usize);
    let mut block = common::make_active("/gpu/array/arithmetic", &args);
    let out = common::run_single_output::<f32, f32>(block.as_mut(), &[&[1.0, 2.0], &[10.0, 20.0], &[100.0, 200.0]]);
    assert_eq!(out, vec![111.0, 222.0]);

    let args = BlockArgs::new().with("dtype", "int32").with("operation", "Divide");
    let mut block = common::make_active("/gpu/array/arithmetic", &args);
    block.input(0).unwrap().push(&BufferChunk::from_slice(&[8i32])).unwrap();
    block.input(1).unwrap().push(&BufferChunk::from_slice(&[0i32])).unwrap();
    assert!(block.work().is_err());

    let args = BlockArgs::new().with("dtype", "uint8").with("operation", "Or");
    let mut block = common::make_active("/gpu/array/logical", &args);
    let out = common::run_single_output::<u8, i8>(block.as_mut(), &[&[0, 0, 3], &[0, 7, 0]]);
    assert_eq!(out, vec![0, 1, 1]);
}

#[test]
fn test_bitwise_and_bitshift() {
    let args = BlockArgs::new().with("dtype", "uint16").with("operation", "XOr").with("numChannels", 3usize);
    let mut block = common::make_active("/gpu/array/bitwise", &args);
    let out = common::run_single_output::<u16, u16>(block.as_mut(), &[&[0b1100], &[0b1010], &[0b0001]]);
    assert_eq!(out, vec![0b0111]);

    let args = BlockArgs::new().with("dtype", "uint32").with("operation", "Left");
    let mut block = common::make_active("/gpu/array/bitshift", &args);
    let out = common::run_single_output::<u32, u32>(block.as_mut(), &[&[1, 3], &[4, 1]]);
    assert_eq!(out, vec![16, 6]);

    let args = BlockArgs::new().with("dtype", "int32").with("operation", "Right").with("scalar", 2i64);
    let mut block = common::make_active("/gpu/scalar/bitshift", &args);
    let out = common::run_single_output::<i32, i32>(block.as_mut(), &[&[16, 7]]);
    assert_eq!(out, vec![4, 1]);
}

#[test]
fn test_scalar_arithmetic_rejects_zero_divisor() {
    let args = BlockArgs::new().with("dtype", "float64").with("operation", "Divide").with("scalar", 0.0);
    assert!(registry::make("/gpu/scalar/arithmetic", &args).is_err());

    let args = BlockArgs::new().with("dtype", "float64").with("operation", "Multiply").with("scalar", 2.5);
    let mut block = common::make_active("/gpu/scalar/arithmetic", &args);
    let out = common::run_single_output::<f64, f64>(block.as_mut(), &[&[2.0, -4.0]]);
    assert_eq!(out, vec![5.0, -10.0]);
}

#[test]
fn test_clamp_and_replace() {
    let args = BlockArgs::new().with("dtype", "int16").with("minValue", -2i64).with("maxValue", 5i64);
    let mut block = common::make_active("/gpu/arith/clamp", &args);
    let out = common::run_single_output::<i16, i16>(block.as_mut(), &[&[-9, 0, 9]]);
    assert_eq!(out, vec![-2, 0, 5]);
    assert!(block.call("setMinValue", &[Value::Int(6)]).is_err());
    assert_eq!(block.call("getMinValue", &[]).unwrap(), Value::Int(-2));

    let args = BlockArgs::new().with("dtype", "float32").with("findValue", 1.5).with("replaceValue", -1.0);
    let mut block = common::make_active("/gpu/data/replace", &args);
    let out = common::run_single_output::<f32, f32>(block.as_mut(), &[&[1.5, 2.0, 1.5]]);
    assert_eq!(out, vec![-1.0, 2.0, -1.0]);
}

#[test]
fn test_sort_and_set_unique() {
    let args = BlockArgs::new().with("dtype", "uint32").with("isAscending", false);
    let mut block = common::make_active("/gpu/algorithm/sort", &args);
    let out = common::run_single_output::<u32, u32>(block.as_mut(), &[&[2, 9, 4]]);
    assert_eq!(out, vec![9, 4, 2]);

    let args = BlockArgs::new().with("dtype", "int16").with("numChannels", 2usize);
    let mut block = common::make_active("/gpu/algorithm/set_unique", &args);
    let out = common::run_single_output::<i16, i16>(block.as_mut(), &[&[5, -1, 5], &[0, -1, 3]]);
    assert_eq!(out, vec![-1, 0, 3, 5]);
}

#[test]
fn test_fft_round_trip() {
    let n = 8usize;
    let signal: Vec<Complex64> = common::random_f64(n, -1.0, 1.0)
        .into_iter()
        .enumerate()
        .map(|(i, re)| Complex64::new(re, i as f64 * 0.25))
        .collect();

    let forward = BlockArgs::new().with("dtype", "complex_float64").with("numBins", n);
    let mut fft = common::make_active("/gpu/signal/fft", &forward);
    let spectrum = common::run_single_output::<Complex64, Complex64>(fft.as_mut(), &[&signal]);
    assert_eq!(spectrum.len(), n);
    let dc: Complex64 = signal.iter().sum();
    assert!((spectrum[0] - dc).norm() < 1e-9);

    let inverse = BlockArgs::new()
        .with("dtype", "complex_float64")
        .with("numBins", n)
        .with("inverse", true)
        .with("norm", 1.0 / n as f64);
    let mut ifft = common::make_active("/gpu/signal/fft", &inverse);
    let back = common::run_single_output::<Complex64, Complex64>(ifft.as_mut(), &[&spectrum]);
    for (a, b) in back.iter().zip(&signal) {
        assert!((a - b).norm() < 1e-9);
    }
}

#[test]
fn test_fft_waits_for_a_full_frame() {
    let args = BlockArgs::new().with("dtype", "complex_float32").with("numBins", 4usize);
    let mut block = common::make_active("/gpu/signal/fft", &args);
    block.input(0).unwrap().push(&BufferChunk::zeros(DType::ComplexFloat32, 3)).unwrap();
    block.work().unwrap();
    assert!(block.output(0).unwrap().drain_buffers().is_empty());
    assert_eq!(block.call("numBins", &[]).unwrap(), Value::from(4usize));
}

#[test]
fn test_fir_moving_average() {
    let args = BlockArgs::new().with("dtype", "float64").with("taps", vec![0.5, 0.5]);
    let mut block = common::make_active("/gpu/signal/fir", &args);
    let out = common::run_single_output::<f64, f64>(block.as_mut(), &[&[2.0, 4.0, 6.0]]);
    assert_eq!(out, vec![1.0, 3.0, 5.0]);

    let empty = BlockArgs::new().with("taps", Vec::<f64>::new());
    assert!(registry::make("/gpu/signal/fir", &empty).is_err());
}

#[test]
fn test_statistics_label_and_passthrough() {
    let args = BlockArgs::new().with("dtype", "float64");
    let mut block = common::make_active("/gpu/statistics/median", &args);
    let input = [5.0f64, 1.0, 4.0];
    let out = common::run_single_output::<f64, f64>(block.as_mut(), &[&input]);
    assert_eq!(out, input.to_vec());
    assert_eq!(block.output(0).unwrap().drain_labels(), vec![Label::new("MEDIAN", 4.0, 2)]);

    let args = BlockArgs::new().with("dtype", "float32").with("isBiased", true);
    let mut var = common::make_active("/gpu/statistics/var", &args);
    assert_eq!(var.call("getIsBiased", &[]).unwrap(), Value::Bool(true));
    common::run_single_output::<f32, f32>(var.as_mut(), &[&[1.0, 3.0]]);
    let labels = var.output(0).unwrap().drain_labels();
    assert_eq!(labels[0].id, "VAR");
    assert!((labels[0].data.as_f64().unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn test_constant_and_random_sources() {
    let args = BlockArgs::new().with("dtype", "int64").with("constant", 7i64);
    let mut constant = common::make_active("/gpu/data/constant", &args);
    constant.work().unwrap();
    let out = constant.output(0).unwrap().collect_vec::<i64>().unwrap();
    assert_eq!(out.len(), config::global().constant_buffer_len);
    assert!(out.iter().all(|&v| v == 7));

    let args = BlockArgs::new().with("dtype", "float64").with("numOutputs", 2usize);
    let mut streams = Vec::new();
    for _ in 0..2 {
        let mut source = common::make_active("/gpu/random/source", &args);
        source.call("reseedRandomEngine", &[Value::Int(1234)]).unwrap();
        source.work().unwrap();
        let first = source.output(0).unwrap().collect_vec::<f64>().unwrap();
        let second = source.output(1).unwrap().collect_vec::<f64>().unwrap();
        assert_ne!(first, second);
        assert!(first.iter().all(|x| (0.0..1.0).contains(x)));
        streams.push(first);
    }
    assert_eq!(streams[0], streams[1]);
}

#[test]
fn test_polar_round_trip() {
    let input = [Complex64::new(3.0, 4.0), Complex64::new(-1.0, 0.5)];
    let args = BlockArgs::new().with("dtype", "complex_float64");
    let mut to_polar = common::make_active("/gpu/arith/complex_to_polar", &args);
    to_polar.input(0).unwrap().push(&BufferChunk::from_slice(&input)).unwrap();
    to_polar.work().unwrap();
    let magnitude = to_polar.output(0).unwrap().collect_vec::<f64>().unwrap();
    let phase = to_polar.output(1).unwrap().collect_vec::<f64>().unwrap();
    assert!((magnitude[0] - 5.0).abs() < 1e-12);

    let mut from_polar = common::make_active("/gpu/arith/polar_to_complex", &BlockArgs::new().with("dtype", "float64"));
    let back = common::run_single_output::<f64, Complex64>(from_polar.as_mut(), &[&magnitude, &phase]);
    for (a, b) in back.iter().zip(&input) {
        assert!((a - b).norm() < 1e-12);
    }
}

#[test]
fn test_work_before_activate_is_an_assertion() {
    let mut block = registry::make("/gpu/arith/abs", &BlockArgs::new()).unwrap();
    block.input(0).unwrap().push(&BufferChunk::from_slice(&[1.0f64])).unwrap();
    let err = block.work().unwrap_err();
    assert!(err.to_string().starts_with("assertion violation:"));
}
