mod common;

use arrayflow::block::BlockArgs;
use arrayflow::buffer::BufferChunk;
use arrayflow::registry;
use arrayflow::value::Value;

#[test]
fn test_array_comparators_emit_int8() {
    let a = [1.0f64, 2.0, 3.0, f64::NAN];
    let b = [2.0f64, 2.0, 2.0, 2.0];
    let cases: [(&str, [i8; 4]); 6] = [
        ("<", [1, 0, 0, 0]),
        ("<=", [1, 1, 0, 0]),
        (">", [0, 0, 1, 0]),
        (">=", [0, 1, 1, 0]),
        ("==", [0, 1, 0, 0]),
        ("!=", [1, 0, 1, 1]),
    ];
    for (symbol, expected) in cases {
        let args = BlockArgs::new().with("dtype", "float64").with("comparator", symbol);
        let mut block = common::make_active("/gpu/array/comparator", &args);
        let out = common::run_single_output::<f64, i8>(block.as_mut(), &[&a, &b]);
        assert_eq!(out, expected.to_vec(), "comparator {symbol}");
    }
}

#[test]
fn test_scalar_comparator_on_unsigned() {
    let args = BlockArgs::new()
        .with("dtype", "uint8")
        .with("comparator", ">")
        .with("scalar", 100i64)
        .with("numChannels", 2usize);
    let mut block = common::make_active("/gpu/scalar/comparator", &args);
    block.input(0).unwrap().push(&BufferChunk::from_slice(&[0u8, 101, 255])).unwrap();
    block.input(1).unwrap().push(&BufferChunk::from_slice(&[100u8, 99, 200])).unwrap();
    block.work().unwrap();
    assert_eq!(block.output(0).unwrap().collect_vec::<i8>().unwrap(), vec![0, 1, 1]);
    assert_eq!(block.output(1).unwrap().collect_vec::<i8>().unwrap(), vec![0, 0, 1]);

    block.call("setScalar", &[Value::Int(0)]).unwrap();
    block.input(0).unwrap().push(&BufferChunk::from_slice(&[0u8])).unwrap();
    block.input(1).unwrap().push(&BufferChunk::from_slice(&[1u8])).unwrap();
    block.work().unwrap();
    assert_eq!(block.output(0).unwrap().collect_vec::<i8>().unwrap(), vec![0]);
    assert_eq!(block.output(1).unwrap().collect_vec::<i8>().unwrap(), vec![1]);
}

#[test]
fn test_bad_comparator_symbols() {
    for path in ["/gpu/array/comparator", "/gpu/scalar/comparator"] {
        let args = BlockArgs::new().with("comparator", "=>").with("scalar", 1i64);
        let err = registry::make(path, &args).err().unwrap();
        assert_eq!(err.to_string(), "invalid argument: Invalid comparator: =>");
    }
}

#[test]
fn test_complex_comparison_is_rejected() {
    let args = BlockArgs::new().with("dtype", "complex_float32").with("comparator", "<");
    assert!(registry::make("/gpu/array/comparator", &args).is_err());
}
