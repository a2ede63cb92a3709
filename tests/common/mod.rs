#![allow(dead_code)]

use arrayflow::block::{Block, BlockArgs};
use arrayflow::buffer::BufferChunk;
use arrayflow::dtype::Element;
use arrayflow::registry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(0x5eed)
}

pub fn random_f64(n: usize, lo: f64, hi: f64) -> Vec<f64> {
    let mut rng = rng();
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

/// Builds and activates the block at `path`.
pub fn make_active(path: &str, args: &BlockArgs) -> Box<dyn Block> {
    init_logging();
    let mut block = registry::make(path, args).unwrap();
    block.activate().unwrap();
    block
}

/// Pushes `inputs[i]` into input `i`, runs one step and collects output 0.
pub fn run_single_output<I: Element, O: Element>(block: &mut dyn Block, inputs: &[&[I]]) -> Vec<O> {
    for (port, data) in inputs.iter().enumerate() {
        block.input(port).unwrap().push(&BufferChunk::from_slice(data)).unwrap();
    }
    block.work().unwrap();
    block.output(0).unwrap().collect_vec::<O>().unwrap()
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        let both_nan = a.is_nan() && e.is_nan();
        assert!(both_nan || (a - e).abs() <= tol, "element {i}: {a} vs {e}");
    }
}
