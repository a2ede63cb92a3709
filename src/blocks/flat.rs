//! Channel concatenation.

use crate::block::{ArrayBlock, Block, setup_ports};
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::Result;

/// Concatenates every input's pending elements, channel 0 first, onto one
/// output.
pub struct FlatBlock {
    base: ArrayBlock,
}

impl FlatBlock {
    pub fn new(device: &str, dtype: DType, nchans: usize) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::ALL)?;
        let mut base = ArrayBlock::new("flat", device)?;
        setup_ports(&mut base, dtype, dtype, nchans, 0);
        base.setup_output(dtype);
        Ok(Self { base })
    }
}

impl Block for FlatBlock {
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
        let stacked = self.base.numbered_inputs_as_2d(elems)?;
        let flat = stacked.reshape(vec![self.base.inputs().len() * elems])?;
        self.base.consume_all(elems)?;
        self.base.post_array(0, &flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn channels_are_laid_end_to_end() {
        let mut block = FlatBlock::new(AUTO_DEVICE, DType::UInt32, 3).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[1u32, 2, 3])).unwrap();
        block.input(1).unwrap().push(&BufferChunk::from_slice(&[4u32, 5])).unwrap();
        block.input(2).unwrap().push(&BufferChunk::from_slice(&[6u32, 7])).unwrap();
        block.work().unwrap();
        assert_eq!(block.output(0).unwrap().collect_vec::<u32>().unwrap(), vec![1, 2, 4, 5, 6, 7]);
        assert_eq!(block.input(0).unwrap().elements(), 1);
    }
}
