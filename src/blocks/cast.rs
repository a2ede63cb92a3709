//! Element type conversion.

use crate::block::OneToOneBlock;
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};

/// A one-to-one block converting `input` elements to `output`.
///
/// Complex values narrowed to a real type would silently lose their
/// imaginary part, so that direction is refused up front.
///
/// # Errors
/// - either type is unsupported
/// - `input` is complex and `output` is not
pub fn cast_block(device: &str, input: DType, output: DType, nchans: usize) -> Result<OneToOneBlock> {
    validate_dtype(input, DTypeSupport::ALL)?;
    validate_dtype(output, DTypeSupport::ALL)?;
    if input.is_complex() && !output.is_complex() {
        return Err(BlockError::invalid("This block cannot perform complex to scalar conversions."));
    }
    OneToOneBlock::new(device, "cast", Box::new(move |a| Ok(a.cast(output))), input, output, nchans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::buffer::BufferChunk;
    use crate::config::AUTO_DEVICE;
    use num_complex::Complex32;

    #[test]
    fn widens_ints_to_complex() {
        let mut block = cast_block(AUTO_DEVICE, DType::Int16, DType::ComplexFloat32, 1).unwrap();
        block.activate().unwrap();
        block.input(0).unwrap().push(&BufferChunk::from_slice(&[-2i16, 7])).unwrap();
        block.work().unwrap();
        assert_eq!(
            block.output(0).unwrap().collect_vec::<Complex32>().unwrap(),
            vec![Complex32::new(-2.0, 0.0), Complex32::new(7.0, 0.0)]
        );
    }

    #[test]
    fn complex_to_real_is_refused() {
        let err = cast_block(AUTO_DEVICE, DType::ComplexFloat64, DType::Float64, 1).err().unwrap();
        assert!(matches!(err, BlockError::InvalidArgument(_)));
        assert!(cast_block(AUTO_DEVICE, DType::Float64, DType::Int8, 1).is_err());
    }
}
