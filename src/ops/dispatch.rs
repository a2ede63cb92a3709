//! Operation dispatch layer.
//!
//! Selects where a kernel runs based on the device that produced its input.
//!
//! Each function attempts implementations in priority order:
//! 1. a GPU shader, when the `wgpu` feature is enabled, the operand lives on
//!    a GPU device and a shader exists for the op and element type
//! 2. the `rayon` CPU kernel
//!
//! Either way the result carries the operand's [`DeviceId`](crate::backend::DeviceId),
//! so chained blocks stay on one device.

use super::binary::{self, BinaryOp};
use super::unary::{self, UnaryOp};
use crate::array::Array;
use crate::error::{BlockError, Result};

/// Dispatches a one-operand element-wise op.
pub fn unary(op: UnaryOp, input: &Array) -> Result<Array> {
    #[cfg(feature = "wgpu")]
    {
        if input.device().is_gpu() {
            if let Some(out) = super::wgpu::try_unary(op, input) {
                return Ok(out);
            }
            log::debug!("{} on {}: no GPU kernel, using CPU", op.name(), input.device());
        }
    }
    unary::unary(op, input)
}

/// Dispatches a two-operand element-wise op.
///
/// No shader covers two operands yet, so GPU-tagged operands always take
/// the CPU kernel.
pub fn binary(op: BinaryOp, a: &Array, b: &Array) -> Result<Array> {
    if a.device().is_gpu() {
        log::trace!("{} on {}: no GPU kernel, using CPU", op.name(), a.device());
    }
    binary::binary(op, a, b)
}

/// Left fold of `op` over `arrays`: `((a0 op a1) op a2) …`, each step
/// dispatched through [`binary`].
pub fn fold(op: BinaryOp, arrays: &[Array]) -> Result<Array> {
    let (first, rest) = arrays
        .split_first()
        .ok_or_else(|| BlockError::assertion("fold over zero arrays"))?;
    rest.iter().try_fold(first.clone(), |acc, next| binary(op, &acc, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, DeviceId};

    #[test]
    fn gpu_tagged_arrays_fall_back() {
        // no adapter 42 exists, so the CPU kernel answers and keeps the tag
        let dev = DeviceId::new(Backend::Wgpu, 42);
        let a = Array::from_vec(vec![-1.5f32, 2.0], dev);
        let out = unary(UnaryOp::Abs, &a).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.5, 2.0]);
        assert_eq!(out.device(), dev);
    }

    #[test]
    fn folds_left() {
        let arrays = vec![
            Array::from_vec(vec![10i32], DeviceId::CPU),
            Array::from_vec(vec![3i32], DeviceId::CPU),
            Array::from_vec(vec![2i32], DeviceId::CPU),
        ];
        assert_eq!(fold(BinaryOp::Sub, &arrays).unwrap().to_vec::<i32>().unwrap(), vec![5]);
        assert_eq!(fold(BinaryOp::Div, &arrays[..2]).unwrap().to_vec::<i32>().unwrap(), vec![3]);
        assert!(matches!(fold(BinaryOp::Add, &[]), Err(BlockError::AssertionViolation(_))));
    }
}
