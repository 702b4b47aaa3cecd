use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};

use crate::backend::{check_block_args, Affinity, BackendKind, BlockBackend};
use crate::element::Element;
use crate::error::{Result, TensorError};

/// Block backend delegating to ndarray's dense GEMM.
///
/// Calls `general_mat_mul` with `alpha = 1` and `beta = 1` on row-major,
/// non-transposed views of the three blocks, so the product is accumulated
/// into the existing contents of `c`.
#[derive(Debug, Clone, Default)]
pub struct LibraryBackend;

impl LibraryBackend {
    pub fn new() -> Self {
        LibraryBackend
    }
}

fn shape_error(e: ndarray::ShapeError) -> TensorError {
    TensorError::Backend {
        backend: "library".to_string(),
        message: e.to_string(),
    }
}

impl<T: Element> BlockBackend<T> for LibraryBackend {
    fn name(&self) -> &str {
        "library"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        a: &[T],
        b: &[T],
        c: &mut [T],
        _affinity: Affinity,
    ) -> Result<()> {
        check_block_args("library multiply_accumulate", block_size, a, b, c)?;
        let dim = (block_size, block_size);
        let a = ArrayView2::from_shape(dim, a).map_err(shape_error)?;
        let b = ArrayView2::from_shape(dim, b).map_err(shape_error)?;
        let mut c = ArrayViewMut2::from_shape(dim, c).map_err(shape_error)?;
        general_mat_mul(T::one(), &a, &b, T::one(), &mut c);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use approx::assert_relative_eq;

    #[test]
    fn test_beta_one_accumulates() {
        let backend = LibraryBackend::new();
        let a = vec![1.0f64, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let mut c = vec![1.0, 1.0, 1.0, 1.0];
        backend
            .multiply_accumulate(2, &a, &b, &mut c, Affinity(0))
            .unwrap();
        assert_eq!(c, vec![20.0, 23.0, 44.0, 51.0]);
    }

    #[test]
    fn test_matches_reference() {
        let n = 16;
        let a: Vec<f32> = (0..n * n).map(|i| (i % 7) as f32 * 0.25).collect();
        let b: Vec<f32> = (0..n * n).map(|i| (i % 5) as f32 - 1.5).collect();
        let mut c_lib = vec![0.5f32; n * n];
        let mut c_ref = c_lib.clone();

        BlockBackend::<f32>::multiply_accumulate(&LibraryBackend, n, &a, &b, &mut c_lib, Affinity(0))
            .unwrap();
        BlockBackend::<f32>::multiply_accumulate(&CpuBackend, n, &a, &b, &mut c_ref, Affinity(0))
            .unwrap();

        for (x, y) in c_lib.iter().zip(c_ref.iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let mut c = vec![0.0f64; 3];
        assert!(LibraryBackend
            .multiply_accumulate(2, &[0.0; 4], &[0.0; 4], &mut c, Affinity(0))
            .is_err());
    }
}
