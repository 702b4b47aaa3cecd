pub mod matmul;

use crate::backend::{check_block_args, Affinity, BackendKind, BlockBackend};
use crate::element::Element;
use crate::error::Result;

/// Pure-Rust reference backend.
///
/// Implements the block multiply with a straightforward triple loop,
/// optimized for correctness rather than peak performance. Intended as the
/// baseline the other backends are compared against.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> BlockBackend<T> for CpuBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Reference
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        a: &[T],
        b: &[T],
        c: &mut [T],
        _affinity: Affinity,
    ) -> Result<()> {
        check_block_args("reference multiply_accumulate", block_size, a, b, c)?;
        matmul::block_mac_ijk(block_size, a, b, c);
        Ok(())
    }
}
