use std::path::PathBuf;

use bm_check::{ReferenceStore, Tolerance};
use bm_sched::ExecutionMode;
use bm_tensor::{BackendKind, BlockIndexer, DType, FillPattern};

use crate::error::{BenchError, Result};

/// How the result of a run is verified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// No verification; the run always passes.
    Disabled,
    /// Closed-form block values, or a host recomputation for random inputs.
    #[default]
    Analytic,
    /// Compare against an existing record. A missing record is fatal.
    Reference(ReferenceStore),
    /// Store the result as a new record.
    Generate(ReferenceStore),
}

impl CheckMode {
    pub fn reference(dir: impl Into<PathBuf>) -> Self {
        CheckMode::Reference(ReferenceStore::new(dir))
    }

    pub fn generate(dir: impl Into<PathBuf>) -> Self {
        CheckMode::Generate(ReferenceStore::new(dir))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CheckMode::Disabled => "disabled",
            CheckMode::Analytic => "analytic",
            CheckMode::Reference(_) => "reference",
            CheckMode::Generate(_) => "generate",
        }
    }
}

/// Initial contents of the three operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inputs {
    pub a: FillPattern,
    pub b: FillPattern,
    pub c: FillPattern,
}

impl Inputs {
    /// Block `l` of A holds `587 + l`, block `l` of B holds `437 - l`, C is zero.
    pub fn ramp() -> Self {
        Inputs {
            a: FillPattern::BlockRamp { base: 587.0, step: 1.0 },
            b: FillPattern::BlockRamp { base: 437.0, step: -1.0 },
            c: FillPattern::Constant(0.0),
        }
    }

    pub fn constant(a: f64, b: f64, c: f64) -> Self {
        Inputs {
            a: FillPattern::Constant(a),
            b: FillPattern::Constant(b),
            c: FillPattern::Constant(c),
        }
    }

    /// Seeded uniform A and B, zero C.
    pub fn random(seed: u64) -> Self {
        Inputs {
            a: FillPattern::Random { seed },
            b: FillPattern::Random {
                seed: seed.wrapping_add(1),
            },
            c: FillPattern::Constant(0.0),
        }
    }
}

impl Default for Inputs {
    fn default() -> Self {
        Self::ramp()
    }
}

/// Parameters for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub matrix_size: usize,
    pub block_size: usize,
    pub dtype: DType,
    pub backend: BackendKind,
    pub mode: ExecutionMode,
    /// Device instances for the systolic backend.
    pub instances: usize,
    pub check: CheckMode,
    pub tolerance: Tolerance,
    /// Times the whole graph is executed, accumulating into C.
    pub repetitions: usize,
    pub warmup: bool,
    pub inputs: Inputs,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            matrix_size: 2048,
            block_size: 128,
            dtype: DType::F64,
            backend: BackendKind::default(),
            mode: ExecutionMode::default(),
            instances: 4,
            check: CheckMode::default(),
            tolerance: Tolerance::default(),
            repetitions: 1,
            warmup: true,
            inputs: Inputs::default(),
        }
    }
}

impl BenchConfig {
    /// Config for a `matrix_size` square matrix tiled into `block_size` blocks,
    /// everything else at its default.
    pub fn new(matrix_size: usize, block_size: usize) -> Self {
        Self {
            matrix_size,
            block_size,
            ..Self::default()
        }
    }

    /// Check every precondition that must hold before any task runs.
    pub fn validate(&self) -> Result<BlockIndexer> {
        let indexer = BlockIndexer::new(self.matrix_size, self.block_size)?;
        if self.repetitions == 0 {
            return Err(BenchError::InvalidConfig(
                "repetitions must be at least 1".to_string(),
            ));
        }
        if self.backend == BackendKind::Systolic && self.instances == 0 {
            return Err(BenchError::InvalidConfig(
                "systolic backend needs at least one device instance".to_string(),
            ));
        }
        Ok(indexer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_tensor::TensorError;

    #[test]
    fn test_defaults() {
        let c = BenchConfig::default();
        assert_eq!(c.matrix_size, 2048);
        assert_eq!(c.block_size, 128);
        assert_eq!(c.dtype, DType::F64);
        assert_eq!(c.instances, 4);
        assert_eq!(c.tolerance.value(), 1e-4);
        assert_eq!(c.check, CheckMode::Analytic);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_not_aligned() {
        let c = BenchConfig::new(100, 32);
        assert!(matches!(
            c.validate(),
            Err(BenchError::TensorError(TensorError::NotBlockAligned { .. }))
        ));
    }

    #[test]
    fn test_zero_repetitions() {
        let c = BenchConfig {
            repetitions: 0,
            ..BenchConfig::new(64, 16)
        };
        assert!(matches!(c.validate(), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn test_systolic_needs_instances() {
        let c = BenchConfig {
            backend: BackendKind::Systolic,
            instances: 0,
            ..BenchConfig::new(64, 16)
        };
        assert!(c.validate().is_err());
    }
}
