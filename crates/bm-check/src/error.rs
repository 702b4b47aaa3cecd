use std::path::PathBuf;

use bm_tensor::DType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("reference file not found: {}", path.display())]
    ReferenceMissing { path: PathBuf },
    #[error("reference file {} holds {got} bytes, expected {expected}", path.display())]
    ReferenceSize {
        path: PathBuf,
        expected: u64,
        got: u64,
    },
    #[error("dtype mismatch: record is {record}, matrix is {matrix}")]
    DTypeMismatch { record: DType, matrix: DType },
    #[error(
        "layout mismatch: computed {computed_size}x{computed_size}/{computed_block}, expected {expected_size}x{expected_size}/{expected_block}"
    )]
    LayoutMismatch {
        computed_size: usize,
        computed_block: usize,
        expected_size: usize,
        expected_block: usize,
    },
    #[error("expected {expected} block values, got {got}")]
    ExpectationCount { expected: usize, got: usize },
    #[error("invalid tolerance: {0}")]
    InvalidTolerance(f64),
    #[error("tensor error: {0}")]
    TensorError(#[from] bm_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, CheckError>;
