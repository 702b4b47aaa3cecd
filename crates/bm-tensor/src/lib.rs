//! `bm-tensor` - Block-tiled matrices and pluggable block multiply backends for blockmm.
//!
//! This crate provides:
//! - A `Matrix` type whose storage is a sequence of contiguous square blocks
//! - `BlockIndexer`, the single source of block address arithmetic
//! - A `BlockBackend` trait for pluggable block multiply-accumulate
//! - Reference (`CpuBackend`), library GEMM (`LibraryBackend`) and simulated
//!   systolic hardware (`SystolicBackend`) implementations
//! - Element type definitions (F32, F64) and fill patterns

pub mod backend;
pub mod blas;
pub mod block;
pub mod cpu;
pub mod dtype;
pub mod element;
pub mod error;
pub mod fill;
pub mod matrix;
pub mod systolic;

// Re-export primary types at the crate root for convenience.
pub use backend::{create_backend, Affinity, BackendKind, BlockBackend};
pub use blas::LibraryBackend;
pub use block::{block_offset, BlockCoord, BlockIndexer};
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use element::Element;
pub use error::{Result, TensorError};
pub use fill::FillPattern;
pub use matrix::Matrix;
pub use systolic::{SystolicBackend, UnitStats};
