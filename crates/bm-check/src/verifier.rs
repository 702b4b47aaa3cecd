use std::fmt;
use std::path::PathBuf;

use bm_tensor::{BlockCoord, BlockIndexer, Element, Matrix};
use rayon::prelude::*;

use crate::error::{CheckError, Result};
use crate::reference::{ReferenceKey, ReferenceStore};
use crate::status::CheckStatus;
use crate::tolerance::Tolerance;

/// The first out-of-tolerance element of one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub block: BlockCoord,
    /// Global row of the element.
    pub row: usize,
    /// Global column of the element.
    pub col: usize,
    pub expected: f64,
    pub found: f64,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} element ({}, {}): expected {} but found {}",
            self.block, self.row, self.col, self.expected, self.found
        )
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Final value of the pass's [`CheckStatus`].
    pub passed: bool,
    /// Number of blocks scanned.
    pub blocks_checked: usize,
    /// One entry per failing block, in block storage order.
    pub mismatches: Vec<Mismatch>,
    /// Set when the pass wrote a new reference record instead of comparing.
    pub generated: Option<PathBuf>,
}

impl CheckReport {
    /// Report for a pass that stored a new reference.
    pub fn generated(path: PathBuf, blocks: usize) -> Self {
        CheckReport {
            passed: true,
            blocks_checked: blocks,
            mismatches: Vec::new(),
            generated: Some(path),
        }
    }
}

/// Compares computed matrices against expectations within a [`Tolerance`].
///
/// Every block is scanned. Inside a block, scanning stops at the first
/// violation, which is logged and recorded; later blocks are still checked
/// so the report names every failing block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier {
    tolerance: Tolerance,
}

impl Verifier {
    pub fn new(tolerance: Tolerance) -> Self {
        Verifier { tolerance }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Check every element of block `n` against `expected[n]`.
    pub fn check_block_values<T: Element>(
        &self,
        computed: &Matrix<T>,
        expected: &[f64],
    ) -> Result<CheckReport> {
        let blocks = computed.indexer().block_count();
        if expected.len() != blocks {
            return Err(CheckError::ExpectationCount {
                expected: blocks,
                got: expected.len(),
            });
        }
        Ok(self.scan(computed, |block, _| expected[block]))
    }

    /// Check `computed` element-wise against `expected`.
    pub fn check_matrix<T: Element, U: Element>(
        &self,
        computed: &Matrix<T>,
        expected: &Matrix<U>,
    ) -> Result<CheckReport> {
        if !computed.same_layout(expected) {
            return Err(CheckError::LayoutMismatch {
                computed_size: computed.size(),
                computed_block: computed.block_size(),
                expected_size: expected.size(),
                expected_block: expected.block_size(),
            });
        }
        let len = computed.indexer().block_len();
        let data = expected.as_slice();
        Ok(self.scan(computed, |block, local| data[block * len + local].to_f64()))
    }

    /// Check `computed` against the stored record for `key`.
    ///
    /// # Errors
    /// A missing record is an error, never a pass.
    pub fn check_reference<T: Element>(
        &self,
        computed: &Matrix<T>,
        store: &ReferenceStore,
        key: &ReferenceKey,
    ) -> Result<CheckReport> {
        let expected: Matrix<T> = store.load(key)?;
        self.check_matrix(computed, &expected)
    }

    fn scan<T, F>(&self, computed: &Matrix<T>, expected: F) -> CheckReport
    where
        T: Element,
        F: Fn(usize, usize) -> f64 + Sync,
    {
        let indexer = *computed.indexer();
        let status = CheckStatus::new();
        let mismatches: Vec<Mismatch> = computed
            .as_slice()
            .par_chunks_exact(indexer.block_len())
            .enumerate()
            .filter_map(|(index, block)| {
                self.check_block(&indexer, index, block, &expected, &status)
            })
            .collect();

        CheckReport {
            passed: status.is_ok(),
            blocks_checked: indexer.block_count(),
            mismatches,
            generated: None,
        }
    }

    fn check_block<T, F>(
        &self,
        indexer: &BlockIndexer,
        index: usize,
        block: &[T],
        expected: &F,
        status: &CheckStatus,
    ) -> Option<Mismatch>
    where
        T: Element,
        F: Fn(usize, usize) -> f64,
    {
        for (local, &value) in block.iter().enumerate() {
            let want = expected(index, local);
            let found = value.to_f64();
            if !self.tolerance.accepts(found, want) {
                status.fail();
                let coord = indexer.coord(index);
                let (row, col) = indexer.global_position(coord, local);
                tracing::error!(block = %coord, row, col, "expected {} but found {}", want, found);
                return Some(Mismatch {
                    block: coord,
                    row,
                    col,
                    expected: want,
                    found,
                });
            }
        }
        None
    }
}
