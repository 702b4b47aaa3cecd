use bm_tensor::cpu::matmul::block_mac_ijk;
use bm_tensor::{BlockCoord, BlockIndexer, Element, FillPattern, Matrix};
use rayon::prelude::*;

use crate::error::{CheckError, Result};

/// Closed-form value of every output block after `repetitions` runs of
/// `C += A * B`, for inputs that are constant within each block.
///
/// Block `(i, j)` ends up as `c(i, j) + repetitions * sum_k a(i, k) * b(k, j) * block_size`.
/// Returns `None` if any pattern varies within a block.
pub fn block_expectations(
    indexer: &BlockIndexer,
    a: &FillPattern,
    b: &FillPattern,
    c: &FillPattern,
    repetitions: usize,
) -> Option<Vec<f64>> {
    let n = indexer.blocks_per_side();
    let bs = indexer.block_size() as f64;
    let value = |p: &FillPattern, row, col| p.block_value(indexer.block_index(BlockCoord::new(row, col)));

    indexer
        .coords()
        .map(|coord| {
            let mut acc = 0.0;
            for k in 0..n {
                acc += value(a, coord.row, k)? * value(b, k, coord.col)? * bs;
            }
            Some(value(c, coord.row, coord.col)? + repetitions as f64 * acc)
        })
        .collect()
}

/// Expected result computed on the host in f64, for inputs with no closed form.
///
/// `c0` is the accumulator's initial contents.
pub fn host_product<T: Element>(
    a: &Matrix<T>,
    b: &Matrix<T>,
    c0: &Matrix<T>,
    repetitions: usize,
) -> Result<Matrix<f64>> {
    for other in [b, c0] {
        if !a.same_layout(other) {
            return Err(CheckError::LayoutMismatch {
                computed_size: other.size(),
                computed_block: other.block_size(),
                expected_size: a.size(),
                expected_block: a.block_size(),
            });
        }
    }

    let indexer = *a.indexer();
    let (size, bs) = (indexer.size(), indexer.block_size());
    let widen = |m: &Matrix<T>| Matrix::from_vec(m.as_slice().iter().map(|v| v.to_f64()).collect(), size, bs);
    let a64 = widen(a)?;
    let b64 = widen(b)?;

    let mut product = Matrix::<f64>::zeros(size, bs)?;
    product
        .as_mut_slice()
        .par_chunks_exact_mut(indexer.block_len())
        .enumerate()
        .for_each(|(index, out)| {
            let coord = indexer.coord(index);
            for k in 0..indexer.blocks_per_side() {
                block_mac_ijk(
                    bs,
                    a64.block(BlockCoord::new(coord.row, k)),
                    b64.block(BlockCoord::new(k, coord.col)),
                    out,
                );
            }
        });

    let mut expected = widen(c0)?;
    let reps = repetitions as f64;
    for (e, p) in expected.as_mut_slice().iter_mut().zip(product.as_slice()) {
        *e += reps * p;
    }
    Ok(expected)
}
