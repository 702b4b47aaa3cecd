use std::slice::ChunksExactMut;

use crate::block::{BlockCoord, BlockIndexer};
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::fill::FillPattern;

/// A square matrix stored as contiguous blocks.
///
/// Owns `size * size` elements laid out as described by [`BlockIndexer`].
/// Blocks are borrowed as plain slices and never outlive the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    indexer: BlockIndexer,
}

impl<T: Element> Matrix<T> {
    /// Create a zero-filled matrix.
    ///
    /// # Errors
    /// Returns an error if the sizes are not block aligned or the buffer
    /// cannot be allocated.
    pub fn zeros(size: usize, block_size: usize) -> Result<Self> {
        let indexer = BlockIndexer::new(size, block_size)?;
        let n = indexer.numel();
        let mut data = Vec::new();
        data.try_reserve_exact(n)
            .map_err(|_| TensorError::Allocation {
                size,
                elements: n,
                bytes: n.saturating_mul(T::DTYPE.size_in_bytes()),
            })?;
        data.resize(n, T::zero());
        Ok(Matrix { data, indexer })
    }

    /// Create a matrix initialised with `pattern`.
    pub fn filled(size: usize, block_size: usize, pattern: &FillPattern) -> Result<Self> {
        let mut m = Self::zeros(size, block_size)?;
        m.fill(pattern);
        Ok(m)
    }

    /// Wrap an existing buffer already in block layout.
    pub fn from_vec(data: Vec<T>, size: usize, block_size: usize) -> Result<Self> {
        let indexer = BlockIndexer::new(size, block_size)?;
        if data.len() != indexer.numel() {
            return Err(TensorError::BufferLength {
                op: "Matrix::from_vec",
                expected: indexer.numel(),
                got: data.len(),
            });
        }
        Ok(Matrix { data, indexer })
    }

    /// Overwrite the contents with `pattern`.
    pub fn fill(&mut self, pattern: &FillPattern) {
        pattern.fill(&self.indexer, &mut self.data);
    }

    /// Returns the block geometry.
    pub fn indexer(&self) -> &BlockIndexer {
        &self.indexer
    }

    /// Matrix dimension in elements.
    pub fn size(&self) -> usize {
        self.indexer.size()
    }

    /// Block dimension in elements.
    pub fn block_size(&self) -> usize {
        self.indexer.block_size()
    }

    /// Returns true if `other` has the same size and block size.
    pub fn same_layout<U>(&self, other: &Matrix<U>) -> bool {
        self.indexer == other.indexer
    }

    /// The raw buffer in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The raw buffer in storage order, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the matrix, returning its buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Borrow the block at `coord`.
    pub fn block(&self, coord: BlockCoord) -> &[T] {
        let start = self.indexer.offset(coord);
        &self.data[start..start + self.indexer.block_len()]
    }

    /// Mutably borrow the block at `coord`.
    pub fn block_mut(&mut self, coord: BlockCoord) -> &mut [T] {
        let start = self.indexer.offset(coord);
        let len = self.indexer.block_len();
        &mut self.data[start..start + len]
    }

    /// Iterate disjoint mutable blocks in storage order.
    ///
    /// The n-th item is the block with `block_index == n`.
    pub fn blocks_mut(&mut self) -> ChunksExactMut<'_, T> {
        let len = self.indexer.block_len();
        self.data.chunks_exact_mut(len)
    }

    /// Element at global position `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.indexer.global_offset(row, col)]
    }

    /// Set the element at global position `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let off = self.indexer.global_offset(row, col);
        self.data[off] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let m = Matrix::<f64>::zeros(8, 4).unwrap();
        assert_eq!(m.size(), 8);
        assert_eq!(m.block_size(), 4);
        assert_eq!(m.as_slice().len(), 64);
        assert!(m.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zeros_not_aligned() {
        assert!(matches!(
            Matrix::<f32>::zeros(10, 4),
            Err(TensorError::NotBlockAligned { .. })
        ));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert!(Matrix::from_vec(vec![0.0f32; 15], 4, 2).is_err());
        assert!(Matrix::from_vec(vec![0.0f32; 16], 4, 2).is_ok());
    }

    #[test]
    fn test_blocks_mut_matches_block_index() {
        let mut m = Matrix::<f64>::zeros(6, 2).unwrap();
        for (i, block) in m.blocks_mut().enumerate() {
            block.fill(i as f64);
        }
        let ix = *m.indexer();
        for coord in ix.coords() {
            let expected = ix.block_index(coord) as f64;
            assert!(m.block(coord).iter().all(|&v| v == expected));
        }
    }

    #[test]
    fn test_get_set_global() {
        let mut m = Matrix::<f32>::zeros(4, 2).unwrap();
        m.set(1, 3, 9.0);
        assert_eq!(m.get(1, 3), 9.0);
        // (1, 3) lives in block (0, 1) at local (1, 1).
        assert_eq!(m.block(BlockCoord::new(0, 1))[3], 9.0);
        m.block_mut(BlockCoord::new(1, 0))[0] = 5.0;
        assert_eq!(m.get(2, 0), 5.0);
    }

    #[test]
    fn test_filled_constant() {
        let m = Matrix::<f64>::filled(4, 2, &FillPattern::Constant(3.5)).unwrap();
        assert!(m.as_slice().iter().all(|&v| v == 3.5));
    }
}
