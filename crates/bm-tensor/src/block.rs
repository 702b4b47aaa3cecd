use std::fmt;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// Starting offset of block `(block_row, block_col)` in a `size`x`size`
/// buffer tiled into `block_size`x`block_size` blocks.
///
/// Each block occupies `block_size²` contiguous elements and the blocks of
/// one block-row band are laid out left to right, so the blocks of the
/// whole matrix appear in row-major block order.
pub fn block_offset(size: usize, block_size: usize, block_row: usize, block_col: usize) -> usize {
    block_col * block_size * block_size + block_row * block_size * size
}

/// Block coordinate inside a tiled matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockCoord {
    pub row: usize,
    pub col: usize,
}

impl BlockCoord {
    pub fn new(row: usize, col: usize) -> Self {
        BlockCoord { row, col }
    }
}

impl fmt::Display for BlockCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Validated block geometry of a square matrix.
///
/// All address arithmetic for tiled matrices goes through this type so that
/// the code filling a matrix and the code multiplying it agree on layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockIndexer {
    size: usize,
    block_size: usize,
}

impl BlockIndexer {
    /// Create an indexer for a `size`x`size` matrix of `block_size` blocks.
    ///
    /// # Errors
    /// Fails if either dimension is zero or `size` is not a multiple of
    /// `block_size`.
    pub fn new(size: usize, block_size: usize) -> Result<Self> {
        if size == 0 || block_size == 0 {
            return Err(TensorError::InvalidSize(format!(
                "matrix size ({}) and block size ({}) must be positive",
                size, block_size
            )));
        }
        if size % block_size != 0 {
            return Err(TensorError::NotBlockAligned {
                matrix_size: size,
                block_size,
            });
        }
        // Sized for the widest element type so every matrix of this
        // geometry has an addressable buffer.
        let elements = size.checked_mul(size);
        let bytes = elements.and_then(|e| e.checked_mul(DType::F64.size_in_bytes()));
        match bytes {
            Some(b) if b <= isize::MAX as usize => {}
            _ => {
                return Err(TensorError::Allocation {
                    size,
                    elements: size.saturating_mul(size),
                    bytes: usize::MAX,
                });
            }
        }
        let n = size / block_size;
        if n.checked_pow(3).is_none() {
            return Err(TensorError::InvalidSize(format!(
                "{}x{} matrix in {}x{} blocks has more block tasks than fit in usize",
                size, size, block_size, block_size
            )));
        }
        Ok(BlockIndexer { size, block_size })
    }

    /// Matrix dimension in elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Block dimension in elements.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks along one side.
    pub fn blocks_per_side(&self) -> usize {
        self.size / self.block_size
    }

    /// Total number of blocks in the matrix.
    pub fn block_count(&self) -> usize {
        self.blocks_per_side() * self.blocks_per_side()
    }

    /// Number of elements in one block.
    pub fn block_len(&self) -> usize {
        self.block_size * self.block_size
    }

    /// Number of elements in the whole matrix.
    pub fn numel(&self) -> usize {
        self.size * self.size
    }

    /// Starting offset of the block at `coord`.
    pub fn offset(&self, coord: BlockCoord) -> usize {
        block_offset(self.size, self.block_size, coord.row, coord.col)
    }

    /// Position of `coord` in storage order, i.e. `offset / block_len`.
    pub fn block_index(&self, coord: BlockCoord) -> usize {
        coord.row * self.blocks_per_side() + coord.col
    }

    /// Inverse of [`BlockIndexer::block_index`].
    pub fn coord(&self, index: usize) -> BlockCoord {
        let n = self.blocks_per_side();
        BlockCoord::new(index / n, index % n)
    }

    /// Iterates all block coordinates in storage order.
    pub fn coords(&self) -> impl Iterator<Item = BlockCoord> + '_ {
        (0..self.block_count()).map(move |i| self.coord(i))
    }

    /// Offset of element `(row, col)` local to the block at `coord`.
    pub fn element_offset(&self, coord: BlockCoord, row: usize, col: usize) -> usize {
        self.offset(coord) + row * self.block_size + col
    }

    /// Offset of the global matrix element `(row, col)`.
    pub fn global_offset(&self, row: usize, col: usize) -> usize {
        let b = self.block_size;
        self.element_offset(BlockCoord::new(row / b, col / b), row % b, col % b)
    }

    /// Global `(row, col)` of the element at `local` inside the block at
    /// `coord`, where `local` is a block-local linear index.
    pub fn global_position(&self, coord: BlockCoord, local: usize) -> (usize, usize) {
        let b = self.block_size;
        (coord.row * b + local / b, coord.col * b + local % b)
    }
}
