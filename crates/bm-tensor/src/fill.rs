use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::block::BlockIndexer;
use crate::element::Element;

/// Initial contents of a benchmark matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillPattern {
    /// Every element holds the same value.
    Constant(f64),
    /// Every element of the block at storage index `l` holds `base + l * step`.
    BlockRamp { base: f64, step: f64 },
    /// Seeded uniform values in `[0, 1)`.
    Random { seed: u64 },
}

impl FillPattern {
    /// Value shared by every element of block `index`, or `None` when the
    /// pattern is not constant per block.
    pub fn block_value(&self, index: usize) -> Option<f64> {
        match *self {
            FillPattern::Constant(v) => Some(v),
            FillPattern::BlockRamp { base, step } => Some(base + index as f64 * step),
            FillPattern::Random { .. } => None,
        }
    }

    /// Returns true if every block holds a single repeated value.
    pub fn is_block_constant(&self) -> bool {
        !matches!(self, FillPattern::Random { .. })
    }

    /// Fill `data`, laid out as described by `indexer`.
    ///
    /// Elements are written block by block using block-local addressing
    /// (`row * block_size + col`), so the result is independent of how the
    /// blocks are later visited.
    ///
    /// # Panics
    /// Panics if `data.len() != indexer.numel()`.
    pub fn fill<T: Element>(&self, indexer: &BlockIndexer, data: &mut [T]) {
        assert_eq!(data.len(), indexer.numel(), "fill: buffer does not match layout");
        let b = indexer.block_size();
        let len = indexer.block_len();

        match *self {
            FillPattern::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                for coord in indexer.coords() {
                    let start = indexer.offset(coord);
                    let block = &mut data[start..start + len];
                    for row in 0..b {
                        for col in 0..b {
                            block[row * b + col] = T::from_f64(rng.gen_range(0.0..1.0));
                        }
                    }
                }
            }
            _ => {
                for (index, coord) in indexer.coords().enumerate() {
                    if let Some(v) = self.block_value(index) {
                        let start = indexer.offset(coord);
                        data[start..start + len].fill(T::from_f64(v));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ramp_values() {
        let p = FillPattern::BlockRamp {
            base: 437.0,
            step: -1.0,
        };
        assert_eq!(p.block_value(0), Some(437.0));
        assert_eq!(p.block_value(5), Some(432.0));
        assert!(p.is_block_constant());
    }

    #[test]
    fn test_fill_ramp_per_block() {
        let ix = BlockIndexer::new(4, 2).unwrap();
        let mut data = vec![0.0f64; 16];
        FillPattern::BlockRamp {
            base: 1.0,
            step: 1.0,
        }
        .fill(&ix, &mut data);
        assert_eq!(&data[0..4], &[1.0; 4]);
        assert_eq!(&data[12..16], &[4.0; 4]);
    }

    #[test]
    fn test_random_is_seeded() {
        let ix = BlockIndexer::new(8, 4).unwrap();
        let mut a = vec![0.0f32; 64];
        let mut b = vec![0.0f32; 64];
        let mut c = vec![0.0f32; 64];
        FillPattern::Random { seed: 7 }.fill(&ix, &mut a);
        FillPattern::Random { seed: 7 }.fill(&ix, &mut b);
        FillPattern::Random { seed: 8 }.fill(&ix, &mut c);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
        assert!(FillPattern::Random { seed: 7 }.block_value(0).is_none());
    }
}
