// Simulated systolic-array block multiply unit.
//
// Each device instance owns a block-sized accumulator tile. Operands stream
// through the array one k-slice per wavefront: the k loop is outermost and
// the i/j loops form the pipelined processing-element grid. The finished
// tile is drained into C in one pass.

use std::sync::{Mutex, MutexGuard};

use crate::backend::{check_block_args, Affinity, BackendKind, BlockBackend};
use crate::element::Element;
use crate::error::{Result, TensorError};

/// Per-instance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    /// Blocks processed by this instance.
    pub blocks: u64,
    /// Modelled pipeline cycles (`3n - 2` fill/drain per block plus `n`
    /// drain cycles to write back the tile).
    pub cycles: u64,
}

#[derive(Debug)]
struct SystolicUnit<T> {
    tile: Vec<T>,
    stats: UnitStats,
}

/// Block backend modelling a fixed number of hardware instances.
///
/// At most one block runs on an instance at a time; the instance is chosen
/// from the [`Affinity`] tag modulo the instance count. The scheduler is
/// told the instance count through [`BlockBackend::slots`] so it never
/// submits more outstanding blocks than there are instances.
#[derive(Debug)]
pub struct SystolicBackend<T> {
    block_size: usize,
    units: Vec<Mutex<SystolicUnit<T>>>,
}

impl<T: Element> SystolicBackend<T> {
    /// Bring up `instances` units for `block_size` blocks.
    ///
    /// # Errors
    /// Fails if no instance is available or `block_size` is zero.
    pub fn new(block_size: usize, instances: usize) -> Result<Self> {
        if instances == 0 {
            return Err(TensorError::Backend {
                backend: "systolic".to_string(),
                message: "no device instances available".to_string(),
            });
        }
        if block_size == 0 {
            return Err(TensorError::InvalidSize(
                "systolic block size must be positive".to_string(),
            ));
        }
        let units = (0..instances)
            .map(|_| {
                Mutex::new(SystolicUnit {
                    tile: vec![T::zero(); block_size * block_size],
                    stats: UnitStats::default(),
                })
            })
            .collect();
        tracing::info!(instances, block_size, "systolic units ready");
        Ok(SystolicBackend { block_size, units })
    }

    /// Number of device instances.
    pub fn instances(&self) -> usize {
        self.units.len()
    }

    /// Block size the accumulators were built for.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Snapshot of every instance's counters.
    pub fn stats(&self) -> Vec<UnitStats> {
        self.units.iter().map(|u| self.lock(u).stats).collect()
    }

    fn lock<'a>(&self, unit: &'a Mutex<SystolicUnit<T>>) -> MutexGuard<'a, SystolicUnit<T>> {
        // A panic inside a unit leaves the tile dirty, but it is cleared at
        // the start of every block.
        unit.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Element> BlockBackend<T> for SystolicBackend<T> {
    fn name(&self) -> &str {
        "systolic"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Systolic
    }

    fn slots(&self) -> Option<usize> {
        Some(self.units.len())
    }

    fn multiply_accumulate(
        &self,
        block_size: usize,
        a: &[T],
        b: &[T],
        c: &mut [T],
        affinity: Affinity,
    ) -> Result<()> {
        if block_size != self.block_size {
            return Err(TensorError::Backend {
                backend: "systolic".to_string(),
                message: format!(
                    "units were built for {}x{} blocks, got {}x{}",
                    self.block_size, self.block_size, block_size, block_size
                ),
            });
        }
        check_block_args("systolic multiply_accumulate", block_size, a, b, c)?;

        let n = block_size;
        let mut unit = self.lock(&self.units[affinity.0 % self.units.len()]);
        let SystolicUnit { tile, stats } = &mut *unit;
        tile.fill(T::zero());

        for k in 0..n {
            let b_row = &b[k * n..(k + 1) * n];
            for i in 0..n {
                let aik = a[i * n + k];
                let acc = &mut tile[i * n..(i + 1) * n];
                for (acc_ij, &bkj) in acc.iter_mut().zip(b_row) {
                    *acc_ij = *acc_ij + aik * bkj;
                }
            }
        }

        for (cij, &t) in c.iter_mut().zip(tile.iter()) {
            *cij = *cij + t;
        }

        stats.blocks += 1;
        stats.cycles += (3 * n as u64).saturating_sub(2) + n as u64;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Taking every unit's lock waits for any block still on the array.
        for unit in &self.units {
            drop(self.lock(unit));
        }
        tracing::debug!(instances = self.units.len(), "systolic units idle");
        Ok(())
    }

    fn unit_stats(&self) -> Option<Vec<UnitStats>> {
        Some(self.stats())
    }
}
