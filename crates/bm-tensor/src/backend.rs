use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::blas::LibraryBackend;
use crate::cpu::CpuBackend;
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::systolic::{SystolicBackend, UnitStats};

/// Selects one of the block multiply implementations at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Plain triple loop.
    #[default]
    Reference,
    /// Dense GEMM from a linear-algebra library.
    Library,
    /// Simulated systolic array with a fixed number of device instances.
    Systolic,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Reference => "reference",
            BackendKind::Library => "library",
            BackendKind::Systolic => "systolic",
        }
    }

    pub const ALL: [BackendKind; 3] = [
        BackendKind::Reference,
        BackendKind::Library,
        BackendKind::Systolic,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" | "ref" | "cpu" => Ok(BackendKind::Reference),
            "library" | "blas" | "gemm" => Ok(BackendKind::Library),
            "systolic" | "hardware" | "hw" => Ok(BackendKind::Systolic),
            other => Err(format!(
                "unknown backend '{}', expected reference, library or systolic",
                other
            )),
        }
    }
}

/// Opaque tag a hardware backend uses to pick a device instance.
///
/// Software backends ignore it; it never changes the numeric result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Affinity(pub usize);

/// Trait for pluggable block multiply backends.
///
/// Every implementation computes `C += A x B` on one `block_size`x`block_size`
/// block triple stored row-major. Implementations read `a` and `b` only,
/// mutate `c` only, do not allocate per call, and may be invoked
/// concurrently on disjoint `c` blocks.
pub trait BlockBackend<T: Element>: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "reference", "systolic").
    fn name(&self) -> &str;

    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Number of concurrent execution slots, or `None` when the backend
    /// accepts any number of outstanding calls.
    fn slots(&self) -> Option<usize> {
        None
    }

    /// Block multiply-accumulate: `c += a @ b`.
    ///
    /// - `a`, `b`, `c`: row-major data of shape [block_size, block_size]
    /// - `affinity`: device instance hint, see [`Affinity`]
    fn multiply_accumulate(
        &self,
        block_size: usize,
        a: &[T],
        b: &[T],
        c: &mut [T],
        affinity: Affinity,
    ) -> Result<()>;

    /// Wait until all submitted work has left the device.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Per-instance counters for backends that model device instances.
    fn unit_stats(&self) -> Option<Vec<UnitStats>> {
        None
    }
}

/// Validate the operand lengths of a block multiply.
pub fn check_block_args<T>(
    op: &'static str,
    block_size: usize,
    a: &[T],
    b: &[T],
    c: &[T],
) -> Result<()> {
    let expected = block_size * block_size;
    for got in [a.len(), b.len(), c.len()] {
        if got != expected {
            return Err(TensorError::BufferLength { op, expected, got });
        }
    }
    Ok(())
}

/// Construct a backend of the given kind.
///
/// `instances` is only used by the systolic backend; `block_size` sizes its
/// per-instance accumulators.
pub fn create_backend<T: Element>(
    kind: BackendKind,
    block_size: usize,
    instances: usize,
) -> Result<Box<dyn BlockBackend<T>>> {
    let backend: Box<dyn BlockBackend<T>> = match kind {
        BackendKind::Reference => Box::new(CpuBackend::new()),
        BackendKind::Library => Box::new(LibraryBackend::new()),
        BackendKind::Systolic => Box::new(SystolicBackend::<T>::new(block_size, instances)?),
    };
    tracing::debug!(backend = backend.name(), block_size, "created block backend");
    Ok(backend)
}
