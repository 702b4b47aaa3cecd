use std::fmt::{Debug, Display};
use std::io::{self, Write};

use ndarray::LinalgScalar;

use crate::dtype::DType;

/// Numeric element stored in a benchmark matrix.
///
/// Bridges the runtime [`DType`] tag and the concrete Rust type, and fixes
/// the little-endian byte encoding used by reference files.
pub trait Element: LinalgScalar + PartialOrd + Debug + Display + Send + Sync {
    /// Runtime tag for this element type.
    const DTYPE: DType;

    /// Converts from f64, rounding when the target is narrower.
    fn from_f64(v: f64) -> Self;

    /// Widens to f64.
    fn to_f64(self) -> f64;

    /// Writes the little-endian encoding of `self`.
    fn write_le<W: Write>(self, out: &mut W) -> io::Result<()>;

    /// Decodes a value from exactly `DTYPE.size_in_bytes()` little-endian bytes.
    ///
    /// # Panics
    /// Panics if `bytes` has the wrong length.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn write_le<W: Write>(self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        f32::from_le_bytes(buf)
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn write_le<W: Write>(self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        f64::from_le_bytes(buf)
    }
}
