use crate::error::{CheckError, Result};

/// Relative tolerance used when none is configured.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Sign-aware relative tolerance.
///
/// A computed value `x` is accepted against `expected` when it lies in
/// `[expected * (1 - t), expected * (1 + t)]`, with the factors swapped for
/// negative `expected` so the interval is never inverted. An expected value
/// of zero therefore demands an exact zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    /// # Errors
    /// Fails if `t` is negative or not finite.
    pub fn new(t: f64) -> Result<Self> {
        if !t.is_finite() || t < 0.0 {
            return Err(CheckError::InvalidTolerance(t));
        }
        Ok(Tolerance(t))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Inclusive `(min, max)` accepted for `expected`.
    pub fn bounds(&self, expected: f64) -> (f64, f64) {
        let t = if expected < 0.0 { -self.0 } else { self.0 };
        (expected * (1.0 - t), expected * (1.0 + t))
    }

    /// Returns true if `computed` is within tolerance of `expected`.
    /// NaN is never accepted.
    pub fn accepts(&self, computed: f64, expected: f64) -> bool {
        let (min, max) = self.bounds(expected);
        computed >= min && computed <= max
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance(DEFAULT_TOLERANCE)
    }
}
