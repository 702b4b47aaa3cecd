//! Result verification for blockmm: tolerance checks, closed-form
//! expectations and stored reference records.

pub mod analytic;
pub mod error;
pub mod reference;
pub mod status;
pub mod tolerance;
pub mod verifier;

pub use analytic::{block_expectations, host_product};
pub use error::{CheckError, Result};
pub use reference::{ReferenceKey, ReferenceStore};
pub use status::CheckStatus;
pub use tolerance::{Tolerance, DEFAULT_TOLERANCE};
pub use verifier::{CheckReport, Mismatch, Verifier};
