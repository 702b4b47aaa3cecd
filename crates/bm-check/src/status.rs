use std::sync::atomic::{AtomicBool, Ordering};

/// Pass/fail flag owned by one verification pass.
///
/// Starts as passing. The first violation flips it to failing and nothing
/// flips it back; a new pass uses a new `CheckStatus`.
#[derive(Debug)]
pub struct CheckStatus {
    ok: AtomicBool,
}

impl CheckStatus {
    pub fn new() -> Self {
        CheckStatus {
            ok: AtomicBool::new(true),
        }
    }

    /// Record a violation. Returns true for the call that flipped the flag.
    pub fn fail(&self) -> bool {
        self.ok.swap(false, Ordering::AcqRel)
    }

    pub fn is_ok(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }
}

impl Default for CheckStatus {
    fn default() -> Self {
        Self::new()
    }
}
