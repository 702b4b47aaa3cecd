use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts outstanding block tasks and remembers the high-water mark.
///
/// A task counts as outstanding from the moment it is submitted until its
/// backend call returns.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one task as submitted. The task is finished when the guard drops.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { gauge: self }
    }

    /// Tasks currently outstanding.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously outstanding tasks seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct InFlightGuard<'a> {
    gauge: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::AcqRel);
    }
}
