//! Internal error counters.
//!
//! Process-wide counters, shared by cloning. The invalidator increments
//! `invalidation` for recognized failures and `panic` for caught faults, so
//! operators can tell bad data apart from bugs.

use rowcache_core::constants::{ERROR_CATEGORY_INVALIDATION, ERROR_CATEGORY_PANIC};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    invalidation: AtomicU64,
    panic: AtomicU64,
}

/// Internal error counters, cheap to clone and safe to share.
#[derive(Debug, Clone, Default)]
pub struct InternalErrors {
    counters: Arc<Counters>,
}

impl InternalErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a recognized failure: bad event data, unknown category, or a
    /// stream error.
    pub fn add_invalidation(&self) {
        self.counters.invalidation.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a caught panic.
    pub fn add_panic(&self) {
        self.counters.panic.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalidation(&self) -> u64 {
        self.counters.invalidation.load(Ordering::Relaxed)
    }

    pub fn panic(&self) -> u64 {
        self.counters.panic.load(Ordering::Relaxed)
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> InternalErrorsSnapshot {
        InternalErrorsSnapshot {
            invalidation: self.invalidation(),
            panic: self.panic(),
        }
    }
}

/// Snapshot of the internal error counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InternalErrorsSnapshot {
    pub invalidation: u64,
    pub panic: u64,
}

impl InternalErrorsSnapshot {
    /// Counter values keyed by category name.
    pub fn by_category(&self) -> [(&'static str, u64); 2] {
        [
            (ERROR_CATEGORY_INVALIDATION, self.invalidation),
            (ERROR_CATEGORY_PANIC, self.panic),
        ]
    }
}
