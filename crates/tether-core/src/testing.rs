//! Deterministic test doubles
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream crates that need controllable time.

use crate::types::{TimeSource, Timestamp};
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Mock Time Source
// ----------------------------------------------------------------------------

/// Mock time source for deterministic testing
///
/// Clones share the same underlying clock, so a test can keep one handle and
/// advance the time seen by a component holding another.
#[derive(Debug, Clone, Default)]
pub struct MockTimeSource {
    current_micros: Arc<AtomicU64>,
}

impl MockTimeSource {
    /// Create a new mock time source starting at time 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new mock time source starting at a specific time
    pub fn new_at(start: Timestamp) -> Self {
        Self {
            current_micros: Arc::new(AtomicU64::new(start.as_micros())),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, by: Duration) {
        let micros = u64::try_from(by.as_micros()).unwrap_or(u64::MAX);
        self.current_micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Set the time to a specific value
    pub fn set(&self, at: Timestamp) {
        self.current_micros.store(at.as_micros(), Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.current_micros.load(Ordering::SeqCst))
    }
}
