//! Latest published sample and connection status.
//!
//! Both fields live behind one mutex. Every critical section is a single
//! copy or assignment, so a host polling once per rendered frame never
//! waits on serial I/O.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Value published whenever no valid reading is available.
pub const FALLBACK_SAMPLE: f32 = 0.0;

/// Point-in-time copy of the published fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Latest decoded measurement
    pub sample: f32,
    /// Whether a serial channel is open and assumed healthy
    pub connected: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            sample: FALLBACK_SAMPLE,
            connected: false,
        }
    }
}

/// Shared state written by the capture loop and read by the host.
#[derive(Debug, Default)]
pub struct PublishedState {
    value: Mutex<Snapshot>,
}

impl PublishedState {
    /// Sample `0.0`, disconnected.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panicked writer cannot leave a torn f32/bool behind.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest sample.
    pub fn sample(&self) -> f32 {
        self.lock().sample
    }

    /// Latest connection status.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Both fields, read under one lock.
    pub fn snapshot(&self) -> Snapshot {
        *self.lock()
    }

    /// Publish a decoded sample; non-finite values become [`FALLBACK_SAMPLE`].
    pub fn publish(&self, sample: f32) {
        let sample = if sample.is_finite() {
            sample
        } else {
            FALLBACK_SAMPLE
        };
        self.lock().sample = sample;
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Publish the fallback and drop the connection flag together.
    pub(crate) fn mark_disconnected(&self) {
        let mut value = self.lock();
        value.sample = FALLBACK_SAMPLE;
        value.connected = false;
    }
}
