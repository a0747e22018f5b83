use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use udmx_types::StatisticsSnapshot;

/// Counters for the current session. Only the transmitter writes these, anyone holding a
/// reference can read them.
#[derive(Debug, Default)]
pub struct SessionStatistics {
    frames: AtomicU64,
    errors: AtomicU64,
    last_send_micros: AtomicU64,
}

impl SessionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&self) {
        self.frames.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.last_send_micros.store(0, Ordering::Relaxed);
    }

    /// Returns the new frame count
    pub(crate) fn record_frame(&self, elapsed: Duration) -> u64 {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_send_micros.store(micros, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new error count
    pub(crate) fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            frames: self.frames(),
            errors: self.errors(),
            last_send: Duration::from_micros(self.last_send_micros.load(Ordering::Relaxed)),
        }
    }
}
