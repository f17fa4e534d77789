//! Monotonic time source.

/// Milliseconds since boot plus a blocking delay.
///
/// The WiFi connector waits through this trait, so tests can substitute a
/// clock whose `sleep_ms` only advances a counter.
pub trait Clock: Send {
    /// Milliseconds elapsed since the clock was created (device uptime).
    fn now_ms(&self) -> u64;

    /// Block the calling context for `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}
