use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use netapp_core::cli::{STATUS_INPUT_ERROR, STATUS_OK};
use netapp_core::{CliError, Extension, SetupContext};
use tracing::debug;

/// Counter increment period.
pub const COUNT_INTERVAL_MS: u64 = 1000;

/// Counter shared between the application loop and the HTTP server.
pub type SharedCount = Arc<AtomicU32>;

pub struct CounterExtension {
    count: SharedCount,
    interval_ms: u64,
}

impl CounterExtension {
    pub fn new() -> Self {
        Self::with_interval(COUNT_INTERVAL_MS)
    }

    pub fn with_interval(interval_ms: u64) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            interval_ms,
        }
    }

    /// Handle to the counter for other consumers such as the HTTP server.
    pub fn handle(&self) -> SharedCount {
        self.count.clone()
    }

    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for CounterExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for CounterExtension {
    fn name(&self) -> &str {
        "counter"
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), CliError> {
        let count = self.count.clone();
        ctx.register_command(
            "count",
            "count",
            "Print the current counter value",
            move |_, inv| {
                if !inv.expect_args(0) {
                    return STATUS_INPUT_ERROR;
                }
                inv.println(&format!("Count: {}", count.load(Ordering::Relaxed)));
                STATUS_OK
            },
        )?;

        let count = self.count.clone();
        ctx.add_status_line(move || format!("count: {}", count.load(Ordering::Relaxed)));

        let count = self.count.clone();
        ctx.every(self.interval_ms, move || {
            let value = count.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            debug!(value, "Counter increased");
            true
        });
        Ok(())
    }
}
