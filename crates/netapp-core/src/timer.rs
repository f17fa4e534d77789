//! Periodic callbacks driven by the application loop.

/// Callback run when a timer is due. Returning `false` cancels the timer.
pub type TimerCallback = Box<dyn FnMut() -> bool + Send>;

struct Task {
    interval_ms: u64,
    last_run_ms: u64,
    callback: TimerCallback,
}

/// A set of repeating timers polled with the current uptime.
///
/// A timer that fell behind by several intervals fires once and is
/// rescheduled from the current time.
#[derive(Default)]
pub struct PeriodicTimers {
    tasks: Vec<Task>,
}

impl PeriodicTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` every `interval_ms`, counting from `now_ms`.
    pub fn every<F>(&mut self, now_ms: u64, interval_ms: u64, callback: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.tasks.push(Task {
            interval_ms,
            last_run_ms: now_ms,
            callback: Box::new(callback),
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fire every due timer. Returns how many callbacks ran.
    pub fn tick(&mut self, now_ms: u64) -> usize {
        let mut fired = 0;
        self.tasks.retain_mut(|task| {
            if now_ms.saturating_sub(task.last_run_ms) < task.interval_ms {
                return true;
            }
            task.last_run_ms = now_ms;
            fired += 1;
            (task.callback)()
        });
        fired
    }
}
