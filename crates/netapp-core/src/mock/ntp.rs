//! Recording NTP clock.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::time::{NtpClock, NtpError, TimeRule};

#[derive(Debug)]
struct NtpState {
    dst_rule: Option<TimeRule>,
    std_rule: Option<TimeRule>,
    update_interval_ms: Option<u64>,
    begin_count: u32,
    update_count: u32,
    fail_begin: bool,
    time_text: String,
}

impl Default for NtpState {
    fn default() -> Self {
        Self {
            dst_rule: None,
            std_rule: None,
            update_interval_ms: None,
            begin_count: 0,
            update_count: 0,
            fail_begin: false,
            time_text: "00:00:00 - 1970-01-01".to_string(),
        }
    }
}

/// NTP clock that records how it was configured and driven.
#[derive(Debug, Clone, Default)]
pub struct MockNtpClock {
    state: Arc<Mutex<NtpState>>,
}

impl MockNtpClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(&self, fail: bool) {
        lock(&self.state).fail_begin = fail;
    }

    /// Text returned by `formatted_time`, whatever the format.
    pub fn set_time_text(&self, text: &str) {
        lock(&self.state).time_text = text.to_string();
    }

    pub fn dst_rule(&self) -> Option<TimeRule> {
        lock(&self.state).dst_rule
    }

    pub fn std_rule(&self) -> Option<TimeRule> {
        lock(&self.state).std_rule
    }

    pub fn update_interval_ms(&self) -> Option<u64> {
        lock(&self.state).update_interval_ms
    }

    pub fn begin_count(&self) -> u32 {
        lock(&self.state).begin_count
    }

    pub fn update_count(&self) -> u32 {
        lock(&self.state).update_count
    }
}

impl NtpClock for MockNtpClock {
    fn set_dst_rule(&mut self, rule: TimeRule) {
        lock(&self.state).dst_rule = Some(rule);
    }

    fn set_std_rule(&mut self, rule: TimeRule) {
        lock(&self.state).std_rule = Some(rule);
    }

    fn set_update_interval(&mut self, interval_ms: u64) {
        lock(&self.state).update_interval_ms = Some(interval_ms);
    }

    fn begin(&mut self) -> Result<(), NtpError> {
        let mut state = lock(&self.state);
        if state.fail_begin {
            return Err(NtpError::Unreachable("simulated".to_string()));
        }
        state.begin_count += 1;
        Ok(())
    }

    fn update(&mut self) -> Result<bool, NtpError> {
        lock(&self.state).update_count += 1;
        Ok(false)
    }

    fn formatted_time(&self, _format: &str) -> String {
        lock(&self.state).time_text.clone()
    }
}
