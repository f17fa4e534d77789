//! NTP time synchronization.
//!
//! The clock algorithm itself lives behind [`NtpClock`]. [`TimeSync`] only
//! decides *when* synchronization is active: it is started once the device
//! is connected and ticked on every loop iteration afterwards.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::wifi::ConnectivityState;

/// Default interval between NTP resyncs.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 10_000;

/// Format used by the `status` command.
pub const STATUS_TIME_FORMAT: &str = "%T - %F";

/// Errors reported by an NTP clock.
#[derive(Debug, Error)]
pub enum NtpError {
    #[error("NTP server unreachable: {0}")]
    Unreachable(String),

    #[error("invalid NTP response: {0}")]
    InvalidResponse(String),
}

/// Which occurrence of a weekday in a month a rule refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Week {
    First,
    Second,
    Third,
    Fourth,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Month {
    Jan = 1,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

/// A daylight-saving transition: "from `week` `weekday` of `month` at
/// `hour` local time, the UTC offset is `offset_minutes`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRule {
    pub abbreviation: &'static str,
    pub week: Week,
    pub weekday: Weekday,
    pub month: Month,
    pub hour: u8,
    pub offset_minutes: i32,
}

/// Central European Summer Time: last Sunday in March, 02:00, UTC+2.
pub const CENTRAL_EUROPEAN_SUMMER_TIME: TimeRule = TimeRule {
    abbreviation: "CEST",
    week: Week::Last,
    weekday: Weekday::Sun,
    month: Month::Mar,
    hour: 2,
    offset_minutes: 120,
};

/// Central European Time: last Sunday in October, 03:00, UTC+1.
pub const CENTRAL_EUROPEAN_TIME: TimeRule = TimeRule {
    abbreviation: "CET",
    week: Week::Last,
    weekday: Weekday::Sun,
    month: Month::Oct,
    hour: 3,
    offset_minutes: 60,
};

/// NTP client primitives.
pub trait NtpClock: Send {
    /// Rule for the start of daylight-saving time.
    fn set_dst_rule(&mut self, rule: TimeRule);

    /// Rule for the start of standard time.
    fn set_std_rule(&mut self, rule: TimeRule);

    /// Minimum time between two resyncs performed by [`NtpClock::update`].
    fn set_update_interval(&mut self, interval_ms: u64);

    /// Start the client and perform the first sync.
    fn begin(&mut self) -> Result<(), NtpError>;

    /// Resync if the update interval has elapsed. Returns whether a resync
    /// happened.
    fn update(&mut self) -> Result<bool, NtpError>;

    /// Current local time formatted with strftime-style `format`.
    fn formatted_time(&self, format: &str) -> String;
}

/// Gates NTP synchronization on connectivity.
#[derive(Debug, Clone)]
pub struct TimeSync {
    update_interval_ms: u64,
    started: bool,
}

impl Default for TimeSync {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL_MS)
    }
}

impl TimeSync {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            update_interval_ms,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Configure the clock and start it, but only when connected and not
    /// already started. Returns whether this call started synchronization.
    pub fn start(
        &mut self,
        connectivity: ConnectivityState,
        ntp: &mut dyn NtpClock,
    ) -> Result<bool, NtpError> {
        if self.started || connectivity != ConnectivityState::Connected {
            return Ok(false);
        }

        ntp.set_dst_rule(CENTRAL_EUROPEAN_SUMMER_TIME);
        ntp.set_std_rule(CENTRAL_EUROPEAN_TIME);
        ntp.set_update_interval(self.update_interval_ms);
        ntp.begin()?;

        self.started = true;
        info!(interval_ms = self.update_interval_ms, "Time synchronization started");
        Ok(true)
    }

    /// Drive the periodic resync. No-op until started.
    pub fn tick(&mut self, ntp: &mut dyn NtpClock) {
        if !self.started {
            return;
        }
        match ntp.update() {
            Ok(true) => debug!("NTP resync complete"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "NTP resync failed"),
        }
    }

    /// Local time as shown by the `status` command.
    pub fn formatted_time(&self, ntp: &dyn NtpClock) -> String {
        ntp.formatted_time(STATUS_TIME_FORMAT)
    }
}
