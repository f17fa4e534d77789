//! WiFi connection management.
//!
//! [`WifiConnector`] drives a [`Radio`] through
//! `Idle -> Connecting -> {Connected | Failed}` using the `ssid` and
//! `password` keys of the configuration store. Progress is written to the
//! console that requested the connection (the serial console at boot, a CLI
//! client on `connect_wifi`).
//!
//! The connect attempt blocks the caller for at most the configured timeout,
//! sleeping through the injected [`Clock`] between status polls.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::ConfigStore;
use crate::console::Console;

/// Config key holding the network name.
pub const SSID_KEY: &str = "ssid";
/// Config key holding the network password.
pub const PASSWORD_KEY: &str = "password";

/// Default connect timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default delay between status polls while connecting.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Link status as reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioStatus {
    /// Radio is on but no connection was requested.
    Idle,
    /// The requested network is not visible.
    NoNetworkFound,
    /// Associated and holding an IP address.
    Connected,
    /// The last connect request failed.
    ConnectFailed,
    /// A previously working connection dropped.
    ConnectionLost,
    /// Explicitly disconnected.
    Disconnected,
}

/// Errors returned by the radio driver when a connect request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("connect request rejected: {0}")]
    Rejected(String),
}

/// Radio driver primitives.
pub trait Radio: Send {
    /// Issue a connect request. Returns immediately; an `Err` means the
    /// driver refused the request outright.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// Current link status.
    fn status(&mut self) -> RadioStatus;

    /// Drop the current connection, if any.
    fn disconnect(&mut self);

    /// Station IPv4 address (`0.0.0.0` when not connected).
    fn local_ipv4(&self) -> Ipv4Addr;

    /// Station IPv6 address (`::` when not connected).
    fn local_ipv6(&self) -> Ipv6Addr;
}

/// Why a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WifiError {
    /// A required config key is absent; the radio was not touched.
    #[error("\"{0}\" in config is missing")]
    MissingCredential(&'static str),

    /// The driver rejected the connect request.
    #[error(transparent)]
    ConnectFailed(#[from] RadioError),

    /// No connection within the timeout.
    #[error("connection timeout reached after {0} ms")]
    Timeout(u64),
}

/// Connector state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiState {
    Idle,
    Connecting,
    Connected,
    Failed(WifiError),
}

/// Tri-state connectivity derived from [`WifiState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

/// Joins the configured network with a bounded wait.
#[derive(Debug, Clone)]
pub struct WifiConnector {
    timeout_ms: u64,
    poll_interval_ms: u64,
    state: WifiState,
}

impl Default for WifiConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS)
    }
}

impl WifiConnector {
    pub fn new(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout_ms,
            // A zero interval would never advance a simulated clock.
            poll_interval_ms: poll_interval_ms.max(1),
            state: WifiState::Idle,
        }
    }

    pub fn state(&self) -> &WifiState {
        &self.state
    }

    pub fn connectivity(&self) -> ConnectivityState {
        match self.state {
            WifiState::Connected => ConnectivityState::Connected,
            WifiState::Connecting => ConnectivityState::Connecting,
            WifiState::Idle | WifiState::Failed(_) => ConnectivityState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity() == ConnectivityState::Connected
    }

    /// Run one full connect attempt, starting from `Idle`.
    pub fn connect(
        &mut self,
        config: &ConfigStore,
        radio: &mut dyn Radio,
        clock: &dyn Clock,
        out: &mut dyn Console,
    ) -> Result<(), WifiError> {
        self.state = WifiState::Idle;
        out.println("Setting up Wifi...");

        let result = self.attempt(config, radio, clock, out);
        self.state = match &result {
            Ok(()) => WifiState::Connected,
            Err(e) => WifiState::Failed(e.clone()),
        };
        result
    }

    fn attempt(
        &mut self,
        config: &ConfigStore,
        radio: &mut dyn Radio,
        clock: &dyn Clock,
        out: &mut dyn Console,
    ) -> Result<(), WifiError> {
        let ssid = required(config, SSID_KEY, out)?;
        let password = required(config, PASSWORD_KEY, out)?;

        out.println(&format!("Connecting to SSID: {}, Key: {}", ssid, password));

        if let Err(e) = radio.begin(ssid, password) {
            warn!(ssid, error = %e, "WiFi connect request rejected");
            out.println(&format!(
                "Unable to connect with SSID: {}, Key: {}",
                ssid, password
            ));
            return Err(e.into());
        }

        self.state = WifiState::Connecting;
        let started = clock.now_ms();
        while radio.status() != RadioStatus::Connected {
            clock.sleep_ms(self.poll_interval_ms);
            out.print(".");

            if clock.now_ms().saturating_sub(started) >= self.timeout_ms {
                out.println("Connection timeout reached!");
                break;
            }
        }
        out.println("");

        if radio.status() == RadioStatus::Connected {
            let (ipv4, ipv6) = (radio.local_ipv4(), radio.local_ipv6());
            info!(ssid, %ipv4, %ipv6, "WiFi connected");
            out.println("WiFi connected!");
            out.println(&format!("\tIPv4: {}", ipv4));
            out.println(&format!("\tIPv6: {}", ipv6));
            Ok(())
        } else {
            warn!(ssid, timeout_ms = self.timeout_ms, "WiFi connection timed out");
            out.println(&format!(
                "Connection to network \"{}\" with password \"{}\" failed!",
                ssid, password
            ));
            Err(WifiError::Timeout(self.timeout_ms))
        }
    }
}

fn required<'c>(
    config: &'c ConfigStore,
    key: &'static str,
    out: &mut dyn Console,
) -> Result<&'c str, WifiError> {
    config.get(key).ok_or_else(|| {
        out.println(&format!(
            "Unable to connect to wifi. \"{}\" in config is missing.",
            key
        ));
        WifiError::MissingCredential(key)
    })
}
