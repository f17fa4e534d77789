//! Scripted radio driver.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::wifi::{Radio, RadioError, RadioStatus};

/// Address reported once connected.
pub const MOCK_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 2);
/// Link-local address reported once connected.
pub const MOCK_IPV6: Ipv6Addr = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2);

#[derive(Debug, Default)]
struct RadioState {
    /// ssid -> (password, status polls needed before the link comes up)
    networks: HashMap<String, (String, u32)>,
    begin_calls: Vec<(String, String)>,
    joining: Option<u32>,
    polls: u32,
    connected: bool,
    last_failed: bool,
}

/// Radio that joins a fixed set of simulated networks.
///
/// - unknown SSID: the request is accepted but the link never comes up
/// - known SSID, wrong password: the request is rejected immediately
/// - known SSID, right password: connected after the configured number of
///   status polls
#[derive(Debug, Clone, Default)]
pub struct MockRadio {
    state: Arc<Mutex<RadioState>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reachable network.
    pub fn with_network(self, ssid: &str, password: &str, join_after_polls: u32) -> Self {
        self.add_network(ssid, password, join_after_polls);
        self
    }

    pub fn add_network(&self, ssid: &str, password: &str, join_after_polls: u32) {
        lock(&self.state)
            .networks
            .insert(ssid.to_string(), (password.to_string(), join_after_polls));
    }

    /// Every `(ssid, password)` passed to `begin`, in order.
    pub fn begin_calls(&self) -> Vec<(String, String)> {
        lock(&self.state).begin_calls.clone()
    }

    /// Simulate the access point going away.
    pub fn drop_link(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.joining = None;
    }
}

impl Radio for MockRadio {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state
            .begin_calls
            .push((ssid.to_string(), password.to_string()));
        state.connected = false;
        state.polls = 0;
        state.last_failed = false;

        let network = state.networks.get(ssid).cloned();
        match network {
            Some((expected, _)) if expected != password => {
                state.joining = None;
                state.last_failed = true;
                Err(RadioError::Rejected("authentication failed".to_string()))
            }
            Some((_, join_after)) => {
                state.joining = Some(join_after);
                Ok(())
            }
            None => {
                state.joining = None;
                Ok(())
            }
        }
    }

    fn status(&mut self) -> RadioStatus {
        let mut state = lock(&self.state);
        if state.connected {
            return RadioStatus::Connected;
        }
        match state.joining {
            Some(join_after) if state.polls >= join_after => {
                state.connected = true;
                RadioStatus::Connected
            }
            Some(_) => {
                state.polls += 1;
                RadioStatus::Idle
            }
            None if state.last_failed => RadioStatus::ConnectFailed,
            None => RadioStatus::NoNetworkFound,
        }
    }

    fn disconnect(&mut self) {
        self.drop_link();
    }

    fn local_ipv4(&self) -> Ipv4Addr {
        if lock(&self.state).connected {
            MOCK_IPV4
        } else {
            Ipv4Addr::UNSPECIFIED
        }
    }

    fn local_ipv6(&self) -> Ipv6Addr {
        if lock(&self.state).connected {
            MOCK_IPV6
        } else {
            Ipv6Addr::UNSPECIFIED
        }
    }
}
