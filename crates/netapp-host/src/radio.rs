//! Simulated WiFi radio.
//!
//! A host has no radio to drive, so access points are declared in the host
//! settings. Joining one succeeds after its configured number of status
//! polls, which keeps the connector's progress output realistic.

use std::net::{Ipv4Addr, Ipv6Addr};

use netapp_core::{Radio, RadioError, RadioStatus};
use tracing::{debug, info};

use crate::settings::NetworkSettings;

#[derive(Debug, Clone)]
struct Association {
    network: NetworkSettings,
    polls: u32,
}

#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    networks: Vec<NetworkSettings>,
    joining: Option<Association>,
    searching: bool,
    connected: Option<NetworkSettings>,
}

impl SimulatedRadio {
    pub fn new(networks: Vec<NetworkSettings>) -> Self {
        Self {
            networks,
            joining: None,
            searching: false,
            connected: None,
        }
    }
}

impl Radio for SimulatedRadio {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        self.disconnect();

        let Some(network) = self.networks.iter().find(|n| n.ssid == ssid) else {
            debug!(ssid, "No simulated network with this SSID");
            self.searching = true;
            return Ok(());
        };
        if network.password != password {
            return Err(RadioError::Rejected(format!("wrong passphrase for \"{}\"", ssid)));
        }

        self.joining = Some(Association {
            network: network.clone(),
            polls: 0,
        });
        Ok(())
    }

    fn status(&mut self) -> RadioStatus {
        if self.connected.is_some() {
            return RadioStatus::Connected;
        }
        if self.searching {
            return RadioStatus::NoNetworkFound;
        }
        let Some(association) = self.joining.as_mut() else {
            return RadioStatus::Idle;
        };

        association.polls += 1;
        if association.polls < association.network.join_polls {
            return RadioStatus::Idle;
        }
        let network = association.network.clone();
        info!(ssid = %network.ssid, ipv4 = %network.ipv4, "Simulated network joined");
        self.joining = None;
        self.connected = Some(network);
        RadioStatus::Connected
    }

    fn disconnect(&mut self) {
        self.joining = None;
        self.searching = false;
        self.connected = None;
    }

    fn local_ipv4(&self) -> Ipv4Addr {
        self.connected
            .as_ref()
            .map_or(Ipv4Addr::UNSPECIFIED, |n| n.ipv4)
    }

    fn local_ipv6(&self) -> Ipv6Addr {
        self.connected
            .as_ref()
            .map_or(Ipv6Addr::UNSPECIFIED, |n| n.ipv6)
    }
}
