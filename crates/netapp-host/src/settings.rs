//! Host settings, read from a TOML file.
//!
//! ```toml
//! data_dir = "/var/lib/netapp"
//! http_port = 8080
//! ntp_server = "pool.ntp.org:123"
//!
//! [app]
//! cli_port = 2323
//!
//! [[networks]]
//! ssid = "home"
//! password = "secret"
//! join_polls = 3
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use netapp_core::AppSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "NETAPP_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A simulated access point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub ssid: String,
    pub password: String,

    /// Status polls until the join completes.
    #[serde(default = "default_join_polls")]
    pub join_polls: u32,

    #[serde(default = "default_ipv4")]
    pub ipv4: Ipv4Addr,

    #[serde(default = "default_ipv6")]
    pub ipv6: Ipv6Addr,
}

fn default_join_polls() -> u32 {
    3
}

fn default_ipv4() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 4, 2)
}

fn default_ipv6() -> Ipv6Addr {
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Host directory backing the device filesystem.
    pub data_dir: PathBuf,

    /// Port of the extension's HTTP server.
    pub http_port: u16,

    /// SNTP server as `host:port`.
    pub ntp_server: String,

    pub app: AppSettings,

    pub networks: Vec<NetworkSettings>,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("netapp-data"),
            http_port: 8080,
            ntp_server: "pool.ntp.org:123".to_string(),
            app: AppSettings::default(),
            networks: vec![NetworkSettings {
                ssid: "netapp-demo".to_string(),
                password: "netapp".to_string(),
                join_polls: default_join_polls(),
                ipv4: default_ipv4(),
                ipv6: default_ipv6(),
            }],
        }
    }
}

impl HostSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load the file named by [`SETTINGS_ENV`], or use defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => {
                let settings = Self::load(&path)?;
                info!(path = %Path::new(&path).display(), "Loaded host settings");
                Ok(settings)
            }
            None => {
                info!("{} not set, using default host settings", SETTINGS_ENV);
                Ok(Self::default())
            }
        }
    }
}
