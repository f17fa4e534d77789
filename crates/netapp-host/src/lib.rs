//! Host (Linux/desktop) implementations of the netapp platform traits.
//!
//! Everything here is plain `std`: the application loop is synchronous and
//! runs on its own thread, so none of these types block an async runtime.

pub mod clock;
pub mod fs;
pub mod ntp;
pub mod radio;
pub mod serial;
pub mod settings;
pub mod tcp;

pub use clock::SystemClock;
pub use fs::DirFileSystem;
pub use ntp::SntpClock;
pub use radio::SimulatedRadio;
pub use serial::StreamConsole;
pub use settings::{HostSettings, NetworkSettings, SettingsError, SETTINGS_ENV};
pub use tcp::{TcpCliClient, TcpCliListener};

use std::net::{Ipv4Addr, SocketAddr};

use netapp_core::Platform;

/// Build the host platform described by `settings`.
///
/// The serial console is bound to the process's stdin and stdout.
pub fn platform(settings: &HostSettings) -> Platform {
    let cli_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.app.cli_port));

    Platform {
        filesystem: Box::new(DirFileSystem::new(&settings.data_dir)),
        radio: Box::new(SimulatedRadio::new(settings.networks.clone())),
        ntp: Box::new(SntpClock::new(settings.ntp_server.clone())),
        clock: Box::new(SystemClock::new()),
        serial: Box::new(StreamConsole::stdio()),
        listener: Box::new(TcpCliListener::new(cli_addr)),
    }
}
