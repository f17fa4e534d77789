//! # netapp-core
//!
//! Core network-application lifecycle for small connected devices.
//!
//! This crate provides:
//! - A flat JSON configuration store mirrored to a single file
//! - A WiFi connector with a bounded connect timeout
//! - An NTP time synchronizer gated on connectivity
//! - A line-oriented CLI dispatcher serving several clients at once
//! - The application lifecycle (`setup` once, `poll` forever) and its
//!   extension points
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Hardware and OS facilities (filesystem, radio, transports, clocks) are
//! consumed through the traits re-exported below, so the same lifecycle runs
//! on a device and on a Linux host.

pub mod app;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod console;
pub mod fs;
pub mod time;
pub mod timer;
pub mod wifi;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use app::{AppSettings, Extension, NetworkApplication, Platform, Services, SetupContext};
pub use cli::{
    ClientKind, CliClient, CliError, CliListener, CommandSpec, Dispatcher, Invocation,
    TransportError,
};
pub use clock::Clock;
pub use config::{ConfigError, ConfigStore, LoadOutcome};
pub use console::{Console, LINE_END};
pub use fs::{FileSystem, FsError};
pub use time::{Month, NtpClock, NtpError, TimeRule, TimeSync, Week, Weekday};
pub use timer::PeriodicTimers;
pub use wifi::{ConnectivityState, Radio, RadioError, RadioStatus, WifiConnector, WifiError, WifiState};
