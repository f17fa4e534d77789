//! In-memory collaborators for testing.
//!
//! Every mock is a cheap handle over shared state: clone it, hand one clone
//! to the application (usually through [`MockPlatform::platform`]) and keep
//! the other to script input and inspect effects.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! # Example
//!
//! ```
//! use netapp_core::mock::MockPlatform;
//! use netapp_core::{AppSettings, NetworkApplication};
//!
//! let mock = MockPlatform::new();
//! let mut app = NetworkApplication::new(AppSettings::default(), mock.platform());
//! app.setup();
//!
//! mock.serial.push_line("help");
//! app.poll();
//! assert!(mock.serial.take_output().contains("Available commands:"));
//! ```

mod cli;
mod clock;
mod fs;
mod ntp;
mod platform;
mod radio;

pub use cli::{MockClient, MockListener};
pub use clock::MockClock;
pub use fs::MemoryFileSystem;
pub use ntp::MockNtpClock;
pub use platform::MockPlatform;
pub use radio::MockRadio;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock shared mock state, ignoring poisoning from a panicking test.
fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
