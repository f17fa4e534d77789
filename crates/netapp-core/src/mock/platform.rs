//! Complete mock platform.

use super::{MemoryFileSystem, MockClient, MockClock, MockListener, MockNtpClock, MockRadio};
use crate::app::Platform;

/// Handles to every mock collaborator of one application.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    pub fs: MemoryFileSystem,
    pub radio: MockRadio,
    pub ntp: MockNtpClock,
    pub clock: MockClock,
    pub serial: MockClient,
    pub listener: MockListener,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            fs: MemoryFileSystem::new(),
            radio: MockRadio::new(),
            ntp: MockNtpClock::new(),
            clock: MockClock::new(),
            serial: MockClient::new("serial"),
            listener: MockListener::new(),
        }
    }

    /// Boxed collaborators sharing state with these handles.
    pub fn platform(&self) -> Platform {
        Platform {
            filesystem: Box::new(self.fs.clone()),
            radio: Box::new(self.radio.clone()),
            ntp: Box::new(self.ntp.clone()),
            clock: Box::new(self.clock.clone()),
            serial: Box::new(self.serial.clone()),
            listener: Box::new(self.listener.clone()),
        }
    }
}
