//! Application lifecycle.
//!
//! [`NetworkApplication`] owns every component and runs them in a fixed order:
//!
//! 1. `setup()` once: serial banner, filesystem mount, config load, WiFi
//!    connect, time sync start, CLI command and serial client registration,
//!    TCP listener start, then each extension's setup.
//! 2. `poll()` forever: time sync tick, one CLI dispatch round, accept a
//!    network client if none is registered, due timers, then each
//!    extension's poll.
//!
//! Applications add behavior by composing [`Extension`]s onto the lifecycle
//! rather than by replacing it.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cli::{ClientKind, CliClient, CliError, CliListener, Dispatcher, Invocation};
use crate::clock::Clock;
use crate::commands;
use crate::config::{ConfigStore, LoadOutcome, CONFIG_PATH};
use crate::console::Console;
use crate::fs::FileSystem;
use crate::time::{NtpClock, TimeSync, DEFAULT_UPDATE_INTERVAL_MS};
use crate::timer::PeriodicTimers;
use crate::wifi::{Radio, WifiConnector, WifiError, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

/// Lifecycle settings. Every field has a device default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Location of the JSON configuration file.
    pub config_path: String,

    /// Serial baud rate reported in the startup banner.
    pub serial_baud: u32,

    /// TCP port of the network CLI.
    pub cli_port: u16,

    /// Upper bound on one WiFi connect attempt.
    pub wifi_timeout_ms: u64,

    /// Delay between WiFi status polls.
    pub wifi_poll_interval_ms: u64,

    /// Interval between NTP resyncs.
    pub ntp_update_interval_ms: u64,

    /// CLI prompt.
    pub prompt: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_path: CONFIG_PATH.to_string(),
            serial_baud: 115_200,
            cli_port: 2323,
            wifi_timeout_ms: DEFAULT_TIMEOUT_MS,
            wifi_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            ntp_update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            prompt: crate::cli::DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Platform collaborators handed to the lifecycle.
pub struct Platform {
    pub filesystem: Box<dyn FileSystem>,
    pub radio: Box<dyn Radio>,
    pub ntp: Box<dyn NtpClock>,
    pub clock: Box<dyn Clock>,
    pub serial: Box<dyn CliClient>,
    pub listener: Box<dyn CliListener>,
}

type StatusLine = Box<dyn Fn() -> String + Send>;

/// State shared by every command handler.
pub struct Services {
    pub config: ConfigStore,
    pub wifi: WifiConnector,
    pub time: TimeSync,
    pub radio: Box<dyn Radio>,
    pub ntp: Box<dyn NtpClock>,
    pub clock: Box<dyn Clock>,
    pub(crate) status_lines: Vec<StatusLine>,
}

impl Services {
    /// Milliseconds since boot.
    pub fn uptime_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Run a WiFi connect attempt reporting to `out`, and start time
    /// synchronization when it succeeds.
    pub fn connect_wifi(&mut self, out: &mut dyn Console) -> Result<(), WifiError> {
        let result = self
            .wifi
            .connect(&self.config, self.radio.as_mut(), self.clock.as_ref(), out);
        if result.is_ok() {
            self.start_time_sync();
        }
        result
    }

    /// Start NTP synchronization if connected and not yet running.
    pub fn start_time_sync(&mut self) {
        if let Err(e) = self.time.start(self.wifi.connectivity(), self.ntp.as_mut()) {
            warn!(error = %e, "Time synchronization could not be started");
        }
    }

    /// Local time as shown by `status`.
    pub fn formatted_time(&self) -> String {
        self.time.formatted_time(self.ntp.as_ref())
    }
}

/// Registration surface handed to [`Extension::setup`].
pub struct SetupContext<'a> {
    services: &'a mut Services,
    dispatcher: &'a mut Dispatcher<Services>,
    timers: &'a mut PeriodicTimers,
}

impl SetupContext<'_> {
    pub fn services(&mut self) -> &mut Services {
        &mut *self.services
    }

    /// Add a CLI command. It also appears in `help`.
    pub fn register_command<F>(
        &mut self,
        name: &str,
        usage: &str,
        summary: &str,
        handler: F,
    ) -> Result<(), CliError>
    where
        F: FnMut(&mut Services, &mut Invocation<'_>) -> i32 + Send + 'static,
    {
        self.dispatcher.register(name, usage, summary, handler)
    }

    /// Add a line to the output of `status`.
    pub fn add_status_line<F>(&mut self, line: F)
    where
        F: Fn() -> String + Send + 'static,
    {
        self.services.status_lines.push(Box::new(line));
    }

    /// Run `callback` every `interval_ms` from the application loop.
    pub fn every<F>(&mut self, interval_ms: u64, callback: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let now = self.services.clock.now_ms();
        self.timers.every(now, interval_ms, callback);
    }
}

/// A unit of application behavior composed onto the lifecycle.
pub trait Extension: Send {
    fn name(&self) -> &str;

    /// Called once, after the core setup finished.
    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), CliError>;

    /// Called on every loop iteration, after the core's own work.
    fn poll(&mut self, services: &Services) {}
}

/// The network application: core components plus extensions.
pub struct NetworkApplication {
    settings: AppSettings,
    services: Services,
    dispatcher: Dispatcher<Services>,
    serial: Option<Box<dyn CliClient>>,
    listener: Box<dyn CliListener>,
    listening: bool,
    timers: PeriodicTimers,
    extensions: Vec<Box<dyn Extension>>,
    is_setup: bool,
}

impl NetworkApplication {
    pub fn new(settings: AppSettings, platform: Platform) -> Self {
        let Platform {
            filesystem,
            radio,
            ntp,
            clock,
            serial,
            listener,
        } = platform;

        let services = Services {
            config: ConfigStore::new(filesystem, settings.config_path.clone()),
            wifi: WifiConnector::new(settings.wifi_timeout_ms, settings.wifi_poll_interval_ms),
            time: TimeSync::new(settings.ntp_update_interval_ms),
            radio,
            ntp,
            clock,
            status_lines: Vec::new(),
        };

        Self {
            dispatcher: Dispatcher::new(settings.prompt.clone()),
            settings,
            services,
            serial: Some(serial),
            listener,
            listening: false,
            timers: PeriodicTimers::new(),
            extensions: Vec::new(),
            is_setup: false,
        }
    }

    /// Add an extension. Extensions are set up and polled in the order
    /// they were added.
    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub fn dispatcher(&self) -> &Dispatcher<Services> {
        &self.dispatcher
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Bring the application up. Nothing here is fatal: failures are logged
    /// or reported on the serial console and setup continues.
    pub fn setup(&mut self) {
        if self.is_setup {
            warn!("setup() called twice, ignoring");
            return;
        }

        self.setup_serial();
        self.setup_filesystem();
        self.read_config();
        self.setup_wifi();
        self.services.start_time_sync();
        self.setup_cli();
        self.start_listener();
        self.setup_extensions();

        self.is_setup = true;
        info!("Application setup complete");
    }

    /// One loop iteration. Never blocks except while a CLI command runs.
    pub fn poll(&mut self) {
        self.services.time.tick(self.services.ntp.as_mut());

        self.dispatcher.process(&mut self.services);

        if self.listening && !self.dispatcher.has_remote_client() {
            if let Some(client) = self.listener.accept() {
                self.dispatcher.add_client(client, ClientKind::Remote);
            }
        }

        self.timers.tick(self.services.clock.now_ms());

        for extension in self.extensions.iter_mut() {
            extension.poll(&self.services);
        }
    }

    /// Poll every `tick_ms` until `should_stop` returns true.
    pub fn run_until(&mut self, tick_ms: u64, should_stop: impl Fn() -> bool) {
        while !should_stop() {
            self.poll();
            self.services.clock.sleep_ms(tick_ms);
        }
    }

    fn setup_serial(&mut self) {
        if let Some(serial) = self.serial.as_mut() {
            serial.println("");
            serial.println(&format!(
                "Setting up serial interface (baud={})...",
                self.settings.serial_baud
            ));
        }
    }

    fn setup_filesystem(&mut self) {
        info!("Setting up filesystem...");
        if let Err(e) = self.services.config.mount() {
            error!(error = %e, "Filesystem mount failed");
        }
    }

    fn read_config(&mut self) {
        let path = self.services.config.path().to_string();
        match self.services.config.load() {
            Ok(LoadOutcome::Created) => info!(%path, "Creating empty config file"),
            Ok(LoadOutcome::Loaded(keys)) => info!(%path, keys, "Config loaded"),
            Err(e) => warn!(%path, error = %e, "Config not loaded, continuing with empty config"),
        }
    }

    fn setup_wifi(&mut self) {
        let Some(serial) = self.serial.as_mut() else {
            return;
        };
        if let Err(e) = self.services.connect_wifi(serial) {
            warn!(error = %e, "WiFi not connected after setup");
        }
    }

    fn setup_cli(&mut self) {
        if let Err(e) = commands::register_builtin(&mut self.dispatcher) {
            error!(error = %e, "Failed to register built-in commands");
        }
        if let Some(serial) = self.serial.take() {
            self.dispatcher.add_client(serial, ClientKind::Local);
        }
    }

    fn start_listener(&mut self) {
        match self.listener.begin() {
            Ok(()) => {
                self.listening = true;
                info!(port = self.settings.cli_port, "CLI server listening");
            }
            Err(e) => error!(port = self.settings.cli_port, error = %e, "CLI server failed to start"),
        }
    }

    fn setup_extensions(&mut self) {
        for extension in self.extensions.iter_mut() {
            let mut ctx = SetupContext {
                services: &mut self.services,
                dispatcher: &mut self.dispatcher,
                timers: &mut self.timers,
            };
            match extension.setup(&mut ctx) {
                Ok(()) => info!(extension = extension.name(), "Extension ready"),
                Err(e) => error!(extension = extension.name(), error = %e, "Extension setup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::STATUS_OK;
    use crate::mock::{MockPlatform, MockClient};

    struct Greeter;

    impl Extension for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), CliError> {
            ctx.add_status_line(|| "greeting: hi".to_string());
            ctx.register_command("hi", "hi", "Say hi", |_, inv| {
                inv.println("hi!");
                STATUS_OK
            })
        }
    }

    struct Clash;

    impl Extension for Clash {
        fn name(&self) -> &str {
            "clash"
        }

        fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<(), CliError> {
            ctx.register_command("help", "help", "Shadow help", |_, _| STATUS_OK)
        }
    }

    #[test]
    fn test_extension_commands_follow_builtins() {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform())
            .with_extension(Greeter);
        app.setup();

        let names: Vec<_> = app
            .dispatcher()
            .commands()
            .iter()
            .map(|spec| spec.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["help", "status", "connect_wifi", "config", "config_set_parameter", "hi"]
        );
    }

    #[test]
    fn test_failed_extension_does_not_stop_setup() {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform())
            .with_extension(Clash)
            .with_extension(Greeter);
        app.setup();

        assert!(app.dispatcher().commands().iter().any(|spec| spec.name == "hi"));
        assert!(app.is_listening());
    }

    #[test]
    fn test_status_includes_extension_lines() {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform())
            .with_extension(Greeter);
        app.setup();
        mock.serial.take_output();

        mock.serial.push_line("status");
        app.poll();

        let out = mock.serial.take_output();
        assert!(out.contains("  greeting: hi\n\r"));
    }

    #[test]
    fn test_setup_twice_is_ignored() {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform());
        app.setup();
        app.setup();

        assert_eq!(app.dispatcher().client_count(), 1);
        assert_eq!(app.dispatcher().commands().len(), 5);
    }

    #[test]
    fn test_run_until_polls_until_stopped() {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform());
        app.setup();

        let clock = mock.clock.clone();
        let start = clock.now_ms();
        app.run_until(10, move || clock.now_ms() >= start + 100);

        assert_eq!(mock.clock.now_ms(), start + 100);
    }
}
