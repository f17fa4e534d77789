//! Integration tests for the application lifecycle.
//!
//! These tests build a full `NetworkApplication` on top of the mock
//! platform and drive it through the serial and network CLI exactly as a
//! user would.

use netapp_core::mock::{MockClient, MockPlatform};
use netapp_core::time::{CENTRAL_EUROPEAN_SUMMER_TIME, CENTRAL_EUROPEAN_TIME};
use netapp_core::{AppSettings, NetworkApplication};
use pretty_assertions::assert_eq;

const CONFIG: &str = "/config.json";

/// Build and set up an application, discarding the boot output.
fn boot(mock: &MockPlatform) -> (NetworkApplication, String) {
    let mut app = NetworkApplication::new(AppSettings::default(), mock.platform());
    app.setup();
    let boot_log = mock.serial.take_output();
    (app, boot_log)
}

/// Send one line on the serial console and return the response.
fn serial(mock: &MockPlatform, app: &mut NetworkApplication, line: &str) -> String {
    mock.serial.push_line(line);
    app.poll();
    mock.serial.take_output()
}

#[test]
fn test_first_boot_creates_empty_config() {
    let mock = MockPlatform::new();
    let (app, boot_log) = boot(&mock);

    assert_eq!(mock.fs.contents(CONFIG).as_deref(), Some("{}"));
    assert!(boot_log.starts_with("\n\rSetting up serial interface (baud=115200)...\n\r"));
    assert!(boot_log.contains("Unable to connect to wifi. \"ssid\" in config is missing."));
    assert!(boot_log.ends_with("Welcome to the CLI, type \"help\" to get available commands.\n\r> "));
    assert!(!app.services().wifi.is_connected());
    assert!(!app.services().time.is_started());
    assert!(mock.listener.is_started());
}

#[test]
fn test_boot_with_stored_credentials_connects_and_starts_time() {
    let mock = MockPlatform::new();
    mock.fs.insert(CONFIG, r#"{"ssid":"home","password":"secret"}"#);
    mock.radio.add_network("home", "secret", 2);

    let (app, boot_log) = boot(&mock);

    assert!(boot_log.contains("Connecting to SSID: home, Key: secret"));
    assert!(boot_log.contains("WiFi connected!\n\r\tIPv4: 192.168.4.2\n\r\tIPv6: fe80::2\n\r"));
    assert!(app.services().wifi.is_connected());
    assert!(app.services().time.is_started());
    assert_eq!(mock.ntp.begin_count(), 1);
    assert_eq!(mock.ntp.dst_rule(), Some(CENTRAL_EUROPEAN_SUMMER_TIME));
    assert_eq!(mock.ntp.std_rule(), Some(CENTRAL_EUROPEAN_TIME));
    assert_eq!(mock.ntp.update_interval_ms(), Some(10_000));
}

#[test]
fn test_loop_ticks_time_only_after_start() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);

    app.poll();
    app.poll();
    assert_eq!(mock.ntp.update_count(), 0);

    mock.radio.add_network("home", "secret", 0);
    serial(&mock, &mut app, "connect_wifi home secret");
    assert!(app.services().time.is_started());

    app.poll();
    assert!(mock.ntp.update_count() >= 1);
}

#[test]
fn test_set_parameters_then_connect_scenario() {
    let mock = MockPlatform::new();
    mock.radio.add_network("home", "secret", 1);
    let (mut app, _) = boot(&mock);

    serial(&mock, &mut app, "config_set_parameter ssid home");
    serial(&mock, &mut app, "config_set_parameter password secret");
    let out = serial(&mock, &mut app, "connect_wifi home secret");

    assert_eq!(
        mock.fs.contents(CONFIG).as_deref(),
        Some(r#"{"ssid":"home","password":"secret"}"#)
    );
    assert_eq!(
        mock.radio.begin_calls(),
        vec![("home".to_string(), "secret".to_string())]
    );
    assert!(out.contains("WiFi connected!"));
    assert!(app.services().wifi.is_connected());
}

#[test]
fn test_set_parameter_is_visible_in_config_print() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);

    for (key, value) in [("mode", "eco"), ("name", "kitchen"), ("mode", "boost")] {
        serial(&mock, &mut app, &format!("config_set_parameter {} {}", key, value));
    }
    let out = serial(&mock, &mut app, "config print");

    assert_eq!(
        out,
        "Config file /config.json: {\"mode\":\"boost\",\"name\":\"kitchen\"}\n\r> "
    );
}

#[test]
fn test_config_survives_reboot() {
    let mock = MockPlatform::new();
    {
        let (mut app, _) = boot(&mock);
        serial(&mock, &mut app, "config_set_parameter mode eco");
        serial(&mock, &mut app, "config_set_parameter name kitchen");
    }

    let rebooted = MockPlatform {
        serial: MockClient::new("serial"),
        ..mock.clone()
    };
    let (app, _) = boot(&rebooted);

    let config = &app.services().config;
    assert_eq!(config.keys().collect::<Vec<_>>(), vec!["mode", "name"]);
    assert_eq!(config.get("mode"), Some("eco"));
    assert_eq!(config.get("name"), Some("kitchen"));
}

#[test]
fn test_connect_wifi_without_password_in_config_never_touches_radio() {
    let mock = MockPlatform::new();
    mock.fs.insert(CONFIG, r#"{"ssid":"home"}"#);

    let (app, boot_log) = boot(&mock);

    assert!(boot_log.contains("Unable to connect to wifi. \"password\" in config is missing."));
    assert!(mock.radio.begin_calls().is_empty());
    assert!(!app.services().wifi.is_connected());
}

#[test]
fn test_unreachable_network_times_out_within_ten_seconds() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);
    let started = mock.clock.now_ms();

    let out = serial(&mock, &mut app, "connect_wifi nowhere secret");

    assert!(mock.clock.now_ms() - started <= 10_000);
    assert!(out.contains("Connection timeout reached!"));
    assert!(out.contains("Connection to network \"nowhere\" with password \"secret\" failed!"));
    assert!(!app.services().wifi.is_connected());
    assert!(!app.services().time.is_started());

    // The loop keeps running afterwards.
    let out = serial(&mock, &mut app, "status");
    assert!(out.starts_with("Status:"));
}

#[test]
fn test_reset_leaves_stale_in_memory_document() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);
    serial(&mock, &mut app, "config_set_parameter ssid home");

    let out = serial(&mock, &mut app, "config reset");
    assert_eq!(out, "Resetting config file /config.json to {}\n\r> ");

    let out = serial(&mock, &mut app, "config print");
    assert_eq!(out, "Config file /config.json: {}\n\r> ");

    // Not reloaded: the document still holds the key, and the next write
    // brings it back.
    assert_eq!(app.services().config.get("ssid"), Some("home"));
    serial(&mock, &mut app, "config_set_parameter mode eco");
    assert_eq!(
        mock.fs.contents(CONFIG).as_deref(),
        Some(r#"{"ssid":"home","mode":"eco"}"#)
    );
}

#[test]
fn test_wrong_argument_count_changes_nothing() {
    let mock = MockPlatform::new();
    mock.fs.insert(CONFIG, r#"{"mode":"eco"}"#);
    let (mut app, _) = boot(&mock);

    let out = serial(&mock, &mut app, "connect_wifi home");
    assert_eq!(out, "Input error: command expects 2 argument(s), got 1\n\r> ");
    let out = serial(&mock, &mut app, "config_set_parameter mode");
    assert_eq!(out, "Input error: command expects 2 argument(s), got 1\n\r> ");

    assert_eq!(mock.fs.contents(CONFIG).as_deref(), Some(r#"{"mode":"eco"}"#));
    assert_eq!(app.services().config.len(), 1);
    assert_eq!(app.services().config.get("mode"), Some("eco"));
    assert!(mock.radio.begin_calls().is_empty());
}

#[test]
fn test_unknown_command_gets_a_reply() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);

    let out = serial(&mock, &mut app, "reboot now");
    assert_eq!(
        out,
        "Unknown command \"reboot\", type \"help\" to get available commands.\n\r> "
    );
}

#[test]
fn test_accepts_one_network_client_at_a_time() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);

    let first = MockClient::new("tcp-1");
    let second = MockClient::new("tcp-2");
    mock.listener.connect(first.clone());
    mock.listener.connect(second.clone());

    app.poll();
    assert!(app.dispatcher().has_remote_client());
    assert_eq!(mock.listener.pending(), 1);
    assert!(first.take_output().contains("Welcome to the CLI"));

    // While a client is registered the listener is not asked again.
    let calls = mock.listener.accept_calls();
    app.poll();
    app.poll();
    assert_eq!(mock.listener.accept_calls(), calls);

    first.push_line("config_set_parameter mode eco");
    app.poll();
    assert!(first.take_output().contains("Config written successfully!"));

    first.disconnect();
    app.poll();
    app.poll();
    assert_eq!(mock.listener.pending(), 0);
    assert!(second.take_output().contains("Welcome to the CLI"));
}

#[test]
fn test_serial_is_served_before_network_client() {
    let mock = MockPlatform::new();
    let (mut app, _) = boot(&mock);
    let remote = MockClient::new("tcp");
    mock.listener.connect(remote.clone());
    app.poll();
    remote.take_output();

    mock.serial.push_line("config_set_parameter order serial");
    remote.push_line("config_set_parameter order remote");
    app.poll();

    // Both ran in one tick, serial first, so the network write wins.
    assert_eq!(mock.fs.contents(CONFIG).as_deref(), Some(r#"{"order":"remote"}"#));
}

#[test]
fn test_listener_failure_is_not_fatal() {
    let mock = MockPlatform::new();
    mock.listener.fail_begin(true);
    let (mut app, _) = boot(&mock);

    assert!(!app.is_listening());
    mock.listener.connect(MockClient::new("tcp"));
    app.poll();
    assert!(!app.dispatcher().has_remote_client());

    let out = serial(&mock, &mut app, "help");
    assert!(out.starts_with("Available commands:"));
}

#[test]
fn test_mount_failure_degrades_to_empty_config() {
    let mock = MockPlatform::new();
    mock.fs.fail_mount(true);
    let (mut app, _) = boot(&mock);

    assert!(app.services().config.is_empty());
    assert!(mock.fs.contents(CONFIG).is_none());

    let out = serial(&mock, &mut app, "config_set_parameter mode eco");
    assert!(out.contains("Setting config parameter: mode=eco"));
    assert!(out.contains("failed: storage error: filesystem is not mounted"));
    assert_eq!(app.services().config.get("mode"), Some("eco"));
}
