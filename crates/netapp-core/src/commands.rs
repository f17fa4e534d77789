//! Built-in CLI commands.

use tracing::{debug, error};

use crate::app::Services;
use crate::cli::{CliError, Dispatcher, Invocation, STATUS_INPUT_ERROR, STATUS_OK};
use crate::console::Console;
use crate::wifi::{PASSWORD_KEY, SSID_KEY};

/// Register `help`, `status`, `connect_wifi`, `config` and
/// `config_set_parameter`, in that order.
pub fn register_builtin(dispatcher: &mut Dispatcher<Services>) -> Result<(), CliError> {
    dispatcher.register("help", "help", "Shows this help message", help)?;
    dispatcher.register(
        "status",
        "status",
        "Shows uptime, current time and IP addresses",
        status,
    )?;
    dispatcher.register(
        "connect_wifi",
        "connect_wifi <SSID> <PASSWORD>",
        "Stores the WiFi credentials in config and connects",
        connect_wifi,
    )?;
    dispatcher.register(
        "config",
        "config print|reset|delete",
        "Prints, resets (set to \"{}\") or deletes the config file",
        config,
    )?;
    dispatcher.register(
        "config_set_parameter",
        "config_set_parameter <KEY> <VALUE>",
        "Sets key value pair in config",
        config_set_parameter,
    )?;
    Ok(())
}

fn help(_: &mut Services, inv: &mut Invocation<'_>) -> i32 {
    if !inv.expect_args(0) {
        return STATUS_INPUT_ERROR;
    }
    inv.println("Available commands:");
    for spec in inv.commands() {
        inv.println(&format!("  {}: {}", spec.usage, spec.summary));
    }
    STATUS_OK
}

fn status(services: &mut Services, inv: &mut Invocation<'_>) -> i32 {
    if !inv.expect_args(0) {
        return STATUS_INPUT_ERROR;
    }
    inv.println("Status:");
    inv.println(&format!("  Uptime: {}", services.uptime_ms()));
    inv.println(&format!("  Time: {}", services.formatted_time()));
    inv.println(&format!("  IPv4: {}", services.radio.local_ipv4()));
    inv.println(&format!("  IPv6: {}", services.radio.local_ipv6()));
    for line in &services.status_lines {
        inv.println(&format!("  {}", line()));
    }
    STATUS_OK
}

fn connect_wifi(services: &mut Services, inv: &mut Invocation<'_>) -> i32 {
    if !inv.expect_args(2) {
        return STATUS_INPUT_ERROR;
    }
    let (Some(ssid), Some(password)) = (inv.arg(1), inv.arg(2)) else {
        return STATUS_INPUT_ERROR;
    };

    set_config_value(services, SSID_KEY, ssid, inv.out());
    set_config_value(services, PASSWORD_KEY, password, inv.out());
    write_config(services, inv.out());

    // Failures were already reported to the client by the connector.
    if let Err(e) = services.connect_wifi(inv.out()) {
        debug!(error = %e, "connect_wifi command did not connect");
    }
    STATUS_OK
}

fn config(services: &mut Services, inv: &mut Invocation<'_>) -> i32 {
    if !inv.expect_args(1) {
        return STATUS_INPUT_ERROR;
    }
    let path = services.config.path().to_string();

    match inv.arg(1).unwrap_or_default() {
        "print" => match services.config.raw_contents() {
            Ok(contents) => inv.println(&format!("Config file {}: {}", path, contents)),
            Err(e) => inv.println(&format!("Unable to read config file {}: {}", path, e)),
        },
        "reset" => {
            inv.println(&format!("Resetting config file {} to {{}}", path));
            if let Err(e) = services.config.reset_file() {
                error!(%path, error = %e, "Config reset failed");
                inv.println(&format!("Resetting config file {} failed: {}", path, e));
            }
        }
        "delete" => {
            inv.println(&format!("Deleting config file {}", path));
            if let Err(e) = services.config.delete_file() {
                error!(%path, error = %e, "Config delete failed");
                inv.println(&format!("Deleting config file {} failed: {}", path, e));
            }
        }
        other => {
            inv.println(&format!("Input Error: Subcommand \"{}\" unknown!", other));
            return STATUS_INPUT_ERROR;
        }
    }
    STATUS_OK
}

fn config_set_parameter(services: &mut Services, inv: &mut Invocation<'_>) -> i32 {
    if !inv.expect_args(2) {
        return STATUS_INPUT_ERROR;
    }
    let (Some(key), Some(value)) = (inv.arg(1), inv.arg(2)) else {
        return STATUS_INPUT_ERROR;
    };

    set_config_value(services, key, value, inv.out());
    write_config(services, inv.out());
    STATUS_OK
}

fn set_config_value(services: &mut Services, key: &str, value: &str, out: &mut dyn Console) {
    out.println(&format!("Setting config parameter: {}={}", key, value));
    services.config.set_value(key, value);
}

fn write_config(services: &mut Services, out: &mut dyn Console) {
    let path = services.config.path().to_string();
    match services.config.write() {
        Ok(written) => {
            out.println(&format!("Writing config to file (\"{}\"): {}", path, written));
            out.println("Config written successfully!");
        }
        Err(e) => {
            error!(%path, error = %e, "Config write failed");
            out.println(&format!("Writing config to file (\"{}\") failed: {}", path, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppSettings, NetworkApplication};
    use crate::mock::MockPlatform;
    use pretty_assertions::assert_eq;

    fn running_app() -> (MockPlatform, NetworkApplication) {
        let mock = MockPlatform::new();
        let mut app = NetworkApplication::new(AppSettings::default(), mock.platform());
        app.setup();
        mock.serial.take_output();
        (mock, app)
    }

    fn run(mock: &MockPlatform, app: &mut NetworkApplication, line: &str) -> String {
        mock.serial.push_line(line);
        app.poll();
        mock.serial.take_output()
    }

    #[test]
    fn test_help_lists_every_command() {
        let (mock, mut app) = running_app();
        let out = run(&mock, &mut app, "help");

        assert_eq!(
            out,
            "Available commands:\n\r\
             \x20 help: Shows this help message\n\r\
             \x20 status: Shows uptime, current time and IP addresses\n\r\
             \x20 connect_wifi <SSID> <PASSWORD>: Stores the WiFi credentials in config and connects\n\r\
             \x20 config print|reset|delete: Prints, resets (set to \"{}\") or deletes the config file\n\r\
             \x20 config_set_parameter <KEY> <VALUE>: Sets key value pair in config\n\r\
             > "
        );
    }

    #[test]
    fn test_status_reports_uptime_time_and_addresses() {
        let (mock, mut app) = running_app();
        mock.clock.advance(1234);
        let out = run(&mock, &mut app, "status");

        assert!(out.starts_with("Status:\n\r  Uptime: 1234\n\r"));
        assert!(out.contains("  Time: 00:00:00 - 1970-01-01\n\r"));
        assert!(out.contains("  IPv4: 0.0.0.0\n\r"));
        assert!(out.contains("  IPv6: ::\n\r"));
    }

    #[test]
    fn test_config_set_parameter_persists() {
        let (mock, mut app) = running_app();
        let out = run(&mock, &mut app, "config_set_parameter mode eco");

        assert_eq!(
            out,
            "Setting config parameter: mode=eco\n\r\
             Writing config to file (\"/config.json\"): {\"mode\":\"eco\"}\n\r\
             Config written successfully!\n\r\
             > "
        );
        assert_eq!(mock.fs.contents("/config.json").as_deref(), Some(r#"{"mode":"eco"}"#));
    }

    #[test]
    fn test_config_print_shows_file_contents() {
        let (mock, mut app) = running_app();
        run(&mock, &mut app, "config_set_parameter mode eco");
        let out = run(&mock, &mut app, "config print");

        assert_eq!(out, "Config file /config.json: {\"mode\":\"eco\"}\n\r> ");
    }

    #[test]
    fn test_config_delete_removes_file() {
        let (mock, mut app) = running_app();
        let out = run(&mock, &mut app, "config delete");

        assert_eq!(out, "Deleting config file /config.json\n\r> ");
        assert!(mock.fs.contents("/config.json").is_none());

        let out = run(&mock, &mut app, "config print");
        assert!(out.starts_with("Unable to read config file /config.json"));
    }

    #[test]
    fn test_unknown_subcommand_is_named() {
        let (mock, mut app) = running_app();
        let out = run(&mock, &mut app, "config wipe");

        assert_eq!(out, "Input Error: Subcommand \"wipe\" unknown!\n\r> ");
    }

    #[test]
    fn test_argument_count_errors_leave_state_unchanged() {
        let (mock, mut app) = running_app();
        let before = mock.fs.contents("/config.json");

        for (line, expected, got) in [
            ("connect_wifi home", 2, 1),
            ("config_set_parameter key", 2, 1),
            ("config_set_parameter a b c", 2, 3),
            ("config", 1, 0),
            ("config print extra", 1, 2),
            ("help x", 0, 1),
            ("status a b", 0, 2),
        ] {
            let out = run(&mock, &mut app, line);
            assert_eq!(
                out,
                format!(
                    "Input error: command expects {} argument(s), got {}\n\r> ",
                    expected, got
                )
            );
        }

        assert_eq!(mock.fs.contents("/config.json"), before);
        assert!(app.services().config.is_empty());
        assert!(mock.radio.begin_calls().is_empty());
    }
}
