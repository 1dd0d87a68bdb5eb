//! Check a nightwatchd configuration file
//!
//! `validate-config [config-file]`, defaulting to the standard location.
//! Exit status: 0 valid, 1 invalid or unreadable.

use nightwatch_config::{CURRENT_CONFIG_VERSION, ConfigError, Settings, load_config};
use nightwatch_util::default_config_path;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if !path.is_file() {
        eprintln!("{}: no such file", path.display());
        eprintln!("usage: validate-config [config-file]");
        return ExitCode::from(1);
    }

    match load_config(&path) {
        Ok(settings) => {
            println!("{}: ok", path.display());
            print_summary(&settings);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: invalid", path.display());
            print_error(&e);
            ExitCode::from(1)
        }
    }
}

fn print_summary(settings: &Settings) {
    let service = &settings.service;
    let rows = [
        ("listen", service.listen.to_string()),
        ("data_dir", service.data_dir.display().to_string()),
        ("default_timezone", service.default_timezone.to_string()),
        ("signature_skew", format!("{}s", service.signature_skew.as_secs())),
        ("heartbeat_throttle", format!("{}s", service.heartbeat_throttle.as_secs())),
        ("default_gap", format!("{} min", service.default_gap_minutes)),
        (
            "admin_token",
            if service.admin_token.is_some() { "set" } else { "unset" }.to_string(),
        ),
        (
            "notify",
            service
                .notify
                .as_ref()
                .map(|n| format!("{} ({}s timeout)", n.webhook_url, n.timeout.as_secs()))
                .unwrap_or_else(|| "log only".to_string()),
        ),
    ];

    for (key, value) in rows {
        println!("  {:<20} {}", key, value);
    }
}

fn print_error(error: &ConfigError) {
    match error {
        ConfigError::ReadError(e) => eprintln!("  read failed: {}", e),
        ConfigError::ParseError(e) => eprintln!("  not valid TOML: {}", e),
        ConfigError::UnsupportedVersion(found) => eprintln!(
            "  config_version {} is not supported (this build reads {})",
            found, CURRENT_CONFIG_VERSION
        ),
        ConfigError::ValidationFailed { errors } => {
            let mut by_field: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for e in errors {
                by_field.entry(e.field()).or_default().push(e.to_string());
            }
            for (field, messages) in by_field {
                eprintln!("  [{}]", field);
                for message in messages {
                    eprintln!("    {}", message);
                }
            }
        }
    }
}
