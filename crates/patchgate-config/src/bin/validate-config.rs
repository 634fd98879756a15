//! Settings validation CLI tool
//!
//! Validates a patchgate settings file and prints the resolved values.

use patchgate_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: patchgate-validate-config [settings-file]");
            eprintln!();
            eprintln!("Validates a patchgate settings file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  patchgate-validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Settings file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match patchgate_config::load_settings(&config_path) {
        Ok(settings) => {
            println!("✓ Settings are valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", patchgate_config::CURRENT_CONFIG_VERSION);
            println!("  Update tool:    {}", settings.paths.update_tool.display());
            println!("  Deferral file:  {}", settings.paths.deferral_file.display());
            println!("  Installer lock: {}", settings.paths.installer_lock.display());
            println!(
                "  Timeouts:       check {}s, download {}s, install {}s, probe {}s",
                settings.timeouts.check.as_secs(),
                settings.timeouts.download.as_secs(),
                settings.timeouts.install.as_secs(),
                settings.timeouts.probe.as_secs(),
            );
            println!(
                "  Console sentinels: {}",
                settings.session.console_sentinels.join(", ")
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Settings validation failed");
            eprintln!();
            match e {
                patchgate_config::ConfigError::ValidationFailed { errors } => {
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                }
                _ => {
                    eprintln!("  {}", e);
                }
            }
            ExitCode::from(1)
        }
    }
}
