//! Config validation CLI tool
//!
//! Validates a hostguardd configuration file and reports any errors.

use hostguard_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a hostguardd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match hostguard_config::load_config(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", hostguard_config::CURRENT_CONFIG_VERSION);
            println!("  Hosts file: {}", config.enforcement.hosts_path.display());
            println!("  Redirect IP: {}", config.enforcement.redirect_ip);
            println!(
                "  Enforcement tick: {}s",
                config.enforcement.tick_interval.as_secs()
            );
            match config.session.max_duration {
                Some(max) => println!(
                    "  Max session: {}",
                    hostguard_util::format_duration(max)
                ),
                None => println!("  Max session: unbounded"),
            }

            if !config.default_blocks.is_empty() {
                println!();
                println!("Default blocks:");
                for (domain, paths) in &config.default_blocks {
                    if paths.is_empty() {
                        println!("  - {} (whole domain)", domain);
                    } else {
                        println!("  - {} {}", domain, paths.join(" "));
                    }
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                hostguard_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                hostguard_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                hostguard_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                hostguard_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        hostguard_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
