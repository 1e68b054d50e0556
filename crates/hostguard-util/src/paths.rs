//! Default paths for hostguard components
//!
//! The service edits `/etc/hosts` and therefore normally runs as root, but
//! nothing here assumes it:
//! - Socket: `$XDG_RUNTIME_DIR/hostguard/hostguardd.sock` or `/tmp/hostguard-$USER/hostguardd.sock`
//! - Data: `$XDG_DATA_HOME/hostguard` or `~/.local/share/hostguard`
//! - Config: `$XDG_CONFIG_HOME/hostguard/config.toml` or `~/.config/hostguard/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const HOSTGUARD_SOCKET_ENV: &str = "HOSTGUARD_SOCKET";

/// Environment variable for overriding the data directory
pub const HOSTGUARD_DATA_DIR_ENV: &str = "HOSTGUARD_DATA_DIR";

const SOCKET_FILENAME: &str = "hostguardd.sock";

const APP_DIR: &str = "hostguard";

/// Default location of the system name-resolution table
pub const DEFAULT_HOSTS_PATH: &str = "/etc/hosts";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$HOSTGUARD_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/hostguard/hostguardd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/hostguard-$USER/hostguardd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(HOSTGUARD_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the HOSTGUARD_SOCKET env var.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$HOSTGUARD_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/hostguard` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/hostguard` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(HOSTGUARD_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the HOSTGUARD_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/var/lib").join(APP_DIR)
}

/// Get the default daemon configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}
