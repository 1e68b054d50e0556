//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    #[serde(default)]
    pub daemon: RawDaemonConfig,

    #[serde(default)]
    pub enforcement: RawEnforcementConfig,

    #[serde(default)]
    pub session: RawSessionConfig,

    /// Replaces the built-in default blocks when present (domain = [paths])
    #[serde(default)]
    pub default_blocks: Option<BTreeMap<String, Vec<String>>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: crate::CURRENT_CONFIG_VERSION,
            daemon: RawDaemonConfig::default(),
            enforcement: RawEnforcementConfig::default(),
            session: RawSessionConfig::default(),
            default_blocks: None,
        }
    }
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/hostguard/hostguardd.sock)
    pub socket_path: Option<PathBuf>,

    /// Directory holding state.json and history.json
    pub data_dir: Option<PathBuf>,
}

/// Host table enforcement settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEnforcementConfig {
    /// Hosts file to manage (default: /etc/hosts)
    pub hosts_path: Option<PathBuf>,

    /// Address blocked domains resolve to (default: 127.0.0.1)
    pub redirect_ip: Option<String>,

    /// Seconds between reconciliation passes (default: 60)
    pub tick_interval_seconds: Option<u64>,

    /// Seconds between status broadcasts (default: 1)
    pub display_interval_seconds: Option<u64>,
}

/// Session limits
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Longest session that may be started; unset means unbounded
    pub max_duration_hours: Option<u64>,

    /// Minutes that must elapse before the emergency override unlocks
    pub emergency_lockout_minutes: Option<u64>,
}
