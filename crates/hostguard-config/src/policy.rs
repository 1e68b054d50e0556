//! Validated configuration structures

use crate::schema::{RawConfig, RawDaemonConfig, RawEnforcementConfig, RawSessionConfig};
use hostguard_util::{normalize_path, Domain, DEFAULT_HOSTS_PATH};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Default enforcement tick
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Default status broadcast cadence
pub const DEFAULT_DISPLAY_INTERVAL: Duration = Duration::from_secs(1);

/// Default wait after session start before the emergency override opens
pub const DEFAULT_EMERGENCY_LOCKOUT_MINUTES: u64 = 60;

/// Default redirect address for blocked domains
pub const DEFAULT_REDIRECT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Block list used when the config has no `[default_blocks]` table.
pub fn builtin_default_blocks() -> BTreeMap<Domain, Vec<String>> {
    [
        ("youtube.com", &["/shorts", "/reel"][..]),
        ("facebook.com", &["/reel", "/watch"][..]),
        ("instagram.com", &["/reels"][..]),
    ]
    .into_iter()
    .filter_map(|(domain, paths)| {
        let domain = Domain::parse(domain).ok()?;
        Some((domain, paths.iter().map(|p| p.to_string()).collect()))
    })
    .collect()
}

/// Validated configuration ready for use by the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub daemon: DaemonConfig,
    pub enforcement: EnforcementConfig,
    pub session: SessionLimits,

    /// Domain -> blocked sub-paths; an empty list blocks the whole domain
    pub default_blocks: BTreeMap<Domain, Vec<String>>,
}

impl ServiceConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let default_blocks = match raw.default_blocks {
            Some(blocks) => convert_blocks(blocks),
            None => builtin_default_blocks(),
        };

        Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            enforcement: EnforcementConfig::from_raw(raw.enforcement),
            session: SessionLimits::from_raw(raw.session),
            default_blocks,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

fn convert_blocks(raw: BTreeMap<String, Vec<String>>) -> BTreeMap<Domain, Vec<String>> {
    raw.into_iter()
        .filter_map(|(domain, paths)| {
            let domain = Domain::parse(&domain).ok()?;
            let mut normalized: Vec<String> = Vec::new();
            for path in paths.iter().filter_map(|p| normalize_path(p)) {
                if !normalized.contains(&path) {
                    normalized.push(path);
                }
            }
            Some((domain, normalized))
        })
        .collect()
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(hostguard_util::default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(hostguard_util::default_data_dir),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from_raw(RawDaemonConfig::default())
    }
}

/// Host table enforcement settings
#[derive(Debug, Clone)]
pub struct EnforcementConfig {
    pub hosts_path: PathBuf,
    pub redirect_ip: IpAddr,
    pub tick_interval: Duration,
    pub display_interval: Duration,
}

impl EnforcementConfig {
    fn from_raw(raw: RawEnforcementConfig) -> Self {
        Self {
            hosts_path: raw
                .hosts_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HOSTS_PATH)),
            redirect_ip: raw
                .redirect_ip
                .and_then(|ip| ip.parse().ok())
                .unwrap_or(DEFAULT_REDIRECT_IP),
            tick_interval: raw
                .tick_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TICK_INTERVAL),
            display_interval: raw
                .display_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DISPLAY_INTERVAL),
        }
    }
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self::from_raw(RawEnforcementConfig::default())
    }
}

/// Limits applied to session commands
#[derive(Debug, Clone)]
pub struct SessionLimits {
    /// Longest session `StartSession` accepts. None means unbounded.
    pub max_duration: Option<Duration>,

    /// Time since session start before `EmergencyShorten` is accepted
    pub emergency_lockout: Duration,
}

impl SessionLimits {
    fn from_raw(raw: RawSessionConfig) -> Self {
        Self {
            max_duration: raw
                .max_duration_hours
                .map(|h| Duration::from_secs(h.saturating_mul(3600))),
            emergency_lockout: Duration::from_secs(
                raw.emergency_lockout_minutes
                    .unwrap_or(DEFAULT_EMERGENCY_LOCKOUT_MINUTES)
                    .saturating_mul(60),
            ),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from_raw(RawSessionConfig::default())
    }
}
