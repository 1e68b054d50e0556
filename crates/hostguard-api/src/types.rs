//! Shared types for the hostguardd API

use chrono::{DateTime, Utc};
use hostguard_util::{ChannelId, Domain, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Lifecycle phase of the block session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session; the managed hosts section is absent
    Idle,
    /// Session running; blocked domains are enforced
    Active,
    /// End time has passed but the next enforcement tick has not yet run
    Expiring,
}

/// Current session status, polled by clients at their own cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub phase: SessionPhase,
    pub session_id: Option<SessionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub remaining: Duration,
    pub elapsed: Duration,
    pub emergency_used: bool,
    /// Whether `EmergencyShorten` would be accepted right now
    pub emergency_available: bool,
    /// Allow-list snapshot taken when the session started
    #[serde(default)]
    pub allowed_sites: Vec<Domain>,
    #[serde(default)]
    pub allowed_channels: Vec<ChannelId>,
}

impl StatusView {
    pub fn idle() -> Self {
        Self {
            phase: SessionPhase::Idle,
            session_id: None,
            started_at: None,
            ends_at: None,
            remaining: Duration::ZERO,
            elapsed: Duration::ZERO,
            emergency_used: false,
            emergency_available: false,
            allowed_sites: Vec::new(),
            allowed_channels: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != SessionPhase::Idle
    }
}

/// Blocking policy as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyView {
    /// Built-in blocks (domain -> blocked sub-paths)
    pub default_blocks: BTreeMap<Domain, Vec<String>>,
    /// User-added blocks; an empty path list blocks the whole domain
    pub custom_sites: BTreeMap<Domain, Vec<String>>,
    pub allowed_sites: Vec<Domain>,
    pub allowed_channels: Vec<ChannelId>,
    pub notifications: bool,
    /// False while a session is active
    pub editable: bool,
}

/// One started session, newest last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration: Duration,
    #[serde(default)]
    pub sites: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Outcome of the most recent host table reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementReport {
    pub at: DateTime<Utc>,
    pub ok: bool,
    /// Number of redirect lines in the managed section
    pub entries: usize,
    pub error: Option<String>,
}

/// Health status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub last_enforcement: Option<EnforcementReport>,
}
