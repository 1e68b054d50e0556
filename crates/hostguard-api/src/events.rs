//! Event types for hostguardd -> client streaming

use chrono::{DateTime, Utc};
use hostguard_util::SessionId;
use serde::{Deserialize, Serialize};

use crate::{PolicyView, StatusView, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: hostguard_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Periodic status on the display cadence
    StatusTick(StatusView),

    SessionStarted {
        session_id: SessionId,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },

    /// The one-shot emergency override was applied
    EmergencyUsed {
        session_id: SessionId,
        ends_at: DateTime<Utc>,
    },

    /// Session reached its end time and blocking was lifted
    SessionCompleted {
        session_id: SessionId,
        ended_at: DateTime<Utc>,
    },

    PolicyChanged(PolicyView),

    /// A reconciliation pass failed; it is retried on the next tick
    EnforcementFailed {
        error: String,
    },

    /// Service is shutting down
    Shutdown,
}
