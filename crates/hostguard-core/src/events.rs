//! Core events emitted by the engine

use chrono::{DateTime, Utc};
use hostguard_util::SessionId;

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Session started and persisted
    SessionStarted {
        session_id: SessionId,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },

    /// Emergency override applied
    EmergencyUsed {
        session_id: SessionId,
        ends_at: DateTime<Utc>,
    },

    /// Session reached its end time and was collapsed to idle
    SessionCompleted {
        session_id: SessionId,
        ended_at: DateTime<Utc>,
    },

    /// Custom blocks, allow lists or preferences changed
    PolicyChanged,
}
