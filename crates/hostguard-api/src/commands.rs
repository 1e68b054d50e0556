//! Command types for the hostguardd protocol

use chrono::{DateTime, Utc};
use hostguard_util::{ClientId, SessionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{HealthStatus, HistoryEntry, PolicyView, StatusView, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
///
/// Validation and conflict codes are returned synchronously and never change
/// persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    /// Bad duration, empty domain, unrecognized channel
    ValidationFailed,
    /// Policy edits and new sessions are locked while a session runs
    SessionActive,
    NoActiveSession,
    /// The emergency override was already spent for this session
    AlreadyUsed,
    /// The emergency override is locked until more of the session has elapsed
    TooEarly,
    AlreadyExists,
    NotFound,
    StoreError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start a block session of the given length
    StartSession { duration: Duration },

    /// Shorten the active session to at most 30 more minutes (once per session)
    EmergencyShorten,

    /// Block a domain; an empty path list blocks the whole domain
    AddCustomDomain {
        domain: String,
        #[serde(default)]
        paths: Vec<String>,
    },

    RemoveCustomDomain { domain: String },

    /// Exempt a domain from blocking in future sessions
    AddAllowedDomain { domain: String },

    RemoveAllowedDomain { domain: String },

    /// Approve a YouTube channel (URL or identifier)
    AddAllowedChannel { channel: String },

    RemoveAllowedChannel { channel: String },

    /// Toggle the desktop notification fired when a session completes
    SetNotifications { enabled: bool },

    GetStatus,

    GetPolicy,

    /// Session history, newest last; `limit` keeps only the most recent
    GetHistory {
        #[serde(default)]
        limit: Option<usize>,
    },

    GetHealth,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Status(StatusView),
    Policy(PolicyView),
    History(Vec<HistoryEntry>),
    SessionStarted {
        session_id: SessionId,
        ends_at: DateTime<Utc>,
    },
    EmergencyApplied {
        ends_at: DateTime<Utc>,
    },
    PolicyUpdated(PolicyView),
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}
