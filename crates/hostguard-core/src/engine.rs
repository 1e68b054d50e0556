//! Block-session engine
//!
//! Owns the policy, the session state and the store handle. Every mutation
//! is persisted before it becomes visible, so a failed write leaves the
//! engine exactly as it was.
//!
//! Store writes are synchronous. Async callers mutate the engine through
//! [`SessionScheduler::mutate_engine`](crate::SessionScheduler::mutate_engine).

use chrono::{DateTime, Utc};
use hostguard_api::{ErrorCode, HistoryEntry, PolicyView, StatusView};
use hostguard_config::SessionLimits;
use hostguard_hosts::EffectiveBlockSet;
use hostguard_store::{HistoryRecord, StateDocument, Store, StoreError};
use hostguard_util::{to_chrono, Domain, SessionId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{ActiveSession, CoreEvent, PolicyStore};

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("A block session is active")]
    SessionActive,

    #[error("No active session")]
    NoActiveSession,

    #[error("Emergency override already used for this session")]
    AlreadyUsed,

    #[error("Emergency override unlocks at {available_at}")]
    TooEarly { available_at: DateTime<Utc> },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Protocol error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationFailed,
            EngineError::SessionActive => ErrorCode::SessionActive,
            EngineError::NoActiveSession => ErrorCode::NoActiveSession,
            EngineError::AlreadyUsed => ErrorCode::AlreadyUsed,
            EngineError::TooEarly { .. } => ErrorCode::TooEarly,
            EngineError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::Store(_) => ErrorCode::StoreError,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// What the host table should look like right now
#[derive(Debug, Clone, PartialEq)]
pub enum EnforcementPlan {
    /// Managed section must hold exactly these entries
    Apply(EffectiveBlockSet),
    /// Managed section must be absent
    Clear,
}

/// The block-session engine
pub struct BlockEngine {
    store: Arc<dyn Store>,
    limits: SessionLimits,
    policy: PolicyStore,
    session: Option<ActiveSession>,
}

impl BlockEngine {
    /// Create an engine from whatever the store holds.
    ///
    /// An empty store (first run, or a document that was set aside as
    /// corrupt) yields an idle engine with default policy.
    pub fn load(
        store: Arc<dyn Store>,
        default_blocks: BTreeMap<Domain, Vec<String>>,
        limits: SessionLimits,
    ) -> EngineResult<Self> {
        let (policy, session) = match store.load_state()? {
            Some(doc) => (
                PolicyStore::from_document(default_blocks, &doc),
                ActiveSession::from_document(&doc),
            ),
            None => {
                info!("No persisted state, starting idle");
                (PolicyStore::new(default_blocks), None)
            }
        };

        if let Some(session) = &session {
            info!(
                session_id = %session.session_id,
                ends_at = %session.ends_at,
                "Loaded active session"
            );
        }

        Ok(Self {
            store,
            limits,
            policy,
            session,
        })
    }

    /// Current session, including one that is past its end but not yet collapsed
    pub fn current_session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    pub fn has_active_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.policy.notifications()
    }

    pub fn store_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    fn document(&self, policy: &PolicyStore, session: Option<&ActiveSession>) -> StateDocument {
        let mut doc = StateDocument::default();
        policy.write_to(&mut doc);
        if let Some(session) = session {
            session.write_to(&mut doc);
        }
        doc
    }

    fn persist(&self, policy: &PolicyStore, session: Option<&ActiveSession>) -> EngineResult<()> {
        let doc = self.document(policy, session);
        self.store.save_state(&doc)?;
        Ok(())
    }

    /// Start a block session of `duration` from `now`
    pub fn start_session(&mut self, duration: Duration, now: DateTime<Utc>) -> EngineResult<CoreEvent> {
        if duration.is_zero() {
            return Err(EngineError::Validation("duration must be greater than zero".into()));
        }
        if let Some(max) = self.limits.max_duration
            && duration > max
        {
            return Err(EngineError::Validation(format!(
                "duration {} exceeds the configured maximum of {}",
                hostguard_util::format_duration(duration),
                hostguard_util::format_duration(max)
            )));
        }
        if self.session.is_some() {
            return Err(EngineError::SessionActive);
        }

        let ends_at = now
            .checked_add_signed(to_chrono(duration))
            .ok_or_else(|| EngineError::Validation("duration is too large".into()))?;

        let session = ActiveSession {
            session_id: SessionId::new(),
            started_at: now,
            ends_at,
            requested: duration,
            emergency_used: false,
            allowed_sites: self.policy.allowed_sites(),
            allowed_channels: self.policy.allowed_channels(),
        };

        self.persist(&self.policy, Some(&session))?;

        let record = HistoryRecord {
            start_time: session.started_at,
            end_time: session.ends_at,
            duration: duration.as_secs(),
            sites: session.allowed_sites.iter().map(|d| d.to_string()).collect(),
            channels: session.allowed_channels.iter().map(|c| c.to_string()).collect(),
        };
        if let Err(e) = self.store.append_history(record) {
            warn!(error = %e, "Failed to append session history");
        }

        info!(
            session_id = %session.session_id,
            ends_at = %session.ends_at,
            duration_secs = duration.as_secs(),
            allowed_sites = session.allowed_sites.len(),
            "Session started"
        );

        let event = CoreEvent::SessionStarted {
            session_id: session.session_id.clone(),
            started_at: session.started_at,
            ends_at: session.ends_at,
        };
        self.session = Some(session);
        Ok(event)
    }

    /// Pull the end time in to at most [`crate::EMERGENCY_GRACE`] from now.
    ///
    /// Allowed once per session.
    pub fn emergency_shorten(&mut self, now: DateTime<Utc>) -> EngineResult<CoreEvent> {
        let session = match &self.session {
            Some(s) if !s.is_expired(now) => s,
            _ => return Err(EngineError::NoActiveSession),
        };
        if session.emergency_used {
            return Err(EngineError::AlreadyUsed);
        }
        let available_at = session.emergency_unlocks_at(self.limits.emergency_lockout);
        if now < available_at {
            return Err(EngineError::TooEarly { available_at });
        }

        let mut updated = session.clone();
        updated.ends_at = session.shortened_end(now);
        updated.emergency_used = true;

        self.persist(&self.policy, Some(&updated))?;

        info!(
            session_id = %updated.session_id,
            previous_end = %session.ends_at,
            ends_at = %updated.ends_at,
            "Emergency override applied"
        );

        let event = CoreEvent::EmergencyUsed {
            session_id: updated.session_id.clone(),
            ends_at: updated.ends_at,
        };
        self.session = Some(updated);
        Ok(event)
    }

    /// Collapse an expired session to idle.
    ///
    /// The transition happens even if it cannot be persisted; the stale
    /// document is expired on the next load anyway.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        let expired = match &self.session {
            Some(s) if s.is_expired(now) => s.clone(),
            _ => return events,
        };

        if let Err(e) = self.persist(&self.policy, None) {
            warn!(error = %e, "Failed to persist session completion");
        }
        self.session = None;

        info!(
            session_id = %expired.session_id,
            ended_at = %expired.ends_at,
            "Session completed"
        );

        events.push(CoreEvent::SessionCompleted {
            session_id: expired.session_id,
            ended_at: expired.ends_at,
        });
        events
    }

    /// Desired host table state for the current session
    pub fn enforcement_plan(&self) -> EnforcementPlan {
        match &self.session {
            Some(session) => {
                EnforcementPlan::Apply(self.policy.effective_block_set(&session.allowed_sites))
            }
            None => EnforcementPlan::Clear,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusView {
        match &self.session {
            Some(session) => session.to_status(now, self.limits.emergency_lockout),
            None => StatusView::idle(),
        }
    }

    pub fn policy_view(&self) -> PolicyView {
        self.policy.view(self.session.is_none())
    }

    /// Session history, oldest first; `limit` keeps the most recent records
    pub fn history(&self, limit: Option<usize>) -> EngineResult<Vec<HistoryEntry>> {
        let records = self.store.load_history()?;
        let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
        Ok(records
            .into_iter()
            .skip(skip)
            .map(|r| HistoryEntry {
                started_at: r.start_time,
                ends_at: r.end_time,
                duration: Duration::from_secs(r.duration),
                sites: r.sites,
                channels: r.channels,
            })
            .collect())
    }

    /// Apply a policy edit. Rejected while a session is active.
    fn edit_policy<T>(
        &mut self,
        edit: impl FnOnce(&mut PolicyStore) -> EngineResult<T>,
    ) -> EngineResult<(T, CoreEvent)> {
        if self.session.is_some() {
            return Err(EngineError::SessionActive);
        }

        let mut policy = self.policy.clone();
        let value = edit(&mut policy)?;
        self.persist(&policy, None)?;
        self.policy = policy;
        Ok((value, CoreEvent::PolicyChanged))
    }

    pub fn add_custom_domain(&mut self, domain: &str, paths: &[String]) -> EngineResult<CoreEvent> {
        let (domain, event) = self.edit_policy(|p| p.add_custom_domain(domain, paths))?;
        info!(domain = %domain, "Custom domain blocked");
        Ok(event)
    }

    pub fn remove_custom_domain(&mut self, domain: &str) -> EngineResult<CoreEvent> {
        let (domain, event) = self.edit_policy(|p| p.remove_custom_domain(domain))?;
        info!(domain = %domain, "Custom domain removed");
        Ok(event)
    }

    pub fn add_allowed_domain(&mut self, domain: &str) -> EngineResult<CoreEvent> {
        let (domain, event) = self.edit_policy(|p| p.add_allowed_domain(domain))?;
        info!(domain = %domain, "Domain allowed");
        Ok(event)
    }

    pub fn remove_allowed_domain(&mut self, domain: &str) -> EngineResult<CoreEvent> {
        let (domain, event) = self.edit_policy(|p| p.remove_allowed_domain(domain))?;
        info!(domain = %domain, "Domain no longer allowed");
        Ok(event)
    }

    pub fn add_allowed_channel(&mut self, channel: &str) -> EngineResult<CoreEvent> {
        let (channel, event) = self.edit_policy(|p| p.add_allowed_channel(channel))?;
        info!(channel = %channel, "Channel allowed");
        Ok(event)
    }

    pub fn remove_allowed_channel(&mut self, channel: &str) -> EngineResult<CoreEvent> {
        let (channel, event) = self.edit_policy(|p| p.remove_allowed_channel(channel))?;
        info!(channel = %channel, "Channel no longer allowed");
        Ok(event)
    }

    /// Toggle the completion notification. Allowed during a session.
    pub fn set_notifications(&mut self, enabled: bool) -> EngineResult<CoreEvent> {
        let mut policy = self.policy.clone();
        policy.set_notifications(enabled);
        self.persist(&policy, self.session.as_ref())?;
        self.policy = policy;
        debug!(enabled, "Notifications toggled");
        Ok(CoreEvent::PolicyChanged)
    }
}
