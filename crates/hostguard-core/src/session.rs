//! Session state machine

use chrono::{DateTime, Utc};
use hostguard_api::{SessionPhase, StatusView};
use hostguard_store::StateDocument;
use hostguard_util::{saturating_between, to_chrono, ChannelId, Domain, SessionId};
use std::time::Duration;

/// How far the emergency override moves the end time from now
pub const EMERGENCY_GRACE: Duration = Duration::from_secs(30 * 60);

/// A running block session
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session_id: SessionId,

    /// Wall-clock start; absolute so it survives restarts
    pub started_at: DateTime<Utc>,

    /// Wall-clock end; only ever moves earlier
    pub ends_at: DateTime<Utc>,

    /// Duration requested at start (unchanged by the emergency override)
    pub requested: Duration,

    pub emergency_used: bool,

    /// Allow lists in force for this session
    pub allowed_sites: Vec<Domain>,
    pub allowed_channels: Vec<ChannelId>,
}

impl ActiveSession {
    /// Restore an active session from a persisted document.
    ///
    /// Returns `None` for an idle document.
    pub fn from_document(doc: &StateDocument) -> Option<Self> {
        if !doc.active {
            return None;
        }

        Some(Self {
            session_id: doc.session_id.clone().unwrap_or_default(),
            started_at: doc.start_time,
            ends_at: doc.end_time,
            requested: Duration::from_secs(doc.duration),
            emergency_used: doc.emergency_used,
            allowed_sites: doc.allowed_sites.clone(),
            allowed_channels: doc.allowed_channels.clone(),
        })
    }

    /// Copy session fields into a document about to be persisted
    pub fn write_to(&self, doc: &mut StateDocument) {
        doc.active = true;
        doc.session_id = Some(self.session_id.clone());
        doc.start_time = self.started_at;
        doc.end_time = self.ends_at;
        doc.duration = self.requested.as_secs();
        doc.emergency_used = self.emergency_used;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        saturating_between(now, self.ends_at)
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        saturating_between(self.started_at, now)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SessionPhase {
        if self.is_expired(now) {
            SessionPhase::Expiring
        } else {
            SessionPhase::Active
        }
    }

    /// Earliest time the emergency override is accepted
    pub fn emergency_unlocks_at(&self, lockout: Duration) -> DateTime<Utc> {
        self.started_at
            .checked_add_signed(to_chrono(lockout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn emergency_available(&self, now: DateTime<Utc>, lockout: Duration) -> bool {
        !self.emergency_used && !self.is_expired(now) && now >= self.emergency_unlocks_at(lockout)
    }

    /// End time after an emergency override applied at `now`
    pub fn shortened_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let grace_end = now + to_chrono(EMERGENCY_GRACE);
        self.ends_at.min(grace_end)
    }

    pub fn to_status(&self, now: DateTime<Utc>, lockout: Duration) -> StatusView {
        StatusView {
            phase: self.phase(now),
            session_id: Some(self.session_id.clone()),
            started_at: Some(self.started_at),
            ends_at: Some(self.ends_at),
            remaining: self.remaining(now),
            elapsed: self.elapsed(now),
            emergency_used: self.emergency_used,
            emergency_available: self.emergency_available(now, lockout),
            allowed_sites: self.allowed_sites.clone(),
            allowed_channels: self.allowed_channels.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(now: DateTime<Utc>, length: chrono::Duration) -> ActiveSession {
        ActiveSession {
            session_id: SessionId::new(),
            started_at: now,
            ends_at: now + length,
            requested: length.to_std().unwrap(),
            emergency_used: false,
            allowed_sites: vec![],
            allowed_channels: vec![],
        }
    }

    #[test]
    fn phase_follows_end_time() {
        let now = hostguard_util::now();
        let s = session(now, chrono::Duration::minutes(10));
        assert_eq!(s.phase(now), SessionPhase::Active);
        assert_eq!(s.phase(s.ends_at), SessionPhase::Expiring);
        assert_eq!(s.remaining(s.ends_at + chrono::Duration::seconds(5)), Duration::ZERO);
    }

    #[test]
    fn shortened_end_never_extends() {
        let now = hostguard_util::now();

        let long = session(now, chrono::Duration::days(7));
        assert_eq!(long.shortened_end(now), now + chrono::Duration::minutes(30));

        let short = session(now, chrono::Duration::minutes(10));
        assert_eq!(short.shortened_end(now), short.ends_at);
    }

    #[test]
    fn emergency_lockout() {
        let now = hostguard_util::now();
        let s = session(now, chrono::Duration::hours(2));
        let lockout = Duration::from_secs(3600);

        assert!(!s.emergency_available(now, lockout));
        assert!(s.emergency_available(now + chrono::Duration::hours(1), lockout));
        assert!(s.emergency_available(now, Duration::ZERO));
    }

    #[test]
    fn document_round_trip() {
        let now = hostguard_util::now();
        let mut s = session(now, chrono::Duration::hours(3));
        s.emergency_used = true;
        s.allowed_sites = vec![Domain::parse("wikipedia.org").unwrap()];

        let mut doc = StateDocument::default();
        doc.allowed_sites = s.allowed_sites.clone();
        s.write_to(&mut doc);

        assert_eq!(ActiveSession::from_document(&doc), Some(s));
    }

    #[test]
    fn idle_document_has_no_session() {
        assert!(ActiveSession::from_document(&StateDocument::default()).is_none());
    }
}
