//! Persisted document shapes

use chrono::{DateTime, Utc};
use hostguard_util::{ChannelId, Domain, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session state and user policy, persisted after every mutation.
///
/// Policy edits are rejected while `active`, so the allow lists stored here
/// are also the snapshot the running session enforces.
///
/// Missing keys take their defaults so older documents keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateDocument {
    pub active: bool,
    pub session_id: Option<SessionId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Requested session length in seconds
    pub duration: u64,
    pub emergency_used: bool,
    pub notifications: bool,
    pub allowed_sites: Vec<Domain>,
    pub allowed_channels: Vec<ChannelId>,
    /// Domain -> blocked sub-paths; an empty list blocks the whole domain
    pub custom_sites: BTreeMap<Domain, Vec<String>>,
}

impl Default for StateDocument {
    fn default() -> Self {
        let now = hostguard_util::now();
        Self {
            active: false,
            session_id: None,
            start_time: now,
            end_time: now,
            duration: 0,
            emergency_used: false,
            notifications: true,
            allowed_sites: Vec::new(),
            allowed_channels: Vec::new(),
            custom_sites: BTreeMap::new(),
        }
    }
}

/// One started session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Requested session length in seconds
    pub duration: u64,
    /// Allowed sites in effect
    #[serde(default)]
    pub sites: Vec<String>,
    /// Allowed channels in effect
    #[serde(default)]
    pub channels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_document_uses_camel_case() {
        let doc = StateDocument::default();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"emergencyUsed\":false"));
        assert!(json.contains("\"startTime\""));
        assert!(json.contains("\"customSites\":{}"));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let doc: StateDocument =
            serde_json::from_str(r#"{"active":true,"endTime":"2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(doc.active);
        assert!(doc.notifications);
        assert!(doc.allowed_sites.is_empty());
        assert_eq!(doc.end_time.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn stored_domains_are_normalized_on_load() {
        let doc: StateDocument = serde_json::from_str(
            r#"{"allowedSites":["https://WWW.Example.com/path"],"customSites":{"Reddit.com":[]}}"#,
        )
        .unwrap();
        assert_eq!(doc.allowed_sites[0].as_str(), "example.com");
        assert!(doc.custom_sites.contains_key(&Domain::parse("reddit.com").unwrap()));
    }

    #[test]
    fn invalid_domain_fails_to_load() {
        let result: Result<StateDocument, _> =
            serde_json::from_str(r#"{"allowedSites":["bad domain"]}"#);
        assert!(result.is_err());
    }
}
