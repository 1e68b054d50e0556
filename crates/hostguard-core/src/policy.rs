//! Blocking policy: what gets redirected and what is exempt

use hostguard_api::PolicyView;
use hostguard_hosts::EffectiveBlockSet;
use hostguard_store::StateDocument;
use hostguard_util::{normalize_path, ChannelId, Domain, DomainError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::EngineError;

impl From<DomainError> for EngineError {
    fn from(e: DomainError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

/// Default blocks plus the user's edits.
///
/// Mutators never check the session lock; [`crate::BlockEngine`] does.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStore {
    default_blocks: BTreeMap<Domain, Vec<String>>,
    custom_sites: BTreeMap<Domain, Vec<String>>,
    allowed_sites: BTreeSet<Domain>,
    allowed_channels: BTreeSet<ChannelId>,
    notifications: bool,
}

impl PolicyStore {
    pub fn new(default_blocks: BTreeMap<Domain, Vec<String>>) -> Self {
        Self {
            default_blocks,
            custom_sites: BTreeMap::new(),
            allowed_sites: BTreeSet::new(),
            allowed_channels: BTreeSet::new(),
            notifications: true,
        }
    }

    /// Restore user edits from a persisted document
    pub fn from_document(
        default_blocks: BTreeMap<Domain, Vec<String>>,
        doc: &StateDocument,
    ) -> Self {
        Self {
            default_blocks,
            custom_sites: doc.custom_sites.clone(),
            allowed_sites: doc.allowed_sites.iter().cloned().collect(),
            allowed_channels: doc.allowed_channels.iter().cloned().collect(),
            notifications: doc.notifications,
        }
    }

    /// Copy user edits into a document about to be persisted
    pub fn write_to(&self, doc: &mut StateDocument) {
        doc.custom_sites = self.custom_sites.clone();
        doc.allowed_sites = self.allowed_sites.iter().cloned().collect();
        doc.allowed_channels = self.allowed_channels.iter().cloned().collect();
        doc.notifications = self.notifications;
    }

    pub fn allowed_sites(&self) -> Vec<Domain> {
        self.allowed_sites.iter().cloned().collect()
    }

    pub fn allowed_channels(&self) -> Vec<ChannelId> {
        self.allowed_channels.iter().cloned().collect()
    }

    pub fn notifications(&self) -> bool {
        self.notifications
    }

    pub fn set_notifications(&mut self, enabled: bool) {
        self.notifications = enabled;
    }

    /// Block a domain. An empty path list blocks the whole domain.
    pub fn add_custom_domain(&mut self, domain: &str, paths: &[String]) -> Result<Domain, EngineError> {
        let domain = Domain::parse(domain)?;
        let mut normalized: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            let path = normalize_path(path)
                .filter(|p| !p.chars().any(char::is_whitespace))
                .ok_or_else(|| EngineError::Validation(format!("invalid path '{}'", path)))?;
            if !normalized.contains(&path) {
                normalized.push(path);
            }
        }

        if self.custom_sites.contains_key(&domain) {
            return Err(EngineError::AlreadyExists(domain.to_string()));
        }
        debug!(domain = %domain, paths = normalized.len(), "Custom domain added");
        self.custom_sites.insert(domain.clone(), normalized);
        Ok(domain)
    }

    pub fn remove_custom_domain(&mut self, domain: &str) -> Result<Domain, EngineError> {
        let domain = Domain::parse(domain)?;
        self.custom_sites
            .remove(&domain)
            .map(|_| domain.clone())
            .ok_or_else(|| EngineError::NotFound(domain.to_string()))
    }

    pub fn add_allowed_domain(&mut self, domain: &str) -> Result<Domain, EngineError> {
        let domain = Domain::parse(domain)?;
        if !self.allowed_sites.insert(domain.clone()) {
            return Err(EngineError::AlreadyExists(domain.to_string()));
        }
        Ok(domain)
    }

    pub fn remove_allowed_domain(&mut self, domain: &str) -> Result<Domain, EngineError> {
        let domain = Domain::parse(domain)?;
        if !self.allowed_sites.remove(&domain) {
            return Err(EngineError::NotFound(domain.to_string()));
        }
        Ok(domain)
    }

    /// Approve a channel given as a channel URL or a bare identifier
    pub fn add_allowed_channel(&mut self, channel: &str) -> Result<ChannelId, EngineError> {
        let channel = ChannelId::parse(channel)?;
        if !self.allowed_channels.insert(channel.clone()) {
            return Err(EngineError::AlreadyExists(channel.to_string()));
        }
        Ok(channel)
    }

    pub fn remove_allowed_channel(&mut self, channel: &str) -> Result<ChannelId, EngineError> {
        let channel = ChannelId::parse(channel)?;
        if !self.allowed_channels.remove(&channel) {
            return Err(EngineError::NotFound(channel.to_string()));
        }
        Ok(channel)
    }

    /// Defaults overlaid with custom blocks, minus every domain in `allowed`.
    ///
    /// A custom entry for a default domain replaces the default path list.
    pub fn effective_block_set(&self, allowed: &[Domain]) -> EffectiveBlockSet {
        let mut merged = self.default_blocks.clone();
        for (domain, paths) in &self.custom_sites {
            merged.insert(domain.clone(), paths.clone());
        }
        merged
            .into_iter()
            .filter(|(domain, _)| !allowed.contains(domain))
            .collect()
    }

    pub fn view(&self, editable: bool) -> PolicyView {
        PolicyView {
            default_blocks: self.default_blocks.clone(),
            custom_sites: self.custom_sites.clone(),
            allowed_sites: self.allowed_sites(),
            allowed_channels: self.allowed_channels(),
            notifications: self.notifications,
            editable,
        }
    }
}
