//! The set of domains a session redirects

use hostguard_util::Domain;
use std::collections::BTreeMap;

/// Domains to block with their blocked sub-paths, in sorted domain order.
///
/// An empty path list blocks the whole domain (plus its `www.` alias).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveBlockSet {
    entries: BTreeMap<Domain, Vec<String>>,
}

impl EffectiveBlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: Domain, paths: Vec<String>) {
        self.entries.insert(domain, paths);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.entries.contains_key(domain)
    }

    pub fn paths(&self, domain: &Domain) -> Option<&[String]> {
        self.entries.get(domain).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Domain, &[String])> {
        self.entries.iter().map(|(d, p)| (d, p.as_slice()))
    }
}

impl FromIterator<(Domain, Vec<String>)> for EffectiveBlockSet {
    fn from_iter<I: IntoIterator<Item = (Domain, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<Domain, Vec<String>>> for EffectiveBlockSet {
    fn from(entries: BTreeMap<Domain, Vec<String>>) -> Self {
        Self { entries }
    }
}
