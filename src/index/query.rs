//! Filtering the search index, and the root-id set derived from it

use super::builder::SearchIndexEntry;
use crate::graph::normalize_node_id;
use std::collections::{BTreeSet, HashSet};

/// Treat an APY above 1 as already a percent, otherwise as a fraction.
///
/// Lossy at exactly 1.0 (100% vs 1%); snapshots carry no unit field.
pub fn apy_as_percent(apy: f64) -> f64 {
    if apy > 1.0 {
        apy
    } else {
        apy * 100.0
    }
}

/// Filters over index entries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub protocol: Option<String>,
    pub chain: Option<String>,
    /// Exact curator name
    pub curator: Option<String>,
    /// Lower APY bound in percent
    pub apy_min: Option<f64>,
    /// Upper APY bound in percent
    pub apy_max: Option<f64>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    pub fn with_curator(mut self, curator: impl Into<String>) -> Self {
        self.curator = Some(curator.into());
        self
    }

    pub fn with_apy_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.apy_min = min.filter(|v| v.is_finite());
        self.apy_max = max.filter(|v| v.is_finite());
        self
    }

    fn scope_matches(&self, entry: &SearchIndexEntry) -> bool {
        let protocol_ok = non_blank(&self.protocol).map_or(true, |p| entry.protocol.eq_ignore_ascii_case(p));
        let chain_ok = non_blank(&self.chain).map_or(true, |c| entry.chain.eq_ignore_ascii_case(c));
        protocol_ok && chain_ok
    }

    pub fn matches(&self, entry: &SearchIndexEntry) -> bool {
        if !self.scope_matches(entry) {
            return false;
        }

        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            let haystack = format!(
                "{} {} {} {} {}",
                entry.name, entry.id, entry.node_id, entry.protocol, entry.chain
            )
            .to_lowercase();
            if !haystack.contains(&text.to_lowercase()) {
                return false;
            }
        }

        if self.apy_min.is_some() || self.apy_max.is_some() {
            let Some(apy) = entry.apy else {
                return false;
            };
            let percent = apy_as_percent(apy);
            if self.apy_min.is_some_and(|min| percent < min) || self.apy_max.is_some_and(|max| percent > max) {
                return false;
            }
        }

        match non_blank(&self.curator) {
            Some(curator) => entry.curator.as_deref() == Some(curator),
            None => true,
        }
    }

    pub fn apply<'a>(&self, entries: &'a [SearchIndexEntry]) -> Vec<&'a SearchIndexEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }

    /// Distinct protocols and chains over all entries; curators only within
    /// the current protocol/chain scope. All sorted.
    pub fn facets(&self, entries: &[SearchIndexEntry]) -> Facets {
        let protocols: BTreeSet<&str> = entries.iter().map(|e| e.protocol.as_str()).collect();
        let chains: BTreeSet<&str> = entries.iter().map(|e| e.chain.as_str()).collect();
        let curators: BTreeSet<&str> = entries
            .iter()
            .filter(|e| self.scope_matches(e))
            .filter_map(|e| e.curator.as_deref().map(str::trim))
            .filter(|c| !c.is_empty())
            .collect();

        Facets {
            protocols: protocols.into_iter().map(str::to_string).collect(),
            chains: chains.into_iter().map(str::to_string).collect(),
            curators: curators.into_iter().map(str::to_string).collect(),
        }
    }
}

/// Filter choices available for an index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub protocols: Vec<String>,
    pub chains: Vec<String>,
    pub curators: Vec<String>,
}

/// Normalized ids of every snapshot root known system-wide.
///
/// Built from one read of the search index and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootIdSet {
    ids: HashSet<String>,
}

impl RootIdSet {
    pub fn from_entries(entries: &[SearchIndexEntry]) -> Self {
        let ids = entries
            .iter()
            .map(|e| {
                let id = if e.node_id.as_str().trim().is_empty() {
                    &e.id
                } else {
                    &e.node_id
                };
                id.normalized()
            })
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(&normalize_node_id(id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<String> for RootIdSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter
                .into_iter()
                .map(|id| normalize_node_id(&id))
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }
}
