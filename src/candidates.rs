//! Candidate Index - normalized name -> {identifier -> best known address}
//!
//! Only names some input row needs are kept, so the index grows with the
//! input sheet rather than with the registry.

use crate::error::Result;
use crate::normalize::{normalize_name, NormalizedKey};
use crate::registry::{FeedSource, RegistryEntry, RegistryScanner};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Candidates for one name key, in first-seen order.
pub type Candidates = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateIndex {
    by_name: HashMap<NormalizedKey, Candidates>,
}

impl CandidateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identifier -> address` under `key`.
    ///
    /// A repeated identifier keeps the longer address; on equal length the
    /// stored one stays.
    pub fn insert(&mut self, key: NormalizedKey, identifier: String, address: String) {
        let candidates = self.by_name.entry(key).or_default();
        match candidates.get_mut(&identifier) {
            Some(existing) => {
                if address.chars().count() > existing.chars().count() {
                    *existing = address;
                }
            }
            None => {
                candidates.insert(identifier, address);
            }
        }
    }

    /// Candidates for `key`; `None` when the registry had none.
    pub fn candidates(&self, key: &str) -> Option<&Candidates> {
        self.by_name.get(key)
    }

    /// Number of distinct name keys with at least one candidate.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Total (name key, identifier) pairs.
    pub fn pair_count(&self) -> usize {
        self.by_name.values().map(|c| c.len()).sum()
    }

    /// Build from registry entries, keeping names in `needed`.
    pub fn build<I>(entries: I, needed: &HashSet<NormalizedKey>) -> Self
    where
        I: IntoIterator<Item = RegistryEntry>,
    {
        let mut index = Self::new();
        for entry in entries {
            index.add_entry(entry, needed);
        }
        index
    }

    /// Like [`CandidateIndex::build`], stopping at the first scan error.
    pub fn try_build<I>(entries: I, needed: &HashSet<NormalizedKey>) -> Result<Self>
    where
        I: IntoIterator<Item = Result<RegistryEntry>>,
    {
        let mut index = Self::new();
        for entry in entries {
            index.add_entry(entry?, needed);
        }
        Ok(index)
    }

    /// Scan `source` under the primary encoding; if that fails to decode,
    /// discard everything and rescan once under the fallback encoding.
    pub fn build_from_feed(
        source: &dyn FeedSource,
        scanner: &RegistryScanner,
        needed: &HashSet<NormalizedKey>,
    ) -> Result<Self> {
        let primary = scanner.primary_encoding()?;
        let index = match Self::try_build(scanner.scan(source, primary)?, needed) {
            Err(e) if e.is_decode_failure() => {
                let fallback = scanner.fallback_encoding()?;
                warn!("{}; rescanning registry feed as {}", e, fallback.name());
                Self::try_build(scanner.scan(source, fallback)?, needed)?
            }
            other => other?,
        };
        info!(
            "Candidate index: {} of {} needed names found, {} candidates",
            index.len(),
            needed.len(),
            index.pair_count()
        );
        Ok(index)
    }

    fn add_entry(&mut self, entry: RegistryEntry, needed: &HashSet<NormalizedKey>) {
        let key = normalize_name(&entry.name);
        if needed.contains(&key) {
            self.insert(key, entry.identifier, entry.address);
        }
    }
}
