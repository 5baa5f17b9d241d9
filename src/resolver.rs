//! Resolver - attaches a registry identifier to each input row
//!
//! Per row, independently of every other row:
//! 1. empty name key            -> `NameMissing`
//! 2. no candidates             -> `NoCandidate`
//! 3. one candidate (if trusted) -> `UniqueMatch`
//! 4. otherwise score addresses; the first maximal score wins and is
//!    accepted at or above the threshold.

use crate::candidates::CandidateIndex;
use crate::config::ResolutionPolicy;
use crate::normalize::{normalize_address_opt, normalize_name_opt, NormalizedKey};
use crate::scorer::AddressScorer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The fields of a source row that matter for resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRow {
    /// 1-based data row number in the source sheet.
    pub row_index: usize,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

impl InputRow {
    pub fn new(row_index: usize, company_name: Option<&str>, company_address: Option<&str>) -> Self {
        Self {
            row_index,
            company_name: company_name.map(str::to_string),
            company_address: company_address.map(str::to_string),
        }
    }

    pub fn name_key(&self) -> NormalizedKey {
        normalize_name_opt(self.company_name.as_deref())
    }

    pub fn address_key(&self) -> NormalizedKey {
        normalize_address_opt(self.company_address.as_deref())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStatus {
    NameMissing,
    NoCandidate,
    UniqueMatch,
    AddressScoredMatch(u8),
    AmbiguousInsufficientAddress(u8),
}

impl ResolutionStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            ResolutionStatus::UniqueMatch | ResolutionStatus::AddressScoredMatch(_)
        )
    }
}

/// Labels used in the unresolved-row report.
impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStatus::NameMissing => write!(f, "企業名欠落"),
            ResolutionStatus::NoCandidate => write!(f, "候補なし"),
            ResolutionStatus::UniqueMatch => write!(f, "一意一致"),
            ResolutionStatus::AddressScoredMatch(score) => write!(f, "複数→住所スコア{}採用", score),
            ResolutionStatus::AmbiguousInsufficientAddress(max) => {
                write!(f, "複数候補（住所不十分, max={}）", max)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub row_index: usize,
    pub identifier: Option<String>,
    pub status: ResolutionStatus,
}

impl ResolutionResult {
    fn unresolved(row_index: usize, status: ResolutionStatus) -> Self {
        Self { row_index, identifier: None, status }
    }

    fn resolved(row_index: usize, identifier: &str, status: ResolutionStatus) -> Self {
        Self {
            row_index,
            identifier: Some(identifier.to_string()),
            status,
        }
    }

    /// Identifier or the empty string.
    pub fn identifier_or_empty(&self) -> &str {
        self.identifier.as_deref().unwrap_or("")
    }
}

pub struct Resolver {
    policy: ResolutionPolicy,
    scorer: Box<dyn AddressScorer>,
}

impl Resolver {
    pub fn new(policy: ResolutionPolicy, scorer: Box<dyn AddressScorer>) -> Self {
        Self { policy, scorer }
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn resolve(&self, row: &InputRow, index: &CandidateIndex) -> ResolutionResult {
        let name_key = row.name_key();
        if name_key.is_empty() {
            return ResolutionResult::unresolved(row.row_index, ResolutionStatus::NameMissing);
        }

        let candidates = match index.candidates(&name_key) {
            Some(c) if !c.is_empty() => c,
            _ => return ResolutionResult::unresolved(row.row_index, ResolutionStatus::NoCandidate),
        };

        if candidates.len() == 1 && self.policy.trust_unique_name {
            if let Some((identifier, _)) = candidates.first() {
                return ResolutionResult::resolved(row.row_index, identifier, ResolutionStatus::UniqueMatch);
            }
        }

        let address_key = row.address_key();
        let mut best: Option<(&str, u8)> = None;
        for (identifier, candidate_address) in candidates {
            let score = self.scorer.score(&address_key, candidate_address);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((identifier.as_str(), score));
            }
        }

        match best {
            Some((identifier, score)) if score >= self.policy.address_threshold => {
                debug!(
                    "Row {}: {} candidates for {}, took {} at score {}",
                    row.row_index,
                    candidates.len(),
                    name_key,
                    identifier,
                    score
                );
                ResolutionResult::resolved(
                    row.row_index,
                    identifier,
                    ResolutionStatus::AddressScoredMatch(score),
                )
            }
            Some((_, score)) => ResolutionResult::unresolved(
                row.row_index,
                ResolutionStatus::AmbiguousInsufficientAddress(score),
            ),
            None => ResolutionResult::unresolved(row.row_index, ResolutionStatus::NoCandidate),
        }
    }

    pub fn resolve_all<'r, I>(&self, rows: I, index: &CandidateIndex) -> Vec<ResolutionResult>
    where
        I: IntoIterator<Item = &'r InputRow>,
    {
        rows.into_iter().map(|row| self.resolve(row, index)).collect()
    }
}
