//! Address Scorer - similarity between two addresses on a 0-100 scale
//!
//! Every strategy normalizes both inputs first and scores 0 when either side
//! is empty afterwards. 100 means identical after normalization.

use crate::normalize::normalize_address;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use strsim::jaro_winkler;

pub trait AddressScorer: Send + Sync {
    /// `a` is the input row's address, `b` the candidate's.
    fn score(&self, a: &str, b: &str) -> u8;

    fn name(&self) -> &'static str;
}

/// Selectable scoring strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    TokenSet,
    CharOverlap,
    CharOverlapSymmetric,
    JaroWinkler,
}

impl ScorerKind {
    pub fn build(self) -> Box<dyn AddressScorer> {
        match self {
            ScorerKind::TokenSet => Box::new(TokenSetScorer),
            ScorerKind::CharOverlap => Box::new(CharOverlapScorer::asymmetric()),
            ScorerKind::CharOverlapSymmetric => Box::new(CharOverlapScorer::symmetric()),
            ScorerKind::JaroWinkler => Box::new(JaroWinklerScorer),
        }
    }
}

impl FromStr for ScorerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "token_set" => Ok(ScorerKind::TokenSet),
            "char_overlap" => Ok(ScorerKind::CharOverlap),
            "char_overlap_symmetric" => Ok(ScorerKind::CharOverlapSymmetric),
            "jaro_winkler" => Ok(ScorerKind::JaroWinkler),
            other => Err(format!(
                "unknown scorer '{}' (expected token_set, char_overlap, char_overlap_symmetric or jaro_winkler)",
                other
            )),
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScorerKind::TokenSet => "token_set",
            ScorerKind::CharOverlap => "char_overlap",
            ScorerKind::CharOverlapSymmetric => "char_overlap_symmetric",
            ScorerKind::JaroWinkler => "jaro_winkler",
        };
        f.write_str(name)
    }
}

fn normalized_pair(a: &str, b: &str) -> Option<(String, String)> {
    let a = normalize_address(a);
    let b = normalize_address(b);
    if a.is_empty() || b.is_empty() {
        None
    } else {
        Some((a, b))
    }
}

/// Token-set ratio: shared tokens are compared against each side's full
/// token list, so reordering and extra tokens on one side are forgiven.
/// Scores are truncated, so a raw 79.9 stays below an 80 threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetScorer;

impl AddressScorer for TokenSetScorer {
    fn score(&self, a: &str, b: &str) -> u8 {
        match normalized_pair(a, b) {
            Some((a, b)) => token_set_ratio(&a, &b).floor() as u8,
            None => 0,
        }
    }

    fn name(&self) -> &'static str {
        "token_set"
    }
}

/// Distinct-character overlap.
///
/// The asymmetric form divides by the distinct characters of `a` only; the
/// symmetric form divides by the union of both sides.
#[derive(Debug, Clone, Copy)]
pub struct CharOverlapScorer {
    symmetric: bool,
}

impl CharOverlapScorer {
    pub fn asymmetric() -> Self {
        Self { symmetric: false }
    }

    pub fn symmetric() -> Self {
        Self { symmetric: true }
    }
}

impl AddressScorer for CharOverlapScorer {
    fn score(&self, a: &str, b: &str) -> u8 {
        let Some((a, b)) = normalized_pair(a, b) else {
            return 0;
        };
        let chars_a: HashSet<char> = a.chars().collect();
        let chars_b: HashSet<char> = b.chars().collect();
        let common = chars_a.intersection(&chars_b).count();
        let denominator = if self.symmetric {
            chars_a.union(&chars_b).count()
        } else {
            chars_a.len()
        };
        (100 * common / denominator.max(1)) as u8
    }

    fn name(&self) -> &'static str {
        if self.symmetric {
            "char_overlap_symmetric"
        } else {
            "char_overlap"
        }
    }
}

/// Jaro-Winkler similarity, scaled and truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinklerScorer;

impl AddressScorer for JaroWinklerScorer {
    fn score(&self, a: &str, b: &str) -> u8 {
        match normalized_pair(a, b) {
            Some((a, b)) => (jaro_winkler(&a, &b) * 100.0).floor().clamp(0.0, 100.0) as u8,
            None => 0,
        }
    }

    fn name(&self) -> &'static str {
        "jaro_winkler"
    }
}

/// Indel similarity: `100 * 2 * LCS / (len(a) + len(b))`, over chars.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Token-set ratio over whitespace-separated tokens, 0.0-100.0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).sorted().join(" ");
    let only_a = tokens_a.difference(&tokens_b).sorted().join(" ");
    let only_b = tokens_b.difference(&tokens_a).sorted().join(" ");

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let combined_a = format!("{} {}", intersection, only_a).trim().to_string();
    let combined_b = format!("{} {}", intersection, only_b).trim().to_string();

    let mut best = indel_ratio(&combined_a, &combined_b);
    if !intersection.is_empty() {
        best = best
            .max(indel_ratio(&intersection, &combined_a))
            .max(indel_ratio(&intersection, &combined_b));
    }
    best
}
