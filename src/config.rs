//! Run configuration
//!
//! Column positions, encodings and the resolution policy live here instead of
//! in module constants. A `LinkerConfig` is built once (defaults, optionally a
//! JSON file, then CLI overrides) and handed to the pipeline.

use crate::error::{LinkError, Result};
use crate::scorer::ScorerKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Column layout of the headerless registry feed (0-based indices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedLayout {
    pub id_column: usize,
    pub name_column: usize,
    /// Concatenated in order: prefecture, municipality, remainder.
    pub address_columns: Vec<usize>,
    /// Rows between progress reports.
    pub chunk_size: usize,
    pub primary_encoding: String,
    pub fallback_encoding: String,
    /// Explicit CSV to use inside a feed container; first `.csv` otherwise.
    pub file_name: Option<String>,
}

impl Default for FeedLayout {
    fn default() -> Self {
        Self {
            id_column: 1,
            name_column: 6,
            address_columns: vec![9, 10, 11],
            chunk_size: 200_000,
            primary_encoding: "UTF-8".to_string(),
            fallback_encoding: "Shift_JIS".to_string(),
            file_name: None,
        }
    }
}

impl FeedLayout {
    /// Minimum record width needed to read an identifier and a name.
    pub fn required_width(&self) -> usize {
        self.id_column.max(self.name_column) + 1
    }

    /// Minimum record width needed to read every address fragment.
    pub fn address_width(&self) -> usize {
        self.address_columns.iter().copied().max().map_or(0, |m| m + 1)
    }
}

/// Where the rows to resolve sit in the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub sheet_name: String,
    /// First data row (1-based, header excluded) to resolve.
    pub start_row: usize,
    pub name_column: usize,
    pub address_column: usize,
    pub target_column: usize,
    /// Replace the target column instead of inserting a new one.
    pub overwrite: bool,
    pub inserted_header: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            sheet_name: "アンケート送付先".to_string(),
            start_row: 23,
            name_column: 2,
            address_column: 7,
            target_column: 3,
            overwrite: true,
            inserted_header: "法人番号".to_string(),
        }
    }
}

/// Disambiguation policy constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPolicy {
    /// Minimum address score (0-100) for accepting one of several candidates.
    pub address_threshold: u8,
    /// Accept a lone candidate without looking at the address.
    pub trust_unique_name: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            address_threshold: 80,
            trust_unique_name: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    pub feed: FeedLayout,
    pub sheet: SheetLayout,
    pub policy: ResolutionPolicy,
    pub scorer: ScorerKind,
}

impl LinkerConfig {
    /// Load a JSON config file; absent keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: LinkerConfig = serde_json::from_str(&content)
            .map_err(|e| LinkError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.address_columns.is_empty() {
            return Err(LinkError::Config("feed.address_columns must not be empty".to_string()));
        }
        if self.feed.chunk_size == 0 {
            return Err(LinkError::Config("feed.chunk_size must be positive".to_string()));
        }
        if self.policy.address_threshold > 100 {
            return Err(LinkError::Config(format!(
                "policy.address_threshold must be within 0-100, got {}",
                self.policy.address_threshold
            )));
        }
        for label in [&self.feed.primary_encoding, &self.feed.fallback_encoding] {
            if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
                return Err(LinkError::Config(format!("Unknown encoding label: {}", label)));
            }
        }
        if self.sheet.start_row == 0 {
            return Err(LinkError::Config("sheet.start_row is 1-based".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_registry_layout() {
        let config = LinkerConfig::default();
        assert_eq!(config.feed.id_column, 1);
        assert_eq!(config.feed.name_column, 6);
        assert_eq!(config.feed.address_columns, vec![9, 10, 11]);
        assert_eq!(config.feed.required_width(), 7);
        assert_eq!(config.feed.address_width(), 12);
        assert_eq!(config.policy.address_threshold, 80);
        assert!(config.policy.trust_unique_name);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: LinkerConfig =
            serde_json::from_str(r#"{"policy": {"address_threshold": 90}, "sheet": {"overwrite": false}}"#)
                .unwrap();
        assert_eq!(config.policy.address_threshold, 90);
        assert!(config.policy.trust_unique_name);
        assert!(!config.sheet.overwrite);
        assert_eq!(config.sheet.start_row, 23);
        assert_eq!(config.feed, FeedLayout::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LinkerConfig::default();
        config.policy.address_threshold = 101;
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));

        let mut config = LinkerConfig::default();
        config.feed.fallback_encoding = "klingon".to_string();
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));

        let mut config = LinkerConfig::default();
        config.feed.address_columns.clear();
        assert!(config.validate().is_err());
    }
}
