//! Linker - end-to-end run over a workbook and a registry feed
//!
//! sheet rows -> needed name keys -> registry scan -> candidate index ->
//! resolver -> annotated workbook + unresolved report

use crate::candidates::CandidateIndex;
use crate::config::LinkerConfig;
use crate::error::{LinkError, Result};
use crate::normalize::NormalizedKey;
use crate::registry::{open_feed, FeedSource, RegistryScanner};
use crate::resolver::{InputRow, ResolutionResult, ResolutionStatus, Resolver};
use crate::workbook::{write_unmatched_report, Workbook};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where a run writes its results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub workbook_dir: PathBuf,
    pub unmatched_report: PathBuf,
}

impl OutputPaths {
    /// `<workbook>_法人番号付与/` and `<workbook>_未マッチ一覧.csv` next to the input.
    pub fn beside(workbook_dir: &Path) -> Self {
        let stem = workbook_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook".to_string());
        let parent = workbook_dir.parent().unwrap_or_else(|| Path::new("."));
        Self {
            workbook_dir: parent.join(format!("{}_法人番号付与", stem)),
            unmatched_report: parent.join(format!("{}_未マッチ一覧.csv", stem)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique or address-scored matches.
    pub resolved: usize,
    /// Several candidates, no address good enough.
    pub ambiguous: usize,
    /// No candidate or no name.
    pub unresolved: usize,
    pub output_dir: Option<PathBuf>,
    /// Set only when the report was written.
    pub unmatched_report: Option<PathBuf>,
    pub overwrite: bool,
}

impl RunSummary {
    pub fn from_results(results: &[ResolutionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                status if status.is_resolved() => summary.resolved += 1,
                ResolutionStatus::AmbiguousInsufficientAddress(_) => summary.ambiguous += 1,
                _ => summary.unresolved += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.resolved + self.ambiguous + self.unresolved
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Resolved (unique name or address score): {}", self.resolved)?;
        writeln!(f, "Ambiguous (several candidates): {}", self.ambiguous)?;
        writeln!(f, "No candidate / name missing: {}", self.unresolved)?;
        if let Some(dir) = &self.output_dir {
            writeln!(f, "Output workbook: {}", dir.display())?;
        }
        if let Some(report) = &self.unmatched_report {
            writeln!(f, "Unmatched rows: {}", report.display())?;
        }
        write!(
            f,
            "Target column mode: {}",
            if self.overwrite { "overwrite" } else { "insert" }
        )
    }
}

pub struct Linker {
    config: LinkerConfig,
    resolver: Resolver,
}

impl Linker {
    pub fn new(config: LinkerConfig) -> Result<Self> {
        config.validate()?;
        let resolver = Resolver::new(config.policy, config.scorer.build());
        Ok(Self { config, resolver })
    }

    /// Resolve `rows` against the registry in `feed`.
    pub fn link_rows(&self, rows: &[InputRow], feed: &dyn FeedSource) -> Result<Vec<ResolutionResult>> {
        let needed: HashSet<NormalizedKey> = rows
            .iter()
            .map(InputRow::name_key)
            .filter(|key| !key.is_empty())
            .collect();
        info!("{} rows, {} distinct names to look up", rows.len(), needed.len());

        let scanner = RegistryScanner::new(self.config.feed.clone()).with_needed_keys(needed.clone());
        let index = CandidateIndex::build_from_feed(feed, &scanner, &needed)?;

        info!("Resolving with {} scorer", self.resolver.scorer_name());
        Ok(self.resolver.resolve_all(rows, &index))
    }

    /// Full batch run. Both inputs are checked before any work starts.
    pub fn run(&self, workbook_dir: &Path, feed_path: &Path, outputs: &OutputPaths) -> Result<RunSummary> {
        for path in [workbook_dir, feed_path] {
            if !path.exists() {
                return Err(LinkError::MissingInputResource(path.to_path_buf()));
            }
        }

        let layout = &self.config.sheet;
        let mut workbook = Workbook::load(workbook_dir)?;
        let sheet = workbook.sheet(&layout.sheet_name)?.clone();
        let feed = open_feed(feed_path, self.config.feed.file_name.as_deref())?;

        let rows = sheet.input_rows(layout);
        let results = self.link_rows(&rows, &*feed)?;

        workbook.replace_sheet(sheet.annotate(&results, layout));
        workbook.save(&outputs.workbook_dir)?;
        let reported = write_unmatched_report(&outputs.unmatched_report, &sheet, &results, layout)?;

        let mut summary = RunSummary::from_results(&results);
        summary.output_dir = Some(outputs.workbook_dir.clone());
        summary.unmatched_report = (reported > 0).then(|| outputs.unmatched_report.clone());
        summary.overwrite = layout.overwrite;
        info!(
            "Run complete: {} resolved, {} ambiguous, {} unresolved",
            summary.resolved, summary.ambiguous, summary.unresolved
        );
        Ok(summary)
    }
}
