//! Workbook - CSV-per-sheet stand-in for the source spreadsheet
//!
//! A workbook is a directory with one `<sheet name>.csv` per sheet, each with
//! a header row. Data rows are numbered from 1, the row after the header.

use crate::config::SheetLayout;
use crate::error::{LinkError, Result};
use crate::resolver::{InputRow, ResolutionResult};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Header of the unresolved-row report.
pub const UNMATCHED_HEADERS: [&str; 4] = ["行番号", "企業名(C列)", "企業所在地(H列)", "付与状況"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut wtr = WriterBuilder::new().flexible(true).from_path(path)?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Cell at (1-based data row, 0-based column); `None` when absent or blank.
    pub fn cell(&self, row_number: usize, column: usize) -> Option<&str> {
        row_number
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .and_then(|row| row.get(column))
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Rows at or after `start_row`, reduced to name and address.
    pub fn input_rows(&self, layout: &SheetLayout) -> Vec<InputRow> {
        (layout.start_row..=self.rows.len())
            .map(|row_number| {
                InputRow::new(
                    row_number,
                    self.cell(row_number, layout.name_column),
                    self.cell(row_number, layout.address_column),
                )
            })
            .collect()
    }

    /// Copy of the sheet with identifiers written into the target column.
    ///
    /// Rows without a result (including those before `start_row`) get an
    /// empty value there.
    pub fn annotate(&self, results: &[ResolutionResult], layout: &SheetLayout) -> Sheet {
        let by_row: HashMap<usize, &str> = results
            .iter()
            .map(|r| (r.row_index, r.identifier_or_empty()))
            .collect();
        let target = layout.target_column;

        let mut sheet = self.clone();
        if layout.overwrite {
            if sheet.headers.len() <= target {
                sheet.headers.resize(target + 1, String::new());
            }
        } else {
            if sheet.headers.len() < target {
                sheet.headers.resize(target, String::new());
            }
            sheet.headers.insert(target, layout.inserted_header.clone());
        }

        for (i, row) in sheet.rows.iter_mut().enumerate() {
            let value = by_row.get(&(i + 1)).copied().unwrap_or("").to_string();
            if layout.overwrite {
                if row.len() <= target {
                    row.resize(target + 1, String::new());
                }
                row[target] = value;
            } else {
                if row.len() < target {
                    row.resize(target, String::new());
                }
                row.insert(target, value);
            }
        }
        sheet
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Load every `*.csv` in `dir`, in name order.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(LinkError::MissingInputResource(dir.to_path_buf()));
        }
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map_or(false, |e| e.eq_ignore_ascii_case("csv")))
            .collect();
        paths.sort();

        let mut sheets = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            sheets.push(Sheet::load(&name, &path)?);
        }
        info!("Loaded workbook {} with {} sheet(s)", dir.display(), sheets.len());
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| LinkError::MissingSheet(name.to_string()))
    }

    /// Swap in `sheet` for the sheet of the same name, or append it.
    pub fn replace_sheet(&mut self, sheet: Sheet) {
        match self.sheets.iter_mut().find(|s| s.name == sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for sheet in &self.sheets {
            sheet.save(&dir.join(format!("{}.csv", sheet.name)))?;
        }
        Ok(())
    }
}

/// Write the rows left without an identifier, reading the name and address
/// from the original sheet. Nothing is written when every row resolved.
/// Returns the number of rows reported.
pub fn write_unmatched_report(
    path: &Path,
    original: &Sheet,
    results: &[ResolutionResult],
    layout: &SheetLayout,
) -> Result<usize> {
    let unmatched: Vec<&ResolutionResult> = results.iter().filter(|r| r.identifier.is_none()).collect();
    if unmatched.is_empty() {
        return Ok(0);
    }

    let mut file = File::create(path)?;
    // BOM so spreadsheet tools pick UTF-8.
    file.write_all("\u{feff}".as_bytes())?;
    let mut wtr = WriterBuilder::new().from_writer(file);
    wtr.write_record(UNMATCHED_HEADERS)?;
    for result in &unmatched {
        let row_number = result.row_index.to_string();
        let status = result.status.to_string();
        wtr.write_record([
            row_number.as_str(),
            original.cell(result.row_index, layout.name_column).unwrap_or(""),
            original.cell(result.row_index, layout.address_column).unwrap_or(""),
            status.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(unmatched.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionStatus;
    use std::fs;

    fn layout() -> SheetLayout {
        SheetLayout {
            sheet_name: "targets".to_string(),
            start_row: 2,
            name_column: 1,
            address_column: 2,
            target_column: 3,
            overwrite: true,
            inserted_header: "法人番号".to_string(),
        }
    }

    fn sheet() -> Sheet {
        Sheet {
            name: "targets".to_string(),
            headers: vec!["no".into(), "name".into(), "address".into(), "old".into()],
            rows: vec![
                vec!["1".into(), "title row".into(), "".into(), "keep?".into()],
                vec!["2".into(), "ABC株式会社".into(), "東京都".into(), "x".into()],
                vec!["3".into(), "".into(), "大阪府".into()],
            ],
        }
    }

    fn results() -> Vec<ResolutionResult> {
        vec![
            ResolutionResult {
                row_index: 2,
                identifier: Some("1234567890123".into()),
                status: ResolutionStatus::UniqueMatch,
            },
            ResolutionResult {
                row_index: 3,
                identifier: None,
                status: ResolutionStatus::NameMissing,
            },
        ]
    }

    #[test]
    fn test_input_rows_start_at_configured_row() {
        let rows = sheet().input_rows(&layout());
        assert_eq!(
            rows,
            vec![
                InputRow::new(2, Some("ABC株式会社"), Some("東京都")),
                InputRow::new(3, None, Some("大阪府")),
            ]
        );
    }

    #[test]
    fn test_annotate_overwrite() {
        let annotated = sheet().annotate(&results(), &layout());
        assert_eq!(annotated.headers, vec!["no", "name", "address", "old"]);
        assert_eq!(annotated.rows[0][3], "");
        assert_eq!(annotated.rows[1][3], "1234567890123");
        assert_eq!(annotated.rows[2], vec!["3", "", "大阪府", ""]);
    }

    #[test]
    fn test_annotate_overwrite_pads_narrow_sheet() {
        let mut layout = layout();
        layout.target_column = 5;
        let annotated = sheet().annotate(&results(), &layout);
        assert_eq!(annotated.headers.len(), 6);
        assert_eq!(annotated.rows[1][5], "1234567890123");
        assert_eq!(annotated.rows[1][3], "x");
    }

    #[test]
    fn test_annotate_insert() {
        let mut layout = layout();
        layout.overwrite = false;
        let annotated = sheet().annotate(&results(), &layout);
        assert_eq!(annotated.headers, vec!["no", "name", "address", "法人番号", "old"]);
        assert_eq!(annotated.rows[1], vec!["2", "ABC株式会社", "東京都", "1234567890123", "x"]);
        assert_eq!(annotated.rows[2], vec!["3", "", "大阪府", ""]);
    }

    #[test]
    fn test_workbook_round_trip_and_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("targets.csv"), "no,name\n1,ABC\n").unwrap();
        fs::write(dir.path().join("other.csv"), "a,b\n1,2\n").unwrap();

        let mut workbook = Workbook::load(dir.path()).unwrap();
        assert_eq!(workbook.sheets().len(), 2);
        assert!(matches!(workbook.sheet("missing"), Err(LinkError::MissingSheet(_))));

        let mut targets = workbook.sheet("targets").unwrap().clone();
        targets.rows[0][1] = "DEF".to_string();
        workbook.replace_sheet(targets);

        let out = dir.path().join("out");
        workbook.save(&out).unwrap();
        assert_eq!(fs::read_to_string(out.join("targets.csv")).unwrap(), "no,name\n1,DEF\n");
        assert_eq!(fs::read_to_string(out.join("other.csv")).unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn test_missing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workbook::load(&dir.path().join("absent")),
            Err(LinkError::MissingInputResource(_))
        ));
    }

    #[test]
    fn test_unmatched_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unmatched.csv");
        let written = write_unmatched_report(&path, &sheet(), &results(), &layout()).unwrap();
        assert_eq!(written, 1);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "\u{feff}行番号,企業名(C列),企業所在地(H列),付与状況\n3,,大阪府,企業名欠落\n"
        );
    }

    #[test]
    fn test_no_report_when_everything_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unmatched.csv");
        let all_resolved = vec![results()[0].clone()];
        assert_eq!(write_unmatched_report(&path, &sheet(), &all_resolved, &layout()).unwrap(), 0);
        assert!(!path.exists());
    }
}
