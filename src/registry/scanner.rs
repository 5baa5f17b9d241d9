//! Registry Scanner - Streams (identifier, name, address) rows out of the feed

use crate::config::FeedLayout;
use crate::error::{LinkError, Result};
use crate::normalize::{normalize_name, NormalizedKey};
use crate::registry::decode::{malformed_input, DecodingReader};
use crate::registry::feed::FeedSource;
use crate::registry::RegistryEntry;
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::Encoding;
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, info};

/// Registry identifiers are exactly 13 ASCII digits.
pub const IDENTIFIER_LEN: usize = 13;

/// Full-width digits are rejected even though they count as digits in Unicode.
pub fn is_valid_identifier(s: &str) -> bool {
    s.len() == IDENTIFIER_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

/// Row counters for one pass over the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub rows_read: u64,
    pub accepted: u64,
    /// Too few columns or a malformed identifier.
    pub skipped: u64,
    /// Dropped by the needed-key prefilter.
    pub filtered: u64,
}

pub struct RegistryScanner {
    layout: FeedLayout,
    needed: Option<HashSet<NormalizedKey>>,
}

impl RegistryScanner {
    pub fn new(layout: FeedLayout) -> Self {
        Self { layout, needed: None }
    }

    /// Only emit rows whose normalized name is in `needed`.
    ///
    /// Purely an optimization: the candidate index applies the same filter.
    pub fn with_needed_keys(mut self, needed: HashSet<NormalizedKey>) -> Self {
        self.needed = Some(needed);
        self
    }

    pub fn primary_encoding(&self) -> Result<&'static Encoding> {
        lookup_encoding(&self.layout.primary_encoding)
    }

    pub fn fallback_encoding(&self) -> Result<&'static Encoding> {
        lookup_encoding(&self.layout.fallback_encoding)
    }

    /// Start a lazy pass over `source`, decoding it as `encoding`.
    pub fn scan<'a>(
        &'a self,
        source: &'a dyn FeedSource,
        encoding: &'static Encoding,
    ) -> Result<RegistryRows<'a>> {
        info!("Scanning registry feed {} as {}", source.describe(), encoding.name());
        let reader = source.open()?;
        let csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(DecodingReader::new(reader, encoding));

        Ok(RegistryRows {
            scanner: self,
            csv,
            record: StringRecord::new(),
            encoding,
            use_address: None,
            stats: ScanStats::default(),
            done: false,
        })
    }
}

fn lookup_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| LinkError::Config(format!("Unknown encoding label: {}", label)))
}

/// Lazy sequence of registry rows. Ends after the first error.
pub struct RegistryRows<'a> {
    scanner: &'a RegistryScanner,
    csv: csv::Reader<DecodingReader<Box<dyn Read + 'a>>>,
    record: StringRecord,
    encoding: &'static Encoding,
    /// Decided from the width of the first record.
    use_address: Option<bool>,
    stats: ScanStats,
    done: bool,
}

impl<'a> RegistryRows<'a> {
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    fn extract(&mut self) -> Option<RegistryEntry> {
        let scanner = self.scanner;
        let layout = &scanner.layout;
        let use_address = *self
            .use_address
            .get_or_insert_with(|| self.record.len() >= layout.address_width());

        if self.record.len() < layout.required_width() {
            self.stats.skipped += 1;
            return None;
        }

        let identifier = &self.record[layout.id_column];
        if !is_valid_identifier(identifier) {
            self.stats.skipped += 1;
            return None;
        }

        let name = &self.record[layout.name_column];
        if let Some(needed) = &scanner.needed {
            if !needed.contains(&normalize_name(name)) {
                self.stats.filtered += 1;
                return None;
            }
        }

        let address = if use_address {
            layout
                .address_columns
                .iter()
                .map(|&idx| self.record.get(idx).unwrap_or(""))
                .collect::<String>()
        } else {
            String::new()
        };

        self.stats.accepted += 1;
        Some(RegistryEntry {
            identifier: identifier.to_string(),
            name: name.to_string(),
            address,
        })
    }

    fn decode_error(&self, err: csv::Error) -> LinkError {
        let detail = match err.kind() {
            csv::ErrorKind::Io(io_err) => malformed_input(io_err).map(|m| m.to_string()),
            csv::ErrorKind::Utf8 { err: utf8, .. } => Some(utf8.to_string()),
            _ => None,
        };
        match detail {
            Some(detail) => LinkError::DecodeFailure {
                encoding: self.encoding.name().to_string(),
                detail,
            },
            None => LinkError::Csv(err),
        }
    }
}

impl<'a> Iterator for RegistryRows<'a> {
    type Item = Result<RegistryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.csv.read_record(&mut self.record) {
                Ok(true) => {
                    self.stats.rows_read += 1;
                    // chunk_size 0 disables progress logs.
                    if self.stats.rows_read.checked_rem(self.scanner.layout.chunk_size as u64) == Some(0) {
                        debug!(
                            "Scanned {} registry rows ({} accepted)",
                            self.stats.rows_read, self.stats.accepted
                        );
                    }
                    if let Some(entry) = self.extract() {
                        return Some(Ok(entry));
                    }
                }
                Ok(false) => {
                    self.done = true;
                    info!(
                        "Registry scan finished: {} rows, {} accepted, {} skipped, {} filtered",
                        self.stats.rows_read, self.stats.accepted, self.stats.skipped, self.stats.filtered
                    );
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(self.decode_error(err)));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::feed::MemoryFeed;
    use encoding_rs::{SHIFT_JIS, UTF_8};

    fn row(id: &str, name: &str, pref: &str, city: &str, rest: &str) -> String {
        format!("1,{},2,3,4,5,{},7,8,{},{},{}\n", id, name, pref, city, rest)
    }

    fn collect(scanner: &RegistryScanner, feed: &MemoryFeed) -> Vec<RegistryEntry> {
        scanner
            .scan(feed, UTF_8)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_identifier_shape() {
        assert!(is_valid_identifier("1234567890123"));
        assert!(!is_valid_identifier("123456789012"));
        assert!(!is_valid_identifier("12345678901234"));
        assert!(!is_valid_identifier("12345678901a3"));
        assert!(!is_valid_identifier("１２３４５６７８９０１２３"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_scan_concatenates_address_and_drops_bad_ids() {
        let feed = MemoryFeed::new(
            "mem",
            [
                row("1234567890123", "株式会社ＡＢＣ", "東京都", "千代田区", "丸の内1-1"),
                row("123456789012", "短い番号", "東京都", "港区", "1"),
                "1,9999999999999\n".to_string(),
                row("2222222222222", "XYZ", "大阪府", "大阪市", ""),
            ]
            .concat(),
        );
        let scanner = RegistryScanner::new(FeedLayout::default());
        let mut rows = scanner.scan(&feed, UTF_8).unwrap();
        let entries: Vec<_> = rows.by_ref().map(|r| r.unwrap()).collect();

        assert_eq!(
            entries,
            vec![
                RegistryEntry {
                    identifier: "1234567890123".to_string(),
                    name: "株式会社ＡＢＣ".to_string(),
                    address: "東京都千代田区丸の内1-1".to_string(),
                },
                RegistryEntry {
                    identifier: "2222222222222".to_string(),
                    name: "XYZ".to_string(),
                    address: "大阪府大阪市".to_string(),
                },
            ]
        );
        assert_eq!(
            rows.stats(),
            ScanStats { rows_read: 4, accepted: 2, skipped: 2, filtered: 0 }
        );
    }

    #[test]
    fn test_narrow_feed_has_empty_addresses() {
        let feed = MemoryFeed::new("mem", "0,1234567890123,a,b,c,d,ABC\n0,2222222222222,a,b,c,d,XYZ,x,y,z,w,v\n");
        let scanner = RegistryScanner::new(FeedLayout::default());
        let entries = collect(&scanner, &feed);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.address.is_empty()));
    }

    #[test]
    fn test_prefilter_keeps_only_needed_names() {
        let feed = MemoryFeed::new(
            "mem",
            [
                row("1111111111111", "ABC株式会社", "東京都", "", ""),
                row("2222222222222", "DEF", "東京都", "", ""),
            ]
            .concat(),
        );
        let needed: HashSet<_> = ["ABC".to_string()].into_iter().collect();
        let scanner = RegistryScanner::new(FeedLayout::default()).with_needed_keys(needed);
        let entries = collect(&scanner, &feed);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, "1111111111111");
    }

    #[test]
    fn test_shift_jis_feed_fails_as_utf8_and_reads_as_fallback() {
        let text = row("1234567890123", "テスト商事株式会社", "東京都", "新宿区", "西新宿2-8-1");
        let (bytes, _, _) = SHIFT_JIS.encode(&text);
        let feed = MemoryFeed::new("sjis", bytes.into_owned());
        let scanner = RegistryScanner::new(FeedLayout::default());

        let first = scanner.scan(&feed, UTF_8).unwrap().next().unwrap();
        assert!(matches!(first, Err(LinkError::DecodeFailure { .. })));

        let fallback = scanner.fallback_encoding().unwrap();
        let entries: Vec<_> = scanner
            .scan(&feed, fallback)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries[0].name, "テスト商事株式会社");
        assert_eq!(entries[0].address, "東京都新宿区西新宿2-8-1");
    }

    #[test]
    fn test_zero_chunk_size_scans_without_progress_logs() {
        let layout = FeedLayout {
            chunk_size: 0,
            ..FeedLayout::default()
        };
        let scanner = RegistryScanner::new(layout);
        let feed = MemoryFeed::new("mem", row("1234567890123", "ABC", "東京都", "港区", "1"));
        let entries = collect(&scanner, &feed);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, "1234567890123");
    }

    #[test]
    fn test_rows_end_after_error() {
        let feed = MemoryFeed::new("bad", vec![0x30, 0x2c, 0x8a, 0x94, b'\n']);
        let scanner = RegistryScanner::new(FeedLayout::default());
        let mut rows = scanner.scan(&feed, UTF_8).unwrap();
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }
}
