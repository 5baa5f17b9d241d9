//! Feed Source - Where the registry bytes come from
//!
//! A feed must be re-openable: the decode fallback rescans it from the start.

use crate::error::{LinkError, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Re-openable byte stream of the headerless registry CSV.
pub trait FeedSource {
    /// Open a fresh reader positioned at the first byte.
    fn open(&self) -> Result<Box<dyn Read + '_>>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// A single CSV file on disk.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(LinkError::MissingInputResource(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedSource for FileFeed {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A container directory holding the bulk CSV among other files.
///
/// The explicitly named file wins; otherwise the first `*.csv` in name order.
pub struct DirectoryFeed {
    dir: PathBuf,
    selected: FileFeed,
}

impl DirectoryFeed {
    pub fn new(dir: impl Into<PathBuf>, file_name: Option<&str>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(LinkError::MissingInputResource(dir));
        }

        let selected = match file_name {
            Some(name) => dir.join(name),
            None => {
                let mut csv_files: Vec<PathBuf> = std::fs::read_dir(&dir)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && has_csv_extension(p))
                    .collect();
                csv_files.sort();
                csv_files
                    .into_iter()
                    .next()
                    .ok_or_else(|| LinkError::MissingFeedFile(dir.clone()))?
            }
        };
        info!("Using registry feed {} from {}", selected.display(), dir.display());

        Ok(Self {
            selected: FileFeed::new(selected)?,
            dir,
        })
    }

    pub fn selected(&self) -> &Path {
        self.selected.path()
    }
}

impl FeedSource for DirectoryFeed {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        self.selected.open()
    }

    fn describe(&self) -> String {
        format!("{} (in {})", self.selected.describe(), self.dir.display())
    }
}

/// In-memory feed bytes.
pub struct MemoryFeed {
    label: String,
    bytes: Vec<u8>,
}

impl MemoryFeed {
    pub fn new(label: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl FeedSource for MemoryFeed {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Pick a file or directory feed for `path`.
pub fn open_feed(path: &Path, file_name: Option<&str>) -> Result<Box<dyn FeedSource>> {
    if path.is_dir() {
        Ok(Box::new(DirectoryFeed::new(path, file_name)?))
    } else if path.is_file() {
        Ok(Box::new(FileFeed::new(path)?))
    } else {
        Err(LinkError::MissingInputResource(path.to_path_buf()))
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read_all(source: &dyn FeedSource) -> String {
        let mut out = String::new();
        source.open().unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_directory_picks_first_csv_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "not it").unwrap();
        fs::write(dir.path().join("b_zenkoku.csv"), "b").unwrap();
        fs::write(dir.path().join("a_zenkoku.CSV"), "a").unwrap();

        let feed = DirectoryFeed::new(dir.path(), None).unwrap();
        assert_eq!(feed.selected(), dir.path().join("a_zenkoku.CSV"));
        assert_eq!(read_all(&feed), "a");
    }

    #[test]
    fn test_directory_honours_explicit_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "a").unwrap();
        fs::write(dir.path().join("b.csv"), "b").unwrap();

        let feed = DirectoryFeed::new(dir.path(), Some("b.csv")).unwrap();
        assert_eq!(read_all(&feed), "b");

        let missing = DirectoryFeed::new(dir.path(), Some("c.csv"));
        assert!(matches!(missing, Err(LinkError::MissingInputResource(_))));
    }

    #[test]
    fn test_directory_without_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), "x").unwrap();
        assert!(matches!(
            DirectoryFeed::new(dir.path(), None),
            Err(LinkError::MissingFeedFile(_))
        ));
    }

    #[test]
    fn test_open_feed_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_feed(&dir.path().join("nope.csv"), None);
        assert!(matches!(result, Err(LinkError::MissingInputResource(_))));
    }

    #[test]
    fn test_memory_feed_reopens() {
        let feed = MemoryFeed::new("mem", "x,y\n");
        assert_eq!(read_all(&feed), "x,y\n");
        assert_eq!(read_all(&feed), "x,y\n");
    }
}
