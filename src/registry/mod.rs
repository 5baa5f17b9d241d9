//! Registry Module
//!
//! Reads the national corporate-number registry:
//! - Feed sources (file, container directory, memory)
//! - Streaming transcoding with an encoding fallback
//! - Row extraction restricted to well-formed identifiers

pub mod decode;
pub mod feed;
pub mod scanner;

pub use feed::{open_feed, DirectoryFeed, FeedSource, FileFeed, MemoryFeed};
pub use scanner::{is_valid_identifier, RegistryRows, RegistryScanner, ScanStats};

use serde::{Deserialize, Serialize};

/// One registry row, as read from the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// 13-digit corporate number.
    pub identifier: String,
    pub name: String,
    /// Prefecture, municipality and remainder concatenated; empty when the
    /// feed is too narrow to carry addresses.
    pub address: String,
}
