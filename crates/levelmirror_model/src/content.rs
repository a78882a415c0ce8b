//! Downloaded level content.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Metadata of one downloaded level archive.
///
/// `md5` is computed once by the fetch client over the complete payload and
/// is the integrity and deduplication key everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipFileInfo {
    /// File name, taken from the effective download URL.
    pub name: String,
    /// Size in MiB, rounded to two decimals.
    pub size_mib: f64,
    /// Lowercase hex MD5 of the payload.
    pub md5: String,
    /// Effective (post-redirect) URL.
    pub url: String,
    /// Release date of this archive, when known.
    pub release: Option<NaiveDate>,
    /// Archive version label, when known.
    pub version: Option<String>,
}

impl ZipFileInfo {
    /// Converts a byte count into MiB rounded to two decimals.
    pub fn size_in_mib(bytes: u64) -> f64 {
        let mib = bytes as f64 / (1024.0 * 1024.0);
        (mib * 100.0).round() / 100.0
    }
}

/// A screenshot attached to a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenImage {
    /// Lowercase hex MD5 of `data`.
    pub md5: String,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

/// Heavy per-level content filled in by the enrichment step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelContent {
    /// Level archives.
    pub zip_files: Vec<ZipFileInfo>,
    /// Screenshots.
    pub screens: Vec<ScreenImage>,
}
