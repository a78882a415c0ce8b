//! Record fixtures and mirror helpers.
//!
//! Fixture levels are released one day apart, in ID order, so a higher ID
//! is always the newer level and listings sort the same way on both sides.

use chrono::{Days, NaiveDate};
use levelmirror_model::{CatalogRecord, ExternalId};
use levelmirror_store::{SqliteGateway, StoreError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Release date of fixture level `id`.
pub fn release_of(id: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid epoch") + Days::new(id)
}

/// Fixture level `id` with one author and fixed attributes.
pub fn level(id: u64) -> CatalogRecord {
    CatalogRecord::new(id, format!("Level {id}"), "TR4", release_of(id))
        .with_author(format!("author{}", id % 7))
        .with_difficulty("medium")
        .with_duration("long")
        .with_genre("adventure")
}

/// Fixture levels for `ids`, newest first.
pub fn levels(ids: impl IntoIterator<Item = u64>) -> Vec<CatalogRecord> {
    let mut records: Vec<CatalogRecord> = ids.into_iter().map(level).collect();
    records.sort_by(|a, b| b.external_id.cmp(&a.external_id));
    records
}

/// The rows a listing shows for one level with several authors: one row
/// per author, identical otherwise.
pub fn author_rows(id: u64, authors: &[&str]) -> Vec<CatalogRecord> {
    authors
        .iter()
        .map(|author| {
            let mut row = level(id);
            row.authors = vec![(*author).to_string()];
            row
        })
        .collect()
}

/// External IDs of `records`, in order.
pub fn ids_of(records: &[CatalogRecord]) -> Vec<u64> {
    records.iter().map(|r| r.external_id.get()).collect()
}

/// Inserts `records` into `gateway`, one transaction each.
pub fn seed(gateway: &SqliteGateway, records: &[CatalogRecord]) {
    for record in records {
        gateway
            .transaction(|tx| -> Result<_, StoreError> { tx.insert_record(record) })
            .expect("Failed to seed record");
    }
}

/// Returns true if the mirror holds level `id`.
pub fn mirrored(gateway: &SqliteGateway, id: u64) -> bool {
    gateway
        .find_record(ExternalId(id))
        .expect("Failed to query mirror")
        .is_some()
}

/// A file-backed mirror in a temporary directory.
pub struct TestMirror {
    /// The gateway.
    pub gateway: SqliteGateway,
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestMirror {
    /// Creates an empty mirror.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("mirror.db");
        let gateway = SqliteGateway::open(&path).expect("Failed to open mirror");
        Self {
            gateway,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Creates a mirror holding `records`.
    pub fn with_records(records: &[CatalogRecord]) -> Self {
        let mirror = Self::new();
        seed(&mirror.gateway, records);
        mirror
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a second gateway on the same file.
    pub fn reopen(&self) -> SqliteGateway {
        SqliteGateway::open(&self.path).expect("Failed to reopen mirror")
    }
}

impl Default for TestMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestMirror {
    type Target = SqliteGateway;

    fn deref(&self) -> &Self::Target {
        &self.gateway
    }
}

/// Runs a test against an empty in-memory mirror.
pub fn with_temp_mirror<F, R>(f: F) -> R
where
    F: FnOnce(&SqliteGateway) -> R,
{
    let gateway = SqliteGateway::open_in_memory().expect("Failed to open in-memory mirror");
    f(&gateway)
}
