//! List command implementation.

use crate::error::CliError;
use levelmirror_model::CatalogRecord;
use levelmirror_store::SqliteGateway;
use serde::Serialize;
use std::path::Path;

/// One line of the listing.
#[derive(Debug, Serialize)]
pub struct ListEntry {
    /// External ID.
    pub external_id: u64,
    /// Title.
    pub title: String,
    /// Authors.
    pub authors: Vec<String>,
    /// Release date.
    pub release: String,
}

impl From<&CatalogRecord> for ListEntry {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            external_id: record.external_id.get(),
            title: record.title.clone(),
            authors: record.authors.clone(),
            release: record.release.to_string(),
        }
    }
}

/// Runs the list command.
pub fn run(db: &Path, limit: Option<usize>, format: &str) -> Result<(), CliError> {
    let gateway = SqliteGateway::open(db)?;
    print!("{}", render(&entries(&gateway, limit)?, format)?);
    Ok(())
}

/// Returns up to `limit` mirrored levels, newest first.
pub fn entries(gateway: &SqliteGateway, limit: Option<usize>) -> Result<Vec<ListEntry>, CliError> {
    let records = match limit {
        Some(limit) => gateway.record_page(0, limit)?,
        None => gateway.list_records()?,
    };
    Ok(records.iter().map(ListEntry::from).collect())
}

fn render(entries: &[ListEntry], format: &str) -> Result<String, CliError> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(entries)? + "\n"),
        "text" => Ok(entries
            .iter()
            .map(|e| {
                format!(
                    "{:>8}  {}  {}  ({})\n",
                    e.external_id,
                    e.release,
                    e.title,
                    e.authors.join(", ")
                )
            })
            .collect()),
        other => Err(CliError::Usage(format!("unknown output format: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelmirror_testkit::prelude::*;

    #[test]
    fn lists_newest_first_with_limit() {
        let mirror = TestMirror::with_records(&levels(1..=30));
        let listed = entries(&mirror, Some(3)).unwrap();
        let ids: Vec<u64> = listed.iter().map(|e| e.external_id).collect();
        assert_eq!(ids, vec![30, 29, 28]);
        assert_eq!(entries(&mirror, None).unwrap().len(), 30);
    }

    #[test]
    fn renders_text_and_json() {
        let mirror = TestMirror::with_records(&levels(7..=7));
        let listed = entries(&mirror, None).unwrap();

        let text = render(&listed, "text").unwrap();
        assert!(text.contains("Level 7"));
        assert!(text.contains("author0"));

        let json: serde_json::Value = serde_json::from_str(&render(&listed, "json").unwrap()).unwrap();
        assert_eq!(json[0]["external_id"], 7);

        assert!(matches!(render(&listed, "yaml"), Err(CliError::Usage(_))));
    }
}
