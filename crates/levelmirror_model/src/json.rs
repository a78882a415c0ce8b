//! Wire format of the paginated JSON listing endpoint.

use crate::error::{ModelError, ModelResult};
use crate::page::{Page, Pagination};
use crate::record::{CatalogRecord, ExternalId};
use chrono::NaiveDate;
use serde::Deserialize;

/// One page as returned by the JSON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonPage {
    /// 1-based number of this page.
    pub current_page: u32,
    /// Number of the last page.
    #[serde(alias = "total_pages")]
    pub last_page: u32,
    /// Total records across all pages.
    #[serde(alias = "records_total")]
    pub total_count: u64,
    /// Levels on this page.
    #[serde(default)]
    pub results: Vec<JsonLevel>,
}

/// A level entry of the JSON endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonLevel {
    /// Catalog ID.
    pub id: u64,
    /// Level title.
    pub name: String,
    /// Authors.
    #[serde(default)]
    pub authors: Vec<JsonUser>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<JsonNamed>,
    /// Genres.
    #[serde(default)]
    pub genres: Vec<JsonNamed>,
    /// Engine, used as the level type.
    pub engine: JsonNamed,
    /// Difficulty.
    pub difficulty: Option<JsonNamed>,
    /// Duration.
    pub duration: Option<JsonNamed>,
    /// Creation timestamp (ISO 8601).
    pub created: String,
}

/// A `{ "username": ... }` object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonUser {
    /// User name.
    pub username: String,
}

/// A `{ "name": ... }` object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonNamed {
    /// Display name.
    pub name: String,
}

impl JsonLevel {
    /// Converts the entry into a catalog record.
    pub fn into_record(self) -> ModelResult<CatalogRecord> {
        let release = parse_iso_date(&self.created).ok_or_else(|| ModelError::InvalidDate {
            external_id: self.id,
            value: self.created.clone(),
        })?;
        if self.name.trim().is_empty() {
            return Err(ModelError::MissingField {
                external_id: self.id,
                field: "name",
            });
        }

        Ok(CatalogRecord {
            external_id: ExternalId(self.id),
            title: self.name,
            authors: self.authors.into_iter().map(|a| a.username).collect(),
            difficulty: self.difficulty.map(|d| d.name),
            duration: self.duration.map(|d| d.name),
            class: None,
            kind: self.engine.name,
            release,
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            tags: self.tags.into_iter().map(|t| t.name).collect(),
        })
    }
}

impl JsonPage {
    /// Converts the page into the shared page shape.
    pub fn into_page(self) -> ModelResult<Page> {
        let pagination = Pagination::Number {
            current: self.current_page,
            last: self.last_page,
        };
        let records = self
            .results
            .into_iter()
            .map(JsonLevel::into_record)
            .collect::<ModelResult<Vec<_>>>()?;
        Page::new(pagination, self.total_count, records)
    }
}

/// Reads the date part of an ISO 8601 date or timestamp.
fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let date = value.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "current_page": 2,
        "last_page": 9,
        "total_count": 170,
        "results": [{
            "id": 3301,
            "name": "Temple of Ash",
            "authors": [{"username": "alice"}, {"username": "bob"}],
            "tags": [{"name": "egypt"}],
            "genres": [{"name": "adventure"}],
            "engine": {"name": "TR4"},
            "difficulty": {"name": "hard"},
            "duration": null,
            "created": "2024-03-17T09:12:44.120Z"
        }]
    }"#;

    #[test]
    fn page_converts() {
        let page: JsonPage = serde_json::from_str(SAMPLE).unwrap();
        let page = page.into_page().unwrap();

        assert_eq!(page.total_records, 170);
        assert_eq!(page.pagination, Pagination::Number { current: 2, last: 9 });
        let record = &page.records[0];
        assert_eq!(record.external_id, ExternalId(3301));
        assert_eq!(record.authors, vec!["alice", "bob"]);
        assert_eq!(record.kind, "TR4");
        assert_eq!(record.duration, None);
        assert_eq!(record.release, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
    }

    #[test]
    fn alternate_metadata_names_accepted() {
        let body = r#"{"current_page": 1, "total_pages": 1, "records_total": 0, "results": []}"#;
        let page: JsonPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.last_page, 1);
        assert_eq!(page.total_count, 0);
    }

    #[test]
    fn bad_date_rejected() {
        let body = SAMPLE.replace("2024-03-17T09:12:44.120Z", "yesterday");
        let page: JsonPage = serde_json::from_str(&body).unwrap();
        assert!(matches!(
            page.into_page(),
            Err(ModelError::InvalidDate { external_id: 3301, .. })
        ));
    }
}
