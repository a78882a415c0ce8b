//! Catalog records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog-assigned numeric identifier of a level.
///
/// Not unique on its own in the raw listing: a level with several authors is
/// listed once per author under the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub u64);

impl ExternalId {
    /// Returns the raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ExternalId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// One entry of the remote or local catalog.
///
/// Raw listings repeat a level once per author; after [`group_rows`] a record
/// carries every author of the level in `authors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Catalog-assigned ID.
    pub external_id: ExternalId,
    /// Level title.
    pub title: String,
    /// Authors, in listing order.
    pub authors: Vec<String>,
    /// Difficulty label, if the catalog has one.
    pub difficulty: Option<String>,
    /// Duration label, if the catalog has one.
    pub duration: Option<String>,
    /// Level class, if the catalog has one.
    pub class: Option<String>,
    /// Level type (engine).
    #[serde(rename = "type")]
    pub kind: String,
    /// Release date.
    pub release: NaiveDate,
    /// Genre names.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CatalogRecord {
    /// Creates a record with the mandatory attributes set and everything else empty.
    pub fn new(
        external_id: impl Into<ExternalId>,
        title: impl Into<String>,
        kind: impl Into<String>,
        release: NaiveDate,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            authors: Vec::new(),
            difficulty: None,
            duration: None,
            class: None,
            kind: kind.into(),
            release,
            genres: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Adds an author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.push_author(author.into());
        self
    }

    /// Sets the difficulty label.
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    /// Sets the duration label.
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Sets the class label.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Adds a genre.
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genres.push(genre.into());
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Compares every attribute except the author list.
    ///
    /// Multi-author levels surface upstream as repeated rows that differ only
    /// by author, so authors are left out of the comparison. A change that
    /// touches only the authors of a level is therefore never reported.
    pub fn same_attributes(&self, other: &CatalogRecord) -> bool {
        self.external_id == other.external_id
            && self.title == other.title
            && self.difficulty == other.difficulty
            && self.duration == other.duration
            && self.class == other.class
            && self.kind == other.kind
            && self.release == other.release
            && sorted(&self.genres) == sorted(&other.genres)
            && sorted(&self.tags) == sorted(&other.tags)
    }

    /// Folds another row of the same level into this record.
    ///
    /// Only the author list grows; the other attributes of `self` win.
    pub fn absorb(&mut self, other: CatalogRecord) {
        debug_assert_eq!(self.external_id, other.external_id);
        for author in other.authors {
            self.push_author(author);
        }
    }

    fn push_author(&mut self, author: String) {
        if !self.authors.contains(&author) {
            self.authors.push(author);
        }
    }
}

fn sorted(values: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = values.iter().map(String::as_str).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Collapses runs of consecutive rows sharing one external ID into one record.
///
/// Non-consecutive repeats are left alone; they are an ordering fault of the
/// source, not a multi-author listing.
pub fn group_rows(rows: impl IntoIterator<Item = CatalogRecord>) -> Vec<CatalogRecord> {
    let mut grouped: Vec<CatalogRecord> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some(last) if last.external_id == row.external_id => last.absorb(row),
            _ => grouped.push(row),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn level(id: u64, author: &str) -> CatalogRecord {
        CatalogRecord::new(id, format!("Level {id}"), "TR4", date(2024, 1, 1))
            .with_author(author)
            .with_difficulty("medium")
    }

    #[test]
    fn grouping_merges_consecutive_authors() {
        let rows = vec![level(7, "alice"), level(7, "bob"), level(6, "carol")];
        let grouped = group_rows(rows);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].authors, vec!["alice", "bob"]);
        assert_eq!(grouped[1].authors, vec!["carol"]);
    }

    #[test]
    fn grouping_keeps_displaced_repeats() {
        let rows = vec![level(7, "alice"), level(6, "carol"), level(7, "alice")];
        assert_eq!(group_rows(rows).len(), 3);
    }

    #[test]
    fn same_attributes_ignores_authors() {
        let a = level(7, "alice");
        let b = level(7, "mallory");
        assert!(a.same_attributes(&b));
    }

    #[test]
    fn same_attributes_detects_title_change() {
        let a = level(7, "alice");
        let mut b = a.clone();
        b.title = "Renamed".into();
        assert!(!a.same_attributes(&b));
    }

    #[test]
    fn same_attributes_ignores_tag_order() {
        let a = level(7, "alice").with_tag("snow").with_tag("egypt");
        let b = level(7, "alice").with_tag("egypt").with_tag("snow");
        assert!(a.same_attributes(&b));
    }

    #[test]
    fn serde_uses_type_key() {
        let json = serde_json::to_value(level(1, "alice")).unwrap();
        assert_eq!(json["type"], "TR4");
        assert_eq!(json["release"], "2024-01-01");
    }
}
