//! Fixed-size pages of catalog records.

use crate::error::{ModelError, ModelResult};
use crate::record::CatalogRecord;
use serde::{Deserialize, Serialize};

/// Number of records in every page except the final one.
pub const PAGE_SIZE: usize = 20;

/// Position of a page within its listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pagination {
    /// Offset-addressed listing (record offset of the first row).
    Offset(u64),
    /// Page-number-addressed listing (1-based).
    Number {
        /// Number of this page.
        current: u32,
        /// Number of the last page.
        last: u32,
    },
}

/// An ordered batch of records plus pagination metadata.
///
/// The shape is the same whether the page came from the remote catalog or
/// from the local mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Where this page sits in the listing.
    pub pagination: Pagination,
    /// Total number of records the source reports.
    pub total_records: u64,
    /// Records, newest first.
    pub records: Vec<CatalogRecord>,
}

impl Page {
    /// Creates a page, rejecting more than [`PAGE_SIZE`] records.
    pub fn new(
        pagination: Pagination,
        total_records: u64,
        records: Vec<CatalogRecord>,
    ) -> ModelResult<Self> {
        if records.len() > PAGE_SIZE {
            return Err(ModelError::OversizedPage {
                limit: PAGE_SIZE,
                actual: records.len(),
            });
        }
        Ok(Self {
            pagination,
            total_records,
            records,
        })
    }

    /// Creates an empty page.
    pub fn empty(pagination: Pagination, total_records: u64) -> Self {
        Self {
            pagination,
            total_records,
            records: Vec::new(),
        }
    }

    /// Returns the number of records on this page.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if no page follows this one.
    ///
    /// Decided by the pagination metadata; an empty page is always final.
    pub fn is_final(&self) -> bool {
        if self.records.is_empty() {
            return true;
        }
        match self.pagination {
            Pagination::Offset(offset) => offset + self.records.len() as u64 >= self.total_records,
            Pagination::Number { current, last } => current >= last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn records(n: usize) -> Vec<CatalogRecord> {
        let release = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        (0..n)
            .map(|i| CatalogRecord::new(i as u64, "t", "TR2", release))
            .collect()
    }

    #[test]
    fn oversized_page_rejected() {
        let err = Page::new(Pagination::Offset(0), 100, records(PAGE_SIZE + 1)).unwrap_err();
        assert!(matches!(err, ModelError::OversizedPage { actual: 21, .. }));
    }

    #[test]
    fn empty_page_is_final() {
        assert!(Page::empty(Pagination::Offset(40), 100).is_final());
    }

    #[test]
    fn short_page_reaching_total_is_final() {
        let page = Page::new(Pagination::Offset(40), 43, records(3)).unwrap();
        assert!(page.is_final());
        let gap = Page::new(Pagination::Offset(40), 100, records(3)).unwrap();
        assert!(!gap.is_final());
    }

    #[test]
    fn full_offset_page_checks_total() {
        let middle = Page::new(Pagination::Offset(20), 100, records(PAGE_SIZE)).unwrap();
        assert!(!middle.is_final());

        let last = Page::new(Pagination::Offset(80), 100, records(PAGE_SIZE)).unwrap();
        assert!(last.is_final());
    }

    #[test]
    fn full_numbered_page_checks_last() {
        let page = Page::new(
            Pagination::Number { current: 3, last: 3 },
            60,
            records(PAGE_SIZE),
        )
        .unwrap();
        assert!(page.is_final());
    }
}
