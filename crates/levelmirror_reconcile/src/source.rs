//! Page sources: where the two sequence windows get their pages from.

use crate::error::ReconcileResult;
use levelmirror_fetch::{FetchClient, HttpBackend};
use levelmirror_model::{CatalogRecord, JsonPage, Page, Pagination, PAGE_SIZE};
use levelmirror_store::SqliteGateway;
use std::fmt;
use tracing::debug;

/// Newest-first listing of approved levels on the JSON endpoint.
pub const DEFAULT_JSON_ENDPOINT: &str =
    "https://trcustoms.org/api/levels/?sort=-created&is_approved=1&page_size=20";

/// Which side of the reconciliation a window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The local mirror.
    Local,
    /// The remote catalog.
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// A paged, newest-first listing of catalog records.
pub trait PageSource {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Loads page `index` (0-based). Past the end, returns an empty page.
    fn load_page(&self, index: u32) -> ReconcileResult<Page>;
}

/// Pages of the local mirror, ordered by release date then external ID.
#[derive(Debug, Clone, Copy)]
pub struct LocalPageSource<'g> {
    gateway: &'g SqliteGateway,
}

impl<'g> LocalPageSource<'g> {
    /// Creates a source over `gateway`.
    pub fn new(gateway: &'g SqliteGateway) -> Self {
        Self { gateway }
    }
}

impl PageSource for LocalPageSource<'_> {
    fn name(&self) -> &str {
        "mirror"
    }

    fn load_page(&self, index: u32) -> ReconcileResult<Page> {
        let total = self.gateway.record_count()?;
        let records = self.gateway.record_page(index, PAGE_SIZE)?;
        let offset = u64::from(index) * PAGE_SIZE as u64;
        Ok(Page::new(Pagination::Offset(offset), total, records)?)
    }
}

/// Pages of the remote JSON endpoint.
pub struct JsonPageSource<'c, B: HttpBackend> {
    client: &'c FetchClient<B>,
    endpoint: String,
}

impl<'c, B: HttpBackend> JsonPageSource<'c, B> {
    /// Creates a source reading `endpoint` (a URL with a query string).
    pub fn new(client: &'c FetchClient<B>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// URL of page `index` (0-based); the endpoint numbers pages from 1.
    pub fn page_url(&self, index: u32) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{separator}page={}", self.endpoint, index + 1)
    }
}

impl<B: HttpBackend> PageSource for JsonPageSource<'_, B> {
    fn name(&self) -> &str {
        &self.endpoint
    }

    fn load_page(&self, index: u32) -> ReconcileResult<Page> {
        let url = self.page_url(index);
        let page: JsonPage = self.client.fetch_json(&url)?;
        if page.current_page > page.last_page {
            debug!(%url, "past the last page");
            return Ok(Page::empty(
                Pagination::Number {
                    current: page.current_page,
                    last: page.last_page,
                },
                page.total_count,
            ));
        }
        Ok(page.into_page()?)
    }
}

/// In-memory listing, split into fixed-size pages.
#[derive(Debug, Clone)]
pub struct MemoryPageSource {
    name: String,
    rows: Vec<CatalogRecord>,
    page_size: usize,
}

impl MemoryPageSource {
    /// Creates a source over rows already sorted newest first.
    pub fn new(name: impl Into<String>, rows: Vec<CatalogRecord>) -> Self {
        Self {
            name: name.into(),
            rows,
            page_size: PAGE_SIZE,
        }
    }

    /// Uses a smaller page size (1..=[`PAGE_SIZE`]).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, PAGE_SIZE);
        self
    }

    /// Returns the rows.
    pub fn rows(&self) -> &[CatalogRecord] {
        &self.rows
    }
}

impl PageSource for MemoryPageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_page(&self, index: u32) -> ReconcileResult<Page> {
        let start = (index as usize).saturating_mul(self.page_size);
        let end = start.saturating_add(self.page_size).min(self.rows.len());
        let records = self.rows.get(start..end).unwrap_or_default().to_vec();
        Ok(Page::new(
            Pagination::Offset(start as u64),
            self.rows.len() as u64,
            records,
        )?)
    }
}
