//! Lazily grown, newest-first view over a page source.

use crate::error::{ReconcileError, ReconcileResult};
use crate::source::{PageSource, Side};
use levelmirror_model::{group_rows, CatalogRecord};
use tracing::debug;

/// Records of one side, loaded one page at a time.
///
/// Consecutive rows of the same level (one per author) are merged into a
/// single record, including across a page boundary. Besides the seed page,
/// at most `max_pages` pages are loaded.
pub struct SequenceWindow<'s> {
    side: Side,
    source: &'s dyn PageSource,
    records: Vec<CatalogRecord>,
    next_page: u32,
    max_pages: u32,
    exhausted: bool,
}

impl<'s> SequenceWindow<'s> {
    /// Creates an empty window.
    pub fn new(side: Side, source: &'s dyn PageSource, max_pages: u32) -> Self {
        Self {
            side,
            source,
            records: Vec::new(),
            next_page: 0,
            max_pages,
            exhausted: false,
        }
    }

    /// Loads the seed page unless one has been loaded already.
    pub fn seed(&mut self) -> ReconcileResult<()> {
        if self.next_page == 0 {
            self.load_page()?;
        }
        Ok(())
    }

    /// Grows the window until it holds `len` records.
    ///
    /// Returns false if the source ran out or the page bound was reached first.
    pub fn ensure_len(&mut self, len: usize) -> ReconcileResult<bool> {
        self.seed()?;
        while self.records.len() < len {
            if !self.can_load() {
                return Ok(false);
            }
            self.load_page()?;
        }
        Ok(true)
    }

    /// Returns the record at `index`.
    pub fn get(&self, index: usize) -> ReconcileResult<&CatalogRecord> {
        self.records
            .get(index)
            .ok_or_else(|| ReconcileError::OutOfBounds {
                side: self.side,
                index,
                len: self.records.len(),
            })
    }

    /// Returns the number of loaded records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the loaded records, newest first.
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    /// Returns the number of pages loaded, seed included.
    pub fn pages_loaded(&self) -> u32 {
        self.next_page
    }

    /// Returns the side this window belongs to.
    pub fn side(&self) -> Side {
        self.side
    }

    fn can_load(&self) -> bool {
        !self.exhausted && self.next_page <= self.max_pages
    }

    fn load_page(&mut self) -> ReconcileResult<()> {
        let index = self.next_page;
        let page = self.source.load_page(index)?;
        self.next_page += 1;
        self.exhausted = page.is_final();
        debug!(
            side = %self.side,
            source = self.source.name(),
            page = index,
            rows = page.len(),
            "loaded page"
        );

        let mut rows = group_rows(page.records).into_iter();
        if let Some(first) = rows.next() {
            match self.records.last_mut() {
                Some(last) if last.external_id == first.external_id => last.absorb(first),
                _ => self.records.push(first),
            }
        }
        self.records.extend(rows);
        Ok(())
    }
}
