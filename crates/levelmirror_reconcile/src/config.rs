//! Reconciler configuration.

/// Configuration for tail reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Base window size. The tail is `5 * match_size` records and the
    /// overshoot search spans `2 * match_size + 1` positions.
    pub match_size: usize,
    /// Pages either sequence may load after its seed page.
    pub max_pages: u32,
}

impl ReconcileConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            match_size: 4,
            max_pages: 10,
        }
    }

    /// Sets the match size (at least 1).
    pub fn with_match_size(mut self, match_size: usize) -> Self {
        self.match_size = match_size.max(1);
        self
    }

    /// Sets the page bound.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Number of local records the batch match compares against.
    pub fn tail_len(&self) -> usize {
        self.match_size * 5
    }

    /// Number of positions the overshoot search covers.
    pub fn overshoot_len(&self) -> usize {
        self.match_size * 2 + 1
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::new()
    }
}
