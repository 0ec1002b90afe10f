//! Full Table Scanner
//!
//! Drains a whole table through repeated `scan` calls. No filtering happens
//! here; predicates are the caller's business.

use std::sync::Arc;
use tideline_core::{require_non_empty, Cursor, Item, ScanRequest, Store, TidelineResult};

/// Full table scanner
#[derive(Clone)]
pub struct TableScanner {
    store: Arc<dyn Store>,
    page_size: Option<u32>,
}

impl TableScanner {
    /// Create a scanner that lets the store choose page sizes
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            page_size: None,
        }
    }

    /// Request pages of at most `page_size` items
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Page-by-page view of a scan
    pub fn pages(&self, table: &str) -> TidelineResult<ScanPages> {
        require_non_empty("table", table)?;
        Ok(ScanPages {
            store: Arc::clone(&self.store),
            table: table.to_string(),
            page_size: self.page_size,
            cursor: None,
            done: false,
            fetched: 0,
        })
    }

    /// Read every item of a table
    ///
    /// Nothing is returned on error, not even the pages read before it.
    pub async fn scan_all(&self, table: &str) -> TidelineResult<Vec<Item>> {
        let mut pages = self.pages(table)?;
        let mut items = Vec::new();
        while let Some(page) = pages.next_page().await? {
            items.extend(page);
        }
        tracing::debug!(
            target: "tideline::scan",
            table,
            pages = pages.pages_fetched(),
            items = items.len(),
            "scan complete"
        );
        Ok(items)
    }
}

/// Lazy, finite, non-restartable page sequence of one scan
pub struct ScanPages {
    store: Arc<dyn Store>,
    table: String,
    page_size: Option<u32>,
    cursor: Option<Cursor>,
    done: bool,
    fetched: usize,
}

impl ScanPages {
    /// Fetch the next page, or None once the scan is complete
    pub async fn next_page(&mut self) -> TidelineResult<Option<Vec<Item>>> {
        if self.done {
            return Ok(None);
        }
        let request = ScanRequest {
            table: self.table.clone(),
            limit: self.page_size,
            exclusive_start: self.cursor.take(),
        };
        let page = match self.store.scan(request).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e.into());
            }
        };
        self.fetched += 1;
        self.done = page.cursor.is_none();
        self.cursor = page.cursor;
        Ok(Some(page.items))
    }

    /// Check if the scan is complete
    pub fn is_exhausted(&self) -> bool {
        self.done
    }

    /// Store calls made so far
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }
}

impl std::fmt::Debug for ScanPages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPages")
            .field("table", &self.table)
            .field("done", &self.done)
            .field("fetched", &self.fetched)
            .finish()
    }
}
