//! Paginated Query Engine
//!
//! Issues one logical query as a sequence of store `query` calls, following
//! the continuation cursor.
//!
//! # Modes
//!
//! - Single page (`recursive = false`): one store call
//! - Recursive: drain until the store stops returning a cursor
//!
//! An empty first page means no results, in both modes. The engine does not
//! look past it even when a cursor came back.
//!
//! # Example
//!
//! ```ignore
//! let engine = QueryEngine::new(store.clone());
//! let descriptor = QueryDescriptor::new("devices", KeyCondition::partition("device", "d1"))
//!     .recursive(true);
//! let items = engine.query(&descriptor).await?.unwrap_or_default();
//! ```

use std::sync::Arc;
use tideline_core::{
    require_non_empty, Cursor, Item, KeyCondition, QueryRequest, Store, TidelineError,
    TidelineResult,
};

/// One logical query: table, key condition, page size and mode
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Table name
    pub table: String,
    /// Partition equality plus optional sort predicate
    pub key_condition: KeyCondition,
    /// Page size hint passed to the store
    pub page_size: Option<u32>,
    /// Drain all pages instead of returning the first one
    pub recursive: bool,
}

impl QueryDescriptor {
    /// Single-page query with no page size hint
    pub fn new(table: impl Into<String>, key_condition: KeyCondition) -> Self {
        Self {
            table: table.into(),
            key_condition,
            page_size: None,
            recursive: false,
        }
    }

    /// Set the page size hint
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the recursive flag
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Check required parts; runs before any store call
    pub fn validate(&self) -> TidelineResult<()> {
        require_non_empty("table", &self.table)?;
        require_non_empty(
            "key condition attribute",
            &self.key_condition.partition_attr,
        )?;
        if self.key_condition.partition_value.is_null() {
            return Err(TidelineError::invalid_input(
                "key condition value is required",
            ));
        }
        if let Some((attr, _)) = &self.key_condition.sort {
            require_non_empty("sort condition attribute", attr)?;
        }
        if self.page_size == Some(0) {
            return Err(TidelineError::invalid_input("page size must be at least 1"));
        }
        Ok(())
    }

    fn request(&self, cursor: Option<Cursor>) -> QueryRequest {
        QueryRequest {
            table: self.table.clone(),
            key_condition: self.key_condition.clone(),
            limit: self.page_size,
            exclusive_start: cursor,
        }
    }
}

/// Paginated query engine
///
/// Stateless facade over a shared store. Clone is cheap (Arc clone).
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn Store>,
}

impl QueryEngine {
    /// Create a query engine over a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Run a query
    ///
    /// # Returns
    ///
    /// - `None` when the first page is empty, even for recursive queries
    /// - The first page's items when not recursive
    /// - Every page's items, in store order, when recursive
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an incomplete descriptor (no store call is made);
    /// store errors propagate unchanged and are not retried.
    pub async fn query(&self, descriptor: &QueryDescriptor) -> TidelineResult<Option<Vec<Item>>> {
        descriptor.validate()?;

        let first = self.store.query(descriptor.request(None)).await?;
        if first.items.is_empty() {
            tracing::debug!(
                target: "tideline::query",
                table = %descriptor.table,
                "first page empty"
            );
            return Ok(None);
        }

        let mut items = first.items;
        let mut cursor = first.cursor;
        let mut pages = 1usize;
        while descriptor.recursive {
            let Some(next) = cursor.take() else { break };
            let page = self.store.query(descriptor.request(Some(next))).await?;
            pages += 1;
            tracing::debug!(
                target: "tideline::query",
                table = %descriptor.table,
                page = pages,
                returned = page.items.len(),
                "query page"
            );
            items.extend(page.items);
            cursor = page.cursor;
        }

        tracing::debug!(
            target: "tideline::query",
            table = %descriptor.table,
            pages,
            items = items.len(),
            "query complete"
        );
        Ok(Some(items))
    }

    /// Page-by-page view of a query
    ///
    /// Validation happens here, so an invalid descriptor never produces a
    /// page sequence. The descriptor's `recursive` flag is ignored: the
    /// sequence always runs until the store stops returning a cursor.
    pub fn pages(&self, descriptor: QueryDescriptor) -> TidelineResult<QueryPages> {
        descriptor.validate()?;
        Ok(QueryPages {
            store: Arc::clone(&self.store),
            descriptor,
            cursor: None,
            state: PageState::Fresh,
            fetched: 0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    Fresh,
    Continuing,
    Done,
}

/// Lazy, finite, non-restartable page sequence of one query
///
/// Each `next_page` call makes at most one store call. Once exhausted (no
/// cursor, an empty first page, or an error) it keeps returning `None`.
pub struct QueryPages {
    store: Arc<dyn Store>,
    descriptor: QueryDescriptor,
    cursor: Option<Cursor>,
    state: PageState,
    fetched: usize,
}

impl QueryPages {
    /// Fetch the next page, or None once the sequence is exhausted
    pub async fn next_page(&mut self) -> TidelineResult<Option<Vec<Item>>> {
        let cursor = match self.state {
            PageState::Done => return Ok(None),
            PageState::Fresh => None,
            PageState::Continuing => self.cursor.take(),
        };
        let first = self.state == PageState::Fresh;

        let page = match self.store.query(self.descriptor.request(cursor)).await {
            Ok(page) => page,
            Err(e) => {
                self.state = PageState::Done;
                return Err(e.into());
            }
        };
        self.fetched += 1;

        if first && page.items.is_empty() {
            self.state = PageState::Done;
            return Ok(None);
        }
        self.state = if page.cursor.is_some() {
            PageState::Continuing
        } else {
            PageState::Done
        };
        self.cursor = page.cursor;
        Ok(Some(page.items))
    }

    /// Check if no further store calls will be made
    pub fn is_exhausted(&self) -> bool {
        self.state == PageState::Done
    }

    /// Store calls made so far
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// Table being queried
    pub fn table(&self) -> &str {
        &self.descriptor.table
    }
}

impl std::fmt::Debug for QueryPages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPages")
            .field("table", &self.descriptor.table)
            .field("state", &self.state)
            .field("fetched", &self.fetched)
            .finish()
    }
}
