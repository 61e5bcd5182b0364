use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;

/// How successive pages are located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Re-query from the start up to `offset + limit` on every page.
    #[default]
    Offset,
    /// Continue each source after its last-seen `(created_at, id)`.
    Cursor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
    /// Opaque continuation token from the previous page, if any.
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the page after this one, when the source pages by cursor.
    pub next_cursor: Option<String>,
    /// Exact number of rows available, when the source knows it.
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            total: None,
        }
    }
}

/// A paged, newest-first source of one item type.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<T>>;
}
