//! Infinite-scroll state over a [`PageSource`].
//!
//! State sits behind a mutex that is never held across an `.await`. Each
//! fetch captures the pager's generation when it starts and commits only if
//! the generation is unchanged; `refresh`, `replace_source` and `unmount` bump
//! it, so a slow stale response cannot clobber newer state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::app::Result;
use crate::domain::FeedEntry;
use crate::feed::merge::sort_by_recency;
use crate::feed::source::{Page, PageRequest, PageSource};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Snapshot handed to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub has_next_page: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> FeedState<T> {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            offset: 0,
            has_next_page: true,
            loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Fresh,
    Mounted,
    Unmounted,
}

struct Inner<T> {
    source: Arc<dyn PageSource<T>>,
    state: FeedState<T>,
    cursor: Option<String>,
    generation: u64,
    lifecycle: Lifecycle,
}

pub struct FeedPager<T> {
    page_size: usize,
    inner: Mutex<Inner<T>>,
}

/// Replace items with a matching id, append new ones, keep newest first.
pub fn merge_by_id<T: FeedEntry>(existing: &mut Vec<T>, fresh: Vec<T>) {
    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id().to_string(), i))
        .collect();

    for item in fresh {
        match index.get(item.id()) {
            Some(&i) => existing[i] = item,
            None => {
                index.insert(item.id().to_string(), existing.len());
                existing.push(item);
            }
        }
    }

    sort_by_recency(existing);
}

impl<T: FeedEntry + Clone + Send + 'static> FeedPager<T> {
    pub fn new(source: Arc<dyn PageSource<T>>, page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            inner: Mutex::new(Inner {
                source,
                state: FeedState::initial(),
                cursor: None,
                generation: 0,
                lifecycle: Lifecycle::Fresh,
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panic mid-commit leaves state that is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> FeedState<T> {
        self.lock().state.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().state.items.clone()
    }

    pub fn has_next_page(&self) -> bool {
        self.lock().state.has_next_page
    }

    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock().state.error.clone()
    }

    /// First fetch on mount. Later calls are no-ops until `unmount`.
    pub async fn mount(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.lifecycle == Lifecycle::Mounted {
                return false;
            }
            inner.lifecycle = Lifecycle::Mounted;
        }
        self.fetch_next_page().await
    }

    /// Discard any in-flight result. `fetch_next_page` is a no-op until
    /// `mount` or `refresh`.
    pub fn unmount(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.lifecycle = Lifecycle::Unmounted;
        inner.state.loading = false;
    }

    /// Load the page at the current offset. Returns whether a page was committed.
    ///
    /// No-op while a fetch is in flight, after the last page, or once unmounted.
    pub async fn fetch_next_page(&self) -> bool {
        let (source, request, generation) = {
            let mut inner = self.lock();
            if inner.lifecycle == Lifecycle::Unmounted {
                debug!("Skipping fetch on unmounted pager");
                return false;
            }
            if !inner.state.has_next_page || inner.state.loading {
                debug!(
                    "Skipping fetch (has_next_page={}, loading={})",
                    inner.state.has_next_page, inner.state.loading
                );
                return false;
            }
            inner.state.loading = true;
            let request = PageRequest {
                offset: inner.state.offset,
                limit: self.page_size,
                cursor: inner.cursor.clone(),
            };
            (inner.source.clone(), request, inner.generation)
        };

        let result = source.fetch_page(&request).await;
        self.commit(generation, result, false)
    }

    /// Drop everything and load the first page again.
    pub async fn refresh(&self) -> bool {
        let (source, request, generation) = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.lifecycle = Lifecycle::Mounted;
            inner.cursor = None;
            inner.state = FeedState::initial();
            inner.state.loading = true;
            (
                inner.source.clone(),
                PageRequest::first(self.page_size),
                inner.generation,
            )
        };

        let result = source.fetch_page(&request).await;
        self.commit(generation, result, true)
    }

    /// Switch to a new source (e.g. a different entity kind) and reload.
    pub async fn replace_source(&self, source: Arc<dyn PageSource<T>>) -> bool {
        self.lock().source = source;
        self.refresh().await
    }

    fn commit(&self, generation: u64, result: Result<Page<T>>, replace: bool) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(
                "Discarding stale page (generation {} != {})",
                generation, inner.generation
            );
            return false;
        }
        inner.state.loading = false;

        match result {
            Ok(page) => {
                let fetched = page.items.len();
                if replace {
                    let mut items = page.items;
                    sort_by_recency(&mut items);
                    let mut deduped = Vec::with_capacity(items.len());
                    merge_by_id(&mut deduped, items);
                    inner.state.items = deduped;
                } else {
                    merge_by_id(&mut inner.state.items, page.items);
                }

                inner.state.offset += self.page_size;
                inner.state.has_next_page = match page.total {
                    Some(total) => (inner.state.offset as u64) < total,
                    None => fetched >= self.page_size,
                };
                inner.cursor = page.next_cursor;
                inner.state.error = None;

                debug!(
                    "Committed {} items (total {}, offset {}, more={})",
                    fetched,
                    inner.state.items.len(),
                    inner.state.offset,
                    inner.state.has_next_page
                );
                true
            }
            Err(e) => {
                warn!("Feed fetch failed: {}", e);
                inner.state.error = Some(e.to_string());
                false
            }
        }
    }
}
