//! Feed and counts settings.

use serde::Deserialize;

use crate::feed::counts::DEFAULT_BATCH_SIZE;
use crate::feed::pager::DEFAULT_PAGE_SIZE;
use crate::feed::PaginationMode;

/// Default page size for the merged video feed.
pub const DEFAULT_VIDEO_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Items per page for place, post and product feeds.
    pub page_size: usize,
    /// Items per page for the merged video feed.
    pub video_page_size: usize,
    pub pagination: PaginationMode,
    /// Ask entity sources for a total count instead of guessing from page length.
    pub exact_totals: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            video_page_size: DEFAULT_VIDEO_PAGE_SIZE,
            pagination: PaginationMode::Offset,
            exact_totals: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountsConfig {
    /// Ids per `entity_id IN (...)` lookup.
    pub batch_size: usize,
}

impl Default for CountsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
