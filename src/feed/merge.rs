//! Unified video merge.
//!
//! Every video source is only sorted and limited locally, so a globally
//! correct window needs each source asked for at least `offset + limit` rows.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::app::Result;
use crate::domain::{FeedEntry, UnifiedVideoItem};
use crate::feed::cursor::{self, VideoCursor};
use crate::feed::fetchers::{fetch_soft, SourceReport, StoreVideoFetcher, VideoFetcher};
use crate::feed::source::{Page, PageRequest, PageSource, PaginationMode};
use crate::store::Store;

/// Stable sort, newest first. Equal timestamps keep their input order.
pub fn sort_by_recency<T: FeedEntry>(items: &mut [T]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

/// Items at positions `[offset, offset + limit)`.
pub fn window<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

/// Concatenate per-source batches, sort globally and slice.
pub fn merge_window<T: FeedEntry>(batches: Vec<Vec<T>>, offset: usize, limit: usize) -> Vec<T> {
    let mut all: Vec<T> = batches.into_iter().flatten().collect();
    sort_by_recency(&mut all);
    window(all, offset, limit)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoPage {
    pub items: Vec<UnifiedVideoItem>,
    pub reports: Vec<SourceReport>,
    /// Set only by the cursor strategy.
    pub next_cursor: Option<String>,
}

impl VideoPage {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| !r.is_ok())
    }
}

pub struct VideoMerger {
    fetchers: Vec<Arc<dyn VideoFetcher>>,
    mode: PaginationMode,
}

impl VideoMerger {
    pub fn new(fetchers: Vec<Arc<dyn VideoFetcher>>) -> Self {
        Self {
            fetchers,
            mode: PaginationMode::Offset,
        }
    }

    pub fn from_store<S: Store + Send + Sync + 'static>(store: Arc<S>) -> Self {
        Self::new(StoreVideoFetcher::all(store))
    }

    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    /// The `[offset, offset + limit)` window of all video sources by recency.
    pub async fn merge_videos(&self, offset: usize, limit: usize) -> VideoPage {
        if limit == 0 {
            return VideoPage::default();
        }

        let fetch_size = offset.saturating_add(limit);
        let results = join_all(
            self.fetchers
                .iter()
                .map(|fetcher| fetch_soft(fetcher.as_ref(), fetch_size, None)),
        )
        .await;

        let (batches, reports): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let items = merge_window(batches, offset, limit);

        debug!(
            "Merged {} videos at offset {} (fetch size {})",
            items.len(),
            offset,
            fetch_size
        );

        VideoPage {
            items,
            reports,
            next_cursor: None,
        }
    }

    /// The next `limit` videos after `position`, reading only `limit` rows
    /// per source.
    pub async fn merge_after(&self, position: &VideoCursor, limit: usize) -> Result<VideoPage> {
        if limit == 0 {
            return Ok(VideoPage::default());
        }

        let results = join_all(self.fetchers.iter().map(|fetcher| {
            fetch_soft(
                fetcher.as_ref(),
                limit,
                position.position(fetcher.source()),
            )
        }))
        .await;

        let (batches, reports): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        let items = merge_window(batches, 0, limit);

        let mut next = position.clone();
        next.advance(&items);
        let next_cursor = if items.is_empty() {
            None
        } else {
            Some(cursor::encode(&next)?)
        };

        debug!("Merged {} videos after cursor", items.len());

        Ok(VideoPage {
            items,
            reports,
            next_cursor,
        })
    }
}

#[async_trait]
impl PageSource<UnifiedVideoItem> for VideoMerger {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<UnifiedVideoItem>> {
        let page = match self.mode {
            PaginationMode::Offset => self.merge_videos(request.offset, request.limit).await,
            PaginationMode::Cursor => {
                let position = match request.cursor.as_deref() {
                    Some(token) => cursor::decode::<VideoCursor>(token)?,
                    None => VideoCursor::default(),
                };
                self.merge_after(&position, request.limit).await?
            }
        };

        Ok(Page {
            items: page.items,
            next_cursor: page.next_cursor,
            total: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};
    use tokio::sync::Notify;
    use tokio_test::{assert_pending, assert_ready};

    use crate::app::FeedError;
    use crate::domain::{Keyset, VideoSource};
    use crate::feed::pager::FeedPager;
    use crate::store::sqlite::fixtures::*;
    use crate::store::SqliteStore;

    /// In-memory source holding a newest-first list.
    struct FixedSource {
        source: VideoSource,
        items: Vec<UnifiedVideoItem>,
        calls: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    impl FixedSource {
        fn build(source: VideoSource, secs: &[i64], gate: Option<Arc<Notify>>) -> Arc<Self> {
            let items = secs
                .iter()
                .map(|s| {
                    UnifiedVideoItem::new(
                        source,
                        &format!("{}", s),
                        format!("{}", s),
                        "pl".into(),
                        "https://videos.example.com/v.mp4".into(),
                        Utc.timestamp_opt(*s, 0).unwrap(),
                    )
                })
                .collect();
            Arc::new(Self {
                source,
                items,
                calls: AtomicUsize::new(0),
                fail: false,
                gate,
            })
        }

        fn new(source: VideoSource, secs: &[i64]) -> Arc<Self> {
            Self::build(source, secs, None)
        }

        /// Holds every fetch until `gate` is notified.
        fn gated(source: VideoSource, secs: &[i64], gate: Arc<Notify>) -> Arc<Self> {
            Self::build(source, secs, Some(gate))
        }

        fn failing(source: VideoSource) -> Arc<Self> {
            Arc::new(Self {
                source,
                items: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
                gate: None,
            })
        }
    }

    #[async_trait]
    impl VideoFetcher for FixedSource {
        fn source(&self) -> VideoSource {
            self.source
        }

        async fn fetch_videos(
            &self,
            limit: usize,
            after: Option<&Keyset>,
        ) -> Result<Vec<UnifiedVideoItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(FeedError::Other("permission denied".into()));
            }
            Ok(self
                .items
                .iter()
                .filter(|i| match after {
                    Some(k) => k.precedes(i.created_at, i.source_row_id()),
                    None => true,
                })
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn scenario() -> VideoMerger {
        VideoMerger::new(vec![
            FixedSource::new(VideoSource::Post, &[10, 7, 3]),
            FixedSource::new(VideoSource::Product, &[9, 5]),
            FixedSource::new(VideoSource::Place, &[8]),
        ])
    }

    fn stamps(items: &[UnifiedVideoItem]) -> Vec<(i64, VideoSource)> {
        items
            .iter()
            .map(|i| (i.created_at.timestamp(), i.source))
            .collect()
    }

    #[tokio::test]
    async fn test_first_window_is_global_top_three() {
        let page = scenario().merge_videos(0, 3).await;
        assert_eq!(
            stamps(&page.items),
            vec![
                (10, VideoSource::Post),
                (9, VideoSource::Product),
                (8, VideoSource::Place)
            ]
        );
    }

    #[tokio::test]
    async fn test_second_window_continues_global_order() {
        let page = scenario().merge_videos(3, 3).await;
        assert_eq!(
            stamps(&page.items),
            vec![
                (7, VideoSource::Post),
                (5, VideoSource::Product),
                (3, VideoSource::Post)
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_equals_slice_of_global_sort() {
        let merger = scenario();
        let all = merger.merge_videos(0, 100).await.items;
        assert_eq!(all.len(), 6);

        for offset in 0..7 {
            for limit in 1..4 {
                let page = merger.merge_videos(offset, limit).await.items;
                let expected = window(all.clone(), offset, limit);
                assert_eq!(page, expected, "offset {} limit {}", offset, limit);
            }
        }
    }

    #[tokio::test]
    async fn test_each_source_asked_once_per_page() {
        let post = FixedSource::new(VideoSource::Post, &[3, 2, 1]);
        let merger = VideoMerger::new(vec![post.clone()]);
        merger.merge_videos(0, 2).await;
        assert_eq!(post.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_source_contributes_nothing() {
        let merger = VideoMerger::new(vec![
            FixedSource::new(VideoSource::Post, &[4, 2]),
            FixedSource::failing(VideoSource::Story),
        ]);

        let page = merger.merge_videos(0, 5).await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.reports.len(), 2);

        let failed: Vec<_> = page.failed_sources().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source, VideoSource::Story);
    }

    #[tokio::test]
    async fn test_zero_limit_fetches_nothing() {
        let post = FixedSource::new(VideoSource::Post, &[1]);
        let merger = VideoMerger::new(vec![post.clone()]);
        assert!(merger.merge_videos(0, 0).await.items.is_empty());
        assert_eq!(post.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cursor_pages_match_offset_pages() {
        let merger = scenario();
        let mut position = VideoCursor::default();
        let mut seen = Vec::new();

        loop {
            let page = merger.merge_after(&position, 2).await.unwrap();
            if page.items.is_empty() {
                assert!(page.next_cursor.is_none());
                break;
            }
            seen.extend(page.items);
            position = cursor::decode(&page.next_cursor.unwrap()).unwrap();
        }

        let offset_order = merger.merge_videos(0, 100).await.items;
        assert_eq!(seen, offset_order);
    }

    #[tokio::test]
    async fn test_page_source_cursor_mode_threads_token() {
        let merger = scenario().with_mode(PaginationMode::Cursor);

        let first = merger.fetch_page(&PageRequest::first(3)).await.unwrap();
        assert_eq!(first.items.len(), 3);

        let second = merger
            .fetch_page(&PageRequest {
                offset: 3,
                limit: 3,
                cursor: first.next_cursor,
            })
            .await
            .unwrap();
        assert_eq!(
            stamps(&second.items),
            vec![
                (7, VideoSource::Post),
                (5, VideoSource::Product),
                (3, VideoSource::Post)
            ]
        );
    }

    #[test]
    fn test_video_pager_fetches_each_source_once_while_loading() {
        let gate = Arc::new(Notify::new());
        let sources = vec![
            FixedSource::gated(VideoSource::Post, &[10, 7, 3], gate.clone()),
            FixedSource::gated(VideoSource::Product, &[9, 5], gate.clone()),
            FixedSource::gated(VideoSource::Place, &[8], gate.clone()),
        ];
        let fetchers: Vec<Arc<dyn VideoFetcher>> = sources
            .iter()
            .map(|s| s.clone() as Arc<dyn VideoFetcher>)
            .collect();
        let pager: FeedPager<UnifiedVideoItem> =
            FeedPager::new(Arc::new(VideoMerger::new(fetchers)), 3);

        let mut first = tokio_test::task::spawn(pager.fetch_next_page());
        assert_pending!(first.poll());
        assert!(pager.is_loading());

        assert!(!tokio_test::block_on(pager.fetch_next_page()));
        assert!(!tokio_test::block_on(pager.fetch_next_page()));

        gate.notify_waiters();
        assert!(assert_ready!(first.poll()));

        for source in &sources {
            assert_eq!(source.calls.load(Ordering::SeqCst), 1, "{}", source.source);
        }
        assert_eq!(
            stamps(&pager.items()),
            vec![
                (10, VideoSource::Post),
                (9, VideoSource::Product),
                (8, VideoSource::Place)
            ]
        );
    }

    #[tokio::test]
    async fn test_huge_offset_does_not_overflow() {
        let post = FixedSource::new(VideoSource::Post, &[3, 2, 1]);
        let merger = VideoMerger::new(vec![post.clone()]);

        let page = merger.merge_videos(usize::MAX, 1).await;
        assert!(page.items.is_empty());
        assert_eq!(post.calls.load(Ordering::SeqCst), 1);
    }

    fn store_with_unusable_head() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        store.add_place(&place("pl", 1)).unwrap();
        let mut bad = post("bad", "pl", 10);
        bad.video_url = Some("uploads/bad.mp4".into());
        store.add_post(&bad).unwrap();
        store.add_post(&with_video(post("good", "pl", 7))).unwrap();
        store.add_product(&product("pr1", "pl", 2)).unwrap();
        store.add_product_video(&product_video("pv", "pr1", 5)).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_unusable_url_at_source_head_keeps_window_exact() {
        let merger = VideoMerger::from_store(store_with_unusable_head());

        let first = merger.merge_videos(0, 1).await;
        let ids: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["post-good"]);

        let mut offset_ids = Vec::new();
        for offset in 0..3 {
            let page = merger.merge_videos(offset, 1).await;
            offset_ids.extend(page.items.into_iter().map(|i| i.id));
        }
        assert_eq!(offset_ids, vec!["post-good", "product-pv"]);

        let mut position = VideoCursor::default();
        let mut cursor_ids = Vec::new();
        loop {
            let page = merger.merge_after(&position, 1).await.unwrap();
            let Some(token) = page.next_cursor else { break };
            cursor_ids.extend(page.items.into_iter().map(|i| i.id));
            position = cursor::decode(&token).unwrap();
        }
        assert_eq!(cursor_ids, vec!["post-good", "product-pv"]);
    }

    #[tokio::test]
    async fn test_merges_store_sources_with_story_in_place_bucket() {
        let store = SqliteStore::in_memory().unwrap();
        let mut filmed = place("pl", 1);
        filmed.video_url = Some("https://videos.example.com/tour.mp4".into());
        store.add_place(&filmed).unwrap();
        store.add_post(&with_video(post("p1", "pl", 4))).unwrap();
        store.add_product(&product("pr1", "pl", 2)).unwrap();
        store.add_product_video(&product_video("pv1", "pr1", 3)).unwrap();
        store.add_story(&video_story("s1", "pl", 5)).unwrap();

        let page = VideoMerger::from_store(Arc::new(store))
            .merge_videos(0, 10)
            .await;

        let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["story-s1", "post-p1", "product-pv1", "place-pl"]);
        assert!(page.reports.iter().all(|r| r.is_ok()));

        let story = &page.items[0];
        assert_eq!(story.entity_type, crate::domain::EntityKind::Place);
        assert_eq!(story.entity_id, "pl");
    }
}
