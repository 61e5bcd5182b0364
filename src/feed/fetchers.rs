//! Source fetchers: one per entity kind and one per video source.
//!
//! Store rows are mapped into feed items here and nowhere else.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::app::Result;
use crate::domain::{
    EntityKind, FeedItem, FeedPayload, Keyset, PlaceCard, PlaceRow, PostCard, PostRow,
    ProductCard, ProductRow, Session, UnifiedVideoItem, VideoRow, VideoSource,
};
use crate::feed::cursor;
use crate::feed::source::{Page, PageRequest, PageSource, PaginationMode};
use crate::store::{RecentQuery, Store};

pub fn place_item(row: PlaceRow) -> FeedItem {
    FeedItem {
        id: row.id,
        created_at: row.created_at,
        payload: FeedPayload::Place(PlaceCard {
            name: row.name,
            owner_id: row.owner_id,
            description: row.description,
            logo_url: row.logo_url,
            cover_url: row.cover_url,
            video_url: row.video_url,
        }),
    }
}

pub fn post_item(row: PostRow) -> FeedItem {
    FeedItem {
        id: row.id,
        created_at: row.created_at,
        payload: FeedPayload::Post(PostCard {
            place_id: row.place_id,
            title: row.title,
            content: row.content,
            image_url: row.image_url,
            video_url: row.video_url,
        }),
    }
}

pub fn product_item(row: ProductRow) -> FeedItem {
    FeedItem {
        id: row.id,
        created_at: row.created_at,
        payload: FeedPayload::Product(ProductCard {
            place_id: row.place_id,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
        }),
    }
}

/// Maps a video row, dropping it when the URL is not an absolute URL.
pub fn video_item(source: VideoSource, row: VideoRow) -> Option<UnifiedVideoItem> {
    if let Err(e) = Url::parse(&row.video_url) {
        debug!(
            "Skipping {} video {} with unusable URL: {}",
            source, row.row_id, e
        );
        return None;
    }

    let mut item = UnifiedVideoItem::new(
        source,
        &row.row_id,
        row.entity_id,
        row.place_id,
        row.video_url,
        row.created_at,
    );
    item.title = row.title;
    item.place_name = row.place_name;
    item.logo_url = row.logo_url;
    Some(item)
}

/// Whose entities a single-kind feed shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OwnerScope {
    #[default]
    Everyone,
    Owner(String),
    /// "Mine" for a viewer who isn't signed in.
    Nobody,
}

impl OwnerScope {
    /// The session user's own entities, or nothing for an anonymous session.
    pub fn viewer(session: &Session) -> Self {
        match session.user_id() {
            Some(user_id) => OwnerScope::Owner(user_id.to_string()),
            None => OwnerScope::Nobody,
        }
    }

    fn owner_id(&self) -> Option<&str> {
        match self {
            OwnerScope::Owner(owner_id) => Some(owner_id.as_str()),
            _ => None,
        }
    }
}

/// Single-kind feed backed by the store.
///
/// Errors propagate so the pager can surface them.
pub struct EntitySource<S> {
    store: Arc<S>,
    kind: EntityKind,
    scope: OwnerScope,
    mode: PaginationMode,
    exact_totals: bool,
}

impl<S: Store> EntitySource<S> {
    pub fn new(store: Arc<S>, kind: EntityKind) -> Self {
        Self {
            store,
            kind,
            scope: OwnerScope::Everyone,
            mode: PaginationMode::Offset,
            exact_totals: false,
        }
    }

    /// Restrict by owner ("my places").
    pub fn with_scope(mut self, scope: OwnerScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Report a `COUNT(*)` total with every page.
    pub fn with_exact_totals(mut self, exact_totals: bool) -> Self {
        self.exact_totals = exact_totals;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    fn query(&self, request: &PageRequest) -> Result<RecentQuery> {
        let query = match (self.mode, request.cursor.as_deref()) {
            (PaginationMode::Cursor, Some(token)) => {
                RecentQuery::after(cursor::decode::<Keyset>(token)?, request.limit)
            }
            (PaginationMode::Cursor, None) => RecentQuery::latest(request.limit),
            (PaginationMode::Offset, _) => RecentQuery::page(request.offset, request.limit),
        };
        Ok(query.owned_by(self.scope.owner_id().map(str::to_string)))
    }

    pub fn fetch_items(&self, request: &PageRequest) -> Result<Vec<FeedItem>> {
        if self.scope == OwnerScope::Nobody {
            return Ok(Vec::new());
        }
        let query = self.query(request)?;
        let items = match self.kind {
            EntityKind::Place => self
                .store
                .recent_places(&query)?
                .into_iter()
                .map(place_item)
                .collect(),
            EntityKind::Post => self
                .store
                .recent_posts(&query)?
                .into_iter()
                .map(post_item)
                .collect(),
            EntityKind::Product => self
                .store
                .recent_products(&query)?
                .into_iter()
                .map(product_item)
                .collect(),
        };
        Ok(items)
    }
}

#[async_trait]
impl<S: Store + Send + Sync> PageSource<FeedItem> for EntitySource<S> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<FeedItem>> {
        let items = self.fetch_items(request).map_err(|e| {
            warn!("Failed to load {} feed: {}", self.kind, e);
            e
        })?;

        let mut page = Page::new(items);
        if self.mode == PaginationMode::Cursor {
            if let Some(last) = page.items.last() {
                page.next_cursor = Some(cursor::encode(&cursor::keyset_of(last))?);
            }
        }
        if self.exact_totals {
            page.total = Some(match self.scope {
                OwnerScope::Nobody => 0,
                _ => self.store.count_entities(self.kind, self.scope.owner_id())?,
            });
        }

        debug!(
            "Loaded {} {} items (offset {})",
            page.items.len(),
            self.kind,
            request.offset
        );
        Ok(page)
    }
}

/// One video-bearing source.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    fn source(&self) -> VideoSource;

    /// Up to `limit` usable videos, newest first, strictly after `after` if
    /// given. Fewer than `limit` means the source is exhausted.
    async fn fetch_videos(
        &self,
        limit: usize,
        after: Option<&Keyset>,
    ) -> Result<Vec<UnifiedVideoItem>>;
}

pub struct StoreVideoFetcher<S> {
    store: Arc<S>,
    source: VideoSource,
}

impl<S: Store + Send + Sync + 'static> StoreVideoFetcher<S> {
    pub fn new(store: Arc<S>, source: VideoSource) -> Self {
        Self { store, source }
    }

    /// One fetcher per video source, in merge order.
    pub fn all(store: Arc<S>) -> Vec<Arc<dyn VideoFetcher>> {
        VideoSource::ALL
            .iter()
            .map(|source| {
                Arc::new(StoreVideoFetcher::new(store.clone(), *source)) as Arc<dyn VideoFetcher>
            })
            .collect()
    }
}

#[async_trait]
impl<S: Store + Send + Sync> VideoFetcher for StoreVideoFetcher<S> {
    fn source(&self) -> VideoSource {
        self.source
    }

    async fn fetch_videos(
        &self,
        limit: usize,
        after: Option<&Keyset>,
    ) -> Result<Vec<UnifiedVideoItem>> {
        let mut items = Vec::new();
        let mut position = after.cloned();

        // Rejected rows don't count toward `limit`; keep reading past them.
        while items.len() < limit {
            let wanted = limit - items.len();
            let query = match &position {
                Some(keyset) => RecentQuery::after(keyset.clone(), wanted),
                None => RecentQuery::latest(wanted),
            };

            let rows = self.store.recent_videos(self.source, &query)?;
            let exhausted = rows.len() < wanted;
            if let Some(last) = rows.last() {
                position = Some(Keyset::new(last.created_at, last.row_id.clone()));
            }
            items.extend(
                rows.into_iter()
                    .filter_map(|row| video_item(self.source, row)),
            );

            if exhausted {
                break;
            }
        }

        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceStatus {
    Ok { count: usize },
    Failed { reason: String },
}

/// Outcome of one source during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: VideoSource,
    #[serde(flatten)]
    pub status: SourceStatus,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, SourceStatus::Ok { .. })
    }
}

/// Runs a fetcher, turning a failure into an empty contribution.
pub async fn fetch_soft(
    fetcher: &dyn VideoFetcher,
    limit: usize,
    after: Option<&Keyset>,
) -> (Vec<UnifiedVideoItem>, SourceReport) {
    let source = fetcher.source();
    match fetcher.fetch_videos(limit, after).await {
        Ok(items) => {
            let report = SourceReport {
                source,
                status: SourceStatus::Ok { count: items.len() },
            };
            (items, report)
        }
        Err(e) => {
            warn!("Video source {} failed, contributing nothing: {}", source, e);
            let report = SourceReport {
                source,
                status: SourceStatus::Failed {
                    reason: e.to_string(),
                },
            };
            (Vec::new(), report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedEntry;
    use crate::store::sqlite::fixtures::*;
    use crate::store::SqliteStore;

    fn seeded() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        store.add_place(&place("pl", 0)).unwrap();
        for i in 1..=5 {
            store.add_post(&post(&format!("p{}", i), "pl", i)).unwrap();
        }
        Arc::new(store)
    }

    fn page_ids(page: &Page<FeedItem>) -> Vec<&str> {
        page.items.iter().map(|i| i.id()).collect()
    }

    #[tokio::test]
    async fn test_entity_source_offset_pages() {
        let source = EntitySource::new(seeded(), EntityKind::Post);

        let first = source.fetch_page(&PageRequest::first(2)).await.unwrap();
        assert_eq!(page_ids(&first), vec!["p5", "p4"]);
        assert!(first.next_cursor.is_none());
        assert!(first.total.is_none());

        let second = source
            .fetch_page(&PageRequest {
                offset: 2,
                limit: 2,
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(page_ids(&second), vec!["p3", "p2"]);
    }

    #[tokio::test]
    async fn test_entity_source_cursor_pages() {
        let source = EntitySource::new(seeded(), EntityKind::Post).with_mode(PaginationMode::Cursor);

        let first = source.fetch_page(&PageRequest::first(3)).await.unwrap();
        assert_eq!(page_ids(&first), vec!["p5", "p4", "p3"]);

        let second = source
            .fetch_page(&PageRequest {
                offset: 3,
                limit: 3,
                cursor: first.next_cursor.clone(),
            })
            .await
            .unwrap();
        assert_eq!(page_ids(&second), vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_owner_scope_filters_and_anonymous_mine_is_empty() {
        let store = seeded();
        let mut mine = place("mine", 6);
        mine.owner_id = Some("u1".into());
        store.add_place(&mine).unwrap();

        let owned = EntitySource::new(store.clone(), EntityKind::Place)
            .with_scope(OwnerScope::viewer(&Session::for_user("u1")));
        let page = owned.fetch_page(&PageRequest::first(5)).await.unwrap();
        assert_eq!(page_ids(&page), vec!["mine"]);

        let anonymous = EntitySource::new(store, EntityKind::Place)
            .with_scope(OwnerScope::viewer(&Session::anonymous()))
            .with_exact_totals(true);
        let page = anonymous.fetch_page(&PageRequest::first(5)).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(0));
    }

    #[tokio::test]
    async fn test_entity_source_reports_exact_total() {
        let source = EntitySource::new(seeded(), EntityKind::Post).with_exact_totals(true);
        let page = source.fetch_page(&PageRequest::first(2)).await.unwrap();
        assert_eq!(page.total, Some(5));
    }

    #[tokio::test]
    async fn test_entity_source_propagates_store_errors() {
        let store = seeded();
        store.execute_raw("DROP TABLE posts").unwrap();

        let source = EntitySource::new(store, EntityKind::Post);
        assert!(source.fetch_page(&PageRequest::first(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_entity_source_rejects_bad_cursor() {
        let source = EntitySource::new(seeded(), EntityKind::Post).with_mode(PaginationMode::Cursor);
        let request = PageRequest {
            offset: 0,
            limit: 2,
            cursor: Some("%%%".into()),
        };
        assert!(source.fetch_page(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_entity_source_maps_kind_payload() {
        let store = seeded();
        store.add_product(&product("pr1", "pl", 9)).unwrap();

        let places = EntitySource::new(store.clone(), EntityKind::Place);
        let page = places.fetch_page(&PageRequest::first(5)).await.unwrap();
        assert!(page.items.iter().all(|i| i.kind() == EntityKind::Place));

        let products = EntitySource::new(store, EntityKind::Product);
        let page = products.fetch_page(&PageRequest::first(5)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].display_title(), "Product pr1");
    }

    #[test]
    fn test_video_item_drops_relative_urls() {
        let row = VideoRow {
            row_id: "v1".into(),
            entity_id: "v1".into(),
            place_id: "pl".into(),
            title: None,
            video_url: "uploads/v1.mp4".into(),
            created_at: at(1),
            place_name: None,
            logo_url: None,
        };
        assert!(video_item(VideoSource::Post, row.clone()).is_none());

        let ok = VideoRow {
            video_url: "https://videos.example.com/v1.mp4".into(),
            ..row
        };
        let item = video_item(VideoSource::Post, ok).unwrap();
        assert_eq!(item.id, "post-v1");
    }

    #[tokio::test]
    async fn test_store_video_fetcher_continues_after_keyset() {
        let store = seeded();
        for i in 1..=3 {
            store
                .add_post(&with_video(post(&format!("v{}", i), "pl", 10 + i)))
                .unwrap();
        }
        let fetcher = StoreVideoFetcher::new(store, VideoSource::Post);

        let first = fetcher.fetch_videos(2, None).await.unwrap();
        assert_eq!(first[0].id, "post-v3");
        assert_eq!(first[1].id, "post-v2");

        let after = Keyset::new(first[1].created_at, first[1].source_row_id());
        let rest = fetcher.fetch_videos(2, Some(&after)).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "post-v1");
    }

    fn with_url(mut row: PostRow, url: &str) -> PostRow {
        row.video_url = Some(url.into());
        row
    }

    #[tokio::test]
    async fn test_store_video_fetcher_skips_unusable_urls_without_losing_rows() {
        let store = seeded();
        store
            .add_post(&with_url(post("bad1", "pl", 12), "uploads/bad1.mp4"))
            .unwrap();
        store
            .add_post(&with_url(post("bad2", "pl", 11), "not a url"))
            .unwrap();
        store.add_post(&with_video(post("good", "pl", 10))).unwrap();
        store
            .add_post(&with_url(post("bad3", "pl", 9), "/relative.mp4"))
            .unwrap();
        store.add_post(&with_video(post("older", "pl", 8))).unwrap();
        let fetcher = StoreVideoFetcher::new(store, VideoSource::Post);

        let first = fetcher.fetch_videos(1, None).await.unwrap();
        let ids: Vec<&str> = first.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["post-good"]);

        let after = Keyset::new(first[0].created_at, first[0].source_row_id());
        let rest = fetcher.fetch_videos(5, Some(&after)).await.unwrap();
        let ids: Vec<&str> = rest.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["post-older"]);
    }

    #[tokio::test]
    async fn test_fetch_soft_reports_failure_as_empty() {
        let store = seeded();
        store.execute_raw("DROP TABLE stories").unwrap();

        let fetcher = StoreVideoFetcher::new(store, VideoSource::Story);
        let (items, report) = fetch_soft(&fetcher, 5, None).await;

        assert!(items.is_empty());
        assert!(!report.is_ok());
        assert_eq!(report.source, VideoSource::Story);
    }
}
