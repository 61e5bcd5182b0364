pub mod sqlite;

use crate::app::Result;
use crate::domain::{
    CommentRow, EntityKind, InteractionRow, Keyset, PlaceRow, PostRow, ProductRow,
    ProductVideoRow, Seed, StoryRow, VideoRow, VideoSource,
};

pub use sqlite::SqliteStore;

/// Filter, sort and limit for a recency query.
///
/// Results are ordered `created_at DESC, id DESC`. `before` restricts the
/// result to rows after that keyset; `offset` skips rows after filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecentQuery {
    pub offset: usize,
    pub limit: usize,
    pub before: Option<Keyset>,
    pub owner_id: Option<String>,
}

impl RecentQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            ..Default::default()
        }
    }

    pub fn after(keyset: Keyset, limit: usize) -> Self {
        Self {
            limit,
            before: Some(keyset),
            ..Default::default()
        }
    }

    pub fn owned_by(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }
}

pub trait Store {
    // Write operations
    fn add_place(&self, place: &PlaceRow) -> Result<()>;
    fn add_post(&self, post: &PostRow) -> Result<()>;
    fn add_product(&self, product: &ProductRow) -> Result<()>;
    fn add_product_video(&self, video: &ProductVideoRow) -> Result<()>;
    fn add_story(&self, story: &StoryRow) -> Result<()>;
    fn add_interaction(&self, interaction: &InteractionRow) -> Result<()>;
    fn add_comment(&self, comment: &CommentRow) -> Result<()>;

    // Feed queries; inactive, deleted and media-less rows are filtered out
    fn recent_places(&self, query: &RecentQuery) -> Result<Vec<PlaceRow>>;
    fn recent_posts(&self, query: &RecentQuery) -> Result<Vec<PostRow>>;
    fn recent_products(&self, query: &RecentQuery) -> Result<Vec<ProductRow>>;
    fn recent_videos(&self, source: VideoSource, query: &RecentQuery) -> Result<Vec<VideoRow>>;
    fn count_entities(&self, kind: EntityKind, owner_id: Option<&str>) -> Result<u64>;

    // Social counts
    fn like_counts(&self, kind: EntityKind, entity_ids: &[String]) -> Result<Vec<(String, u64)>>;
    fn comment_counts(&self, kind: EntityKind, entity_ids: &[String])
        -> Result<Vec<(String, u64)>>;
    fn liked_by(&self, kind: EntityKind, user_id: &str, entity_ids: &[String])
        -> Result<Vec<String>>;
}

/// Write every row of a seed, parents before children. Returns the row count.
pub fn load_seed<S: Store + ?Sized>(store: &S, seed: &Seed) -> Result<usize> {
    for place in &seed.places {
        store.add_place(place)?;
    }
    for post in &seed.posts {
        store.add_post(post)?;
    }
    for product in &seed.products {
        store.add_product(product)?;
    }
    for video in &seed.product_videos {
        store.add_product_video(video)?;
    }
    for story in &seed.stories {
        store.add_story(story)?;
    }
    for interaction in &seed.interactions {
        store.add_interaction(interaction)?;
    }
    for comment in &seed.comments {
        store.add_comment(comment)?;
    }

    tracing::info!("Loaded {} seed rows", seed.len());
    Ok(seed.len())
}
