//! Typed rows exchanged with the store.
//!
//! Every query result is mapped into one of these structs at the store
//! boundary; fetchers turn them into feed items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EntityKind;

fn default_true() -> bool {
    true
}

fn default_like() -> String {
    "like".to_string()
}

fn default_image() -> String {
    "image".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRow {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub place_id: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVideoRow {
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRow {
    pub id: String,
    pub place_id: String,
    pub media_url: String,
    #[serde(default = "default_image")]
    pub media_type: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRow {
    pub id: String,
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub user_id: String,
    #[serde(default = "default_like")]
    pub interaction_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub user_id: String,
    pub body: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Projection shared by the four video queries.
///
/// `row_id` is the id in the source table; `entity_id` is the id owning the
/// like/comment bucket (the place id for stories and place videos).
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub row_id: String,
    pub entity_id: String,
    pub place_id: String,
    pub title: Option<String>,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
    pub place_name: Option<String>,
    pub logo_url: Option<String>,
}

/// Bulk data accepted by `placefeed import`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub places: Vec<PlaceRow>,
    pub posts: Vec<PostRow>,
    pub products: Vec<ProductRow>,
    pub product_videos: Vec<ProductVideoRow>,
    pub stories: Vec<StoryRow>,
    pub interactions: Vec<InteractionRow>,
    pub comments: Vec<CommentRow>,
}

impl Seed {
    pub fn len(&self) -> usize {
        self.places.len()
            + self.posts.len()
            + self.products.len()
            + self.product_videos.len()
            + self.stories.len()
            + self.interactions.len()
            + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
