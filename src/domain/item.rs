use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EntityKind;

/// Anything that can sit in a reverse-chronological feed.
pub trait FeedEntry {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Anything that can be looked up in the like/comment counts store.
pub trait CountTarget {
    fn entity_type(&self) -> EntityKind;
    fn entity_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCard {
    pub name: String,
    pub owner_id: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCard {
    pub place_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCard {
    pub place_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedPayload {
    Place(PlaceCard),
    Post(PostCard),
    Product(ProductCard),
}

/// A single-kind feed entry (place, post or product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: FeedPayload,
}

impl FeedItem {
    pub fn kind(&self) -> EntityKind {
        match self.payload {
            FeedPayload::Place(_) => EntityKind::Place,
            FeedPayload::Post(_) => EntityKind::Post,
            FeedPayload::Product(_) => EntityKind::Product,
        }
    }

    pub fn display_title(&self) -> &str {
        match &self.payload {
            FeedPayload::Place(place) => &place.name,
            FeedPayload::Post(post) => post
                .title
                .as_deref()
                .or(post.content.as_deref())
                .unwrap_or("(Untitled)"),
            FeedPayload::Product(product) => &product.name,
        }
    }

    /// Best media URL for a thumbnail, video first.
    pub fn display_media(&self) -> Option<&str> {
        match &self.payload {
            FeedPayload::Place(place) => place
                .video_url
                .as_deref()
                .or(place.cover_url.as_deref())
                .or(place.logo_url.as_deref()),
            FeedPayload::Post(post) => post.video_url.as_deref().or(post.image_url.as_deref()),
            FeedPayload::Product(product) => product.image_url.as_deref(),
        }
    }
}

impl FeedEntry for FeedItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl CountTarget for FeedItem {
    fn entity_type(&self) -> EntityKind {
        self.kind()
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: Option<&str>, content: Option<&str>) -> FeedItem {
        FeedItem {
            id: "p1".into(),
            created_at: Utc::now(),
            payload: FeedPayload::Post(PostCard {
                place_id: "pl1".into(),
                title: title.map(String::from),
                content: content.map(String::from),
                image_url: Some("https://cdn.example.com/a.jpg".into()),
                video_url: None,
            }),
        }
    }

    #[test]
    fn test_kind_follows_payload() {
        assert_eq!(post(None, None).kind(), EntityKind::Post);
    }

    #[test]
    fn test_display_title_falls_back_to_content() {
        assert_eq!(post(Some("Hello"), Some("Body")).display_title(), "Hello");
        assert_eq!(post(None, Some("Body")).display_title(), "Body");
        assert_eq!(post(None, None).display_title(), "(Untitled)");
    }

    #[test]
    fn test_display_media_prefers_video() {
        let mut item = post(None, None);
        assert_eq!(item.display_media(), Some("https://cdn.example.com/a.jpg"));

        if let FeedPayload::Post(ref mut card) = item.payload {
            card.video_url = Some("https://cdn.example.com/a.mp4".into());
        }
        assert_eq!(item.display_media(), Some("https://cdn.example.com/a.mp4"));
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(post(Some("Hello"), None)).unwrap();
        assert_eq!(json["kind"], "post");
        assert_eq!(json["id"], "p1");
        assert_eq!(json["title"], "Hello");
    }
}
