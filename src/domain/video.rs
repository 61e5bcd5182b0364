use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CountTarget, EntityKind, FeedEntry};

/// Where a unified video came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Post,
    Product,
    Place,
    Story,
}

impl VideoSource {
    /// Concatenation order used by the merge; ties in `created_at` keep this order.
    pub const ALL: [VideoSource; 4] = [
        VideoSource::Post,
        VideoSource::Product,
        VideoSource::Place,
        VideoSource::Story,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoSource::Post => "post",
            VideoSource::Product => "product",
            VideoSource::Place => "place",
            VideoSource::Story => "story",
        }
    }

    /// Bucket used for social counts. Stories borrow their place's bucket.
    pub fn entity_type(&self) -> EntityKind {
        match self {
            VideoSource::Post => EntityKind::Post,
            VideoSource::Product => EntityKind::Product,
            VideoSource::Place | VideoSource::Story => EntityKind::Place,
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedVideoItem {
    pub id: String,
    pub source: VideoSource,
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub video_url: String,
    pub place_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub place_name: Option<String>,
    pub logo_url: Option<String>,
}

impl UnifiedVideoItem {
    /// Builds an item whose id is `{source}-{row_id}` and whose count bucket
    /// is derived from the source.
    pub fn new(
        source: VideoSource,
        row_id: &str,
        entity_id: String,
        place_id: String,
        video_url: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::composite_id(source, row_id),
            source,
            entity_id,
            entity_type: source.entity_type(),
            video_url,
            place_id,
            title: None,
            created_at,
            place_name: None,
            logo_url: None,
        }
    }

    pub fn composite_id(source: VideoSource, row_id: &str) -> String {
        format!("{}-{}", source.as_str(), row_id)
    }

    /// Id of the row in the source table.
    pub fn source_row_id(&self) -> &str {
        self.id
            .strip_prefix(self.source.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(&self.id)
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.place_name.as_deref())
            .unwrap_or("(Untitled)")
    }
}

impl FeedEntry for UnifiedVideoItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl CountTarget for UnifiedVideoItem {
    fn entity_type(&self) -> EntityKind {
        self.entity_type
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }
}
