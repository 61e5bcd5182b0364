//! Opaque continuation tokens.
//!
//! A token is URL-safe base64 over a small JSON document, so its format can
//! change without clients parsing it.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app::{FeedError, Result};
use crate::domain::{FeedEntry, Keyset, UnifiedVideoItem, VideoSource};

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| FeedError::InvalidCursor(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| FeedError::InvalidCursor(e.to_string()))
}

/// Keyset of the last item in a page.
pub fn keyset_of<T: FeedEntry>(item: &T) -> Keyset {
    Keyset::new(item.created_at(), item.id())
}

/// Per-source positions for the merged video feed.
///
/// A source with no entry has not emitted anything yet and is read from the
/// start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCursor {
    #[serde(rename = "p")]
    pub positions: BTreeMap<VideoSource, Keyset>,
}

impl VideoCursor {
    pub fn position(&self, source: VideoSource) -> Option<&Keyset> {
        self.positions.get(&source)
    }

    /// Move each source's position to the last item it contributed.
    pub fn advance(&mut self, emitted: &[UnifiedVideoItem]) {
        for item in emitted {
            let keyset = Keyset::new(item.created_at, item.source_row_id());
            let replace = match self.positions.get(&item.source) {
                Some(current) => current.precedes(keyset.created_at, &keyset.id),
                None => true,
            };
            if replace {
                self.positions.insert(item.source, keyset);
            }
        }
    }
}
