use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three entity kinds that own a like/comment bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Place,
    Post,
    Product,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Place, EntityKind::Post, EntityKind::Product];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Place => "place",
            EntityKind::Post => "post",
            EntityKind::Product => "product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Accepts singular and plural forms ("post", "posts").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "place" | "places" => Ok(EntityKind::Place),
            "post" | "posts" => Ok(EntityKind::Post),
            "product" | "products" => Ok(EntityKind::Product),
            other => Err(format!(
                "Unknown entity kind: {}. Use place, post or product",
                other
            )),
        }
    }
}
