use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position in a `(created_at DESC, id DESC)` ordering.
///
/// A query continued "after" a keyset returns only rows that sort strictly
/// later, i.e. older rows, or rows with the same timestamp and a smaller id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    #[serde(rename = "t")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "i")]
    pub id: String,
}

impl Keyset {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }

    /// True if a row at `(created_at, id)` comes after this position.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: &str) -> bool {
        match created_at.cmp(&self.created_at) {
            Ordering::Less => true,
            Ordering::Equal => id < self.id.as_str(),
            Ordering::Greater => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_precedes_orders_by_time_then_id() {
        let at = Utc.timestamp_opt(100, 0).unwrap();
        let keyset = Keyset::new(at, "m");

        assert!(keyset.precedes(Utc.timestamp_opt(99, 0).unwrap(), "z"));
        assert!(keyset.precedes(at, "a"));
        assert!(!keyset.precedes(at, "m"));
        assert!(!keyset.precedes(at, "z"));
        assert!(!keyset.precedes(Utc.timestamp_opt(101, 0).unwrap(), "a"));
    }
}
