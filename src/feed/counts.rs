//! Like/comment counts for visible feed items.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{CountTarget, EntityKind, Session};
use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub like_count: u64,
    pub comment_count: u64,
}

/// Counts for one entity kind. Every requested id is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountsMap {
    pub like_count_by_entity_id: HashMap<String, u64>,
    pub comment_count_by_entity_id: HashMap<String, u64>,
    /// Ids the session's user has liked; empty for anonymous sessions.
    pub liked_by_viewer: HashSet<String>,
}

impl CountsMap {
    fn zeroed(ids: &[String]) -> Self {
        Self {
            like_count_by_entity_id: ids.iter().map(|id| (id.clone(), 0)).collect(),
            comment_count_by_entity_id: ids.iter().map(|id| (id.clone(), 0)).collect(),
            liked_by_viewer: HashSet::new(),
        }
    }

    pub fn get(&self, entity_id: &str) -> EntityCounts {
        EntityCounts {
            like_count: self
                .like_count_by_entity_id
                .get(entity_id)
                .copied()
                .unwrap_or(0),
            comment_count: self
                .comment_count_by_entity_id
                .get(entity_id)
                .copied()
                .unwrap_or(0),
        }
    }

    pub fn is_liked(&self, entity_id: &str) -> bool {
        self.liked_by_viewer.contains(entity_id)
    }

    pub fn len(&self) -> usize {
        self.like_count_by_entity_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.like_count_by_entity_id.is_empty()
    }
}

/// An item paired with its counts, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counted<T> {
    pub item: T,
    pub counts: EntityCounts,
    pub liked: bool,
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

pub struct CountsAggregator<S> {
    store: Arc<S>,
    batch_size: usize,
    session: Session,
}

impl<S: Store> CountsAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            session: Session::anonymous(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Counts for `entity_ids` in `kind`'s bucket, zero for anything missing.
    ///
    /// A failed batch keeps its zero defaults; other batches are unaffected.
    pub async fn entity_counts(&self, entity_ids: &[String], kind: EntityKind) -> CountsMap {
        let ids = dedup_ids(entity_ids);
        let mut counts = CountsMap::zeroed(&ids);

        for batch in ids.chunks(self.batch_size) {
            match self.store.like_counts(kind, batch) {
                Ok(rows) => counts.like_count_by_entity_id.extend(rows),
                Err(e) => warn!("Like counts failed for {} {} ids: {}", batch.len(), kind, e),
            }

            match self.store.comment_counts(kind, batch) {
                Ok(rows) => counts.comment_count_by_entity_id.extend(rows),
                Err(e) => warn!(
                    "Comment counts failed for {} {} ids: {}",
                    batch.len(),
                    kind,
                    e
                ),
            }

            if let Some(user_id) = self.session.user_id() {
                match self.store.liked_by(kind, user_id, batch) {
                    Ok(liked) => counts.liked_by_viewer.extend(liked),
                    Err(e) => warn!("Viewer likes failed for {} ids: {}", batch.len(), e),
                }
            }
        }

        debug!("Counted {} {} entities", counts.len(), kind);
        counts
    }

    /// Pair each item with its counts, looking up each bucket once.
    pub async fn annotate<T: CountTarget + Clone>(&self, items: &[T]) -> Vec<Counted<T>> {
        let mut by_kind: HashMap<EntityKind, Vec<String>> = HashMap::new();
        for item in items {
            by_kind
                .entry(item.entity_type())
                .or_default()
                .push(item.entity_id().to_string());
        }

        let mut maps = HashMap::new();
        for (kind, ids) in by_kind {
            maps.insert(kind, self.entity_counts(&ids, kind).await);
        }

        items
            .iter()
            .map(|item| {
                let map = maps.get(&item.entity_type());
                Counted {
                    item: item.clone(),
                    counts: map
                        .map(|m| m.get(item.entity_id()))
                        .unwrap_or_default(),
                    liked: map.map(|m| m.is_liked(item.entity_id())).unwrap_or(false),
                }
            })
            .collect()
    }
}

/// Counts for the currently visible ids, rebuilt whenever the id set or the
/// kind changes.
#[derive(Debug, Default)]
pub struct CountsView {
    key: Option<(EntityKind, BTreeSet<String>)>,
    counts: CountsMap,
}

impl CountsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the map was rebuilt.
    pub async fn sync<S: Store>(
        &mut self,
        aggregator: &CountsAggregator<S>,
        entity_ids: &[String],
        kind: EntityKind,
    ) -> bool {
        let key = (kind, entity_ids.iter().cloned().collect::<BTreeSet<_>>());
        if self.key.as_ref() == Some(&key) {
            return false;
        }

        self.counts = aggregator.entity_counts(entity_ids, kind).await;
        self.key = Some(key);
        true
    }

    pub fn counts(&self) -> &CountsMap {
        &self.counts
    }
}
