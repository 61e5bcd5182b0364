use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{FeedError, Result};
use crate::config::Config;
use crate::domain::{EntityKind, FeedItem, Session, UnifiedVideoItem};
use crate::feed::{
    CountsAggregator, EntitySource, FeedPager, OwnerScope, PageSource, VideoMerger,
};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub config: Config,
    pub session: Session,
}

impl AppContext {
    /// Open the database at `db_path`, falling back to the configured path
    /// and then to the data directory.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path.or_else(|| config.store.path.clone()) {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);

        Ok(Self {
            store,
            config,
            session: Session::anonymous(),
        })
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);

        Ok(Self {
            store,
            config,
            session: Session::anonymous(),
        })
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Source for one entity kind, optionally limited to the session user's
    /// rows. `owned` with an anonymous session yields nothing.
    pub fn entity_source(&self, kind: EntityKind, owned: bool) -> EntitySource<SqliteStore> {
        let scope = if owned {
            OwnerScope::viewer(&self.session)
        } else {
            OwnerScope::Everyone
        };

        EntitySource::new(self.store.clone(), kind)
            .with_scope(scope)
            .with_mode(self.config.feed.pagination)
            .with_exact_totals(self.config.feed.exact_totals)
    }

    pub fn entity_pager(&self, kind: EntityKind, owned: bool) -> FeedPager<FeedItem> {
        let source: Arc<dyn PageSource<FeedItem>> = Arc::new(self.entity_source(kind, owned));
        FeedPager::new(source, self.config.feed.page_size)
    }

    pub fn video_merger(&self) -> VideoMerger {
        VideoMerger::from_store(self.store.clone()).with_mode(self.config.feed.pagination)
    }

    pub fn video_pager(&self) -> FeedPager<UnifiedVideoItem> {
        let source: Arc<dyn PageSource<UnifiedVideoItem>> = Arc::new(self.video_merger());
        FeedPager::new(source, self.config.feed.video_page_size)
    }

    pub fn counts(&self) -> CountsAggregator<SqliteStore> {
        CountsAggregator::new(self.store.clone())
            .with_batch_size(self.config.counts.batch_size)
            .with_session(self.session.clone())
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FeedError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("placefeed");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("placefeed.db"))
    }
}
