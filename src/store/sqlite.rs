use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{FeedError, Result};
use crate::domain::{
    CommentRow, EntityKind, InteractionRow, Keyset, PlaceRow, PostRow, ProductRow,
    ProductVideoRow, StoryRow, VideoRow, VideoSource,
};
use crate::store::{RecentQuery, Store};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// WHERE clause under construction, with its positional values.
struct Filter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Filter {
    fn new(base: &[&str]) -> Self {
        Self {
            clauses: base.iter().map(|c| c.to_string()).collect(),
            values: Vec::new(),
        }
    }

    fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.values.extend(values);
    }

    fn owner(&mut self, column: &str, owner_id: Option<&str>) {
        if let Some(owner_id) = owner_id {
            self.push(
                format!("{} = ?", column),
                [Value::Text(owner_id.to_string())],
            );
        }
    }

    fn keyset(&mut self, ts_column: &str, id_column: &str, before: Option<&Keyset>) {
        if let Some(keyset) = before {
            let ts = SqliteStore::format_ts(&keyset.created_at);
            self.push(
                format!(
                    "({ts} < ? OR ({ts} = ? AND {id} < ?))",
                    ts = ts_column,
                    id = id_column
                ),
                [
                    Value::Text(ts.clone()),
                    Value::Text(ts),
                    Value::Text(keyset.id.clone()),
                ],
            );
        }
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Finish as a recency-ordered, limited query.
    fn into_recent(
        mut self,
        select: &str,
        ts_column: &str,
        id_column: &str,
        query: &RecentQuery,
    ) -> (String, Vec<Value>) {
        self.keyset(ts_column, id_column, query.before.as_ref());
        let sql = format!(
            "{}{} ORDER BY {} DESC, {} DESC LIMIT ? OFFSET ?",
            select,
            self.where_sql(),
            ts_column,
            id_column
        );
        self.values
            .push(Value::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
        self.values
            .push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));
        (sql, self.values)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| FeedError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            FeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Fixed-width UTC timestamps so that text order equals time order.
    pub(crate) fn format_ts(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn optional_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
        Ok(row
            .get::<_, Option<String>>(idx)?
            .and_then(|s| Self::parse_datetime(&s)))
    }

    /// Unparseable timestamps sink to the epoch rather than jumping to the top.
    fn required_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        Ok(row
            .get::<_, String>(idx)
            .ok()
            .and_then(|s| Self::parse_datetime(&s))
            .unwrap_or_default())
    }

    fn place_from_row(row: &Row<'_>) -> rusqlite::Result<PlaceRow> {
        Ok(PlaceRow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            logo_url: row.get(4)?,
            cover_url: row.get(5)?,
            video_url: row.get(6)?,
            is_active: row.get::<_, i32>(7)? != 0,
            deleted_at: Self::optional_ts(row, 8)?,
            created_at: Self::required_ts(row, 9)?,
        })
    }

    fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
        Ok(PostRow {
            id: row.get(0)?,
            place_id: row.get(1)?,
            author_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            image_url: row.get(5)?,
            video_url: row.get(6)?,
            is_deleted: row.get::<_, i32>(7)? != 0,
            created_at: Self::required_ts(row, 8)?,
        })
    }

    fn product_from_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
        Ok(ProductRow {
            id: row.get(0)?,
            place_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            price: row.get(4)?,
            image_url: row.get(5)?,
            is_active: row.get::<_, i32>(6)? != 0,
            created_at: Self::required_ts(row, 7)?,
        })
    }

    fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
        Ok(VideoRow {
            row_id: row.get(0)?,
            entity_id: row.get(1)?,
            place_id: row.get(2)?,
            title: row.get(3)?,
            video_url: row.get(4)?,
            created_at: Self::required_ts(row, 5)?,
            place_name: row.get(6)?,
            logo_url: row.get(7)?,
        })
    }

    fn query_rows<T>(
        &self,
        sql: &str,
        values: Vec<Value>,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn grouped_counts(
        &self,
        table_filter: &str,
        kind: EntityKind,
        entity_ids: &[String],
    ) -> Result<Vec<(String, u64)>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT entity_id, COUNT(*) FROM {} AND entity_type = ? AND entity_id IN ({})
             GROUP BY entity_id",
            table_filter,
            placeholders(entity_ids.len())
        );
        let mut values = vec![Value::Text(kind.as_str().to_string())];
        values.extend(entity_ids.iter().cloned().map(Value::Text));

        self.query_rows(&sql, values, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn add_place(&self, place: &PlaceRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO places (id, owner_id, name, description, logo_url, cover_url, video_url,
                                 is_active, deleted_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                place.id,
                place.owner_id,
                place.name,
                place.description,
                place.logo_url,
                place.cover_url,
                place.video_url,
                place.is_active as i32,
                place.deleted_at.as_ref().map(Self::format_ts),
                Self::format_ts(&place.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_post(&self, post: &PostRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO posts (id, place_id, author_id, title, content, image_url, video_url,
                                is_deleted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                post.id,
                post.place_id,
                post.author_id,
                post.title,
                post.content,
                post.image_url,
                post.video_url,
                post.is_deleted as i32,
                Self::format_ts(&post.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_product(&self, product: &ProductRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO products (id, place_id, name, description, price, image_url, is_active,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                product.id,
                product.place_id,
                product.name,
                product.description,
                product.price,
                product.image_url,
                product.is_active as i32,
                Self::format_ts(&product.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_product_video(&self, video: &ProductVideoRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO product_videos (id, product_id, title, video_url, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                video.id,
                video.product_id,
                video.title,
                video.video_url,
                video.is_active as i32,
                Self::format_ts(&video.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_story(&self, story: &StoryRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO stories (id, place_id, media_url, media_type, caption, expires_at,
                                  created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                story.id,
                story.place_id,
                story.media_url,
                story.media_type,
                story.caption,
                story.expires_at.as_ref().map(Self::format_ts),
                Self::format_ts(&story.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_interaction(&self, interaction: &InteractionRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO interactions (id, entity_id, entity_type, user_id, interaction_type,
                                       created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                interaction.id,
                interaction.entity_id,
                interaction.entity_type.as_str(),
                interaction.user_id,
                interaction.interaction_type,
                Self::format_ts(&interaction.created_at)
            ],
        )?;
        Ok(())
    }

    fn add_comment(&self, comment: &CommentRow) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO comments (id, entity_id, entity_type, user_id, body, is_deleted,
                                   created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.id,
                comment.entity_id,
                comment.entity_type.as_str(),
                comment.user_id,
                comment.body,
                comment.is_deleted as i32,
                Self::format_ts(&comment.created_at)
            ],
        )?;
        Ok(())
    }

    fn recent_places(&self, query: &RecentQuery) -> Result<Vec<PlaceRow>> {
        let mut filter = Filter::new(&["is_active = 1", "deleted_at IS NULL"]);
        filter.owner("owner_id", query.owner_id.as_deref());
        let (sql, values) = filter.into_recent(
            "SELECT id, owner_id, name, description, logo_url, cover_url, video_url, is_active,
                    deleted_at, created_at
             FROM places",
            "created_at",
            "id",
            query,
        );
        self.query_rows(&sql, values, Self::place_from_row)
    }

    fn recent_posts(&self, query: &RecentQuery) -> Result<Vec<PostRow>> {
        let mut filter = Filter::new(&["p.is_deleted = 0"]);
        filter.owner("pl.owner_id", query.owner_id.as_deref());
        let (sql, values) = filter.into_recent(
            "SELECT p.id, p.place_id, p.author_id, p.title, p.content, p.image_url, p.video_url,
                    p.is_deleted, p.created_at
             FROM posts p LEFT JOIN places pl ON pl.id = p.place_id",
            "p.created_at",
            "p.id",
            query,
        );
        self.query_rows(&sql, values, Self::post_from_row)
    }

    fn recent_products(&self, query: &RecentQuery) -> Result<Vec<ProductRow>> {
        let mut filter = Filter::new(&["pr.is_active = 1"]);
        filter.owner("pl.owner_id", query.owner_id.as_deref());
        let (sql, values) = filter.into_recent(
            "SELECT pr.id, pr.place_id, pr.name, pr.description, pr.price, pr.image_url,
                    pr.is_active, pr.created_at
             FROM products pr LEFT JOIN places pl ON pl.id = pr.place_id",
            "pr.created_at",
            "pr.id",
            query,
        );
        self.query_rows(&sql, values, Self::product_from_row)
    }

    fn recent_videos(&self, source: VideoSource, query: &RecentQuery) -> Result<Vec<VideoRow>> {
        let (select, mut filter, ts_column, id_column) = match source {
            VideoSource::Post => (
                "SELECT p.id, p.id, p.place_id, p.title, p.video_url, p.created_at, pl.name,
                        pl.logo_url
                 FROM posts p LEFT JOIN places pl ON pl.id = p.place_id",
                Filter::new(&[
                    "p.is_deleted = 0",
                    "p.video_url IS NOT NULL",
                    "p.video_url <> ''",
                ]),
                "p.created_at",
                "p.id",
            ),
            VideoSource::Product => (
                "SELECT v.id, pr.id, pr.place_id, COALESCE(v.title, pr.name), v.video_url,
                        v.created_at, pl.name, pl.logo_url
                 FROM product_videos v
                 JOIN products pr ON pr.id = v.product_id
                 LEFT JOIN places pl ON pl.id = pr.place_id",
                Filter::new(&[
                    "v.is_active = 1",
                    "pr.is_active = 1",
                    "v.video_url IS NOT NULL",
                    "v.video_url <> ''",
                ]),
                "v.created_at",
                "v.id",
            ),
            VideoSource::Place => (
                "SELECT pl.id, pl.id, pl.id, pl.name, pl.video_url, pl.created_at, pl.name,
                        pl.logo_url
                 FROM places pl",
                Filter::new(&[
                    "pl.is_active = 1",
                    "pl.deleted_at IS NULL",
                    "pl.video_url IS NOT NULL",
                    "pl.video_url <> ''",
                ]),
                "pl.created_at",
                "pl.id",
            ),
            VideoSource::Story => {
                let mut filter = Filter::new(&[
                    "s.media_type = 'video'",
                    "pl.is_active = 1",
                    "pl.deleted_at IS NULL",
                ]);
                filter.push(
                    "(s.expires_at IS NULL OR s.expires_at > ?)",
                    [Value::Text(Self::format_ts(&Utc::now()))],
                );
                (
                    "SELECT s.id, s.place_id, s.place_id, s.caption, s.media_url, s.created_at,
                            pl.name, pl.logo_url
                     FROM stories s JOIN places pl ON pl.id = s.place_id",
                    filter,
                    "s.created_at",
                    "s.id",
                )
            }
        };

        filter.owner("pl.owner_id", query.owner_id.as_deref());
        let (sql, values) = filter.into_recent(select, ts_column, id_column, query);
        self.query_rows(&sql, values, Self::video_from_row)
    }

    fn count_entities(&self, kind: EntityKind, owner_id: Option<&str>) -> Result<u64> {
        let (from, mut filter) = match kind {
            EntityKind::Place => (
                "SELECT COUNT(*) FROM places pl",
                Filter::new(&["pl.is_active = 1", "pl.deleted_at IS NULL"]),
            ),
            EntityKind::Post => (
                "SELECT COUNT(*) FROM posts p LEFT JOIN places pl ON pl.id = p.place_id",
                Filter::new(&["p.is_deleted = 0"]),
            ),
            EntityKind::Product => (
                "SELECT COUNT(*) FROM products pr LEFT JOIN places pl ON pl.id = pr.place_id",
                Filter::new(&["pr.is_active = 1"]),
            ),
        };
        filter.owner("pl.owner_id", owner_id);

        let sql = format!("{}{}", from, filter.where_sql());
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row(&sql, params_from_iter(filter.values.iter()), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn like_counts(&self, kind: EntityKind, entity_ids: &[String]) -> Result<Vec<(String, u64)>> {
        self.grouped_counts(
            "interactions WHERE interaction_type = 'like'",
            kind,
            entity_ids,
        )
    }

    fn comment_counts(
        &self,
        kind: EntityKind,
        entity_ids: &[String],
    ) -> Result<Vec<(String, u64)>> {
        self.grouped_counts("comments WHERE is_deleted = 0", kind, entity_ids)
    }

    fn liked_by(
        &self,
        kind: EntityKind,
        user_id: &str,
        entity_ids: &[String],
    ) -> Result<Vec<String>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT entity_id FROM interactions
             WHERE interaction_type = 'like' AND entity_type = ? AND user_id = ?
               AND entity_id IN ({})",
            placeholders(entity_ids.len())
        );
        let mut values = vec![
            Value::Text(kind.as_str().to_string()),
            Value::Text(user_id.to_string()),
        ];
        values.extend(entity_ids.iter().cloned().map(Value::Text));

        self.query_rows(&sql, values, |row| row.get(0))
    }
}
