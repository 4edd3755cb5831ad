use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, SqlitePool};
use std::sync::Arc;

use crate::models::{Link, LinkChanges, NewLink};
use crate::slug;
use crate::storage::{ClickBucket, ListFilter, SlugSpec, Storage, StorageError, StorageResult};

const LINK_COLUMNS: &str = "id, slug, destination, owner, group_id, group_domain, group_name, \
                            description, created_at, expires_at, clicks";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // slug is nullable so a generated-slug insert can assign it within
        // the same transaction; committed rows always carry one.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT UNIQUE,
                destination TEXT NOT NULL,
                owner TEXT NOT NULL,
                group_id TEXT,
                group_domain TEXT,
                group_name TEXT,
                description TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                clicks INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_owner ON links(owner)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_expires ON links(expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id INTEGER NOT NULL,
                ts INTEGER NOT NULL,
                lang TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link_ts ON click_events(link_id, ts)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blacklist (
                host TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_link(&self, link: &NewLink, spec: SlugSpec<'_>) -> StorageResult<Link> {
        match spec {
            SlugSpec::Custom(slug) => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO links (slug, destination, owner, group_id, group_domain,
                                       group_name, description, created_at, expires_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(slug) DO NOTHING
                    "#,
                )
                .bind(slug)
                .bind(&link.destination)
                .bind(&link.owner)
                .bind(&link.group_id)
                .bind(&link.group_domain)
                .bind(&link.group_name)
                .bind(&link.description)
                .bind(link.created_at)
                .bind(link.expires_at)
                .execute(self.pool.as_ref())
                .await
                .map_err(|e| StorageError::Other(e.into()))?;

                if result.rows_affected() == 0 {
                    return Err(StorageError::Conflict);
                }

                let row = sqlx::query_as::<_, Link>(&format!(
                    "SELECT {LINK_COLUMNS} FROM links WHERE slug = ?"
                ))
                .bind(slug)
                .fetch_one(self.pool.as_ref())
                .await
                .map_err(|e| StorageError::Other(e.into()))?;

                Ok(row)
            }
            SlugSpec::Generated => {
                let mut tx = self
                    .pool
                    .begin()
                    .await
                    .map_err(|e| StorageError::Other(e.into()))?;

                let result = sqlx::query(
                    r#"
                    INSERT INTO links (slug, destination, owner, group_id, group_domain,
                                       group_name, description, created_at, expires_at)
                    VALUES (NULL, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&link.destination)
                .bind(&link.owner)
                .bind(&link.group_id)
                .bind(&link.group_domain)
                .bind(&link.group_name)
                .bind(&link.description)
                .bind(link.created_at)
                .bind(link.expires_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Other(e.into()))?;

                let id = result.last_insert_rowid();
                let encoded = slug::encode(id);

                sqlx::query("UPDATE links SET slug = ? WHERE id = ?")
                    .bind(&encoded)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StorageError::Other(e.into()))?;

                let row = sqlx::query_as::<_, Link>(&format!(
                    "SELECT {LINK_COLUMNS} FROM links WHERE id = ?"
                ))
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| StorageError::Other(e.into()))?;

                tx.commit().await.map_err(|e| StorageError::Other(e.into()))?;

                Ok(row)
            }
        }
    }

    async fn update_link(&self, id: i64, changes: &LinkChanges) -> Result<Option<Link>> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET destination = ?, group_id = ?, group_domain = ?, group_name = ?,
                description = ?, expires_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.destination)
        .bind(&changes.group_id)
        .bind(&changes.group_domain)
        .bind(&changes.group_name)
        .bind(&changes.description)
        .bind(changes.expires_at)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let row =
            sqlx::query_as::<_, Link>(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?"))
                .bind(id)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(Some(row))
    }

    async fn delete_link(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM click_events WHERE link_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Link>> {
        let row =
            sqlx::query_as::<_, Link>(&format!("SELECT {LINK_COLUMNS} FROM links WHERE slug = ?"))
                .bind(slug)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(row)
    }

    async fn list_links(&self, filter: &ListFilter) -> Result<Vec<Link>> {
        let mut qb = QueryBuilder::new(format!("SELECT {LINK_COLUMNS} FROM links"));

        if let ListFilter::OwnerOrGroups { owner, groups } = filter {
            qb.push(" WHERE (owner = ");
            qb.push_bind(owner);
            for (group_id, group_domain) in groups {
                qb.push(" OR (group_id = ");
                qb.push_bind(group_id);
                qb.push(" AND group_domain = ");
                qb.push_bind(group_domain);
                qb.push(")");
            }
            qb.push(")");
        }

        qb.push(" ORDER BY created_at DESC, expires_at ASC NULLS LAST");

        let links = qb
            .build_query_as::<Link>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(links)
    }

    async fn record_click(&self, link_id: i64, timestamp: i64, lang: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO click_events (link_id, ts, lang) VALUES (?, ?, ?)")
            .bind(link_id)
            .bind(timestamp)
            .bind(lang)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE links SET clicks = clicks + 1 WHERE id = ?")
            .bind(link_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn click_buckets(
        &self,
        link_id: i64,
        bucket_secs: i64,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<ClickBucket>> {
        let buckets = match range {
            Some((start, end)) => {
                sqlx::query_as::<_, (i64, i64)>(
                    r#"
                    SELECT (ts / ?) * ? AS bucket, COUNT(*) AS clicks
                    FROM click_events
                    WHERE link_id = ? AND ts >= ? AND ts < ?
                    GROUP BY bucket
                    ORDER BY bucket
                    "#,
                )
                .bind(bucket_secs)
                .bind(bucket_secs)
                .bind(link_id)
                .bind(start)
                .bind(end)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, (i64, i64)>(
                    r#"
                    SELECT (ts / ?) * ? AS bucket, COUNT(*) AS clicks
                    FROM click_events
                    WHERE link_id = ?
                    GROUP BY bucket
                    ORDER BY bucket
                    "#,
                )
                .bind(bucket_secs)
                .bind(bucket_secs)
                .bind(link_id)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        Ok(buckets)
    }

    async fn language_counts(&self, link_id: i64) -> Result<Vec<(Option<String>, i64)>> {
        let counts = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            SELECT lang, COUNT(*) AS clicks
            FROM click_events
            WHERE link_id = ?
            GROUP BY lang
            ORDER BY clicks DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(counts)
    }

    async fn blacklist_contains(&self, host: &str) -> Result<bool> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blacklist WHERE host = ?")
                .bind(host)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count > 0)
    }

    async fn blacklist_add(&self, host: &str) -> Result<()> {
        sqlx::query("INSERT INTO blacklist (host) VALUES (?) ON CONFLICT(host) DO NOTHING")
            .bind(host)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn blacklist_remove(&self, host: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blacklist WHERE host = ?")
            .bind(host)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn blacklist_all(&self) -> Result<Vec<String>> {
        let hosts = sqlx::query_scalar::<_, String>("SELECT host FROM blacklist ORDER BY host")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(hosts)
    }

    async fn delete_expired(&self, now: i64) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM click_events WHERE link_id IN
                (SELECT id FROM links WHERE expires_at IS NOT NULL AND expires_at < ?)
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let slugs = sqlx::query_scalar::<_, String>(
            "DELETE FROM links WHERE expires_at IS NOT NULL AND expires_at < ? RETURNING slug",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(slugs)
    }
}
