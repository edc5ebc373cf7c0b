use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::model::{Category, Entity, EntityId, FeedId, FeedRecord, StatusRecord};

use super::{FeedSource, SourceError};

const RECORD_COLUMNS: &str = "notification_id, category, title, body, link, avatar, is_read, created_at";

/// Cheap change detector for the notification table. `ids` sums the id
/// hashes so a delete plus insert at the same size still shows up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedFingerprint {
    pub total: i64,
    pub read: i64,
    pub newest: Option<DateTime<Utc>>,
    pub ids: i64,
}

#[derive(Clone, Debug)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn fingerprint(&self) -> Result<FeedFingerprint, SourceError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::bigint AS total,
                   COUNT(*) FILTER (WHERE is_read)::bigint AS read,
                   MAX(created_at) AS newest,
                   COALESCE(SUM(hashtext(notification_id)::bigint), 0)::bigint AS ids
            FROM monitor.notification
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(FeedFingerprint {
            total: row.try_get("total")?,
            read: row.try_get("read")?,
            newest: row.try_get("newest")?,
            ids: row.try_get("ids")?,
        })
    }

    /// Every record, most recent first.
    pub async fn fetch_snapshot(&self) -> Result<Vec<FeedRecord>, SourceError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM monitor.notification ORDER BY created_at DESC, notification_id DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &PgRow) -> Result<FeedRecord, SourceError> {
    let raw: String = row.try_get("category")?;
    let category = Category::parse(&raw).ok_or_else(|| SourceError::Decode(format!("unknown category '{raw}'")))?;
    Ok(FeedRecord {
        id: FeedId::new(row.try_get::<String, _>("notification_id")?),
        category,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        link: row.try_get("link")?,
        avatar: row.try_get("avatar")?,
        read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl FeedSource for PgSource {
    async fn fetch_page(&self, category: Option<Category>, limit: u32, offset: u64) -> Result<Vec<FeedRecord>, SourceError> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM monitor.notification
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY created_at DESC, notification_id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(category.map(Category::as_str))
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn fetch_count(&self, category: Option<Category>) -> Result<u64, SourceError> {
        let n: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::bigint
            FROM monitor.notification
            WHERE ($1::text IS NULL OR category = $1)
            "#,
        )
        .bind(category.map(Category::as_str))
        .fetch_one(&self.pool)
        .await?;
        Ok(n.max(0) as u64)
    }

    async fn mark_read(&self, id: &FeedId) -> Result<(), SourceError> {
        sqlx::query("UPDATE monitor.notification SET is_read = TRUE WHERE notification_id = $1 AND NOT is_read")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), SourceError> {
        sqlx::query("UPDATE monitor.notification SET is_read = TRUE WHERE NOT is_read")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SourceError> {
        sqlx::query("DELETE FROM monitor.notification").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_entities(&self) -> Result<Vec<Entity>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT streamer_id, display_name, is_active, platform_ids
            FROM monitor.streamer
            ORDER BY streamer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<Entity, SourceError> {
                let platform_ids: Vec<String> = row.try_get("platform_ids")?;
                Ok(Entity {
                    id: EntityId::new(row.try_get::<String, _>("streamer_id")?),
                    display_name: row.try_get("display_name")?,
                    active: row.try_get("is_active")?,
                    platform_ids: platform_ids.into_iter().collect(),
                })
            })
            .collect()
    }

    async fn fetch_statuses(&self) -> Result<Vec<StatusRecord>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT streamer_id, is_live, title, link
            FROM monitor.stream_status
            ORDER BY streamer_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<StatusRecord, SourceError> {
                Ok(StatusRecord {
                    entity_id: EntityId::new(row.try_get::<String, _>("streamer_id")?),
                    is_live: row.try_get("is_live")?,
                    title: row.try_get("title")?,
                    link: row.try_get("link")?,
                })
            })
            .collect()
    }
}
