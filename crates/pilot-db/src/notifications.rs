//! User-facing notification records. Authored by the LISTEN/NOTIFY bridge
//! (C5) when it handles a price/BSR alert channel payload — the detector
//! (C4) inserts `anomaly_events` only and relies on the DB-trigger bridge
//! for user-visible notifications (spec §4.4).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub severity: String,
    pub product_id: Option<Uuid>,
    pub data: Option<Json>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        notification_type: row.try_get("type")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        severity: row.try_get("severity")?,
        product_id: row.try_get("product_id")?,
        data: row.try_get("data")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

pub struct NewNotification<'a> {
    pub user_id: Uuid,
    pub notification_type: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub severity: &'a str,
    pub product_id: Option<Uuid>,
    pub data: Option<Json>,
}

pub async fn insert_notification(pool: &PgPool, n: &NewNotification<'_>) -> Result<Uuid> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        insert into notifications (user_id, type, title, message, severity, product_id, data)
        values ($1, $2, $3, $4, $5, $6, $7)
        returning id
        "#,
    )
    .bind(n.user_id)
    .bind(n.notification_type)
    .bind(n.title)
    .bind(n.message)
    .bind(n.severity)
    .bind(n.product_id)
    .bind(&n.data)
    .fetch_one(pool)
    .await
    .context("insert_notification failed")?;
    Ok(id)
}

pub async fn list_notifications_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<NotificationRow>> {
    let rows = sqlx::query(
        "select * from notifications where user_id = $1 order by created_at desc limit $2 offset $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("list_notifications_for_user failed")?;
    rows.iter().map(notification_from_row).collect()
}

pub async fn mark_notification_read(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("update notifications set is_read = true where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("mark_notification_read failed")?;
    Ok(result.rows_affected() > 0)
}

pub async fn notification_exists(pool: &PgPool, id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("select exists(select 1 from notifications where id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("notification_exists failed")?;
    Ok(exists)
}
