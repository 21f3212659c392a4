//! Compensation-sweep source for the LISTEN/NOTIFY bridge (C5, spec §4.5).
//! Every anomaly-event trigger fan-out writes one row here alongside its
//! `pg_notify` call; the listener marks a row processed immediately after
//! handling it — live or swept — so the sweep never redelivers it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct ChangeEventRow {
    pub id: i64,
    pub channel: String,
    pub product_id: Option<uuid::Uuid>,
    pub payload: Json,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

fn change_event_from_row(row: &sqlx::postgres::PgRow) -> Result<ChangeEventRow> {
    Ok(ChangeEventRow {
        id: row.try_get("id")?,
        channel: row.try_get("channel")?,
        product_id: row.try_get("product_id")?,
        payload: row.try_get("payload")?,
        processed: row.try_get("processed")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Rows left unprocessed for longer than `older_than`, re-processed by the
/// 5-minute compensation sweep.
pub async fn list_unprocessed_older_than(
    pool: &PgPool,
    older_than: chrono::Duration,
) -> Result<Vec<ChangeEventRow>> {
    let cutoff = Utc::now() - older_than;
    let rows = sqlx::query(
        "select * from change_events where not processed and created_at < $1 order by id asc",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
    .context("list_unprocessed_older_than failed")?;
    rows.iter().map(change_event_from_row).collect()
}

/// The most recent unprocessed row for this channel+payload, used to mark
/// the exact row a just-handled live NOTIFY corresponds to (the trigger
/// inserts the row in the same statement that issues the NOTIFY, so it is
/// always present by the time the listener parses the notification).
pub async fn find_matching_unprocessed(
    pool: &PgPool,
    channel: &str,
    payload: &Json,
) -> Result<Option<ChangeEventRow>> {
    let row = sqlx::query(
        r#"
        select * from change_events
        where not processed and channel = $1 and payload = $2
        order by id desc
        limit 1
        "#,
    )
    .bind(channel)
    .bind(payload)
    .fetch_optional(pool)
    .await
    .context("find_matching_unprocessed failed")?;
    row.as_ref().map(change_event_from_row).transpose()
}

pub async fn mark_processed(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("update change_events set processed = true where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("mark_processed failed")?;
    Ok(())
}
