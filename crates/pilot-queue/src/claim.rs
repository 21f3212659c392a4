//! SQL claim/ack/fail operations against `pilot_queue`, generalized from
//! `mqk-db`'s `outbox_enqueue`/`outbox_claim_batch`/`outbox_mark_sent`/
//! `outbox_mark_failed`/`outbox_release_claim` functions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::QueueName;

#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: i64,
    pub queue: String,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub priority: i16,
    pub attempts: i32,
    pub max_attempts: i32,
}

fn claimed_task_from_row(row: &sqlx::postgres::PgRow) -> Result<ClaimedTask> {
    Ok(ClaimedTask {
        id: row.try_get("id")?,
        queue: row.try_get("queue")?,
        task_type: row.try_get("task_type")?,
        payload: row.try_get("payload")?,
        priority: row.try_get("priority")?,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
    })
}

/// Enqueues a task. `idempotency_key`, when set, makes the enqueue a no-op
/// if a task with that key already exists (mirrors `outbox_enqueue`'s
/// `ON CONFLICT ... DO NOTHING` dedup).
pub async fn enqueue(
    pool: &PgPool,
    queue: QueueName,
    task_type: &str,
    payload: serde_json::Value,
    priority: i16,
    idempotency_key: Option<&str>,
) -> Result<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        insert into pilot_queue (queue, task_type, payload, priority, idempotency_key)
        values ($1, $2, $3, $4, $5)
        on conflict (idempotency_key) do nothing
        returning id
        "#,
    )
    .bind(queue.as_str())
    .bind(task_type)
    .bind(&payload)
    .bind(priority)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await
    .context("enqueue insert failed")?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let key = idempotency_key.context("enqueue conflicted but no idempotency_key was given")?;
    let existing: i64 = sqlx::query_scalar("select id from pilot_queue where idempotency_key = $1")
        .bind(key)
        .fetch_one(pool)
        .await
        .context("enqueue: lookup existing idempotency_key failed")?;
    Ok(existing)
}

/// Claims up to `batch_size` pending tasks, weighted toward higher-weight
/// queues and higher in-queue priority, using `FOR UPDATE SKIP LOCKED` so
/// concurrent dispatchers never double-claim a row.
pub async fn claim_batch(
    pool: &PgPool,
    dispatcher_id: &str,
    batch_size: i64,
) -> Result<Vec<ClaimedTask>> {
    let rows = sqlx::query(
        r#"
        with claimable as (
            select id
            from pilot_queue
            where status = 'pending' and available_at <= now()
            order by
                (case queue
                    when 'critical' then 6
                    when 'default' then 3
                    when 'apify' then 2
                    when 'cleanup' then 1
                    else 0
                end) desc,
                priority desc,
                id asc
            limit $2
            for update skip locked
        )
        update pilot_queue
        set status = 'claimed', claimed_at = now(), claimed_by = $1
        from claimable
        where pilot_queue.id = claimable.id
        returning pilot_queue.*
        "#,
    )
    .bind(dispatcher_id)
    .bind(batch_size)
    .fetch_all(pool)
    .await
    .context("claim_batch failed")?;

    rows.iter().map(claimed_task_from_row).collect()
}

pub async fn mark_sent(pool: &PgPool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        "update pilot_queue set status = 'sent', sent_at = now() where id = $1 and status = 'claimed'",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("mark_sent failed")?;
    Ok(result.rows_affected() > 0)
}

/// Backoff delay before a retryable failure becomes claimable again:
/// 30s * 2^attempts, capped at 1 hour.
fn backoff_for(attempts: i32) -> chrono::Duration {
    let capped_exp = attempts.clamp(0, 7) as u32;
    let secs = 30i64.saturating_mul(2i64.saturating_pow(capped_exp));
    chrono::Duration::seconds(secs.min(3600))
}

/// Marks a claimed task failed. `permanent` forces a terminal `failed`
/// status regardless of remaining attempts (matches
/// `ApiError::is_permanent_for_queue` — validation/not-found errors should
/// never be retried).
pub async fn mark_failed(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    permanent: bool,
) -> Result<()> {
    let row = sqlx::query("select attempts, max_attempts from pilot_queue where id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .context("mark_failed: lookup failed")?;
    let attempts: i32 = row.try_get("attempts")?;
    let max_attempts: i32 = row.try_get("max_attempts")?;
    let next_attempts = attempts + 1;

    if permanent || next_attempts >= max_attempts {
        sqlx::query(
            "update pilot_queue set status = 'failed', attempts = $2, last_error = $3 where id = $1",
        )
        .bind(id)
        .bind(next_attempts)
        .bind(error_message)
        .execute(pool)
        .await
        .context("mark_failed: terminal update failed")?;
        return Ok(());
    }

    let available_at: DateTime<Utc> = Utc::now() + backoff_for(attempts);
    sqlx::query(
        r#"
        update pilot_queue
        set status = 'pending', attempts = $2, last_error = $3, available_at = $4,
            claimed_at = null, claimed_by = null
        where id = $1
        "#,
    )
    .bind(id)
    .bind(next_attempts)
    .bind(error_message)
    .bind(available_at)
    .execute(pool)
    .await
    .context("mark_failed: retry update failed")?;
    Ok(())
}

/// Returns a claimed task to `pending` without counting it as a failed
/// attempt — used when a dispatcher shuts down mid-batch.
pub async fn release_claim(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query(
        "update pilot_queue set status = 'pending', claimed_at = null, claimed_by = null where id = $1 and status = 'claimed'",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("release_claim failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps_at_one_hour() {
        assert_eq!(backoff_for(0), chrono::Duration::seconds(30));
        assert_eq!(backoff_for(1), chrono::Duration::seconds(60));
        assert_eq!(backoff_for(10), chrono::Duration::seconds(3600));
    }
}
