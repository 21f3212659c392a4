//! Periodic scheduler (C7): enumerates due tracked products and enqueues
//! `refresh_product_data` tasks, plus a fixed daily cleanup sweep. Grounded
//! on the original's `SchedulerService` (`setupPeriodicTasks` +
//! `runPeriodicScheduler`'s ticker), minus the analysis-related jobs it
//! scheduled — competitor reports are client-initiated here (spec §4.8),
//! not cron-driven.

pub mod interval;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use pilot_db::products;
use pilot_queue::{DataCleanupPayload, QueueName, TaskType};

use interval::Schedule;

const PRODUCT_UPDATE_BATCH_SIZE: i64 = 50;
const DATA_CLEANUP_CRON: &str = "0 0 2 * * *";
const DATA_CLEANUP_RETENTION_DAYS: i64 = 30;

/// One scan of due tracked products, each enqueued as a `refresh_product_data`
/// task on the `apify` queue. The idempotency key is bucketed by the tick
/// interval so overlapping ticks (no global lock, spec §4.7) collapse into
/// one enqueue per product per bucket instead of piling up duplicates.
pub async fn run_product_update_tick(pool: &PgPool, bucket_seconds: i64) -> Result<(usize, usize)> {
    let due = products::list_due_tracked_products(pool, PRODUCT_UPDATE_BATCH_SIZE)
        .await
        .context("failed to list due tracked products")?;

    let bucket = Utc::now().timestamp() / bucket_seconds.max(1);
    let mut enqueued = 0usize;
    let mut failed = 0usize;

    for tracked in &due {
        let product = match products::get_product(pool, tracked.product_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(tracked_product_id = %tracked.id, "tracked product references a missing product, skipping");
                failed += 1;
                continue;
            }
            Err(err) => {
                error!(tracked_product_id = %tracked.id, %err, "failed to load product for scheduling");
                failed += 1;
                continue;
            }
        };

        let payload = pilot_queue::RefreshProductDataPayload {
            product_id: tracked.product_id,
            tracked_product_id: Some(tracked.id),
            asin: product.asin.clone(),
            requested_at: Utc::now(),
        };
        let idempotency_key = format!("refresh:{}:{}", tracked.id, bucket);

        let enqueue_result = pilot_queue::enqueue(
            pool,
            TaskType::RefreshProductData.default_queue(),
            TaskType::RefreshProductData.as_str(),
            serde_json::to_value(&payload).context("failed to serialize refresh payload")?,
            0,
            Some(idempotency_key.as_str()),
        )
        .await;

        match enqueue_result {
            Ok(_) => enqueued += 1,
            Err(err) => {
                error!(tracked_product_id = %tracked.id, %err, "failed to enqueue refresh_product_data");
                failed += 1;
            }
        }
    }

    if enqueued > 0 || failed > 0 {
        info!(enqueued, failed, "product update tick completed");
    }

    Ok((enqueued, failed))
}

async fn run_data_cleanup_tick(pool: &PgPool) -> Result<()> {
    let payload = DataCleanupPayload {
        older_than_days: DATA_CLEANUP_RETENTION_DAYS,
    };
    pilot_queue::enqueue(
        pool,
        QueueName::Cleanup,
        TaskType::DataCleanup.as_str(),
        serde_json::to_value(&payload).context("failed to serialize cleanup payload")?,
        0,
        None,
    )
    .await
    .context("failed to enqueue data_cleanup")?;
    info!("daily data cleanup enqueued");
    Ok(())
}

/// Runs the scheduler until `shutdown` is set. The product-update job
/// follows `schedule` (either a fixed tick or a full cron job); the daily
/// cleanup sweep always runs on its own fixed cron regardless of
/// `schedule`, matching the original's two independent periodic jobs.
pub async fn run(pool: PgPool, schedule: Schedule, shutdown: Arc<AtomicBool>) -> Result<()> {
    match schedule {
        Schedule::Every(interval) => run_ticker(pool, interval, shutdown).await,
        Schedule::Cron(expr) => run_cron(pool, expr, shutdown).await,
    }
}

async fn run_ticker(pool: PgPool, interval: Duration, shutdown: Arc<AtomicBool>) -> Result<()> {
    let bucket_seconds = interval.as_secs().max(1) as i64;
    let mut tick = tokio::time::interval(interval);
    let mut last_cleanup = Utc::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("scheduler shutting down");
            return Ok(());
        }

        tick.tick().await;
        if let Err(err) = run_product_update_tick(&pool, bucket_seconds).await {
            error!(%err, "product update tick failed");
        }

        if (Utc::now() - last_cleanup).num_hours() >= 24 {
            if let Err(err) = run_data_cleanup_tick(&pool).await {
                error!(%err, "data cleanup tick failed");
            }
            last_cleanup = Utc::now();
        }
    }
}

async fn run_cron(pool: PgPool, cron_expr: String, shutdown: Arc<AtomicBool>) -> Result<()> {
    let scheduler = JobScheduler::new()
        .await
        .context("failed to build cron scheduler")?;

    let bucket_seconds = cron_bucket_hint(&cron_expr);
    let update_pool = pool.clone();
    let product_update_job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
        let pool = update_pool.clone();
        Box::pin(async move {
            if let Err(err) = run_product_update_tick(&pool, bucket_seconds).await {
                error!(%err, "product update tick failed");
            }
        })
    })
    .with_context(|| format!("invalid SCHEDULER_PRODUCT_UPDATE_INTERVAL cron expression: {cron_expr}"))?;
    scheduler
        .add(product_update_job)
        .await
        .context("failed to register product update job")?;

    let cleanup_pool = pool.clone();
    let cleanup_job = Job::new_async(DATA_CLEANUP_CRON, move |_uuid, _l| {
        let pool = cleanup_pool.clone();
        Box::pin(async move {
            if let Err(err) = run_data_cleanup_tick(&pool).await {
                error!(%err, "data cleanup tick failed");
            }
        })
    })
    .context("invalid built-in data cleanup cron expression")?;
    scheduler
        .add(cleanup_job)
        .await
        .context("failed to register data cleanup job")?;

    scheduler.start().await.context("failed to start cron scheduler")?;
    info!(cron_expr, "scheduler running on cron expression");

    while !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    info!("scheduler shutting down");
    scheduler
        .shutdown()
        .await
        .context("failed to shut down cron scheduler")?;
    Ok(())
}

/// A full cron job has no single natural "tick length"; a day is a safe,
/// generous idempotency bucket for jobs that otherwise run sub-daily.
fn cron_bucket_hint(_cron_expr: &str) -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_cleanup_runs_nightly() {
        assert_eq!(DATA_CLEANUP_CRON, "0 0 2 * * *");
    }
}
