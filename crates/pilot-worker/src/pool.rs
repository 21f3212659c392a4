//! Worker pool loop: claims batches across the four priority-weighted
//! queues and dispatches each to its handler, acking or failing it back
//! into `pilot-queue`. `W` concurrent workers (spec §5) is just
//! `tokio::spawn` fan-out over one claimed batch — two tasks for different
//! products run in parallel; same-tracked-product serialization falls out
//! of the `tracked_products` row-level write inside the ingest transaction
//! (`pilot_db::products::ingest_product_fact`), not from anything here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::handlers::{dispatch, WorkerContext};

pub async fn run_worker_loop(
    pool: PgPool,
    ctx: Arc<WorkerContext>,
    dispatcher_id: String,
    concurrency: usize,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!(dispatcher_id, "worker loop shutting down");
            return;
        }

        let claimed = match pilot_queue::claim_batch(&pool, &dispatcher_id, concurrency as i64).await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(%err, "claim_batch failed");
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
        };

        if claimed.is_empty() {
            tokio::time::sleep(Duration::from_millis(500)).await;
            continue;
        }

        let mut handles = Vec::with_capacity(claimed.len());
        for task in claimed {
            let ctx = Arc::clone(&ctx);
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let result = dispatch(&ctx, &task.task_type, task.payload.clone()).await;
                match result {
                    Ok(()) => {
                        if let Err(err) = pilot_queue::mark_sent(&pool, task.id).await {
                            error!(task_id = task.id, %err, "mark_sent failed");
                        }
                    }
                    Err(handler_err) => {
                        warn!(task_id = task.id, task_type = %task.task_type, %handler_err, "task failed");
                        if let Err(err) = pilot_queue::mark_failed(
                            &pool,
                            task.id,
                            &handler_err.message,
                            handler_err.permanent,
                        )
                        .await
                        {
                            error!(task_id = task.id, %err, "mark_failed failed");
                        }
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!(%err, "worker task panicked");
            }
        }
    }
}
