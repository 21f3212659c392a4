//! Worker pool process (C2 consumer + C3/C4/C8 handler side): drains the
//! four priority-weighted queues with `WORKER_CONCURRENCY` concurrent
//! handlers. Grounded on `mqk-daemon/src/main.rs`'s bootstrap order
//! (dotenv → tracing → construct shared state → run → shut down on
//! signal).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use pilot_cache::CacheLayer;
use pilot_config::ServiceName;
use pilot_fetch::ApifyProvider;
use pilot_llm::{HttpLlmClient, LlmProviderKind};
use pilot_worker::WorkerContext;

#[tokio::main]
async fn main() -> Result<()> {
    let env = pilot_daemon::bootstrap(ServiceName::Worker);
    env.validate_required(
        ServiceName::Worker,
        &["DATABASE_DSN", "APIFY_API_TOKEN", "OPENAI_API_KEY"],
    )?;

    let pool = pilot_daemon::connect_and_migrate(&env).await?;
    let cache = CacheLayer::connect(&env.redis_addr(), env.redis_db).await?;
    let fetch = Arc::new(ApifyProvider::new(
        env.apify_api_token.clone().expect("validated above"),
    ));
    let llm_kind = LlmProviderKind::from_config_str(&env.llm_provider);
    let llm = Arc::new(HttpLlmClient::new(
        llm_kind,
        env.openai_api_key.clone().expect("validated above"),
    ));

    let ctx = Arc::new(WorkerContext {
        pool: pool.clone(),
        cache,
        fetch,
        llm,
    });

    let shutdown = pilot_daemon::shutdown_flag();
    let dispatcher_id = format!("worker-{}", uuid::Uuid::new_v4());

    info!(
        dispatcher_id,
        concurrency = env.worker_concurrency,
        "worker pool starting"
    );

    // The loop only notices `shutdown` between claimed batches, so it is
    // spawned rather than raced directly: a signal-triggered `select!`
    // would otherwise drop it mid-batch instead of letting in-flight
    // handlers finish (spec §4.2 "waits for in-flight handlers up to a
    // grace period").
    let loop_shutdown = Arc::clone(&shutdown);
    let loop_handle = tokio::spawn(pilot_worker::run_worker_loop(
        pool,
        ctx,
        dispatcher_id,
        env.worker_concurrency,
        loop_shutdown,
    ));

    pilot_daemon::wait_for_shutdown_signal(Arc::clone(&shutdown)).await;
    info!("shutdown signal received, draining in-flight handlers");

    if tokio::time::timeout(Duration::from_secs(30), loop_handle)
        .await
        .is_err()
    {
        warn!("worker pool did not drain within the shutdown grace period");
    }

    Ok(())
}
