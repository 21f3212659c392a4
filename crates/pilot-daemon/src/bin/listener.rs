//! DB-trigger alert bridge process (C5): one pinned `LISTEN` connection on
//! `price_alerts`/`bsr_alerts`, with a compensation sweep over stale
//! `change_events` rows. Grounded on `mqk-daemon/src/main.rs`'s bootstrap
//! order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use pilot_config::ServiceName;

#[tokio::main]
async fn main() -> Result<()> {
    let env = pilot_daemon::bootstrap(ServiceName::Listener);
    env.validate_required(ServiceName::Listener, &["DATABASE_DSN"])?;

    let pool = pilot_daemon::connect_and_migrate(&env).await?;
    let dsn = env
        .database_dsn
        .clone()
        .context("DATABASE_DSN is not configured")?;

    info!("listener starting");

    let shutdown = pilot_daemon::shutdown_flag();
    let loop_shutdown = Arc::clone(&shutdown);
    let listener_pool = pool.clone();
    let loop_handle = tokio::spawn(async move {
        pilot_listener::run(listener_pool, &dsn, loop_shutdown).await
    });

    pilot_daemon::wait_for_shutdown_signal(Arc::clone(&shutdown)).await;
    info!("shutdown signal received, closing the listener connection");

    if tokio::time::timeout(Duration::from_secs(30), loop_handle)
        .await
        .is_err()
    {
        warn!("listener did not stop within the shutdown grace period");
    }

    Ok(())
}
