//! Periodic scheduler process (C7): enumerates due tracked products every
//! tick and enqueues `refresh_product_data` tasks, plus the nightly
//! `data_cleanup` sweep. Grounded on `mqk-daemon/src/main.rs`'s bootstrap
//! order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use pilot_config::ServiceName;
use pilot_scheduler::interval;

#[tokio::main]
async fn main() -> Result<()> {
    let env = pilot_daemon::bootstrap(ServiceName::Scheduler);
    env.validate_required(ServiceName::Scheduler, &["DATABASE_DSN"])?;

    let pool = pilot_daemon::connect_and_migrate(&env).await?;
    let schedule = interval::parse(&env.scheduler_product_update_interval);

    info!(
        interval = %env.scheduler_product_update_interval,
        "scheduler starting"
    );

    let shutdown = pilot_daemon::shutdown_flag();
    let loop_shutdown = Arc::clone(&shutdown);
    let loop_handle = tokio::spawn(pilot_scheduler::run(pool, schedule, loop_shutdown));

    pilot_daemon::wait_for_shutdown_signal(Arc::clone(&shutdown)).await;
    info!("shutdown signal received, waiting for the current tick to finish");

    if tokio::time::timeout(Duration::from_secs(30), loop_handle)
        .await
        .is_err()
    {
        warn!("scheduler did not stop within the shutdown grace period");
    }

    Ok(())
}
