//! LISTEN/NOTIFY alert bridge (C5): a single pinned-connection listener on
//! `price_alerts`/`bsr_alerts`, backed by a `change_events` compensation
//! sweep for anything missed while disconnected. Grounded on the original's
//! `PgNotifyListener` (`Start`/`listenLoop`/`handleNotification`/
//! `reconnect`/`Stop`), rebuilt around `sqlx::postgres::PgListener` and a
//! `tokio::select!` loop instead of a dedicated goroutine + channel.

pub mod handle;
pub mod payload;

pub use handle::handle;
pub use payload::AlertPayload;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{error, info, warn};

use pilot_db::change_events;

const CHANNELS: [&str; 2] = ["price_alerts", "bsr_alerts"];
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const SWEEP_AGE_THRESHOLD_SECS: i64 = 300;

async fn connect_listener(dsn: &str) -> Result<PgListener> {
    let mut listener = PgListener::connect(dsn)
        .await
        .context("failed to connect for LISTEN")?;
    listener
        .listen_all(CHANNELS)
        .await
        .context("failed to LISTEN on alert channels")?;
    info!(channels = ?CHANNELS, "PostgreSQL notification listener connected");
    Ok(listener)
}

/// Re-processes `change_events` rows left `processed = false` for longer
/// than the sweep age threshold, then marks each one handled. Catches
/// anomaly events whose NOTIFY fired while no listener was connected.
pub async fn run_sweep(pool: &PgPool) -> Result<usize> {
    let stale = change_events::list_unprocessed_older_than(
        pool,
        chrono::Duration::seconds(SWEEP_AGE_THRESHOLD_SECS),
    )
    .await
    .context("sweep: failed to list unprocessed change_events")?;

    let mut handled = 0usize;
    for row in stale {
        let parsed = match serde_json::from_value::<AlertPayload>(row.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(change_event_id = row.id, %err, "sweep: malformed change_events payload, marking processed anyway");
                change_events::mark_processed(pool, row.id).await?;
                continue;
            }
        };

        if let Err(err) = handle::handle(pool, &row.channel, &parsed).await {
            error!(change_event_id = row.id, %err, "sweep: failed to handle stale change_event");
            continue;
        }

        change_events::mark_processed(pool, row.id).await?;
        handled += 1;
    }

    if handled > 0 {
        info!(handled, "compensation sweep processed stale change_events");
    }

    Ok(handled)
}

async fn handle_live_notification(pool: &PgPool, notification: &sqlx::postgres::PgNotification) -> Result<()> {
    let channel = notification.channel().to_string();
    let raw = notification.payload();

    let value: serde_json::Value =
        serde_json::from_str(raw).context("failed to parse notification payload as JSON")?;
    let parsed: AlertPayload =
        serde_json::from_value(value.clone()).context("failed to decode notification payload")?;

    handle::handle(pool, &channel, &parsed).await?;

    match change_events::find_matching_unprocessed(pool, &channel, &value).await? {
        Some(row) => change_events::mark_processed(pool, row.id).await?,
        None => warn!(channel, "no matching change_events row found for live notification"),
    }

    Ok(())
}

/// Runs the listener until `shutdown` is set. Reconnects with a fixed
/// backoff on any connection error and periodically runs the compensation
/// sweep so a prolonged disconnect is still caught up once reconnected.
pub async fn run(pool: PgPool, dsn: &str, shutdown: Arc<AtomicBool>) -> Result<()> {
    let mut listener = connect_listener(dsn).await?;
    let mut last_sweep = Instant::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("listener shutting down");
            return Ok(());
        }

        tokio::select! {
            res = listener.recv() => {
                match res {
                    Ok(notification) => {
                        if let Err(err) = handle_live_notification(&pool, &notification).await {
                            error!(%err, "failed to handle live notification");
                        }
                    }
                    Err(err) => {
                        error!(%err, "listener connection error, reconnecting");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                        match connect_listener(dsn).await {
                            Ok(fresh) => listener = fresh,
                            Err(err) => error!(%err, "reconnect attempt failed"),
                        }
                    }
                }
            }
            _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => {
                if last_sweep.elapsed() >= SWEEP_INTERVAL {
                    if let Err(err) = run_sweep(&pool).await {
                        error!(%err, "compensation sweep failed");
                    }
                    last_sweep = Instant::now();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listens_on_both_documented_channels() {
        assert_eq!(CHANNELS, ["price_alerts", "bsr_alerts"]);
    }

    #[test]
    fn sweep_threshold_matches_documented_five_minutes() {
        assert_eq!(SWEEP_AGE_THRESHOLD_SECS, SWEEP_INTERVAL.as_secs() as i64);
    }
}
