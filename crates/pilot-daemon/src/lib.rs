//! Shared process bootstrap for the three standalone binaries (worker,
//! scheduler, listener). Each binary is a thin `main.rs` that calls into
//! this module for tracing setup, config load/validate, pool/cache/fetch/
//! llm client construction, and the SIGTERM/SIGINT graceful-shutdown
//! signal, then hands off to its component's `run` loop.
//!
//! Grounded on `mqk-daemon`'s `init_tracing` and `AppState` construction
//! pattern (tracing bootstrap + one constructor-injected shared-state
//! struct); the signal-handling loop itself has no teacher counterpart
//! (`mqk-daemon`'s `axum::serve` call has no graceful-shutdown wiring) and
//! is authored fresh in the surrounding idiom (`anyhow` + `tracing`,
//! `tokio::select!`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pilot_config::{PilotEnv, ServiceName};

/// Loads `.env.local` if present (dev convenience; silent if absent, same
/// as `mqk-daemon`'s `dotenvy::from_filename` call), then installs the
/// `tracing` subscriber with `RUST_LOG`-driven filtering.
pub fn bootstrap(service: ServiceName) -> PilotEnv {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();
    let env = PilotEnv::load();
    info!(service = service.as_str(), environment = %env.environment, "starting");
    env
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Connects to Postgres and runs migrations. Each of the three binaries
/// needs a ready schema on first boot — `pilot-db`'s migration runner is
/// idempotent so repeated calls across binaries are harmless.
pub async fn connect_and_migrate(env: &PilotEnv) -> Result<sqlx::PgPool> {
    let pool = pilot_db::connect_from_env(env)
        .await
        .context("failed to connect to Postgres")?;
    pilot_db::migrate(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(pool)
}

/// An `AtomicBool` flag flipped by the first SIGTERM/SIGINT, shared with a
/// component's `run` loop so it can stop accepting new work and return.
pub fn shutdown_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

/// Waits for SIGTERM or SIGINT, then flips `flag` and returns. Intended to
/// be raced against the component's own `run` future via `tokio::select!`
/// in each binary's `main`.
pub async fn wait_for_shutdown_signal(flag: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    }

    flag.store(true, Ordering::Relaxed);
}
