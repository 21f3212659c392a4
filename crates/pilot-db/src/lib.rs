//! Postgres access layer for the Amazon Pilot tracking pipeline.
//!
//! Connection bootstrap and the migration runner mirror the teacher's
//! `mqk-db::connect_from_env`/`migrate`/`status` shape; the ingest-writer
//! transaction (C3), history-series reads, and anomaly/notification/analysis
//! CRUD are new, grounded on the CTE upsert-or-insert pattern from
//! `other_examples` scbdb `products.rs` and the field mapping of the
//! original `internal/pkg/tasks/apify_tasks.go`.

pub mod analysis;
pub mod anomalies;
pub mod change_events;
pub mod notifications;
pub mod products;

pub use analysis::{AnalysisGroupRow, AnalysisResultRow};
pub use anomalies::{AnomalyEventRow, NewAnomalyEvent};
pub use change_events::ChangeEventRow;
pub use notifications::NotificationRow;
pub use products::{
    BuyboxHistoryRow, HistoryPoint, IngestSnapshots, PriceHistoryRow, ProductRow,
    RankingHistoryRow, ReviewHistoryRow, TrackedProductRow,
};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use pilot_config::PilotEnv;

/// Connect to Postgres using the pool sizing/lifetime from [`PilotEnv`].
pub async fn connect_from_env(env: &PilotEnv) -> Result<PgPool> {
    let dsn = env
        .database_dsn
        .as_deref()
        .context("DATABASE_DSN is not configured")?;

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_open_conns)
        .min_connections(env.database_max_idle_conns.min(env.database_max_open_conns))
        .max_lifetime(env.database_conn_max_lifetime)
        .connect(dsn)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations (schema + alert triggers).
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema-presence status, used by bootstrap health checks.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (has_products,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'products'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_products_table: has_products,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_products_table: bool,
}
