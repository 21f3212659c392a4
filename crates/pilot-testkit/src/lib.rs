//! Test-only helpers: a migrated Postgres pool bootstrap and fixture
//! builders for the entities scenario tests across the workspace need most
//! often (Product, TrackedProduct, CompetitorAnalysisGroup).
//!
//! Grounded on `mqk-testkit`'s crate shape and `mqk-db::testkit_db_pool`
//! (connect via env, then run migrations before handing back the pool).
//! Not wired into any production binary's dependency tree — only
//! `[dev-dependencies]` in the crates that need it, same as the teacher's
//! boundary comment on `mqk-db`'s `testkit` feature.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use pilot_config::PilotEnv;
use pilot_fetch::ProductFact;

/// Connects using `DATABASE_DSN` (or whatever `PilotEnv::load` resolves)
/// and ensures migrations are applied. Panics via `?` if `DATABASE_DSN` is
/// unset — tests that need a live database are expected to set it, same as
/// the teacher's `MQK_DATABASE_URL` convention.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let env = PilotEnv::load();
    let pool = pilot_db::connect_from_env(&env).await?;
    pilot_db::migrate(&pool).await?;
    Ok(pool)
}

/// A minimal, deterministic `ProductFact` for a given ASIN, usable both as
/// ingest input and as the seed for `fixture_product`.
pub fn sample_product_fact(asin: &str, title: &str, price: f64) -> ProductFact {
    ProductFact {
        asin: asin.to_string(),
        title: title.to_string(),
        brand: Some("Acme".to_string()),
        category: Some("Electronics".to_string()),
        description: Some("a fixture product".to_string()),
        bullet_points: vec!["durable".to_string(), "lightweight".to_string()],
        images: vec!["https://example.com/img.jpg".to_string()],
        price: Some(price),
        currency: "USD".to_string(),
        rating: Some(4.2),
        review_count: Some(128),
        bsr: Some(5_000),
        bsr_category: Some("Electronics".to_string()),
        buy_box_price: None,
        seller: Some("Acme Direct".to_string()),
        availability: Some("In Stock".to_string()),
        prime: true,
        scraped_at: Utc::now(),
    }
}

/// Upserts a fixture `Product` row from [`sample_product_fact`] and returns
/// its id.
pub async fn fixture_product(pool: &PgPool, asin: &str, title: &str, price: f64) -> Result<Uuid> {
    let fact = sample_product_fact(asin, title, price);
    pilot_db::products::upsert_product(pool, &fact).await
}

/// Creates a fixture `TrackedProduct` row for `user_id` tracking
/// `product_id`, using default thresholds (0.0 persisted, meaning "use the
/// detector's built-in default" per spec §4.4).
pub async fn fixture_tracked_product(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<pilot_db::TrackedProductRow> {
    pilot_db::products::create_tracked_product(pool, user_id, product_id, 0.0, 0.0).await
}

/// Creates a fixture `CompetitorAnalysisGroup` with `main` as the main
/// product and `competitors` as its linked competitor set.
pub async fn fixture_analysis_group(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    main_product_id: Uuid,
    competitor_product_ids: &[Uuid],
) -> Result<pilot_db::AnalysisGroupRow> {
    pilot_db::analysis::create_analysis_group(
        pool,
        user_id,
        name,
        None,
        main_product_id,
        competitor_product_ids,
    )
    .await
}

/// A fresh random user id — the core has no user table of its own (§3:
/// users are created externally and treated as a foreign key), so fixture
/// users are just UUIDs with no backing row.
pub fn fixture_user_id() -> Uuid {
    Uuid::new_v4()
}
