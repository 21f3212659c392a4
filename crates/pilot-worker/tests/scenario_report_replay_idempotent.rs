//! Scenario (spec §8 "Round-trip / idempotence"): replaying a
//! `generate_competitor_report` task whose result row is already
//! `completed` must leave the row unchanged rather than re-invoking the LLM
//! and reverting it to `processing`.
//!
//! Requires a live PostgreSQL instance (DATABASE_DSN) and Redis
//! (REDIS_ADDR, e.g. `127.0.0.1:6379`) — the worker context's cache layer
//! needs a real connection even though this scenario never reads through
//! it. Skips via `#[ignore]` when either is absent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pilot_cache::CacheLayer;
use pilot_db::{analysis, products};
use pilot_fetch::{ProductFact, Provider, ProviderError};
use pilot_llm::{ChatCompletionClient, CompetitorAnalysisData, CompetitorReport, LlmError};
use pilot_queue::GenerateCompetitorReportPayload;
use pilot_schemas::Asin;
use pilot_worker::{handlers::handle_generate_competitor_report, WorkerContext};
use sqlx::PgPool;
use uuid::Uuid;

struct UnreachableProvider;

#[async_trait]
impl Provider for UnreachableProvider {
    fn name(&self) -> &'static str {
        "unreachable"
    }
    async fn fetch_sync(&self, _: &[Asin], _: std::time::Duration) -> Result<Vec<ProductFact>, ProviderError> {
        panic!("a replay on a terminal result must never call the scraper")
    }
    async fn run_async(&self, _: &[Asin]) -> Result<String, ProviderError> {
        panic!("unused")
    }
    async fn await_run(&self, _: &str, _: std::time::Duration) -> Result<(), ProviderError> {
        panic!("unused")
    }
    async fn fetch_run(&self, _: &str) -> Result<Vec<ProductFact>, ProviderError> {
        panic!("unused")
    }
}

struct UnreachableLlm;

#[async_trait]
impl ChatCompletionClient for UnreachableLlm {
    async fn generate_competitor_report(
        &self,
        _: &CompetitorAnalysisData,
    ) -> Result<CompetitorReport, LlmError> {
        panic!("a replay on a terminal result must never call the LLM")
    }
}

async fn connect() -> PgPool {
    let dsn = std::env::var("DATABASE_DSN").expect("DATABASE_DSN required");
    let pool = PgPool::connect(&dsn).await.expect("connect");
    sqlx::migrate!("../pilot-db/migrations").run(&pool).await.expect("migrate");
    pool
}

fn fact(asin: &str) -> ProductFact {
    ProductFact {
        asin: asin.to_string(),
        title: "Replay Widget".to_string(),
        brand: None,
        category: None,
        description: None,
        bullet_points: vec![],
        images: vec![],
        price: Some(10.0),
        currency: "USD".to_string(),
        rating: None,
        review_count: None,
        bsr: None,
        bsr_category: None,
        buy_box_price: None,
        seller: None,
        availability: None,
        prime: false,
        scraped_at: Utc::now(),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_DSN and REDIS_ADDR; run: DATABASE_DSN=... REDIS_ADDR=127.0.0.1:6379 cargo test -p pilot-worker -- --include-ignored"]
async fn replaying_a_completed_report_task_is_a_no_op() {
    let pool = connect().await;
    let redis_addr = std::env::var("REDIS_ADDR").expect("REDIS_ADDR required");
    let cache = CacheLayer::connect(&redis_addr, 0).await.expect("connect redis");

    let asin = format!("B{:09}", Uuid::new_v4().as_u128() % 1_000_000_000);
    let (product_id, _) = products::ingest_product_fact(&pool, &fact(&asin), "mock", None)
        .await
        .expect("seed product");
    let user_id = Uuid::new_v4();
    let group = pilot_db::analysis::create_analysis_group(&pool, user_id, "Replay Group", None, product_id, &[])
        .await
        .expect("create group");

    let task_id = Uuid::new_v4();
    analysis::insert_queued_result(&pool, group.id, task_id, None)
        .await
        .expect("insert queued result");
    analysis::mark_result_processing(&pool, task_id).await.expect("mark processing");
    analysis::mark_result_completed(
        &pool,
        task_id,
        serde_json::json!({"main": {}, "competitors": []}),
        serde_json::json!({"summary": "already done", "recommendations": [], "market_insights": []}),
        serde_json::json!([]),
    )
    .await
    .expect("mark completed");

    let ctx = WorkerContext {
        pool: pool.clone(),
        cache,
        fetch: Arc::new(UnreachableProvider),
        llm: Arc::new(UnreachableLlm),
    };

    let payload = GenerateCompetitorReportPayload {
        group_id: group.id,
        task_id,
    };

    handle_generate_competitor_report(&ctx, payload)
        .await
        .expect("replay on a completed result must return Ok without touching the LLM");

    let reloaded = analysis::get_result_by_task_id(&pool, task_id)
        .await
        .expect("reload")
        .expect("row exists");
    assert_eq!(reloaded.status, "completed");
    assert_eq!(
        reloaded.insights.unwrap()["summary"],
        serde_json::json!("already done")
    );
}
