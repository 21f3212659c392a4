use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use pilot_cache::CacheLayer;
use pilot_db::products::{self, IngestSnapshots};
use pilot_db::{analysis, anomalies, notifications};
use pilot_fetch::Provider;
use pilot_llm::{ChatCompletionClient, CompetitorAnalysisData, ProductData};
use pilot_queue::{
    DataCleanupPayload, GenerateCompetitorReportPayload, RefreshProductDataPayload,
    SendNotificationPayload,
};

/// Default refresh cadence applied after a successful ingest, when the
/// scheduler hasn't already set a tighter one.
const DEFAULT_RECHECK_INTERVAL: chrono::Duration = chrono::Duration::hours(1);

#[derive(Debug)]
pub struct HandlerError {
    pub message: String,
    /// Mirrors `ApiError::is_permanent_for_queue` — a permanent failure is
    /// never retried by the broker (missing referenced row, malformed
    /// payload); anything else is retryable.
    pub permanent: bool,
}

impl HandlerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

pub struct WorkerContext {
    pub pool: PgPool,
    pub cache: CacheLayer,
    pub fetch: Arc<dyn Provider>,
    pub llm: Arc<dyn ChatCompletionClient>,
}

pub async fn handle_refresh_product_data(
    ctx: &WorkerContext,
    payload: RefreshProductDataPayload,
) -> Result<(), HandlerError> {
    let asin = pilot_schemas::Asin::parse(&payload.asin)
        .map_err(|e| HandlerError::permanent(format!("invalid asin in payload: {e}")))?;

    let facts = ctx
        .fetch
        .fetch_sync(&[asin], Duration::from_secs(60))
        .await
        .map_err(|e| HandlerError::retryable(format!("scraper fetch failed: {e}")))?;

    let fact = facts
        .into_iter()
        .next()
        .ok_or_else(|| HandlerError::retryable("scraper returned no product data"))?;

    // The `tracked_products` touch happens inside the ingest transaction
    // itself (spec §4.3 step 5): that row-level write is what serializes
    // concurrent refreshes of the same tracked product and keeps
    // history-advance coupled to last_checked_at-advance (spec §8.3).
    let tracked_touch = payload
        .tracked_product_id
        .map(|tracked_id| (tracked_id, Utc::now() + DEFAULT_RECHECK_INTERVAL));

    let (product_id, snapshots): (Uuid, IngestSnapshots) =
        products::ingest_product_fact(&ctx.pool, &fact, "apify", tracked_touch)
            .await
            .map_err(|e| HandlerError::retryable(format!("ingest failed: {e}")))?;

    if let Some(tracked_id) = payload.tracked_product_id {
        let tracked = products::get_tracked_product(&ctx.pool, tracked_id)
            .await
            .map_err(|e| HandlerError::retryable(format!("load tracked product failed: {e}")))?
            .ok_or_else(|| HandlerError::permanent("tracked product no longer exists"))?;

        let candidates = anomalies::detect(
            &fact.asin,
            product_id,
            &fact,
            &snapshots,
            tracked.price_change_threshold,
            tracked.bsr_change_threshold,
        );
        if !candidates.is_empty() {
            anomalies::insert_batch(&ctx.pool, &candidates)
                .await
                .map_err(|e| HandlerError::retryable(format!("anomaly insert failed: {e}")))?;
        }
    }

    ctx.cache.invalidate_product(product_id).await;

    info!(asin = %fact.asin, %product_id, "refresh_product_data completed");
    Ok(())
}

pub async fn handle_generate_competitor_report(
    ctx: &WorkerContext,
    payload: GenerateCompetitorReportPayload,
) -> Result<(), HandlerError> {
    // Replay guard (spec §4.8 step 7 / §4.2 idempotency table): a broker
    // retry after the handler already drove this task_id to a terminal
    // state must return early rather than re-run the LLM call and clobber
    // `completed`/`failed` back to `processing`.
    let existing = analysis::get_result_by_task_id(&ctx.pool, payload.task_id)
        .await
        .map_err(|e| HandlerError::retryable(format!("load result failed: {e}")))?
        .ok_or_else(|| HandlerError::permanent("analysis result row no longer exists"))?;
    if existing.status == "completed" || existing.status == "failed" {
        info!(task_id = %payload.task_id, status = %existing.status, "generate_competitor_report replay on terminal result, skipping");
        return Ok(());
    }

    analysis::mark_result_processing(&ctx.pool, payload.task_id)
        .await
        .map_err(|e| HandlerError::retryable(format!("mark processing failed: {e}")))?;

    let group = analysis::get_analysis_group(&ctx.pool, payload.group_id)
        .await
        .map_err(|e| HandlerError::retryable(format!("load group failed: {e}")))?
        .ok_or_else(|| HandlerError::permanent("analysis group no longer exists"))?;

    let competitor_ids = analysis::list_group_competitor_ids(&ctx.pool, group.id)
        .await
        .map_err(|e| HandlerError::retryable(format!("load competitors failed: {e}")))?;

    let main = load_product_data(&ctx.pool, group.main_product_id)
        .await
        .map_err(|e| HandlerError::retryable(format!("load main product failed: {e}")))?;

    let mut competitors = Vec::with_capacity(competitor_ids.len());
    for id in competitor_ids {
        competitors.push(
            load_product_data(&ctx.pool, id)
                .await
                .map_err(|e| HandlerError::retryable(format!("load competitor failed: {e}")))?,
        );
    }

    let data = CompetitorAnalysisData { main, competitors };

    match ctx.llm.generate_competitor_report(&data).await {
        Ok(report) => {
            let analysis_data = serde_json::to_value(&data)
                .map_err(|e| HandlerError::retryable(format!("serialize analysis_data: {e}")))?;
            let insights = serde_json::to_value(&report)
                .map_err(|e| HandlerError::retryable(format!("serialize insights: {e}")))?;
            let recommendations = serde_json::to_value(&report.recommendations)
                .map_err(|e| HandlerError::retryable(format!("serialize recommendations: {e}")))?;

            analysis::mark_result_completed(&ctx.pool, payload.task_id, analysis_data, insights, recommendations)
                .await
                .map_err(|e| HandlerError::retryable(format!("mark completed failed: {e}")))?;
            Ok(())
        }
        Err(err) => {
            warn!(task_id = %payload.task_id, %err, "competitor report generation failed");
            analysis::mark_result_failed(&ctx.pool, payload.task_id, &err.to_string())
                .await
                .map_err(|e| HandlerError::retryable(format!("mark failed failed: {e}")))?;
            // The report failure itself is terminal for this task (spec §4.8
            // step 7: "does not self-retry semantically"); the result row is
            // already `failed`, so the broker need not retry either.
            Ok(())
        }
    }
}

async fn load_product_data(pool: &PgPool, product_id: Uuid) -> anyhow::Result<ProductData> {
    let product = products::get_product(pool, product_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} not found"))?;

    let price = products::latest_price_history(pool, product_id).await?;
    let ranking = products::latest_ranking_history(pool, product_id).await?;
    let review = products::latest_review_history(pool, product_id).await?;

    let (price_value, currency) = match &price {
        Some(p) => (p.price.unwrap_or(0.0), p.currency.clone()),
        None => (0.0, "USD".to_string()),
    };

    Ok(ProductData {
        asin: product.asin,
        title: product.title,
        price: price_value,
        currency,
        bsr: ranking.and_then(|r| r.bsr_rank).map(|v| v as i64).unwrap_or(0),
        rating: review.as_ref().and_then(|r| r.rating).unwrap_or(0.0),
        review_count: review
            .and_then(|r| r.review_count)
            .map(|v| v as i64)
            .unwrap_or(0),
    })
}

/// Persists delivery intent only — no real push/email transport (non-goal).
pub async fn handle_send_notification(
    ctx: &WorkerContext,
    payload: SendNotificationPayload,
) -> Result<(), HandlerError> {
    let exists = notifications::notification_exists(&ctx.pool, payload.notification_id)
        .await
        .map_err(|e| HandlerError::retryable(format!("lookup notification failed: {e}")))?;

    if !exists {
        return Err(HandlerError::permanent("notification row no longer exists"));
    }

    info!(notification_id = %payload.notification_id, "send_notification delivery intent recorded");
    Ok(())
}

pub async fn handle_data_cleanup(
    ctx: &WorkerContext,
    payload: DataCleanupPayload,
) -> Result<(), HandlerError> {
    let cutoff = Utc::now() - chrono::Duration::days(payload.older_than_days);

    sqlx::query("delete from change_events where processed and created_at < $1")
        .bind(cutoff)
        .execute(&ctx.pool)
        .await
        .map_err(|e| HandlerError::retryable(format!("cleanup change_events failed: {e}")))?;

    sqlx::query("delete from pilot_queue where status in ('sent', 'failed') and created_at < $1")
        .bind(cutoff)
        .execute(&ctx.pool)
        .await
        .map_err(|e| HandlerError::retryable(format!("cleanup pilot_queue failed: {e}")))?;

    info!(days = payload.older_than_days, "data_cleanup completed");
    Ok(())
}

pub async fn dispatch(
    ctx: &WorkerContext,
    task_type: &str,
    payload: serde_json::Value,
) -> Result<(), HandlerError> {
    match pilot_queue::TaskType::parse(task_type) {
        Some(pilot_queue::TaskType::RefreshProductData) => {
            let p: RefreshProductDataPayload = serde_json::from_value(payload)
                .map_err(|e| HandlerError::permanent(format!("bad payload: {e}")))?;
            handle_refresh_product_data(ctx, p).await
        }
        Some(pilot_queue::TaskType::GenerateCompetitorReport) => {
            let p: GenerateCompetitorReportPayload = serde_json::from_value(payload)
                .map_err(|e| HandlerError::permanent(format!("bad payload: {e}")))?;
            handle_generate_competitor_report(ctx, p).await
        }
        Some(pilot_queue::TaskType::SendNotification) => {
            let p: SendNotificationPayload = serde_json::from_value(payload)
                .map_err(|e| HandlerError::permanent(format!("bad payload: {e}")))?;
            handle_send_notification(ctx, p).await
        }
        Some(pilot_queue::TaskType::DataCleanup) => {
            let p: DataCleanupPayload = serde_json::from_value(payload)
                .map_err(|e| HandlerError::permanent(format!("bad payload: {e}")))?;
            handle_data_cleanup(ctx, p).await
        }
        None => Err(HandlerError::permanent(format!("unknown task type: {task_type}"))),
    }
}
