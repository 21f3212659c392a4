//! Product catalog, tracking subscriptions, and the four append-only
//! history series (spec §3, §4.3). Row structs and query bodies follow the
//! teacher's manual `sqlx::query` + `row.try_get` idiom rather than the
//! `query!` compile-time macro or `FromRow` derive.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use pilot_fetch::ProductFact;
use pilot_schemas::HistoryMetric;

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: Uuid,
    pub asin: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub bullet_points: Option<Json>,
    pub images: Option<Json>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<ProductRow> {
    Ok(ProductRow {
        id: row.try_get("id")?,
        asin: row.try_get("asin")?,
        title: row.try_get("title")?,
        brand: row.try_get("brand")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        bullet_points: row.try_get("bullet_points")?,
        images: row.try_get("images")?,
        last_updated_at: row.try_get("last_updated_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct TrackedProductRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub price_change_threshold: f64,
    pub bsr_change_threshold: f64,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn tracked_product_from_row(row: &sqlx::postgres::PgRow) -> Result<TrackedProductRow> {
    Ok(TrackedProductRow {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        price_change_threshold: row.try_get("price_change_threshold")?,
        bsr_change_threshold: row.try_get("bsr_change_threshold")?,
        is_active: row.try_get("is_active")?,
        last_checked_at: row.try_get("last_checked_at")?,
        next_check_at: row.try_get("next_check_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_id: Uuid,
    pub price: Option<f64>,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
    pub data_source: String,
}

#[derive(Debug, Clone)]
pub struct RankingHistoryRow {
    pub id: i64,
    pub product_id: Uuid,
    pub category: Option<String>,
    pub bsr_rank: Option<i32>,
    pub recorded_at: DateTime<Utc>,
    pub data_source: String,
}

#[derive(Debug, Clone)]
pub struct ReviewHistoryRow {
    pub id: i64,
    pub product_id: Uuid,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub recorded_at: DateTime<Utc>,
    pub data_source: String,
}

#[derive(Debug, Clone)]
pub struct BuyboxHistoryRow {
    pub id: i64,
    pub product_id: Uuid,
    pub buy_box_price: Option<f64>,
    pub seller: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub data_source: String,
}

/// A single point on a history chart, as returned by the
/// `GET /product/{id}/history` façade contract.
#[derive(Debug, Clone)]
pub struct HistoryPoint {
    pub date: DateTime<Utc>,
    pub value: Option<f64>,
    pub currency: Option<String>,
}

/// The four previous-snapshot rows read inside the ingest transaction,
/// before the new history rows are appended. The anomaly detector (C4)
/// compares its incoming fact against these, not against the rows it is
/// about to insert.
#[derive(Debug, Clone, Default)]
pub struct IngestSnapshots {
    pub previous_price: Option<PriceHistoryRow>,
    pub previous_ranking: Option<RankingHistoryRow>,
    pub previous_review: Option<ReviewHistoryRow>,
    pub previous_buybox: Option<BuyboxHistoryRow>,
}

pub async fn upsert_product(pool: &PgPool, fact: &ProductFact) -> Result<Uuid> {
    let bullet_points = serde_json::to_value(&fact.bullet_points).ok();
    let images = serde_json::to_value(&fact.images).ok();

    let id: Uuid = sqlx::query_scalar(
        r#"
        insert into products (asin, title, brand, category, description, bullet_points, images, last_updated_at)
        values ($1, $2, $3, $4, $5, $6, $7, now())
        on conflict (asin) do update set
            title = excluded.title,
            brand = excluded.brand,
            category = excluded.category,
            description = excluded.description,
            bullet_points = excluded.bullet_points,
            images = excluded.images,
            last_updated_at = now()
        returning id
        "#,
    )
    .bind(&fact.asin)
    .bind(&fact.title)
    .bind(&fact.brand)
    .bind(&fact.category)
    .bind(&fact.description)
    .bind(bullet_points)
    .bind(images)
    .fetch_one(pool)
    .await
    .context("upsert_product failed")?;

    Ok(id)
}

pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Option<ProductRow>> {
    let row = sqlx::query("select * from products where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get_product failed")?;
    row.as_ref().map(product_from_row).transpose()
}

pub async fn get_product_by_asin(pool: &PgPool, asin: &str) -> Result<Option<ProductRow>> {
    let row = sqlx::query("select * from products where asin = $1")
        .bind(asin)
        .fetch_optional(pool)
        .await
        .context("get_product_by_asin failed")?;
    row.as_ref().map(product_from_row).transpose()
}

pub async fn create_tracked_product(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    price_change_threshold: f64,
    bsr_change_threshold: f64,
) -> Result<TrackedProductRow> {
    let row = sqlx::query(
        r#"
        insert into tracked_products (user_id, product_id, price_change_threshold, bsr_change_threshold, next_check_at)
        values ($1, $2, $3, $4, now())
        returning *
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(price_change_threshold)
    .bind(bsr_change_threshold)
    .fetch_one(pool)
    .await
    .context("create_tracked_product failed")?;
    tracked_product_from_row(&row)
}

pub async fn get_tracked_product(pool: &PgPool, id: Uuid) -> Result<Option<TrackedProductRow>> {
    let row = sqlx::query("select * from tracked_products where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get_tracked_product failed")?;
    row.as_ref().map(tracked_product_from_row).transpose()
}

pub async fn list_tracked_products_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<TrackedProductRow>> {
    let rows = sqlx::query(
        "select * from tracked_products where user_id = $1 order by created_at desc",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("list_tracked_products_for_user failed")?;
    rows.iter().map(tracked_product_from_row).collect()
}

/// Tracked products due for a refresh: active, and `next_check_at` unset or
/// already in the past. This is the sole frequency gate (spec §9 OQ1) —
/// there is no separate hourly/daily/weekly enum.
pub async fn list_due_tracked_products(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TrackedProductRow>> {
    let rows = sqlx::query(
        r#"
        select * from tracked_products
        where is_active
          and (next_check_at is null or next_check_at <= now())
        order by next_check_at asc nulls first
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("list_due_tracked_products failed")?;
    rows.iter().map(tracked_product_from_row).collect()
}

pub async fn delete_tracked_product(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("delete from tracked_products where id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("delete_tracked_product failed")?;
    Ok(result.rows_affected() > 0)
}

fn price_history_from_row(row: &sqlx::postgres::PgRow) -> Result<PriceHistoryRow> {
    Ok(PriceHistoryRow {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        price: row.try_get("price")?,
        currency: row.try_get("currency")?,
        recorded_at: row.try_get("recorded_at")?,
        data_source: row.try_get("data_source")?,
    })
}

fn ranking_history_from_row(row: &sqlx::postgres::PgRow) -> Result<RankingHistoryRow> {
    Ok(RankingHistoryRow {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        category: row.try_get("category")?,
        bsr_rank: row.try_get("bsr_rank")?,
        recorded_at: row.try_get("recorded_at")?,
        data_source: row.try_get("data_source")?,
    })
}

fn review_history_from_row(row: &sqlx::postgres::PgRow) -> Result<ReviewHistoryRow> {
    Ok(ReviewHistoryRow {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        rating: row.try_get("rating")?,
        review_count: row.try_get("review_count")?,
        recorded_at: row.try_get("recorded_at")?,
        data_source: row.try_get("data_source")?,
    })
}

fn buybox_history_from_row(row: &sqlx::postgres::PgRow) -> Result<BuyboxHistoryRow> {
    Ok(BuyboxHistoryRow {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        buy_box_price: row.try_get("buy_box_price")?,
        seller: row.try_get("seller")?,
        recorded_at: row.try_get("recorded_at")?,
        data_source: row.try_get("data_source")?,
    })
}

async fn latest_price(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<Option<PriceHistoryRow>> {
    let row = sqlx::query(
        "select * from price_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .context("latest_price failed")?;
    row.as_ref().map(price_history_from_row).transpose()
}

async fn latest_ranking(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<Option<RankingHistoryRow>> {
    let row = sqlx::query(
        "select * from ranking_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .context("latest_ranking failed")?;
    row.as_ref().map(ranking_history_from_row).transpose()
}

async fn latest_review(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<Option<ReviewHistoryRow>> {
    let row = sqlx::query(
        "select * from review_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .context("latest_review failed")?;
    row.as_ref().map(review_history_from_row).transpose()
}

async fn latest_buybox(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<Option<BuyboxHistoryRow>> {
    let row = sqlx::query(
        "select * from buybox_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await
    .context("latest_buybox failed")?;
    row.as_ref().map(buybox_history_from_row).transpose()
}

pub async fn latest_price_history(pool: &PgPool, product_id: Uuid) -> Result<Option<PriceHistoryRow>> {
    let row = sqlx::query(
        "select * from price_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("latest_price_history failed")?;
    row.as_ref().map(price_history_from_row).transpose()
}

pub async fn latest_ranking_history(pool: &PgPool, product_id: Uuid) -> Result<Option<RankingHistoryRow>> {
    let row = sqlx::query(
        "select * from ranking_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("latest_ranking_history failed")?;
    row.as_ref().map(ranking_history_from_row).transpose()
}

pub async fn latest_review_history(pool: &PgPool, product_id: Uuid) -> Result<Option<ReviewHistoryRow>> {
    let row = sqlx::query(
        "select * from review_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("latest_review_history failed")?;
    row.as_ref().map(review_history_from_row).transpose()
}

pub async fn latest_buybox_history(pool: &PgPool, product_id: Uuid) -> Result<Option<BuyboxHistoryRow>> {
    let row = sqlx::query(
        "select * from buybox_history where product_id = $1 order by recorded_at desc, id desc limit 1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("latest_buybox_history failed")?;
    row.as_ref().map(buybox_history_from_row).transpose()
}

/// Paginated series for the history façade contract. `since` bounds the
/// window by `Period::days()`.
pub async fn list_history(
    pool: &PgPool,
    product_id: Uuid,
    metric: HistoryMetric,
    since: DateTime<Utc>,
) -> Result<Vec<HistoryPoint>> {
    let points = match metric {
        HistoryMetric::Price => {
            let rows = sqlx::query(
                "select recorded_at, price, currency from price_history where product_id = $1 and recorded_at >= $2 order by recorded_at asc",
            )
            .bind(product_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .context("list_history(price) failed")?;
            rows.iter()
                .map(|r| -> Result<HistoryPoint> {
                    Ok(HistoryPoint {
                        date: r.try_get("recorded_at")?,
                        value: r.try_get("price")?,
                        currency: r.try_get("currency")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        HistoryMetric::Bsr => {
            let rows = sqlx::query(
                "select recorded_at, bsr_rank from ranking_history where product_id = $1 and recorded_at >= $2 order by recorded_at asc",
            )
            .bind(product_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .context("list_history(bsr) failed")?;
            rows.iter()
                .map(|r| -> Result<HistoryPoint> {
                    let rank: Option<i32> = r.try_get("bsr_rank")?;
                    Ok(HistoryPoint {
                        date: r.try_get("recorded_at")?,
                        value: rank.map(|v| v as f64),
                        currency: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        HistoryMetric::Rating => {
            let rows = sqlx::query(
                "select recorded_at, rating from review_history where product_id = $1 and recorded_at >= $2 order by recorded_at asc",
            )
            .bind(product_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .context("list_history(rating) failed")?;
            rows.iter()
                .map(|r| -> Result<HistoryPoint> {
                    Ok(HistoryPoint {
                        date: r.try_get("recorded_at")?,
                        value: r.try_get("rating")?,
                        currency: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        HistoryMetric::ReviewCount => {
            let rows = sqlx::query(
                "select recorded_at, review_count from review_history where product_id = $1 and recorded_at >= $2 order by recorded_at asc",
            )
            .bind(product_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .context("list_history(review_count) failed")?;
            rows.iter()
                .map(|r| -> Result<HistoryPoint> {
                    let count: Option<i32> = r.try_get("review_count")?;
                    Ok(HistoryPoint {
                        date: r.try_get("recorded_at")?,
                        value: count.map(|v| v as f64),
                        currency: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        HistoryMetric::Buybox => {
            let rows = sqlx::query(
                "select recorded_at, buy_box_price from buybox_history where product_id = $1 and recorded_at >= $2 order by recorded_at asc",
            )
            .bind(product_id)
            .bind(since)
            .fetch_all(pool)
            .await
            .context("list_history(buybox) failed")?;
            rows.iter()
                .map(|r| -> Result<HistoryPoint> {
                    Ok(HistoryPoint {
                        date: r.try_get("recorded_at")?,
                        value: r.try_get("buy_box_price")?,
                        currency: None,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
    };
    Ok(points)
}

/// Atomically upserts the product row, reads the previous snapshot of each
/// of the four series, appends one new row to each series unconditionally
/// (spec §4.3, §8.2 — exactly one inserted row per series per ingest,
/// regardless of whether the value changed), and — when this fact is tied
/// to a tracked product — touches `tracked_products.last_checked_at` in the
/// same transaction (spec §4.3 step 5). That row-level write is the named
/// serialization point for concurrent refreshes of the same tracked
/// product: a second ingest for the same `tracked_id` blocks on the row
/// lock until this transaction commits or rolls back, so
/// history-advance and last_checked_at-advance stay atomically coupled
/// (spec §8.3). The previous snapshots are returned for the caller to run
/// anomaly detection against, outside this transaction.
pub async fn ingest_product_fact(
    pool: &PgPool,
    fact: &ProductFact,
    data_source: &str,
    tracked_touch: Option<(Uuid, DateTime<Utc>)>,
) -> Result<(Uuid, IngestSnapshots)> {
    let mut tx = pool.begin().await.context("ingest: begin tx failed")?;

    let bullet_points = serde_json::to_value(&fact.bullet_points).ok();
    let images = serde_json::to_value(&fact.images).ok();

    let product_id: Uuid = sqlx::query_scalar(
        r#"
        insert into products (asin, title, brand, category, description, bullet_points, images, last_updated_at)
        values ($1, $2, $3, $4, $5, $6, $7, now())
        on conflict (asin) do update set
            title = excluded.title,
            brand = excluded.brand,
            category = excluded.category,
            description = excluded.description,
            bullet_points = excluded.bullet_points,
            images = excluded.images,
            last_updated_at = now()
        returning id
        "#,
    )
    .bind(&fact.asin)
    .bind(&fact.title)
    .bind(&fact.brand)
    .bind(&fact.category)
    .bind(&fact.description)
    .bind(bullet_points)
    .bind(images)
    .fetch_one(&mut *tx)
    .await
    .context("ingest: upsert product failed")?;

    let snapshots = IngestSnapshots {
        previous_price: latest_price(&mut tx, product_id).await?,
        previous_ranking: latest_ranking(&mut tx, product_id).await?,
        previous_review: latest_review(&mut tx, product_id).await?,
        previous_buybox: latest_buybox(&mut tx, product_id).await?,
    };

    sqlx::query(
        "insert into price_history (product_id, price, currency, data_source) values ($1, $2, $3, $4)",
    )
    .bind(product_id)
    .bind(fact.price)
    .bind(&fact.currency)
    .bind(data_source)
    .execute(&mut *tx)
    .await
    .context("ingest: insert price_history failed")?;

    sqlx::query(
        "insert into ranking_history (product_id, category, bsr_rank, data_source) values ($1, $2, $3, $4)",
    )
    .bind(product_id)
    .bind(&fact.bsr_category)
    .bind(fact.bsr.map(|v| v as i32))
    .bind(data_source)
    .execute(&mut *tx)
    .await
    .context("ingest: insert ranking_history failed")?;

    sqlx::query(
        "insert into review_history (product_id, rating, review_count, data_source) values ($1, $2, $3, $4)",
    )
    .bind(product_id)
    .bind(fact.rating)
    .bind(fact.review_count.map(|v| v as i32))
    .bind(data_source)
    .execute(&mut *tx)
    .await
    .context("ingest: insert review_history failed")?;

    sqlx::query(
        "insert into buybox_history (product_id, buy_box_price, seller, data_source) values ($1, $2, $3, $4)",
    )
    .bind(product_id)
    .bind(fact.buy_box_price)
    .bind(&fact.seller)
    .bind(data_source)
    .execute(&mut *tx)
    .await
    .context("ingest: insert buybox_history failed")?;

    if let Some((tracked_id, next_check_at)) = tracked_touch {
        sqlx::query(
            "update tracked_products set last_checked_at = now(), next_check_at = $2 where id = $1",
        )
        .bind(tracked_id)
        .bind(next_check_at)
        .execute(&mut *tx)
        .await
        .context("ingest: touch tracked_products failed")?;
    }

    tx.commit().await.context("ingest: commit failed")?;

    Ok((product_id, snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_snapshots_default_is_all_none() {
        let snapshots = IngestSnapshots::default();
        assert!(snapshots.previous_price.is_none());
        assert!(snapshots.previous_ranking.is_none());
        assert!(snapshots.previous_review.is_none());
        assert!(snapshots.previous_buybox.is_none());
    }
}
