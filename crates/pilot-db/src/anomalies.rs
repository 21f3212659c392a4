//! Anomaly detector (C4): compares an incoming fact against the previous
//! snapshot of each series and batch-inserts the anomaly events that cross
//! threshold, per the exact formulas in `internal/pkg/tasks/apify_tasks.go`'s
//! `detectAndRecordAnomalies`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use pilot_schemas::{EventType, Severity};

use crate::products::IngestSnapshots;
use pilot_fetch::ProductFact;

#[derive(Debug, Clone)]
pub struct AnomalyEventRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub asin: String,
    pub event_type: String,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
    pub change_percentage: Option<f64>,
    pub threshold: Option<f64>,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

fn anomaly_event_from_row(row: &sqlx::postgres::PgRow) -> Result<AnomalyEventRow> {
    Ok(AnomalyEventRow {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        asin: row.try_get("asin")?,
        event_type: row.try_get("event_type")?,
        old_value: row.try_get("old_value")?,
        new_value: row.try_get("new_value")?,
        change_percentage: row.try_get("change_percentage")?,
        threshold: row.try_get("threshold")?,
        severity: row.try_get("severity")?,
        created_at: row.try_get("created_at")?,
    })
}

/// A candidate anomaly, computed but not yet persisted.
#[derive(Debug, Clone)]
pub struct NewAnomalyEvent {
    pub product_id: Uuid,
    pub asin: String,
    pub event_type: EventType,
    pub old_value: f64,
    pub new_value: f64,
    pub change_percentage: f64,
    pub threshold: f64,
    pub severity: Severity,
}

fn pct_change(old: f64, new: f64) -> f64 {
    ((new - old) / old).abs() * 100.0
}

fn price_severity(pct: f64) -> Severity {
    if pct >= 20.0 {
        Severity::Critical
    } else if pct >= 10.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

fn bsr_severity(pct: f64) -> Severity {
    if pct >= 50.0 {
        Severity::Critical
    } else if pct >= 30.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

fn rating_severity(pct: f64) -> Severity {
    if pct > 20.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

fn review_count_severity(pct: f64) -> Severity {
    if pct > 50.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

const DEFAULT_PRICE_THRESHOLD: f64 = 10.0;
const DEFAULT_BSR_THRESHOLD: f64 = 30.0;
const RATING_THRESHOLD: f64 = 5.0;
const REVIEW_COUNT_THRESHOLD: f64 = 20.0;

/// Computes up to four anomaly candidates from one ingest's snapshots. Pure
/// function — no I/O — so it can be unit tested directly against the
/// breakpoints in the spec's threshold table.
pub fn detect(
    asin: &str,
    product_id: Uuid,
    fact: &ProductFact,
    snapshots: &IngestSnapshots,
    price_change_threshold: f64,
    bsr_change_threshold: f64,
) -> Vec<NewAnomalyEvent> {
    let mut events = Vec::new();

    if let (Some(prev), Some(new_price)) = (
        snapshots.previous_price.as_ref().and_then(|p| p.price),
        fact.price,
    ) {
        if prev > 0.0 && new_price > 0.0 {
            let pct = pct_change(prev, new_price);
            let threshold = if price_change_threshold > 0.0 {
                price_change_threshold
            } else {
                DEFAULT_PRICE_THRESHOLD
            };
            if pct > threshold {
                events.push(NewAnomalyEvent {
                    product_id,
                    asin: asin.to_string(),
                    event_type: EventType::PriceChange,
                    old_value: prev,
                    new_value: new_price,
                    change_percentage: pct,
                    threshold,
                    severity: price_severity(pct),
                });
            }
        }
    }

    if let (Some(prev_bsr), Some(new_bsr)) = (
        snapshots
            .previous_ranking
            .as_ref()
            .and_then(|r| r.bsr_rank)
            .map(|v| v as f64),
        fact.bsr.map(|v| v as f64),
    ) {
        if prev_bsr > 0.0 && new_bsr > 0.0 {
            let pct = pct_change(prev_bsr, new_bsr);
            let threshold = if bsr_change_threshold > 0.0 {
                bsr_change_threshold
            } else {
                DEFAULT_BSR_THRESHOLD
            };
            if pct > threshold {
                events.push(NewAnomalyEvent {
                    product_id,
                    asin: asin.to_string(),
                    event_type: EventType::BsrChange,
                    old_value: prev_bsr,
                    new_value: new_bsr,
                    change_percentage: pct,
                    threshold,
                    severity: bsr_severity(pct),
                });
            }
        }
    }

    if let (Some(prev_rating), Some(new_rating)) = (
        snapshots.previous_review.as_ref().and_then(|r| r.rating),
        fact.rating,
    ) {
        if prev_rating > 0.0 && new_rating > 0.0 {
            let pct = pct_change(prev_rating, new_rating);
            if pct > RATING_THRESHOLD {
                events.push(NewAnomalyEvent {
                    product_id,
                    asin: asin.to_string(),
                    event_type: EventType::RatingChange,
                    old_value: prev_rating,
                    new_value: new_rating,
                    change_percentage: pct,
                    threshold: RATING_THRESHOLD,
                    severity: rating_severity(pct),
                });
            }
        }
    }

    if let (Some(prev_count), Some(new_count)) = (
        snapshots
            .previous_review
            .as_ref()
            .and_then(|r| r.review_count)
            .map(|v| v as f64),
        fact.review_count.map(|v| v as f64),
    ) {
        if prev_count > 0.0 && new_count > 0.0 {
            let pct = pct_change(prev_count, new_count);
            if pct > REVIEW_COUNT_THRESHOLD {
                events.push(NewAnomalyEvent {
                    product_id,
                    asin: asin.to_string(),
                    event_type: EventType::ReviewCountChange,
                    old_value: prev_count,
                    new_value: new_count,
                    change_percentage: pct,
                    threshold: REVIEW_COUNT_THRESHOLD,
                    severity: review_count_severity(pct),
                });
            }
        }
    }

    events
}

/// Inserts every candidate in a single batch (spec §4.4: "inserted in a
/// single batch"). The DB trigger on this table is the notification
/// fan-out path (spec §9 OQ2) — this function does not itself write to
/// `notifications`.
pub async fn insert_batch(pool: &PgPool, events: &[NewAnomalyEvent]) -> Result<Vec<Uuid>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await.context("anomaly insert_batch: begin failed")?;
    let mut ids = Vec::with_capacity(events.len());
    for event in events {
        let id: Uuid = sqlx::query_scalar(
            r#"
            insert into anomaly_events
                (product_id, asin, event_type, old_value, new_value, change_percentage, threshold, severity)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            returning id
            "#,
        )
        .bind(event.product_id)
        .bind(&event.asin)
        .bind(event.event_type.as_str())
        .bind(event.old_value)
        .bind(event.new_value)
        .bind(event.change_percentage)
        .bind(event.threshold)
        .bind(event.severity.as_str())
        .fetch_one(&mut *tx)
        .await
        .context("anomaly insert_batch: insert failed")?;
        ids.push(id);
    }
    tx.commit().await.context("anomaly insert_batch: commit failed")?;
    Ok(ids)
}

#[derive(Debug, Clone, Default)]
pub struct AnomalyEventFilter {
    pub asin: Option<String>,
    pub event_type: Option<String>,
    pub severity: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_anomaly_events(
    pool: &PgPool,
    filter: &AnomalyEventFilter,
) -> Result<Vec<AnomalyEventRow>> {
    let rows = sqlx::query(
        r#"
        select * from anomaly_events
        where ($1::text is null or asin = $1)
          and ($2::text is null or event_type = $2)
          and ($3::text is null or severity = $3)
        order by created_at desc
        limit $4 offset $5
        "#,
    )
    .bind(&filter.asin)
    .bind(&filter.event_type)
    .bind(&filter.severity)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await
    .context("list_anomaly_events failed")?;
    rows.iter().map(anomaly_event_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::{IngestSnapshots, PriceHistoryRow, RankingHistoryRow, ReviewHistoryRow};
    use chrono::Utc;

    fn fact(price: Option<f64>, bsr: Option<i64>, rating: Option<f64>, review_count: Option<i64>) -> ProductFact {
        ProductFact {
            asin: "B08N5WRWNW".to_string(),
            title: "Widget".to_string(),
            brand: None,
            category: None,
            description: None,
            bullet_points: vec![],
            images: vec![],
            price,
            currency: "USD".to_string(),
            rating,
            review_count,
            bsr,
            bsr_category: None,
            buy_box_price: None,
            seller: None,
            availability: None,
            prime: false,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn price_drop_past_threshold_is_critical() {
        let snapshots = IngestSnapshots {
            previous_price: Some(PriceHistoryRow {
                id: 1,
                product_id: Uuid::nil(),
                price: Some(100.0),
                currency: "USD".to_string(),
                recorded_at: Utc::now(),
                data_source: "apify".to_string(),
            }),
            ..Default::default()
        };
        let f = fact(Some(75.0), None, None, None);
        let events = detect("B08N5WRWNW", Uuid::nil(), &f, &snapshots, 0.0, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::PriceChange);
        assert_eq!(events[0].severity, Severity::Critical);
    }

    #[test]
    fn price_change_within_threshold_is_not_reported() {
        let snapshots = IngestSnapshots {
            previous_price: Some(PriceHistoryRow {
                id: 1,
                product_id: Uuid::nil(),
                price: Some(100.0),
                currency: "USD".to_string(),
                recorded_at: Utc::now(),
                data_source: "apify".to_string(),
            }),
            ..Default::default()
        };
        let f = fact(Some(105.0), None, None, None);
        let events = detect("B08N5WRWNW", Uuid::nil(), &f, &snapshots, 0.0, 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn bsr_worsening_past_fifty_percent_is_critical() {
        let snapshots = IngestSnapshots {
            previous_ranking: Some(RankingHistoryRow {
                id: 1,
                product_id: Uuid::nil(),
                category: None,
                bsr_rank: Some(1000),
                recorded_at: Utc::now(),
                data_source: "apify".to_string(),
            }),
            ..Default::default()
        };
        let f = fact(None, Some(1600), None, None);
        let events = detect("B08N5WRWNW", Uuid::nil(), &f, &snapshots, 0.0, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::BsrChange);
        assert_eq!(events[0].severity, Severity::Critical);
    }

    #[test]
    fn rating_change_never_reaches_critical() {
        let snapshots = IngestSnapshots {
            previous_review: Some(ReviewHistoryRow {
                id: 1,
                product_id: Uuid::nil(),
                rating: Some(4.0),
                review_count: Some(100),
                recorded_at: Utc::now(),
                data_source: "apify".to_string(),
            }),
            ..Default::default()
        };
        let f = fact(None, None, Some(2.0), None);
        let events = detect("B08N5WRWNW", Uuid::nil(), &f, &snapshots, 0.0, 0.0);
        assert_eq!(events.len(), 1);
        assert_ne!(events[0].severity, Severity::Critical);
    }

    #[test]
    fn zero_previous_value_never_fires() {
        let snapshots = IngestSnapshots {
            previous_price: Some(PriceHistoryRow {
                id: 1,
                product_id: Uuid::nil(),
                price: Some(0.0),
                currency: "USD".to_string(),
                recorded_at: Utc::now(),
                data_source: "apify".to_string(),
            }),
            ..Default::default()
        };
        let f = fact(Some(50.0), None, None, None);
        let events = detect("B08N5WRWNW", Uuid::nil(), &f, &snapshots, 0.0, 0.0);
        assert!(events.is_empty());
    }
}
