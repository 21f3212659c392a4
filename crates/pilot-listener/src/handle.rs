//! Per-notification handling, shared by the live NOTIFY path and the
//! compensation sweep: persist a `notifications` row, enqueue a
//! `send_notification` task on the critical queue, grounded on the
//! original's `handlePriceAlert`/`handleBSRAlert` two-step shape.

use anyhow::{Context, Result};
use serde_json::Value as Json;
use sqlx::PgPool;
use tracing::info;

use pilot_db::notifications::{self, NewNotification};
use pilot_queue::{SendNotificationPayload, TaskType};

use crate::payload::AlertPayload;

/// critical -> 9, warning -> 7 (price) / 6 (bsr), info -> 4 (spec §4.5
/// priority table; price alerts outrank BSR alerts at the same severity).
fn priority_for(channel: &str, severity: &str) -> i16 {
    match (channel, severity) {
        ("price_alerts", "critical") => 9,
        ("price_alerts", "warning") => 7,
        ("bsr_alerts", "critical") => 9,
        ("bsr_alerts", "warning") => 6,
        (_, "critical") => 9,
        (_, "warning") => 6,
        _ => 4,
    }
}

pub fn parse_payload(raw: &str) -> Result<AlertPayload> {
    serde_json::from_str(raw).context("failed to parse notification payload")
}

pub async fn handle(pool: &PgPool, channel: &str, payload: &AlertPayload) -> Result<()> {
    let new_notification = NewNotification {
        user_id: payload.user_id,
        notification_type: payload.event_type.as_str(),
        title: payload.notification_data.title.as_str(),
        message: payload.notification_data.message.as_str(),
        severity: payload.notification_data.severity.as_str(),
        product_id: Some(payload.product_id),
        data: Some(payload.change_data.clone() as Json),
    };

    let notification_id = notifications::insert_notification(pool, &new_notification)
        .await
        .context("failed to persist alert notification")?;

    let priority = priority_for(channel, &payload.notification_data.severity);
    let task_payload = serde_json::to_value(SendNotificationPayload { notification_id })
        .context("failed to serialize send_notification payload")?;
    let idempotency_key = format!("notify:{notification_id}");

    pilot_queue::enqueue(
        pool,
        TaskType::SendNotification.default_queue(),
        TaskType::SendNotification.as_str(),
        task_payload,
        priority,
        Some(idempotency_key.as_str()),
    )
    .await
    .context("failed to enqueue send_notification task")?;

    info!(
        %notification_id,
        channel,
        asin = %payload.product_asin,
        severity = %payload.notification_data.severity,
        "alert notification queued"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_alerts_outrank_bsr_alerts_at_warning_severity() {
        assert!(priority_for("price_alerts", "warning") > priority_for("bsr_alerts", "warning"));
    }

    #[test]
    fn critical_is_the_same_priority_regardless_of_channel() {
        assert_eq!(priority_for("price_alerts", "critical"), priority_for("bsr_alerts", "critical"));
    }

    #[test]
    fn severity_ranks_critical_above_warning_above_info() {
        assert!(priority_for("price_alerts", "critical") > priority_for("price_alerts", "warning"));
        assert!(priority_for("price_alerts", "warning") > priority_for("price_alerts", "info"));
        assert!(priority_for("bsr_alerts", "critical") > priority_for("bsr_alerts", "warning"));
        assert!(priority_for("bsr_alerts", "warning") > priority_for("bsr_alerts", "info"));
    }

    #[test]
    fn parses_a_well_formed_payload() {
        let raw = r#"{
            "event_type": "price_change",
            "user_id": "9f6a9f0e-8b1a-4b8d-9f0a-5d6c9b9b9b9b",
            "user_plan": "",
            "product_id": "9f6a9f0e-8b1a-4b8d-9f0a-5d6c9b9b9b9a",
            "product_asin": "B000000000",
            "notification_data": {"title": "t", "message": "m", "severity": "critical"},
            "change_data": {"old_value": 10.0, "new_value": 8.0}
        }"#;
        let parsed = parse_payload(raw).expect("valid payload parses");
        assert_eq!(parsed.product_asin, "B000000000");
        assert_eq!(parsed.notification_data.severity, "critical");
    }
}
