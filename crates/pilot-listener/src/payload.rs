//! Wire shape of the JSON `pg_notify` payload built by
//! `notify_anomaly_event()` (`pilot-db/migrations/0002_alert_triggers.sql`).

use serde::Deserialize;
use serde_json::Value as Json;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub title: String,
    pub message: String,
    pub severity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertPayload {
    pub event_type: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub user_plan: String,
    pub product_id: Uuid,
    pub product_asin: String,
    pub notification_data: NotificationData,
    pub change_data: Json,
}
