//! Typed task payloads. The original Go queue passed a loose
//! `map[string]interface{}`; SPEC_FULL.md's redesign calls for typed structs
//! per task type instead, so each handler decodes a concrete shape rather
//! than probing a map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshProductDataPayload {
    pub product_id: Uuid,
    pub tracked_product_id: Option<Uuid>,
    pub asin: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateCompetitorReportPayload {
    pub group_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationPayload {
    pub notification_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCleanupPayload {
    pub older_than_days: i64,
}
