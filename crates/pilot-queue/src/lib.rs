//! Durable task broker (C2): four named, weighted-priority queues backed by
//! the `pilot_queue` table (migration owned by `pilot-db`).
//!
//! The claim/ack/fail SQL shape is `mqk-db`'s outbox (`outbox_enqueue`,
//! `outbox_claim_batch` with `FOR UPDATE SKIP LOCKED`,
//! `outbox_mark_sent`/`outbox_mark_failed`/`outbox_release_claim`)
//! generalized from one `order_json` column to `(queue, task_type, payload)`.
//! Queue names, weights, and the task-type-to-queue table come from the
//! spec rather than the original's 3-queue `asynq` scheme.

pub mod claim;
pub mod payloads;

pub use claim::{claim_batch, enqueue, mark_failed, mark_sent, release_claim, ClaimedTask};
pub use payloads::{
    DataCleanupPayload, GenerateCompetitorReportPayload, RefreshProductDataPayload,
    SendNotificationPayload,
};

use std::fmt;

/// Named queues, each with a fixed weight used to bias claim ordering
/// (spec §4.2). Higher weight drains faster relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Critical,
    Default,
    Apify,
    Cleanup,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Critical => "critical",
            QueueName::Default => "default",
            QueueName::Apify => "apify",
            QueueName::Cleanup => "cleanup",
        }
    }

    pub fn weight(&self) -> i32 {
        match self {
            QueueName::Critical => 6,
            QueueName::Default => 3,
            QueueName::Apify => 2,
            QueueName::Cleanup => 1,
        }
    }

    pub fn all() -> [QueueName; 4] {
        [
            QueueName::Critical,
            QueueName::Default,
            QueueName::Apify,
            QueueName::Cleanup,
        ]
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task types the worker pool dispatches on (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    RefreshProductData,
    GenerateCompetitorReport,
    SendNotification,
    DataCleanup,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RefreshProductData => "refresh_product_data",
            TaskType::GenerateCompetitorReport => "generate_competitor_report",
            TaskType::SendNotification => "send_notification",
            TaskType::DataCleanup => "data_cleanup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refresh_product_data" => Some(TaskType::RefreshProductData),
            "generate_competitor_report" => Some(TaskType::GenerateCompetitorReport),
            "send_notification" => Some(TaskType::SendNotification),
            "data_cleanup" => Some(TaskType::DataCleanup),
            _ => None,
        }
    }

    /// The queue each task type is enqueued onto (spec §4.2's table).
    pub fn default_queue(&self) -> QueueName {
        match self {
            TaskType::RefreshProductData => QueueName::Apify,
            TaskType::GenerateCompetitorReport => QueueName::Default,
            TaskType::SendNotification => QueueName::Critical,
            TaskType::DataCleanup => QueueName::Cleanup,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_weights_match_spec_table() {
        assert_eq!(QueueName::Critical.weight(), 6);
        assert_eq!(QueueName::Default.weight(), 3);
        assert_eq!(QueueName::Apify.weight(), 2);
        assert_eq!(QueueName::Cleanup.weight(), 1);
    }

    #[test]
    fn task_types_map_to_documented_queues() {
        assert_eq!(TaskType::RefreshProductData.default_queue(), QueueName::Apify);
        assert_eq!(
            TaskType::GenerateCompetitorReport.default_queue(),
            QueueName::Default
        );
        assert_eq!(TaskType::SendNotification.default_queue(), QueueName::Critical);
        assert_eq!(TaskType::DataCleanup.default_queue(), QueueName::Cleanup);
    }

    #[test]
    fn task_type_round_trips_through_str() {
        for t in [
            TaskType::RefreshProductData,
            TaskType::GenerateCompetitorReport,
            TaskType::SendNotification,
            TaskType::DataCleanup,
        ] {
            assert_eq!(TaskType::parse(t.as_str()), Some(t));
        }
    }
}
