//! Shared domain primitives for the Amazon Pilot tracking pipeline.
//!
//! Kept dependency-light and free of I/O, mirroring how the teacher's
//! schema crate holds only serializable value types shared across the
//! workspace.

pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amazon Standard Identification Number: exactly 10 uppercase alphanumeric
/// characters, first character `B`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asin(String);

#[derive(Debug, PartialEq, Eq)]
pub struct AsinError(pub String);

impl fmt::Display for AsinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ASIN '{}': expected 10 uppercase alphanumeric characters starting with 'B'", self.0)
    }
}

impl std::error::Error for AsinError {}

impl Asin {
    pub fn parse(raw: &str) -> Result<Self, AsinError> {
        let valid = raw.len() == 10
            && raw.starts_with('B')
            && raw.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(AsinError(raw.to_string()));
        }
        Ok(Asin(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Asin {
    type Error = AsinError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Asin::parse(&value)
    }
}

impl From<Asin> for String {
    fn from(value: Asin) -> Self {
        value.0
    }
}

/// Plan tag carried by a User row; consumed only for rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Basic,
    Premium,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Premium => "premium",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Plan::Basic),
            "premium" => Some(Plan::Premium),
            "enterprise" => Some(Plan::Enterprise),
            _ => None,
        }
    }
}

/// Anomaly metric kind. One `AnomalyEvent` row per (product, event_type, detection_time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PriceChange,
    BsrChange,
    RatingChange,
    ReviewCountChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PriceChange => "price_change",
            EventType::BsrChange => "bsr_change",
            EventType::RatingChange => "rating_change",
            EventType::ReviewCountChange => "review_count_change",
        }
    }
}

/// Severity computed from the magnitude of a metric change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Origin tag stamped on every history row; `apify` for real scraper data,
/// `mock` for test fixtures and local development seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Apify,
    Mock,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Apify => "apify",
            DataSource::Mock => "mock",
        }
    }
}

/// CompetitorAnalysisResult lifecycle state. Transitions are monotonic:
/// queued -> processing -> (completed | failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Queued => "queued",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    /// `progress` field returned by `GET /competitor/report/status`: 0|50|100.
    pub fn progress(&self) -> u8 {
        match self {
            AnalysisStatus::Queued => 0,
            AnalysisStatus::Processing => 50,
            AnalysisStatus::Completed | AnalysisStatus::Failed => 100,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(AnalysisStatus::Queued),
            "processing" => Some(AnalysisStatus::Processing),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

/// Metric selector for `GET /product/{id}/history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMetric {
    Price,
    Bsr,
    Rating,
    ReviewCount,
    Buybox,
}

impl HistoryMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "price" => Some(HistoryMetric::Price),
            "bsr" => Some(HistoryMetric::Bsr),
            "rating" => Some(HistoryMetric::Rating),
            "review_count" => Some(HistoryMetric::ReviewCount),
            "buybox" => Some(HistoryMetric::Buybox),
            _ => None,
        }
    }
}

/// Lookback window for `GET /product/{id}/history`: `7d|30d|90d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Days7,
    Days30,
    Days90,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "7d" => Some(Period::Days7),
            "30d" => Some(Period::Days30),
            "90d" => Some(Period::Days90),
            _ => None,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Period::Days7 => 7,
            Period::Days30 => 30,
            Period::Days90 => 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asin_accepts_exactly_10_uppercase_alnum_starting_with_b() {
        assert!(Asin::parse("B08N5WRWNW").is_ok());
        assert!(Asin::parse("B0BDRR8Z6G").is_ok());
    }

    #[test]
    fn asin_rejects_wrong_length() {
        assert!(Asin::parse("B08N5WRWN").is_err());
        assert!(Asin::parse("B08N5WRWNWX").is_err());
    }

    #[test]
    fn asin_rejects_lowercase_and_non_alnum() {
        assert!(Asin::parse("b08n5wrwnw").is_err());
        assert!(Asin::parse("B08N5-RWNW").is_err());
    }

    #[test]
    fn asin_rejects_wrong_leading_char() {
        assert!(Asin::parse("A08N5WRWNW").is_err());
    }

    #[test]
    fn analysis_status_progress_matches_spec_table() {
        assert_eq!(AnalysisStatus::Queued.progress(), 0);
        assert_eq!(AnalysisStatus::Processing.progress(), 50);
        assert_eq!(AnalysisStatus::Completed.progress(), 100);
        assert_eq!(AnalysisStatus::Failed.progress(), 100);
    }

    #[test]
    fn period_parses_only_documented_strings() {
        assert_eq!(Period::parse("7d"), Some(Period::Days7));
        assert_eq!(Period::parse("30d"), Some(Period::Days30));
        assert_eq!(Period::parse("90d"), Some(Period::Days90));
        assert_eq!(Period::parse("14d"), None);
    }
}
