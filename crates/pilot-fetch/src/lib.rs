//! External fetch client (C1): contract with the scraping provider, in both
//! its sync and split-async forms, plus response normalization.
//!
//! The `Provider` trait shape and `ProviderError` enum follow the teacher's
//! `mqk-md::provider` module (object-safe trait, manual `Display`, mock-based
//! unit tests); the concrete `ApifyProvider`, its URL/endpoint shapes, and
//! the normalization field table are grounded in the original
//! `internal/pkg/apify/client.go`.

pub mod apify;
pub mod normalizer;

pub use apify::ApifyProvider;
pub use normalizer::normalize;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pilot_schemas::Asin;
use serde::{Deserialize, Serialize};

/// A single normalized product record as read off the scraper at one point
/// in time. `scraped_at` is stamped at read time (spec §4.1), not supplied
/// by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductFact {
    pub asin: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub bullet_points: Vec<String>,
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub bsr: Option<i64>,
    pub bsr_category: Option<String>,
    /// Buy Box price. The spec treats "Buy Box unknown" as null and
    /// forbids silently equating it with the current price (§9 OQ3) —
    /// the normalizer never fills this from `price`.
    pub buy_box_price: Option<f64>,
    pub seller: Option<String>,
    pub availability: Option<String>,
    pub prime: bool,
    pub scraped_at: DateTime<Utc>,
}

/// Errors a [`Provider`] implementation may return. Every variant is
/// retryable by the worker (spec §4.1); none is process-fatal.
#[derive(Debug)]
pub enum ProviderError {
    /// HTTP status >= 400.
    Failed { status: u16, body: String },
    /// Connection error or deadline exceeded.
    Timeout(String),
    /// Response body did not decode as expected JSON.
    Malformed(String),
    /// Missing or invalid client configuration (e.g. bearer token).
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Failed { status, body } => {
                write!(f, "fetch failed: status {status}: {body}")
            }
            ProviderError::Timeout(msg) => write!(f, "fetch timeout: {msg}"),
            ProviderError::Malformed(msg) => write!(f, "fetch malformed response: {msg}"),
            ProviderError::Config(msg) => write!(f, "fetch config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Scraper provider contract: a synchronous single-round-trip fetch, and the
/// split run/poll/fetch form for large batches (spec §4.1).
///
/// Object-safe (`Box<dyn Provider>`); `Send + Sync` so it can cross worker
/// task boundaries.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_sync(
        &self,
        asins: &[Asin],
        timeout: Duration,
    ) -> Result<Vec<ProductFact>, ProviderError>;

    async fn run_async(&self, asins: &[Asin]) -> Result<String, ProviderError>;

    /// Poll until the run reaches a terminal state or `timeout` elapses.
    async fn await_run(&self, run_id: &str, timeout: Duration) -> Result<(), ProviderError>;

    async fn fetch_run(&self, run_id: &str) -> Result<Vec<ProductFact>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider {
        facts: Vec<ProductFact>,
    }

    fn sample_fact(asin: &str) -> ProductFact {
        ProductFact {
            asin: asin.to_string(),
            title: "Widget".to_string(),
            brand: Some("Acme".to_string()),
            category: Some("Home".to_string()),
            description: None,
            bullet_points: vec!["Durable".to_string()],
            images: vec!["https://example.com/a.jpg".to_string()],
            price: Some(19.99),
            currency: "USD".to_string(),
            rating: Some(4.5),
            review_count: Some(120),
            bsr: Some(500),
            bsr_category: Some("Kitchen".to_string()),
            buy_box_price: None,
            seller: Some("Acme Direct".to_string()),
            availability: Some("In Stock".to_string()),
            prime: true,
            scraped_at: Utc::now(),
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_sync(
            &self,
            _asins: &[Asin],
            _timeout: Duration,
        ) -> Result<Vec<ProductFact>, ProviderError> {
            Ok(self.facts.clone())
        }

        async fn run_async(&self, _asins: &[Asin]) -> Result<String, ProviderError> {
            Ok("run-1".to_string())
        }

        async fn await_run(&self, _run_id: &str, _timeout: Duration) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn fetch_run(&self, _run_id: &str) -> Result<Vec<ProductFact>, ProviderError> {
            Ok(self.facts.clone())
        }
    }

    #[tokio::test]
    async fn mock_provider_returns_configured_facts() {
        let provider: Box<dyn Provider> = Box::new(MockProvider {
            facts: vec![sample_fact("B08N5WRWNW")],
        });
        let asin = Asin::parse("B08N5WRWNW").unwrap();
        let out = provider
            .fetch_sync(&[asin], Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].asin, "B08N5WRWNW");
    }

    #[test]
    fn provider_error_display_failed() {
        let err = ProviderError::Failed {
            status: 503,
            body: "upstream down".to_string(),
        };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn buy_box_price_never_defaults_to_current_price() {
        let fact = sample_fact("B08N5WRWNW");
        assert_eq!(fact.buy_box_price, None);
        assert!(fact.price.is_some());
    }
}
