//! Reqwest-based [`Provider`] implementation against the Apify actor API,
//! grounded on `internal/pkg/apify/client.go`'s endpoint shapes, actor IDs,
//! and run-state machine.

use std::time::Duration;

use async_trait::async_trait;
use pilot_schemas::Asin;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::normalizer::normalize;
use crate::{ProductFact, Provider, ProviderError};

const BASE_URL: &str = "https://api.apify.com/v2";
/// Actor used for the async run/poll/fetch path.
const ASYNC_ACTOR_ID: &str = "7KgyOHHEiPEcilZXM";
/// Actor used for the single-round-trip sync path.
const SYNC_ACTOR_NAME: &str = "axesso_data~amazon-product-details-scraper";
const POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct ApifyProvider {
    http: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl ApifyProvider {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token: api_token.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    fn product_urls(asins: &[Asin]) -> Vec<String> {
        asins
            .iter()
            .map(|a| format!("https://www.amazon.com/dp/{}", a.as_str()))
            .collect()
    }

    async fn run_status(&self, run_id: &str) -> Result<RunStatusResponse, ProviderError> {
        let url = format!(
            "{}/acts/runs/{}?token={}",
            self.base_url, run_id, self.api_token
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Timeout(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Failed { status, body });
        }

        resp.json::<RunStatusEnvelope>()
            .await
            .map(|env| env.data)
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RunStatusEnvelope {
    data: RunStatusResponse,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    id: String,
    status: String,
}

#[async_trait]
impl Provider for ApifyProvider {
    fn name(&self) -> &'static str {
        "apify"
    }

    async fn fetch_sync(
        &self,
        asins: &[Asin],
        timeout: Duration,
    ) -> Result<Vec<ProductFact>, ProviderError> {
        if self.api_token.is_empty() {
            return Err(ProviderError::Config("apify api token is empty".to_string()));
        }

        let url = format!(
            "{}/acts/{}/run-sync-get-dataset-items?token={}",
            self.base_url, SYNC_ACTOR_NAME, self.api_token
        );
        let body = json!({ "urls": Self::product_urls(asins) });

        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Failed {
                        status: 0,
                        body: e.to_string(),
                    }
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Failed { status, body: text });
        }

        let items: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let mut facts = Vec::with_capacity(items.len());
        for item in &items {
            match normalize(item) {
                Ok(fact) => facts.push(fact),
                Err(err) => warn!(%err, "skipping malformed apify item"),
            }
        }
        Ok(facts)
    }

    async fn run_async(&self, asins: &[Asin]) -> Result<String, ProviderError> {
        if self.api_token.is_empty() {
            return Err(ProviderError::Config("apify api token is empty".to_string()));
        }

        let url = format!(
            "{}/acts/{}/runs?token={}",
            self.base_url, ASYNC_ACTOR_ID, self.api_token
        );
        let body = json!({ "urls": Self::product_urls(asins) });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Timeout(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Failed { status, body: text });
        }

        let envelope: RunStatusEnvelope = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(envelope.data.id)
    }

    async fn await_run(&self, run_id: &str, timeout: Duration) -> Result<(), ProviderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.run_status(run_id).await?;
            debug!(run_id, status = %status.status, "apify run status");
            match status.status.as_str() {
                "SUCCEEDED" => return Ok(()),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ProviderError::Failed {
                        status: 0,
                        body: format!("run {run_id} ended with status {}", status.status),
                    })
                }
                "READY" | "RUNNING" => {}
                other => {
                    return Err(ProviderError::Malformed(format!(
                        "unknown apify run status: {other}"
                    )))
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::Timeout(format!(
                    "run {run_id} did not complete within deadline"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Vec<ProductFact>, ProviderError> {
        let url = format!(
            "{}/acts/runs/{}/dataset/items?token={}",
            self.base_url, run_id, self.api_token
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Timeout(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Failed { status, body: text });
        }

        let items: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let mut facts = Vec::with_capacity(items.len());
        for item in &items {
            match normalize(item) {
                Ok(fact) => facts.push(fact),
                Err(err) => warn!(%err, "skipping malformed apify item"),
            }
        }
        Ok(facts)
    }
}
