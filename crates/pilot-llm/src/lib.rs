//! LLM competitive-report client (C8): chat-completion call, prompt build,
//! and the repair-pass JSON parser, grounded on the original
//! `internal/pkg/llm/deepseek_client.go`.
//!
//! Provider selection is explicit config (`LlmProviderKind` + base URL +
//! model), not a heuristic over the shape of the API key string (spec §9
//! OQ4) — the same `OPENAI_API_KEY` env var is reused as the bearer token
//! for either an OpenAI-compatible or a DeepSeek endpoint, per spec §6.

pub mod client;
pub mod parse;
pub mod prompt;

pub use client::{ChatCompletionClient, HttpLlmClient, LlmProviderKind};
pub use parse::parse_competitor_report;
pub use prompt::build_competitor_analysis_prompt;

use std::fmt;

use serde::{Deserialize, Serialize};

/// One product's metrics at report-build time (spec §4.8 step 3). Missing
/// series default to a zero-valued, USD tuple — a conservative lower bound
/// for the prompt, not a sentinel meaning "unknown".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductData {
    pub asin: String,
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub bsr: i64,
    pub rating: f64,
    pub review_count: i64,
}

impl ProductData {
    pub fn zero_valued(asin: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            title: title.into(),
            price: 0.0,
            currency: "USD".to_string(),
            bsr: 0,
            rating: 0.0,
            review_count: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorAnalysisData {
    pub main: ProductData,
    pub competitors: Vec<ProductData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    pub title: String,
    pub description: String,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorReport {
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
    pub market_insights: Vec<String>,
}

#[derive(Debug)]
pub enum LlmError {
    Request(String),
    Failed { status: u16, body: String },
    EmptyChoices,
    Malformed { original: String, cleaned: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Request(msg) => write!(f, "llm request error: {msg}"),
            LlmError::Failed { status, body } => write!(f, "llm request failed: status {status}: {body}"),
            LlmError::EmptyChoices => write!(f, "llm response had no choices"),
            LlmError::Malformed { original, cleaned } => write!(
                f,
                "llm response was not valid JSON even after repair; original={original}; cleaned={cleaned}"
            ),
        }
    }
}

impl std::error::Error for LlmError {}
