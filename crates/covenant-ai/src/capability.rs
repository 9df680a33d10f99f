//! External capability interfaces.
//!
//! Each trait returns one fixed result type. Implementations own the
//! "guess the response shape" logic (see [`crate::normalize`]) so raw
//! backend payloads never reach the pipeline stages.

use async_trait::async_trait;
use covenant_core::{ComplianceStatus, RiskLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Top-1 classification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Structured risk judgement for one clause, before it is tied to a clause id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub framework: String,
    pub status: ComplianceStatus,
    pub reason: String,
    /// In `[0, 1]`; higher means lower risk.
    pub score: f32,
}

#[async_trait]
pub trait ClauseClassifier: Send + Sync {
    /// Classify arbitrary-length clause text.
    async fn classify(&self, text: &str) -> Result<LabelScore, CapabilityError>;
}

#[async_trait]
pub trait RiskAssessor: Send + Sync {
    async fn assess(&self, text: &str, clause_type: &str)
    -> Result<RiskAssessment, CapabilityError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce free text for the given prompt.
    async fn summarize(&self, prompt: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CapabilityError>;
}
