//! HTTP adapters for hosted inference endpoints.
//!
//! Classification, risk reasoning and embeddings speak the Hugging Face
//! inference API shape; summarisation posts to a generic `generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::capability::{
    CapabilityError, ClauseClassifier, Embedder, LabelScore, RiskAssessment, RiskAssessor,
    Summarizer,
};
use crate::normalize;

/// Shared HTTP client with optional bearer authentication.
#[derive(Clone)]
pub struct InferenceClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl InferenceClient {
    /// `timeout` bounds every request, including slow model cold starts.
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, CapabilityError> {
        debug!(url = %url, "posting inference request");
        let mut req = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::Server {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

// ── Classification ──

pub struct HfClassifier {
    client: InferenceClient,
    url: String,
}

impl HfClassifier {
    pub fn new(client: InferenceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ClauseClassifier for HfClassifier {
    async fn classify(&self, text: &str) -> Result<LabelScore, CapabilityError> {
        let data = self
            .client
            .post_json(&self.url, &json!({ "inputs": text }))
            .await?;
        normalize::best_label(&data)
    }
}

// ── Risk ──

pub struct HfRiskAssessor {
    client: InferenceClient,
    url: String,
    frameworks: Vec<String>,
    max_new_tokens: u32,
}

impl HfRiskAssessor {
    /// `frameworks` must be non-empty; the first is the default framework.
    pub fn new(client: InferenceClient, url: impl Into<String>, frameworks: Vec<String>) -> Self {
        Self {
            client,
            url: url.into(),
            frameworks,
            max_new_tokens: 200,
        }
    }

    fn primary_framework(&self) -> &str {
        self.frameworks.first().map(String::as_str).unwrap_or("IRDAI")
    }
}

/// Prompt asking a text2text model for a JSON risk judgement.
pub fn risk_prompt(text: &str, clause_type: &str, frameworks: &[String]) -> String {
    let names = frameworks.join(", ");
    let choices = frameworks.join("|");
    format!(
        "You are a compliance analyst. Evaluate the following clause for compliance with {names}.\n\
         \n\
         Clause: {text}\n\
         Classification: {clause_type}\n\
         \n\
         Respond ONLY with a JSON object:\n\
         {{\n  \
           \"risk\": \"Low|Medium|High\",\n  \
           \"framework\": \"<{choices}>\",\n  \
           \"status\": \"Aligned|Partial|Gap\",\n  \
           \"reason\": \"...\",\n  \
           \"score\": 0.xx\n\
         }}\n\
         A higher score means the clause is more compliant."
    )
}

#[async_trait]
impl RiskAssessor for HfRiskAssessor {
    async fn assess(
        &self,
        text: &str,
        clause_type: &str,
    ) -> Result<RiskAssessment, CapabilityError> {
        let body = json!({
            "inputs": risk_prompt(text, clause_type, &self.frameworks),
            "parameters": { "max_new_tokens": self.max_new_tokens },
        });
        let data = self.client.post_json(&self.url, &body).await?;
        normalize::risk_assessment(&data, self.primary_framework())
    }
}

// ── Embeddings ──

pub struct HfEmbedder {
    client: InferenceClient,
    url: String,
}

impl HfEmbedder {
    pub fn new(client: InferenceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Embedder for HfEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let data = self
            .client
            .post_json(&self.url, &json!({ "inputs": texts }))
            .await?;
        normalize::embedding_batch(&data, texts.len())
    }
}

// ── Summarisation ──

pub struct GenerateSummarizer {
    client: InferenceClient,
    url: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GenerateSummarizer {
    pub fn new(client: InferenceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            max_output_tokens: 512,
            temperature: 0.2,
        }
    }
}

#[async_trait]
impl Summarizer for GenerateSummarizer {
    async fn summarize(&self, prompt: &str) -> Result<String, CapabilityError> {
        let body = json!({
            "prompt": prompt,
            "max_output_tokens": self.max_output_tokens,
            "temperature": self.temperature,
        });
        let data = self.client.post_json(&self.url, &body).await?;
        Ok(normalize::generated_text(&data).unwrap_or_else(|| data.to_string()))
    }
}
