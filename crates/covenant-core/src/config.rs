//! Analysis configuration.
//!
//! Passed explicitly into the segmenter and stage constructors. Every field
//! has a default so a partial TOML file is enough to override one knob.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Clause labels recognised by the classification stage.
pub const DEFAULT_LABELS: &[&str] = &[
    "Confidentiality",
    "Termination",
    "Liability",
    "Indemnity",
    "Payment",
    "Coverage",
    "Exclusion",
    "Claims",
    "Governing Law",
    "Dispute Resolution",
    "Data Protection",
    "Renewal",
];

/// Regulatory frameworks; the first one is used in fallback records.
pub const DEFAULT_FRAMEWORKS: &[&str] = &["IRDAI", "GDPR", "HIPAA"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmenter: SegmenterConfig,
    pub stages: StageConfig,
    pub advisory: AdvisoryConfig,
    pub labels: Vec<String>,
    pub frameworks: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            stages: StageConfig::default(),
            advisory: AdvisoryConfig::default(),
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            frameworks: DEFAULT_FRAMEWORKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AnalysisConfig {
    /// Framework named in fallback risk records.
    pub fn primary_framework(&self) -> &str {
        self.frameworks
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_FRAMEWORKS[0])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Chunks shorter than this (in chars, after trimming) are dropped.
    pub min_clause_chars: usize,
    /// Sentence-split fragments shorter than this are discarded.
    pub min_sentence_chars: usize,
    pub semantic_merge: bool,
    pub merge_threshold: f32,
    /// Added to `merge_threshold` when the candidate chunk is short.
    pub short_chunk_delta: f32,
    pub short_chunk_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_clause_chars: 20,
            min_sentence_chars: 15,
            semantic_merge: false,
            merge_threshold: 0.80,
            short_chunk_delta: 0.05,
            short_chunk_chars: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Maximum in-flight capability calls per stage. `0` means unbounded.
    pub max_concurrency: usize,
    pub item_timeout_secs: u64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            item_timeout_secs: 90,
        }
    }
}

impl StageConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrency > 0).then_some(self.max_concurrency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub max_summary_chars: usize,
    pub max_recommendations: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            max_summary_chars: 1200,
            max_recommendations: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: AnalysisConfig = toml::from_str(
            r#"
            frameworks = ["GDPR"]

            [segmenter]
            semantic_merge = true

            [stages]
            max_concurrency = 0
            "#,
        )
        .unwrap();

        assert!(cfg.segmenter.semantic_merge);
        assert_eq!(cfg.segmenter.min_clause_chars, 20);
        assert_eq!(cfg.stages.concurrency_limit(), None);
        assert_eq!(cfg.stages.item_timeout(), Duration::from_secs(90));
        assert_eq!(cfg.primary_framework(), "GDPR");
        assert_eq!(cfg.labels.len(), DEFAULT_LABELS.len());
    }

    #[test]
    fn primary_framework_falls_back_when_empty() {
        let cfg = AnalysisConfig {
            frameworks: vec![],
            ..Default::default()
        };
        assert_eq!(cfg.primary_framework(), "IRDAI");
    }

    #[test]
    fn default_concurrency_is_capped() {
        assert_eq!(StageConfig::default().concurrency_limit(), Some(8));
    }
}
