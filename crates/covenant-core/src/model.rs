//! Contract analysis records shared by every pipeline stage.
//!
//! Records are produced once by their owning stage and only read afterwards.
//! Risk scores follow a single convention: a higher score means higher
//! compliance confidence, i.e. lower risk.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Section name used when extraction supplied none.
pub const UNKNOWN_SECTION: &str = "Unknown";

/// Catch-all clause type for labels outside the configured set.
pub const OTHER_LABEL: &str = "Other";

/// A block of extracted text as returned by the document-parsing backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawBlock {
    pub text: String,
    /// 1-based page number. Malformed values deserialize to `None`.
    #[serde(default, deserialize_with = "lenient_page")]
    pub page: Option<u32>,
    #[serde(default)]
    pub section: Option<String>,
    /// Heading blocks set the current section instead of becoming clauses.
    #[serde(default)]
    pub heading: bool,
}

impl RawBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: true,
            ..Default::default()
        }
    }

    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Accept integers and numeric strings; everything else is treated as unknown.
fn lenient_page<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(page_from_value))
}

fn page_from_value(value: &serde_json::Value) -> Option<u32> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f > 0.0)
                .map(|f| f as u64)
        })?,
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|&p| p > 0)
}

/// A minimal unit of contract text with a stable identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub id: String,
    pub text: String,
    pub page: u32,
    pub section: String,
}

impl Clause {
    /// Build a clause, applying the page/section defaulting rules.
    pub fn new(
        ordinal: usize,
        text: impl Into<String>,
        page: Option<u32>,
        section: Option<&str>,
    ) -> Self {
        Self {
            id: format!("C{ordinal}"),
            text: text.into(),
            page: page.filter(|&p| p > 0).unwrap_or(1),
            section: section
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_SECTION)
                .to_string(),
        }
    }
}

/// A clause with its predicted type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedClause {
    #[serde(flatten)]
    pub clause: Clause,
    #[serde(rename = "type")]
    pub clause_type: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl ClassifiedClause {
    pub fn id(&self) -> &str {
        &self.clause.id
    }

    pub fn text(&self) -> &str {
        &self.clause.text
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised {kind}: {value:?}")]
pub struct ParseLevelError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseLevelError {
                kind: "risk level",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Alignment of a clause with its regulatory framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceStatus {
    Aligned,
    Partial,
    Gap,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligned => "Aligned",
            Self::Partial => "Partial",
            Self::Gap => "Gap",
        }
    }
}

impl FromStr for ComplianceStatus {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aligned" | "compliant" => Ok(Self::Aligned),
            "partial" => Ok(Self::Partial),
            "gap" | "non-compliant" => Ok(Self::Gap),
            _ => Err(ParseLevelError {
                kind: "compliance status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Compliance assessment of one clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    /// References `Clause::id`.
    pub clause_id: String,
    pub risk_level: RiskLevel,
    pub framework: String,
    pub status: ComplianceStatus,
    pub reason: String,
    /// In `[0, 1]`; higher means lower risk.
    pub score: f32,
}

/// Executive summary over all risk results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Advisory {
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// Pipeline states, named after the stage output they guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Ingested,
    Classified,
    Assessed,
    Advised,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Classified => "classified",
            Self::Assessed => "assessed",
            Self::Advised => "advised",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Audit record appended when the pipeline enters a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub stage: Stage,
    /// Records produced by the stage.
    pub items: usize,
    /// How many of those records are fallback values.
    pub fallbacks: usize,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// The complete result of analysing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub source_path: PathBuf,
    pub clauses: Vec<Clause>,
    pub classified_clauses: Vec<ClassifiedClause>,
    pub risks: Vec<RiskResult>,
    pub advisory: Advisory,
    /// Mean risk score, `0.0` when there are no risks.
    pub overall_score: f32,
    pub transitions: Vec<StageTransition>,
}

impl AnalysisState {
    /// Total fallback values substituted across all stages.
    pub fn fallback_count(&self) -> usize {
        self.transitions.iter().map(|t| t.fallbacks).sum()
    }
}
