//! Response normalisation for loosely-typed inference backends.
//!
//! Hosted models answer in several shapes (a list of label/score lists, a
//! labels/scores dict, free text with embedded JSON). One function per
//! capability turns those into the fixed types in [`crate::capability`].

use covenant_core::{ComplianceStatus, OTHER_LABEL, RiskLevel};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::capability::{CapabilityError, LabelScore, RiskAssessment};
use crate::similarity;

/// Score used when a risk response omits it.
pub const DEFAULT_RISK_SCORE: f32 = 0.5;

const NO_REASON: &str = "no reason given";

fn shape(msg: impl Into<String>) -> CapabilityError {
    CapabilityError::UnexpectedShape(msg.into())
}

// ── Classification ──

/// Select the highest-scoring label from a classification response.
///
/// Accepts `[[{label, score}, ..]]`, `[{label, score}, ..]`,
/// `{labels: [..], scores: [..]}` and a bare `{label, score}`. The score is
/// clamped to `[0, 1]`; non-finite scores are ignored.
pub fn best_label(value: &Value) -> Result<LabelScore, CapabilityError> {
    label_candidates(value)?
        .into_iter()
        .filter(|c| c.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|best| LabelScore {
            score: best.score.clamp(0.0, 1.0),
            label: best.label,
        })
        .ok_or_else(|| shape("no scored labels in classification response"))
}

fn label_candidates(value: &Value) -> Result<Vec<LabelScore>, CapabilityError> {
    match value {
        Value::Array(items) => match items.first() {
            Some(Value::Array(inner)) => inner.iter().map(label_entry).collect(),
            _ => items.iter().map(label_entry).collect(),
        },
        Value::Object(map) => match (map.get("labels"), map.get("scores")) {
            (Some(Value::Array(labels)), Some(Value::Array(scores))) => {
                if labels.len() != scores.len() {
                    return Err(shape(format!(
                        "{} labels but {} scores",
                        labels.len(),
                        scores.len()
                    )));
                }
                labels
                    .iter()
                    .zip(scores)
                    .map(|(label, score)| -> Result<LabelScore, CapabilityError> {
                        Ok(LabelScore {
                            label: label
                                .as_str()
                                .ok_or_else(|| shape("non-string label"))?
                                .to_string(),
                            score: number(score).ok_or_else(|| shape("non-numeric score"))?,
                        })
                    })
                    .collect()
            }
            _ => label_entry(value).map(|entry| vec![entry]),
        },
        other => Err(shape(format!("classification response is {}", kind(other)))),
    }
}

fn label_entry(value: &Value) -> Result<LabelScore, CapabilityError> {
    let label = value
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| shape("entry without a string 'label'"))?;
    let score = value
        .get("score")
        .and_then(number)
        .ok_or_else(|| shape("entry without a numeric 'score'"))?;
    Ok(LabelScore {
        label: label.to_string(),
        score,
    })
}

/// Map a backend label onto the configured label set.
///
/// Matches case-insensitively, resolves `LABEL_n` to the n-th configured
/// label and maps everything else to [`OTHER_LABEL`].
pub fn resolve_label(raw: &str, labels: &[String]) -> String {
    let raw = raw.trim();
    if let Some(known) = labels.iter().find(|l| l.eq_ignore_ascii_case(raw)) {
        return known.clone();
    }

    let upper = raw.to_ascii_uppercase();
    if let Some(index) = upper.strip_prefix("LABEL_")
        && let Ok(index) = index.parse::<usize>()
        && let Some(label) = labels.get(index)
    {
        return label.clone();
    }

    OTHER_LABEL.to_string()
}

// ── Risk ──

#[derive(Deserialize)]
struct RawRisk {
    #[serde(default, alias = "risk", alias = "riskLevel")]
    risk_level: Option<String>,
    #[serde(default)]
    framework: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    score: Option<Value>,
}

/// Parse and validate a risk response.
///
/// The payload may be the JSON object itself, free text containing one
/// (markdown fences and surrounding prose are tolerated), or either of those
/// wrapped as `[{"generated_text": ..}]`.
pub fn risk_assessment(
    value: &Value,
    primary_framework: &str,
) -> Result<RiskAssessment, CapabilityError> {
    match value {
        Value::Array(items) => {
            let first = items.first().ok_or_else(|| shape("empty risk response"))?;
            risk_assessment(first, primary_framework)
        }
        Value::String(text) => risk_assessment_from_text(text, primary_framework),
        Value::Object(map) => match map.get("generated_text") {
            Some(Value::String(text)) => risk_assessment_from_text(text, primary_framework),
            _ => validate_risk(serde_json::from_value(value.clone())?, primary_framework),
        },
        other => Err(shape(format!("risk response is {}", kind(other)))),
    }
}

/// Parse a risk judgement out of generated free text.
pub fn risk_assessment_from_text(
    text: &str,
    primary_framework: &str,
) -> Result<RiskAssessment, CapabilityError> {
    let object = extract_json_object(text).ok_or_else(|| {
        shape(format!(
            "no JSON object in generated text: {}",
            preview(text)
        ))
    })?;
    let raw: RawRisk = serde_json::from_str(object)?;
    validate_risk(raw, primary_framework)
}

fn validate_risk(raw: RawRisk, primary_framework: &str) -> Result<RiskAssessment, CapabilityError> {
    let risk_level: RiskLevel = raw
        .risk_level
        .as_deref()
        .ok_or_else(|| shape("risk response without a risk level"))?
        .parse()
        .map_err(|e| shape(format!("{e}")))?;
    let status: ComplianceStatus = raw
        .status
        .as_deref()
        .ok_or_else(|| shape("risk response without a status"))?
        .parse()
        .map_err(|e| shape(format!("{e}")))?;

    let score = match raw.score {
        None | Some(Value::Null) => DEFAULT_RISK_SCORE,
        Some(v) => number(&v)
            .filter(|s| s.is_finite())
            .ok_or_else(|| shape(format!("invalid risk score: {v}")))?
            .clamp(0.0, 1.0),
    };

    Ok(RiskAssessment {
        risk_level,
        framework: non_blank(raw.framework).unwrap_or_else(|| primary_framework.to_string()),
        status,
        reason: non_blank(raw.reason).unwrap_or_else(|| NO_REASON.to_string()),
        score,
    })
}

/// Return the first balanced `{ .. }` slice of `text` that parses as a JSON
/// object, honouring JSON strings. Braces in surrounding prose are skipped.
pub fn extract_json_object(text: &str) -> Option<&str> {
    text.match_indices('{')
        .filter_map(|(start, _)| balanced_object(&text[start..]))
        .find(|candidate| serde_json::from_str::<Map<String, Value>>(candidate).is_ok())
}

/// The prefix of `text` (which starts with `{`) up to its matching `}`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

// ── Summarisation ──

/// Pull generated text out of a text-generation response.
///
/// Looks for `text`, `output` or `generated_text`; arrays are unwrapped to
/// their first element.
pub fn generated_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(generated_text),
        Value::Object(map) => ["text", "output", "generated_text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

// ── Embeddings ──

/// Decode a feature-extraction response into one vector per input.
///
/// Sentence-level output (`[[f32; dim]; n]`) is used as-is; token-level
/// output (`[[[f32; dim]; tokens]; n]`) is mean-pooled.
pub fn embedding_batch(value: &Value, expected: usize) -> Result<Vec<Vec<f32>>, CapabilityError> {
    let rows = value
        .as_array()
        .ok_or_else(|| shape(format!("embedding response is {}", kind(value))))?;
    if rows.len() != expected {
        return Err(shape(format!(
            "expected {expected} embeddings, got {}",
            rows.len()
        )));
    }
    rows.iter().map(embedding_row).collect()
}

fn embedding_row(row: &Value) -> Result<Vec<f32>, CapabilityError> {
    let items = row
        .as_array()
        .ok_or_else(|| shape("embedding row is not an array"))?;

    match items.first() {
        Some(Value::Array(_)) => {
            let tokens: Vec<Vec<f32>> =
                items.iter().map(embedding_row).collect::<Result<_, _>>()?;
            mean_pool(&tokens)
        }
        _ => items
            .iter()
            .map(|v| number(v).ok_or_else(|| shape("non-numeric embedding value")))
            .collect(),
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Result<Vec<f32>, CapabilityError> {
    let dim = tokens.first().map(Vec::len).unwrap_or(0);
    if tokens.iter().any(|token| token.len() != dim) {
        return Err(shape("ragged token embeddings"));
    }
    Ok(similarity::mean_pool(dim, tokens.iter().map(Vec::as_slice)))
}

// ── Helpers ──

fn number(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
