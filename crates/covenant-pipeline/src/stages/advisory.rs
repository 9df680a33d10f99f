//! Executive advisory over all risk results, from a single summarizer call.

use std::sync::Arc;
use std::time::Instant;

use covenant_ai::{CapabilityError, Summarizer};
use covenant_core::{Advisory, AdvisoryConfig, RiskResult, StageConfig};
use tracing::info;

use crate::executor::StageExecutor;
use crate::state::{Advised, Assessed};

const INSTRUCTION: &str = "Generate an executive summary of the following contract risks \
     with the top 3 recommendations as a bulleted list:";

/// Recommendation lines at or below this many chars are treated as noise.
const MIN_RECOMMENDATION_CHARS: usize = 10;

pub struct AdvisoryStage {
    summarizer: Arc<dyn Summarizer>,
    config: AdvisoryConfig,
    executor: StageExecutor,
}

impl AdvisoryStage {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        config: AdvisoryConfig,
        stage_config: &StageConfig,
    ) -> Self {
        Self {
            summarizer,
            config,
            executor: StageExecutor::new("advisory", stage_config),
        }
    }

    pub async fn advise(&self, state: Assessed) -> Advised {
        let started = Instant::now();

        if state.risks().is_empty() {
            info!("no clauses to advise on; skipping summarizer");
            return state.advised(no_clauses_advisory(), 0, started);
        }

        let prompt = digest_prompt(state.risks());
        let summarizer = self.summarizer.as_ref();
        let config = &self.config;

        let mut output = self
            .executor
            .run(
                std::slice::from_ref(&prompt),
                move |prompt| async move {
                    let text = summarizer.summarize(prompt).await?;
                    if text.trim().is_empty() {
                        return Err(CapabilityError::UnexpectedShape("empty summary".into()));
                    }
                    Ok::<_, CapabilityError>(parse_advisory(&text, config))
                },
                |_, _| fallback_advisory(),
            )
            .await;

        let advisory = output.items.pop().unwrap_or_else(fallback_advisory);
        state.advised(advisory, output.fallbacks, started)
    }
}

/// Summarizer prompt: the instruction followed by one line per risk.
pub fn digest_prompt(risks: &[RiskResult]) -> String {
    let mut prompt = String::from(INSTRUCTION);
    for r in risks {
        prompt.push('\n');
        prompt.push_str(&format!(
            "{} - {} - {} - {} - {}",
            r.clause_id, r.risk_level, r.framework, r.status, r.reason
        ));
    }
    prompt
}

/// Split summarizer text into summary and recommendations.
///
/// Bullet and numbered lines become recommendations and the rest is the
/// summary. Text without any bullets is kept whole as the summary, and
/// every substantial line is offered as a recommendation.
pub fn parse_advisory(text: &str, config: &AdvisoryConfig) -> Advisory {
    let mut summary_lines = Vec::new();
    let mut bullets = Vec::new();
    let mut saw_bullet = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match strip_bullet(line) {
            Some(item) => {
                saw_bullet = true;
                if item.chars().count() > MIN_RECOMMENDATION_CHARS {
                    bullets.push(item.to_string());
                }
            }
            None => summary_lines.push(line),
        }
    }

    let (summary, mut recommendations) = if saw_bullet && !summary_lines.is_empty() {
        (summary_lines.join("\n"), bullets)
    } else if saw_bullet {
        (text.trim().to_string(), bullets)
    } else {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| l.chars().count() > MIN_RECOMMENDATION_CHARS)
            .map(str::to_string)
            .collect();
        (text.trim().to_string(), lines)
    };

    recommendations.truncate(config.max_recommendations);
    Advisory {
        summary: truncate_chars(&summary, config.max_summary_chars),
        recommendations,
    }
}

/// Strip a `-`, `*`, `•`, `1.` or `1)` list prefix.
fn strip_bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line
        .strip_prefix(['-', '*', '•'])
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        return Some(rest.trim());
    }

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 || digits > 3 {
        return None;
    }
    line[digits..]
        .strip_prefix(['.', ')'])
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        .map(str::trim)
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].trim_end().to_string(),
        None => text.to_string(),
    }
}

pub fn no_clauses_advisory() -> Advisory {
    Advisory {
        summary: "No clauses were extracted from the document, so there are no risks to summarize."
            .into(),
        recommendations: vec![
            "Check that the document contains readable contract text and re-run the analysis."
                .into(),
        ],
    }
}

/// Neutral advisory used when the summarizer is unavailable.
pub fn fallback_advisory() -> Advisory {
    Advisory {
        summary: "An executive summary could not be generated. \
                  Review the per-clause risk results directly."
            .into(),
        recommendations: vec![
            "Prioritise clauses rated High risk or with a Gap status for legal review.".into(),
        ],
    }
}
