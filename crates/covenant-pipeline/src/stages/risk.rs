use std::sync::Arc;
use std::time::Instant;

use covenant_ai::normalize::DEFAULT_RISK_SCORE;
use covenant_ai::{CapabilityError, RiskAssessment, RiskAssessor};
use covenant_core::{ComplianceStatus, RiskLevel, RiskResult, StageConfig};
use tracing::debug;

use crate::executor::StageExecutor;
use crate::state::{Assessed, Classified};

/// Reason carried by substituted risk records.
pub const FALLBACK_REASON: &str = "fallback";

/// Scores every classified clause against the configured frameworks.
pub struct RiskStage {
    assessor: Arc<dyn RiskAssessor>,
    primary_framework: String,
    executor: StageExecutor,
}

impl RiskStage {
    /// `primary_framework` is named in fallback records.
    pub fn new(
        assessor: Arc<dyn RiskAssessor>,
        primary_framework: impl Into<String>,
        config: &StageConfig,
    ) -> Self {
        Self {
            assessor,
            primary_framework: primary_framework.into(),
            executor: StageExecutor::new("risk", config),
        }
    }

    pub async fn assess(&self, state: Classified) -> Assessed {
        let started = Instant::now();
        let assessor = self.assessor.as_ref();
        let primary = self.primary_framework.as_str();

        let output = self
            .executor
            .run(
                state.classified_clauses(),
                move |clause| async move {
                    let assessment = assessor.assess(clause.text(), &clause.clause_type).await?;
                    risk_result(clause.id(), assessment, primary)
                },
                |clause, _| fallback(clause.id(), primary),
            )
            .await;

        let overall = overall_score(&output.items);
        debug!(overall_score = overall, "aggregated risk");
        state.assessed(output.items, overall, output.fallbacks, started)
    }
}

fn risk_result(
    clause_id: &str,
    assessment: RiskAssessment,
    primary: &str,
) -> Result<RiskResult, CapabilityError> {
    if !assessment.score.is_finite() {
        return Err(CapabilityError::UnexpectedShape(format!(
            "non-finite risk score {}",
            assessment.score
        )));
    }
    let framework = match assessment.framework.trim() {
        "" => primary.to_string(),
        name => name.to_string(),
    };
    Ok(RiskResult {
        clause_id: clause_id.to_string(),
        risk_level: assessment.risk_level,
        framework,
        status: assessment.status,
        reason: assessment.reason,
        score: assessment.score.clamp(0.0, 1.0),
    })
}

/// The record substituted when assessment fails.
pub fn fallback(clause_id: &str, primary_framework: &str) -> RiskResult {
    RiskResult {
        clause_id: clause_id.to_string(),
        risk_level: RiskLevel::Medium,
        framework: primary_framework.to_string(),
        status: ComplianceStatus::Partial,
        reason: FALLBACK_REASON.to_string(),
        score: DEFAULT_RISK_SCORE,
    }
}

/// Mean score, or `0.0` for no risks. Higher means more compliant.
pub fn overall_score(risks: &[RiskResult]) -> f32 {
    if risks.is_empty() {
        return 0.0;
    }
    let total: f32 = risks.iter().map(|r| r.score).sum();
    (total / risks.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use covenant_core::{Clause, ClassifiedClause};
    use std::collections::HashMap;

    /// Scores keyed by clause type; unknown types fail.
    struct TableAssessor(HashMap<&'static str, f32>);

    #[async_trait]
    impl RiskAssessor for TableAssessor {
        async fn assess(
            &self,
            _text: &str,
            clause_type: &str,
        ) -> Result<RiskAssessment, CapabilityError> {
            let score = self
                .0
                .get(clause_type)
                .copied()
                .ok_or_else(|| CapabilityError::Backend(format!("no rule for {clause_type}")))?;
            Ok(RiskAssessment {
                risk_level: RiskLevel::Low,
                framework: String::new(),
                status: ComplianceStatus::Aligned,
                reason: format!("{clause_type} reviewed"),
                score,
            })
        }
    }

    fn classified(types: &[&str]) -> Classified {
        let clauses: Vec<Clause> = types
            .iter()
            .enumerate()
            .map(|(i, _)| Clause::new(i + 1, format!("clause text {i}"), None, None))
            .collect();
        let classified = clauses
            .iter()
            .zip(types)
            .map(|(c, t)| ClassifiedClause {
                clause: c.clone(),
                clause_type: t.to_string(),
                confidence: 0.9,
            })
            .collect();
        crate::state::Ingested::new("policy.txt".into(), clauses, Instant::now()).classified(
            classified,
            0,
            Instant::now(),
        )
    }

    fn stage(scores: &[(&'static str, f32)]) -> RiskStage {
        RiskStage::new(
            Arc::new(TableAssessor(scores.iter().copied().collect())),
            "IRDAI",
            &StageConfig::default(),
        )
    }

    #[tokio::test]
    async fn results_align_with_clauses_and_average() {
        let state = stage(&[("Confidentiality", 0.8), ("Termination", 0.6)])
            .assess(classified(&["Confidentiality", "Termination"]))
            .await;

        let ids: Vec<&str> = state.risks().iter().map(|r| r.clause_id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
        assert_eq!(state.risks()[0].framework, "IRDAI");
        assert!((state.overall_score() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn failures_get_the_fallback_record() {
        let state = stage(&[("Payment", 0.9)])
            .assess(classified(&["Payment", "Other"]))
            .await;

        let risk = &state.risks()[1];
        assert_eq!(risk.risk_level, RiskLevel::Medium);
        assert_eq!(risk.status, ComplianceStatus::Partial);
        assert_eq!(risk.framework, "IRDAI");
        assert_eq!(risk.reason, FALLBACK_REASON);
        assert_eq!(risk.score, 0.5);
        assert!((state.overall_score() - 0.7).abs() < 1e-6);
        assert_eq!(state.transitions().last().unwrap().fallbacks, 1);
    }

    #[tokio::test]
    async fn empty_input_scores_zero() {
        let state = stage(&[]).assess(classified(&[])).await;
        assert!(state.risks().is_empty());
        assert_eq!(state.overall_score(), 0.0);
    }

    #[tokio::test]
    async fn scores_are_clamped_and_validated() {
        let state = stage(&[("Liability", 1.4), ("Payment", f32::INFINITY)])
            .assess(classified(&["Liability", "Payment"]))
            .await;

        assert_eq!(state.risks()[0].score, 1.0);
        assert_eq!(state.risks()[1].reason, FALLBACK_REASON);
        for r in state.risks() {
            assert!((0.0..=1.0).contains(&r.score));
        }
    }

    #[test]
    fn overall_score_is_never_nan() {
        assert_eq!(overall_score(&[]), 0.0);
        let risks = vec![fallback("C1", "GDPR"), fallback("C2", "GDPR")];
        assert_eq!(overall_score(&risks), 0.5);
    }
}
