use std::sync::Arc;
use std::time::Instant;

use covenant_ai::normalize::resolve_label;
use covenant_ai::{CapabilityError, ClauseClassifier, LabelScore};
use covenant_core::{Clause, ClassifiedClause, OTHER_LABEL, StageConfig};

use crate::executor::StageExecutor;
use crate::state::{Classified, Ingested};

/// Confidence reported for clauses the classifier could not label.
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Labels every clause, one classifier call per clause.
pub struct ClassificationStage {
    classifier: Arc<dyn ClauseClassifier>,
    labels: Vec<String>,
    executor: StageExecutor,
}

impl ClassificationStage {
    pub fn new(
        classifier: Arc<dyn ClauseClassifier>,
        labels: Vec<String>,
        config: &StageConfig,
    ) -> Self {
        Self {
            classifier,
            labels,
            executor: StageExecutor::new("classification", config),
        }
    }

    pub async fn classify(&self, state: Ingested) -> Classified {
        let started = Instant::now();
        let classifier = self.classifier.as_ref();
        let labels = self.labels.as_slice();

        let output = self
            .executor
            .run(
                state.clauses(),
                move |clause| async move {
                    let raw = classifier.classify(&clause.text).await?;
                    classified(clause, raw, labels)
                },
                |clause, _| fallback(clause),
            )
            .await;

        state.classified(output.items, output.fallbacks, started)
    }
}

fn classified(
    clause: &Clause,
    raw: LabelScore,
    labels: &[String],
) -> Result<ClassifiedClause, CapabilityError> {
    if !raw.score.is_finite() {
        return Err(CapabilityError::UnexpectedShape(format!(
            "non-finite confidence {}",
            raw.score
        )));
    }
    Ok(ClassifiedClause {
        clause: clause.clone(),
        clause_type: resolve_label(&raw.label, labels),
        confidence: raw.score.clamp(0.0, 1.0),
    })
}

/// The record substituted when classification fails.
pub fn fallback(clause: &Clause) -> ClassifiedClause {
    ClassifiedClause {
        clause: clause.clone(),
        clause_type: OTHER_LABEL.to_string(),
        confidence: FALLBACK_CONFIDENCE,
    }
}
