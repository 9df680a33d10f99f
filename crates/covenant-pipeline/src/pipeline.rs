//! The analysis state machine.
//!
//! Stages run strictly in order; within a stage all per-clause calls are
//! concurrent. Only ingestion can halt a run.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use covenant_ai::{ClauseClassifier, Embedder, RiskAssessor, Summarizer};
use covenant_core::{AnalysisConfig, AnalysisState};
use covenant_segment::{BlockSource, Segmenter, TextFileSource};
use tracing::info;

use crate::error::PipelineError;
use crate::stages::{AdvisoryStage, ClassificationStage, IngestionStage, RiskStage};

pub struct Pipeline {
    ingestion: IngestionStage,
    classification: ClassificationStage,
    risk: RiskStage,
    advisory: AdvisoryStage,
}

impl Pipeline {
    pub fn builder(
        config: AnalysisConfig,
        classifier: Arc<dyn ClauseClassifier>,
        assessor: Arc<dyn RiskAssessor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            config,
            classifier,
            assessor,
            summarizer,
            embedder: None,
            source: None,
        }
    }

    /// Analyse one document end to end.
    ///
    /// Returns a fully populated state, or the ingestion error that stopped
    /// the run. Capability failures never fail the call; they are replaced
    /// by fallback values and counted in the state's transitions.
    pub async fn analyze(&self, path: &Path) -> Result<AnalysisState, PipelineError> {
        let started = Instant::now();

        let ingested = self.ingestion.ingest(path).await?;
        let classified = self.classification.classify(ingested).await;
        let assessed = self.risk.assess(classified).await;
        let advised = self.advisory.advise(assessed).await;

        let state = AnalysisState::from(advised);
        info!(
            path = %path.display(),
            clauses = state.clauses.len(),
            overall_score = state.overall_score,
            fallbacks = state.fallback_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );
        Ok(state)
    }
}

pub struct PipelineBuilder {
    config: AnalysisConfig,
    classifier: Arc<dyn ClauseClassifier>,
    assessor: Arc<dyn RiskAssessor>,
    summarizer: Arc<dyn Summarizer>,
    embedder: Option<Arc<dyn Embedder>>,
    source: Option<Arc<dyn BlockSource>>,
}

impl PipelineBuilder {
    /// Embedder for semantic merge; only used when the segmenter config
    /// enables it.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Block source for ingestion. Defaults to [`TextFileSource`].
    pub fn source(mut self, source: Arc<dyn BlockSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> Pipeline {
        let Self {
            config,
            classifier,
            assessor,
            summarizer,
            embedder,
            source,
        } = self;

        let mut segmenter = Segmenter::new(config.segmenter.clone());
        if let Some(embedder) = embedder {
            segmenter = segmenter.with_embedder(embedder);
        }
        let source: Arc<dyn BlockSource> = match source {
            Some(source) => source,
            None => Arc::new(TextFileSource),
        };

        Pipeline {
            ingestion: IngestionStage::new(source, segmenter),
            classification: ClassificationStage::new(
                classifier,
                config.labels.clone(),
                &config.stages,
            ),
            risk: RiskStage::new(assessor, config.primary_framework(), &config.stages),
            advisory: AdvisoryStage::new(summarizer, config.advisory.clone(), &config.stages),
        }
    }
}
