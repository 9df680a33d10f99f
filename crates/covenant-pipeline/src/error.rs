use covenant_segment::IngestError;
use thiserror::Error;

/// Failures that halt an analysis. Per-clause failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestError),
}
