use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use covenant_segment::{BlockSource, IngestError, Segmenter};
use tracing::info;

use crate::state::Ingested;

/// Extracts blocks from the source document and segments them into clauses.
pub struct IngestionStage {
    source: Arc<dyn BlockSource>,
    segmenter: Segmenter,
}

impl IngestionStage {
    pub fn new(source: Arc<dyn BlockSource>, segmenter: Segmenter) -> Self {
        Self { source, segmenter }
    }

    /// Fails only when the source cannot be read or parsed. A document with
    /// no recoverable clauses is a valid, empty result.
    pub async fn ingest(&self, path: &Path) -> Result<Ingested, IngestError> {
        let started = Instant::now();
        let blocks = self.source.extract_blocks(path).await?;
        let clauses = self.segmenter.segment(&blocks).await;

        info!(
            path = %path.display(),
            blocks = blocks.len(),
            clauses = clauses.len(),
            "ingested document"
        );
        Ok(Ingested::new(path.to_path_buf(), clauses, started))
    }
}
