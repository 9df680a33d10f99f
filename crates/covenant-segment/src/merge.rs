//! Semantic merge of adjacent chunks.
//!
//! Short text embeds noisily close to its neighbours, so short candidates
//! need a higher similarity before they are folded into the running buffer.

use covenant_ai::{Embedder, cosine_similarity};
use covenant_core::SegmenterConfig;
use tracing::{debug, warn};

use crate::segmenter::Chunk;

/// Similarity `chunk` must exceed to join the preceding buffer.
pub(crate) fn merge_threshold(chunk: &Chunk, config: &SegmenterConfig) -> f32 {
    if chunk.text.chars().count() < config.short_chunk_chars {
        config.merge_threshold + config.short_chunk_delta
    } else {
        config.merge_threshold
    }
}

/// Merge chunks given `similarities[i]` between chunk `i` and chunk `i + 1`.
///
/// Order is preserved; a merged chunk keeps the metadata of its first part.
pub(crate) fn merge_by_similarity(
    chunks: Vec<Chunk>,
    similarities: &[f32],
    config: &SegmenterConfig,
) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for (i, chunk) in chunks.into_iter().enumerate() {
        let joins = i > 0
            && similarities
                .get(i - 1)
                .is_some_and(|&sim| sim > merge_threshold(&chunk, config));

        match merged.last_mut() {
            Some(buffer) if joins => {
                buffer.text.push(' ');
                buffer.text.push_str(&chunk.text);
            }
            _ => merged.push(chunk),
        }
    }

    merged
}

/// Embed all chunks and merge semantically continuous neighbours.
///
/// Embedding failures leave the chunks unmerged.
pub(crate) async fn semantic_merge(
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
    config: &SegmenterConfig,
) -> Vec<Chunk> {
    if chunks.len() < 2 {
        return chunks;
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = match embedder.embed_batch(&texts).await {
        Ok(v) if v.len() == chunks.len() => v,
        Ok(v) => {
            warn!(
                expected = chunks.len(),
                got = v.len(),
                "embedding count mismatch; skipping semantic merge"
            );
            return chunks;
        }
        Err(e) => {
            warn!(error = %e, "embedding failed; skipping semantic merge");
            return chunks;
        }
    };

    let similarities: Vec<f32> = vectors
        .windows(2)
        .map(|pair| cosine_similarity(&pair[0], &pair[1]))
        .collect();

    let before = chunks.len();
    let merged = merge_by_similarity(chunks, &similarities, config);
    debug!(before, after = merged.len(), "semantic merge complete");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use covenant_ai::CapabilityError;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            page: None,
            section: None,
        }
    }

    // 24 and 25 chars: both under the 50-char short threshold.
    const SHORT_A: &str = "Premiums are due monthly";
    const SHORT_B: &str = "Late premiums incur fees.";
    const LONG_A: &str = "Premiums are due on the first business day of each month.";
    const LONG_B: &str = "Premiums received late incur a fee of two percent per month.";

    #[test]
    fn threshold_raised_for_short_chunks() {
        let cfg = SegmenterConfig::default();
        assert!((merge_threshold(&chunk(SHORT_A), &cfg) - 0.85).abs() < 1e-6);
        assert!((merge_threshold(&chunk(LONG_A), &cfg) - 0.80).abs() < 1e-6);
    }

    #[test]
    fn short_chunks_between_thresholds_stay_apart() {
        let cfg = SegmenterConfig::default();
        let out = merge_by_similarity(vec![chunk(SHORT_A), chunk(SHORT_B)], &[0.82], &cfg);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn long_chunks_with_same_similarity_merge() {
        let cfg = SegmenterConfig::default();
        let out = merge_by_similarity(vec![chunk(LONG_A), chunk(LONG_B)], &[0.82], &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, format!("{LONG_A} {LONG_B}"));
    }

    #[test]
    fn short_chunks_above_raised_threshold_merge() {
        let cfg = SegmenterConfig::default();
        let out = merge_by_similarity(vec![chunk(SHORT_A), chunk(SHORT_B)], &[0.9], &cfg);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn threshold_is_exclusive() {
        let cfg = SegmenterConfig::default();
        let out = merge_by_similarity(vec![chunk(LONG_A), chunk(LONG_B)], &[0.80], &cfg);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn merge_runs_keep_order_and_first_metadata() {
        let cfg = SegmenterConfig::default();
        let mut first = chunk(LONG_A);
        first.page = Some(3);
        first.section = Some("Payment".into());
        let chunks = vec![first, chunk(LONG_B), chunk("An unrelated clause about governing law.")];

        let out = merge_by_similarity(chunks, &[0.95, 0.1], &cfg);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].page, Some(3));
        assert_eq!(out[0].section.as_deref(), Some("Payment"));
        assert!(out[0].text.starts_with(LONG_A));
        assert!(out[1].text.starts_with("An unrelated"));
    }

    /// Returns fixed vectors so adjacent cosine similarity is controlled.
    struct FixedEmbedder(Vec<Vec<f32>>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, CapabilityError> {
            Ok(self.0.iter().take(texts.len()).cloned().collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, CapabilityError> {
            Err(CapabilityError::Backend("offline".into()))
        }
    }

    /// Unit vectors at cosine similarity 0.82.
    fn pair_at_082() -> Vec<Vec<f32>> {
        let sin = (1.0f32 - 0.82 * 0.82).sqrt();
        vec![vec![1.0, 0.0], vec![0.82, sin]]
    }

    #[tokio::test]
    async fn semantic_merge_uses_embedding_similarity() {
        let cfg = SegmenterConfig::default();
        let embedder = FixedEmbedder(pair_at_082());

        let short = semantic_merge(vec![chunk(SHORT_A), chunk(SHORT_B)], &embedder, &cfg).await;
        assert_eq!(short.len(), 2);

        let long = semantic_merge(vec![chunk(LONG_A), chunk(LONG_B)], &embedder, &cfg).await;
        assert_eq!(long.len(), 1);
    }

    #[tokio::test]
    async fn semantic_merge_skipped_on_embedder_failure() {
        let cfg = SegmenterConfig::default();
        let out = semantic_merge(vec![chunk(LONG_A), chunk(LONG_B)], &FailingEmbedder, &cfg).await;
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn semantic_merge_skipped_on_count_mismatch() {
        let cfg = SegmenterConfig::default();
        let embedder = FixedEmbedder(vec![vec![1.0, 0.0]]);
        let out = semantic_merge(vec![chunk(LONG_A), chunk(LONG_B)], &embedder, &cfg).await;
        assert_eq!(out.len(), 2);
    }
}
