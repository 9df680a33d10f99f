//! Clause segmentation over extracted document blocks.
//!
//! Each text block is cut by the splitting cascade on its own, then chunks
//! are filtered by length and optionally merged by embedding similarity.
//! Every chunk inherits page/section from the block it was cut from.

use std::sync::Arc;

use covenant_ai::Embedder;
use covenant_core::{Clause, RawBlock, SegmenterConfig};
use tracing::{debug, warn};

use crate::merge::semantic_merge;
use crate::split::cascade;

/// A clause candidate before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub page: Option<u32>,
    pub section: Option<String>,
}

/// A non-blank text block with the section it falls under.
struct TextBlock<'a> {
    text: &'a str,
    page: Option<u32>,
    section: Option<String>,
}

/// Drop heading and blank blocks, tracking the section cursor headings set.
fn text_blocks(blocks: &[RawBlock]) -> Vec<TextBlock<'_>> {
    let mut out = Vec::new();
    let mut current_section: Option<String> = None;

    for block in blocks {
        if block.heading {
            let heading = block.text.trim().trim_start_matches('#').trim();
            if !heading.is_empty() {
                current_section = Some(heading.to_string());
            }
            continue;
        }

        let text = block.text.trim();
        if text.is_empty() {
            continue;
        }

        // A block's own section wins over the cursor.
        let section = block
            .section
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| current_section.clone());
        out.push(TextBlock {
            text,
            page: block.page,
            section,
        });
    }
    out
}

/// Turns raw extracted blocks into ordered clauses.
pub struct Segmenter {
    config: SegmenterConfig,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Embedder used for semantic merge when `semantic_merge` is enabled.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment blocks into clauses with ids `C1..Cn` in document order.
    ///
    /// Empty input, or input with nothing recoverable, yields no clauses.
    pub async fn segment(&self, blocks: &[RawBlock]) -> Vec<Clause> {
        let mut chunks = self.chunk(blocks);

        if self.config.semantic_merge {
            match &self.embedder {
                Some(embedder) => {
                    chunks = semantic_merge(chunks, embedder.as_ref(), &self.config).await;
                }
                None => warn!("semantic merge enabled without an embedder; skipping"),
            }
        }

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| Clause::new(i + 1, c.text, c.page, c.section.as_deref()))
            .collect()
    }

    /// Run the splitting cascade and length filter, without semantic merge.
    pub fn chunk(&self, blocks: &[RawBlock]) -> Vec<Chunk> {
        let blocks = text_blocks(blocks);
        if blocks.is_empty() {
            return vec![];
        }

        let texts: Vec<&str> = blocks.iter().map(|b| b.text).collect();
        let (strategy, spans) = cascade(&texts, self.config.min_sentence_chars);
        let candidates = spans.len();
        let chunks: Vec<Chunk> = spans
            .into_iter()
            .map(|(i, span)| {
                let block = &blocks[i];
                Chunk {
                    text: block.text[span].to_string(),
                    page: block.page,
                    section: block.section.clone(),
                }
            })
            .filter(|c| c.text.chars().count() >= self.config.min_clause_chars)
            .collect();

        debug!(
            strategy = strategy.as_str(),
            blocks = blocks.len(),
            candidates,
            kept = chunks.len(),
            "segmented document"
        );
        chunks
    }
}
