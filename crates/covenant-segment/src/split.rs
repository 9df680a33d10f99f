//! Splitting strategies, tried in order by [`cascade`].
//!
//! Every strategy returns trimmed, non-empty byte spans into the input so
//! callers can map each chunk back to the block it came from.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

pub(crate) type Span = Range<usize>;

/// Legal numbering and heading markers.
///
/// Line-start markers: `12.3`, `4.1.2.`, `1.`, `Section 4`, `Clause 7`,
/// `Article IV`, `Schedule 2`, `(a)`, `(iv)`, `(3)`, `## Heading`.
/// Parenthesised enumerators are also recognised inline after `:` or `;`.
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?mi)^[ \t]*(?P<line>",
        r"(?:section|clause|article|subsection|schedule|part)[ \t]+(?:\d+(?:\.\d+)*|[ivxlc]+)\b",
        r"|\d+(?:\.\d+)+\.?[ \t]",
        r"|\d+\.[ \t]",
        r"|\((?:[a-z]{1,2}|[ivxlc]{1,5}|\d{1,3})\)[ \t]",
        r"|#{1,6}[ \t]",
        r")",
        r"|[:;][ \t]+(?P<inline>\((?:[a-z]{1,2}|[ivxlc]{1,5}|\d{1,3})\)[ \t])",
    ))
    .expect("marker pattern is valid")
});

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n\s*").expect("paragraph pattern is valid"));

/// The strategy that produced a segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Markers,
    Paragraphs,
    Sentences,
    /// No strategy split the text; it is kept as one candidate.
    Whole,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markers => "markers",
            Self::Paragraphs => "paragraphs",
            Self::Sentences => "sentences",
            Self::Whole => "whole",
        }
    }
}

/// A span inside one block of a document, tagged with the block's index.
pub(crate) type BlockSpan = (usize, Span);

/// Run the cascade over a document's text blocks.
///
/// The first strategy yielding more than one part across the document wins;
/// the marker split also needs at least one marker somewhere. Each block is
/// cut on its own, so no span crosses a block boundary. If no strategy splits
/// the document, surviving sentences are used, else each whole block.
pub(crate) fn cascade(blocks: &[&str], min_sentence_chars: usize) -> (Strategy, Vec<BlockSpan>) {
    if blocks.iter().any(|text| MARKER.is_match(text)) {
        let parts = per_block(blocks, split_markers);
        if parts.len() > 1 {
            return (Strategy::Markers, parts);
        }
    }

    let parts = per_block(blocks, split_paragraphs);
    if parts.len() > 1 {
        return (Strategy::Paragraphs, parts);
    }

    let parts = per_block(blocks, |text| split_sentences(text, min_sentence_chars));
    if !parts.is_empty() {
        return (Strategy::Sentences, parts);
    }

    let whole = per_block(blocks, |text| trim_span(text, 0..text.len()).into_iter().collect());
    (Strategy::Whole, whole)
}

fn per_block(blocks: &[&str], split: impl Fn(&str) -> Vec<Span>) -> Vec<BlockSpan> {
    blocks
        .iter()
        .enumerate()
        .flat_map(|(i, text)| split(text).into_iter().map(move |span| (i, span)))
        .collect()
}

/// Split immediately before each structural marker, keeping the marker with
/// the text that follows it.
pub(crate) fn split_markers(text: &str) -> Vec<Span> {
    let starts = MARKER.captures_iter(text).filter_map(|caps| {
        caps.name("line")
            .or_else(|| caps.name("inline"))
            .map(|m| m.start())
    });
    split_at(text, starts)
}

pub(crate) fn split_paragraphs(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    for sep in PARAGRAPH_BREAK.find_iter(text) {
        spans.extend(trim_span(text, start..sep.start()));
        start = sep.end();
    }
    spans.extend(trim_span(text, start..text.len()));
    spans
}

/// Unicode sentence split, discarding fragments shorter than `min_chars`.
pub(crate) fn split_sentences(text: &str, min_chars: usize) -> Vec<Span> {
    text.split_sentence_bound_indices()
        .filter_map(|(offset, sentence)| trim_span(text, offset..offset + sentence.len()))
        .filter(|span| text[span.clone()].chars().count() >= min_chars)
        .collect()
}

fn split_at(text: &str, starts: impl Iterator<Item = usize>) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    for cut in starts {
        if cut > start {
            spans.extend(trim_span(text, start..cut));
            start = cut;
        }
    }
    spans.extend(trim_span(text, start..text.len()));
    spans
}

/// Shrink a span to exclude surrounding whitespace; `None` if nothing is left.
fn trim_span(text: &str, span: Span) -> Option<Span> {
    let slice = &text[span.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    let start = span.start + lead;
    Some(start..start + trimmed.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(text: &'a str, spans: &[Span]) -> Vec<&'a str> {
        spans.iter().map(|s| &text[s.clone()]).collect()
    }

    #[test]
    fn markers_split_numbered_clauses() {
        let text = "Preamble between the parties.\n\
                    1.1 Definitions apply throughout.\n\
                    1.2 Headings are for convenience.\n\
                    Section 4 Payment is due monthly.\n\
                    Article IV Governing law is India.";
        let spans = split_markers(text);
        assert_eq!(
            texts(text, &spans),
            vec![
                "Preamble between the parties.",
                "1.1 Definitions apply throughout.",
                "1.2 Headings are for convenience.",
                "Section 4 Payment is due monthly.",
                "Article IV Governing law is India.",
            ]
        );
    }

    #[test]
    fn markers_ignore_inline_references() {
        let text = "The insurer shall pay as defined in Section 4 and clause 7.2 of this policy.";
        assert_eq!(split_markers(text).len(), 1);
    }

    #[test]
    fn markers_split_inline_enumerators() {
        let text = "The insured must: (a) notify the insurer promptly; (b) preserve evidence; (iv) cooperate fully.";
        let spans = split_markers(text);
        assert_eq!(
            texts(text, &spans),
            vec![
                "The insured must:",
                "(a) notify the insurer promptly;",
                "(b) preserve evidence;",
                "(iv) cooperate fully.",
            ]
        );
    }

    #[test]
    fn markers_split_markdown_headers() {
        let text = "## Exclusions\nWar and nuclear risks.\n## Claims\nNotify within 30 days.";
        let spans = split_markers(text);
        assert_eq!(spans.len(), 2);
        assert!(texts(text, &spans)[1].starts_with("## Claims"));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First paragraph of terms.\n\n  \nSecond paragraph of terms.\r\n\r\nThird.";
        let spans = split_paragraphs(text);
        assert_eq!(
            texts(text, &spans),
            vec![
                "First paragraph of terms.",
                "Second paragraph of terms.",
                "Third."
            ]
        );
    }

    #[test]
    fn sentences_drop_short_fragments() {
        let text = "The policy covers fire damage. Yes. Claims must be filed within thirty days.";
        let spans = split_sentences(text, 15);
        assert_eq!(
            texts(text, &spans),
            vec![
                "The policy covers fire damage.",
                "Claims must be filed within thirty days."
            ]
        );
    }

    fn spans(blocks: &[&str]) -> (Strategy, Vec<BlockSpan>) {
        cascade(blocks, 15)
    }

    #[test]
    fn cascade_prefers_markers() {
        let text = "1. Confidentiality. Each party shall keep terms confidential.\n\n\
                    2. Termination. Either party may terminate with 30 days notice.";
        let (strategy, parts) = spans(&[text]);
        assert_eq!(strategy, Strategy::Markers);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn cascade_falls_through_to_paragraphs() {
        let text = "Premiums are payable in advance.\n\nCover lapses if unpaid.";
        let (strategy, parts) = spans(&[text]);
        assert_eq!(strategy, Strategy::Paragraphs);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn cascade_single_sentence() {
        let text = "  The insurer shall pay all valid claims within thirty days.  ";
        let (strategy, parts) = spans(&[text]);
        assert_eq!(strategy, Strategy::Sentences);
        assert_eq!(parts.len(), 1);
        assert_eq!(
            &text[parts[0].1.clone()],
            "The insurer shall pay all valid claims within thirty days."
        );
    }

    #[test]
    fn cascade_whole_when_every_sentence_is_short() {
        let (strategy, parts) = spans(&["Void."]);
        assert_eq!(strategy, Strategy::Whole);
        assert_eq!(parts, vec![(0, 0..5)]);
    }

    #[test]
    fn cascade_empty_text() {
        let (_, parts) = spans(&["   \n\t "]);
        assert!(parts.is_empty());
        assert!(spans(&[]).1.is_empty());
    }

    #[test]
    fn cascade_never_crosses_blocks() {
        let blocks = [
            "1.1 \"Insured\" means the person named in the schedule.",
            "War and nuclear risks are excluded from all cover.",
            "2.1 Claims must be notified within thirty days.",
        ];
        let (strategy, parts) = spans(&blocks);
        assert_eq!(strategy, Strategy::Markers);
        let owners: Vec<usize> = parts.iter().map(|(block, _)| *block).collect();
        assert_eq!(owners, vec![0, 1, 2]);
        assert_eq!(&blocks[1][parts[1].1.clone()], blocks[1]);
    }

    #[test]
    fn unmarked_blocks_use_paragraphs() {
        let (strategy, parts) = spans(&[
            "The insurer agrees to indemnify the insured.",
            "First paragraph of the schedule.\n\nSecond paragraph of the schedule.",
        ]);
        assert_eq!(strategy, Strategy::Paragraphs);
        let owners: Vec<usize> = parts.iter().map(|(block, _)| *block).collect();
        assert_eq!(owners, vec![0, 1, 1]);
    }
}
