//! Block sources: where raw extracted blocks come from.

use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use covenant_core::RawBlock;
use regex::Regex;
use tracing::info;

use crate::error::IngestError;
use crate::split::split_paragraphs;

const PAGE_BREAK: char = '\x0c';

/// A one-line markdown heading: one to six `#` then whitespace and a title.
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#{1,6}[ \t]+(?P<title>\S.*)$").expect("heading pattern is valid")
});

/// Document extraction backend.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn extract_blocks(&self, path: &Path) -> Result<Vec<RawBlock>, IngestError>;
}

/// Reads plain-text documents or pre-extracted JSON block files.
///
/// A `.json` file must hold an array of blocks; anything else is read as
/// UTF-8 text (see [`blocks_from_text`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFileSource;

#[async_trait]
impl BlockSource for TextFileSource {
    async fn extract_blocks(&self, path: &Path) -> Result<Vec<RawBlock>, IngestError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| IngestError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let blocks = if is_json {
            serde_json::from_str(&content).map_err(|source| IngestError::Malformed {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            blocks_from_text(&content)
        };

        info!(
            path = %path.display(),
            blocks = blocks.len(),
            format = if is_json { "json" } else { "text" },
            "extracted blocks"
        );
        Ok(blocks)
    }
}

/// Split plain text into blocks.
///
/// Form feeds separate pages (numbered from 1) and blank lines separate
/// paragraphs. A single-line paragraph of the form `## Title` is a heading.
pub fn blocks_from_text(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();

    for (i, page) in text.split(PAGE_BREAK).enumerate() {
        let page_no = u32::try_from(i + 1).unwrap_or(u32::MAX);
        for span in split_paragraphs(page) {
            let para = &page[span];
            let block = match HEADING.captures(para).and_then(|caps| caps.name("title")) {
                Some(title) => RawBlock::heading(title.as_str().trim()),
                None => RawBlock::text(para),
            };
            blocks.push(block.on_page(page_no));
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn text_pages_paragraphs_and_headings() {
        let text = "# General Conditions\n\n\
                    1. The insurer shall pay valid claims.\n\n\
                    2. Premiums are due annually.\x0c\
                    ## Exclusions\n\n\
                    War risks are excluded.\n#3 is not a heading here.";
        let blocks = blocks_from_text(text);

        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0], RawBlock::heading("General Conditions").on_page(1));
        assert_eq!(blocks[1].text, "1. The insurer shall pay valid claims.");
        assert_eq!(blocks[2].page, Some(1));
        assert_eq!(blocks[3], RawBlock::heading("Exclusions").on_page(2));
        assert!(!blocks[4].heading);
        assert_eq!(blocks[4].page, Some(2));
    }

    #[test]
    fn hash_prefixed_text_is_not_a_heading() {
        let text = "#3 Payment is due within thirty days.\n\n\
                    #hashtag\n\n\
                    ####### Seven hashes\n\n\
                    ###\n\n\
                    ### Schedule";
        let blocks = blocks_from_text(text);

        let headings: Vec<bool> = blocks.iter().map(|b| b.heading).collect();
        assert_eq!(headings, vec![false, false, false, false, true]);
        assert_eq!(blocks[0].text, "#3 Payment is due within thirty days.");
        assert_eq!(blocks[4].text, "Schedule");
    }

    #[test]
    fn blank_text_has_no_blocks() {
        assert!(blocks_from_text("").is_empty());
        assert!(blocks_from_text(" \n\n\x0c\n").is_empty());
    }

    #[tokio::test]
    async fn reads_json_block_files() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[
                {{"text": "Definitions", "heading": true}},
                {{"text": "1.1 Insured means the policyholder.", "page": "2"}},
                {{"text": "1.2 Policy means this contract.", "page": "n/a", "section": "Definitions"}}
            ]"#
        )
        .unwrap();

        let blocks = TextFileSource.extract_blocks(file.path()).await.unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].heading);
        assert_eq!(blocks[1].page, Some(2));
        assert_eq!(blocks[2].page, None);
        assert_eq!(blocks[2].section.as_deref(), Some("Definitions"));
    }

    #[tokio::test]
    async fn reads_plain_text_files() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "1. Cover applies worldwide.\n\n2. Claims within 30 days.").unwrap();

        let blocks = TextFileSource.extract_blocks(file.path()).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text, "2. Claims within 30 days.");
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let err = TextFileSource
            .extract_blocks(Path::new("/nonexistent/contract.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn invalid_utf8_is_unreadable() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(&[0x31, 0x2e, 0x20, 0xff, 0xfe]).unwrap();

        let err = TextFileSource.extract_blocks(file.path()).await.unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn bad_json_is_malformed() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"text": "not an array"}}"#).unwrap();

        let err = TextFileSource.extract_blocks(file.path()).await.unwrap_err();
        assert!(matches!(err, IngestError::Malformed { .. }));
    }
}
