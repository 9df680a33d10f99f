//! Document segmentation: raw extracted blocks in, ordered clauses out.

mod error;
mod merge;
mod segmenter;
mod source;
mod split;

pub use error::IngestError;
pub use segmenter::{Chunk, Segmenter};
pub use source::{BlockSource, TextFileSource, blocks_from_text};
pub use split::Strategy;
