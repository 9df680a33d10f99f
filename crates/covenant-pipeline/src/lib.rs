//! Staged contract analysis.
//!
//! A document flows through ingestion, classification, risk and advisory,
//! each stage consuming the previous typed state.

pub mod executor;
pub mod pipeline;
pub mod stages;
pub mod state;

mod error;

pub use error::PipelineError;
pub use executor::{ItemFailure, StageExecutor, StageOutput};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use state::{Advised, Assessed, Classified, Ingested};
