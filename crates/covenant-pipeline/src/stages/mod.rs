//! The four pipeline stages, in execution order.

pub mod advisory;
pub mod classification;
pub mod ingestion;
pub mod risk;

pub use advisory::AdvisoryStage;
pub use classification::ClassificationStage;
pub use ingestion::IngestionStage;
pub use risk::RiskStage;
