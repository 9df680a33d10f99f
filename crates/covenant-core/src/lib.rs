pub mod config;
pub mod model;

pub use config::{AdvisoryConfig, AnalysisConfig, SegmenterConfig, StageConfig};
pub use model::{
    Advisory, AnalysisState, Clause, ClassifiedClause, ComplianceStatus, ParseLevelError,
    RawBlock, RiskLevel, RiskResult, Stage, StageTransition, OTHER_LABEL, UNKNOWN_SECTION,
};
