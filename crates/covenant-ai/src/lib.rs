//! Capability layer: the external oracles the pipeline calls, and the
//! adapters that normalise their responses into fixed result types.

pub mod capability;
pub mod normalize;
pub mod similarity;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "onnx")]
mod embedder;

pub use capability::{
    CapabilityError, ClauseClassifier, Embedder, LabelScore, RiskAssessment, RiskAssessor,
    Summarizer,
};
pub use similarity::cosine_similarity;

#[cfg(feature = "http")]
pub use http::{GenerateSummarizer, HfClassifier, HfEmbedder, HfRiskAssessor, InferenceClient};

#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
