//! Local explanations for spam predictions
//!
//! Explanations are produced by an ordered [`ExplanationChain`]:
//! - [`PerturbationExplainer`] - masked-token sampling with a weighted linear surrogate
//! - [`CoefficientExplainer`] - linear weights or feature importances of a classifier
//! - [`KeywordExplainer`] - curated keyword table, always succeeds
//!
//! The [`ExplanationSummarizer`] ranks the winning attributions and grades them.

mod chain;
mod fallback;
mod narrative;
mod perturbation;
mod summary;
mod surrogate;
mod types;

pub use chain::{ExplanationChain, ExplanationRequest, ExplanationStrategy, StrategyOutput};
pub use fallback::{CoefficientExplainer, KeywordExplainer};
pub use narrative::describe_feature;
pub use perturbation::{PerturbationExplainer, MASK_TOKEN};
pub use summary::ExplanationSummarizer;
pub use surrogate::{kernel_weight, SurrogateFit, WeightedRidge};
pub use types::{
    Attribution, ConfidenceLevel, ExplanationBudget, ExplanationFeature, ExplanationMethod,
    ExplanationQuality, ExplanationResult, FallbackReason, ReasonCode, Strength,
};
