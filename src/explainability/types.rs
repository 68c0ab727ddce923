//! Explanation result types

use crate::classifier::Label;
use crate::error::SpamLensError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weights below this magnitude carry no signal
pub(crate) const NEGLIGIBLE_WEIGHT: f64 = 1e-9;

/// Method that produced an explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationMethod {
    /// Weighted surrogate fit on masked variants of the message
    Perturbation,
    /// Signed weights of a linear classifier
    LinearCoefficients,
    /// Unsigned importances of a tree-ensemble style classifier
    FeatureImportances,
    /// Curated keyword table
    Keyword,
    /// Merge of two methods
    Combined,
    /// No strategy produced a payload
    Unavailable,
}

impl ExplanationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationMethod::Perturbation => "perturbation",
            ExplanationMethod::LinearCoefficients => "linear_coefficients",
            ExplanationMethod::FeatureImportances => "feature_importances",
            ExplanationMethod::Keyword => "keyword",
            ExplanationMethod::Combined => "combined",
            ExplanationMethod::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ExplanationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength of a feature relative to the strongest one in the same result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

/// Overall confidence in an explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        })
    }
}

/// Why a strategy did not produce the explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    ClassifierUnavailable,
    IncompatibleClassifier,
    VectorizerMismatch,
    NumericalSingularity,
    EmptyMessage,
    BudgetExceeded,
    InsufficientSamples,
    NoSignal,
    StrategyFailed,
}

impl From<&SpamLensError> for ReasonCode {
    fn from(err: &SpamLensError) -> Self {
        match err {
            SpamLensError::ClassifierUnavailable(_) => ReasonCode::ClassifierUnavailable,
            SpamLensError::MissingCapability { .. } => ReasonCode::IncompatibleClassifier,
            SpamLensError::VectorizerError(_) | SpamLensError::DimensionMismatch { .. } => {
                ReasonCode::VectorizerMismatch
            }
            SpamLensError::NumericalError(_) => ReasonCode::NumericalSingularity,
            SpamLensError::EmptyMessage => ReasonCode::EmptyMessage,
            SpamLensError::BudgetExceeded { .. } => ReasonCode::BudgetExceeded,
            SpamLensError::InsufficientSamples { .. } => ReasonCode::InsufficientSamples,
            SpamLensError::ExplanationError(_) => ReasonCode::NoSignal,
            _ => ReasonCode::StrategyFailed,
        }
    }
}

/// A strategy that failed before the one that produced the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackReason {
    pub strategy: String,
    pub code: ReasonCode,
    pub detail: String,
}

impl FallbackReason {
    pub fn from_error(strategy: &str, err: &SpamLensError) -> Self {
        Self {
            strategy: strategy.to_string(),
            code: ReasonCode::from(err),
            detail: err.to_string(),
        }
    }
}

/// Per-call limits on the perturbation explainer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationBudget {
    /// Cap on perturbed samples, on top of the configured caps
    pub max_samples: Option<usize>,
    /// Wall-clock limit for sampling, in milliseconds
    pub max_time_ms: Option<u64>,
}

impl ExplanationBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    pub fn with_max_time_ms(mut self, max_time_ms: u64) -> Self {
        self.max_time_ms = Some(max_time_ms);
        self
    }
}

/// Raw token attribution produced by a strategy, before summarization
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub token: String,
    /// Signed weight; positive pushes toward spam
    pub weight: f64,
    pub methods: Vec<ExplanationMethod>,
}

impl Attribution {
    pub fn new(token: impl Into<String>, weight: f64, method: ExplanationMethod) -> Self {
        Self {
            token: token.into(),
            weight,
            methods: vec![method],
        }
    }
}

/// One token's contribution in a summarized explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationFeature {
    pub token: String,
    pub raw_weight: f64,
    pub direction: Label,
    pub abs_importance: f64,
    pub strength: Strength,
    pub methods: Vec<ExplanationMethod>,
    /// Why this token points the way it does
    pub explanation: String,
}

/// Quality block of an [`ExplanationResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationQuality {
    pub confidence_level: ConfidenceLevel,
    /// Sum of `abs_importance` over the returned features
    pub total_importance: f64,
    pub spam_feature_count: usize,
    pub ham_feature_count: usize,
}

/// Token-level explanation of a message's spam probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResult {
    pub success: bool,
    pub method: ExplanationMethod,
    /// Ordered by `abs_importance` descending
    pub features: Vec<ExplanationFeature>,
    pub summary: String,
    pub quality: ExplanationQuality,
    pub fallback_reasons: Vec<FallbackReason>,
    pub samples_used: Option<usize>,
}

impl ExplanationResult {
    /// Result for a request no strategy could serve
    pub fn unavailable(fallback_reasons: Vec<FallbackReason>) -> Self {
        Self {
            success: false,
            method: ExplanationMethod::Unavailable,
            features: Vec::new(),
            summary: "No explanation strategy succeeded.".to_string(),
            quality: ExplanationQuality {
                confidence_level: ConfidenceLevel::Low,
                total_importance: 0.0,
                spam_feature_count: 0,
                ham_feature_count: 0,
            },
            fallback_reasons,
            samples_used: None,
        }
    }

    pub fn spam_features(&self) -> impl Iterator<Item = &ExplanationFeature> {
        self.features.iter().filter(|f| f.direction == Label::Spam)
    }

    pub fn ham_features(&self) -> impl Iterator<Item = &ExplanationFeature> {
        self.features.iter().filter(|f| f.direction == Label::Ham)
    }

    pub fn is_fallback(&self) -> bool {
        !self.fallback_reasons.is_empty()
    }
}
