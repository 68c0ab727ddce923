//! Fallback explanation strategies
//!
//! Tier 1 reads attributions straight off a classifier's coefficients or
//! importances. Tier 2 consults a curated keyword table and always succeeds;
//! it reads the surface text so phrases survive stop-word removal.

use super::chain::{ExplanationRequest, ExplanationStrategy, StrategyOutput};
use super::types::{Attribution, ExplanationMethod};
use crate::classifier::{Label, PoolMember};
use crate::error::{Result, SpamLensError};
use crate::vectorizer::Vectorizer;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Curated keyword weights; ham words carry their weight with a negative sign
const KEYWORD_TABLE: &[(&str, f64, Label)] = &[
    // Spam phrases
    ("click here", 0.9, Label::Spam),
    ("call now", 0.85, Label::Spam),
    ("act now", 0.8, Label::Spam),
    ("limited time", 0.75, Label::Spam),
    ("you have won", 0.9, Label::Spam),
    // Spam words
    ("free", 0.8, Label::Spam),
    ("win", 0.75, Label::Spam),
    ("winner", 0.8, Label::Spam),
    ("won", 0.7, Label::Spam),
    ("urgent", 0.7, Label::Spam),
    ("click", 0.65, Label::Spam),
    ("now", 0.4, Label::Spam),
    ("limited", 0.55, Label::Spam),
    ("offer", 0.6, Label::Spam),
    ("prize", 0.85, Label::Spam),
    ("money", 0.6, Label::Spam),
    ("cash", 0.7, Label::Spam),
    ("congratulations", 0.75, Label::Spam),
    ("call", 0.45, Label::Spam),
    ("text", 0.45, Label::Spam),
    ("txt", 0.6, Label::Spam),
    ("stop", 0.5, Label::Spam),
    ("reply", 0.5, Label::Spam),
    ("claim", 0.8, Label::Spam),
    ("lottery", 0.85, Label::Spam),
    ("jackpot", 0.85, Label::Spam),
    ("reward", 0.65, Label::Spam),
    ("bonus", 0.6, Label::Spam),
    ("guarantee", 0.55, Label::Spam),
    ("guaranteed", 0.6, Label::Spam),
    ("exclusive", 0.5, Label::Spam),
    ("credit", 0.5, Label::Spam),
    ("loan", 0.55, Label::Spam),
    ("deal", 0.45, Label::Spam),
    ("mobile", 0.4, Label::Spam),
    // Ham words
    ("meeting", 0.6, Label::Ham),
    ("thanks", 0.55, Label::Ham),
    ("thank", 0.5, Label::Ham),
    ("please", 0.3, Label::Ham),
    ("time", 0.25, Label::Ham),
    ("today", 0.3, Label::Ham),
    ("tomorrow", 0.45, Label::Ham),
    ("tonight", 0.4, Label::Ham),
    ("work", 0.4, Label::Ham),
    ("home", 0.45, Label::Ham),
    ("family", 0.5, Label::Ham),
    ("friend", 0.45, Label::Ham),
    ("love", 0.45, Label::Ham),
    ("sorry", 0.5, Label::Ham),
    ("help", 0.3, Label::Ham),
    ("lunch", 0.5, Label::Ham),
    ("dinner", 0.5, Label::Ham),
];

/// Signed weight of a table entry
fn signed(weight: f64, label: Label) -> f64 {
    match label {
        Label::Spam => weight,
        Label::Ham => -weight,
    }
}

/// Tier 1: attributions from a classifier's linear weights or importances
pub struct CoefficientExplainer {
    vectorizer: Arc<dyn Vectorizer>,
    targets: Vec<PoolMember>,
}

impl CoefficientExplainer {
    pub fn new(vectorizer: Arc<dyn Vectorizer>, targets: Vec<PoolMember>) -> Self {
        Self { vectorizer, targets }
    }

    pub fn explain_message(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput> {
        if self.targets.is_empty() {
            return Err(SpamLensError::ClassifierUnavailable(
                "No classifier designated for explanation".to_string(),
            ));
        }

        let member = self
            .targets
            .iter()
            .find(|m| {
                m.capability().linear_weights().is_some()
                    || m.capability().feature_importances().is_some()
            })
            .ok_or_else(|| SpamLensError::MissingCapability {
                classifier: self.targets[0].id().to_string(),
                capability: "linear weights or feature importances",
            })?;

        let x = self.vectorizer.transform(request.cleaned)?;
        let capability = member.capability();

        let (method, weights, sign) = if let Some(weights) = capability.linear_weights() {
            (ExplanationMethod::LinearCoefficients, weights, 1.0)
        } else if let Some(importances) = capability.feature_importances() {
            // Unsigned magnitudes explain whichever class the model leans toward
            let leans_spam = match member.spam_probability(&x) {
                Ok(p) => p >= capability.sign_threshold(),
                Err(_) => capability.predict(&x)? == Label::Spam,
            };
            let sign = if leans_spam { 1.0 } else { -1.0 };
            (ExplanationMethod::FeatureImportances, importances, sign)
        } else {
            return Err(SpamLensError::MissingCapability {
                classifier: member.id().to_string(),
                capability: "linear weights or feature importances",
            });
        };

        if weights.len() != x.len() {
            return Err(SpamLensError::DimensionMismatch {
                expected: weights.len(),
                actual: x.len(),
            });
        }

        let mut attributions = Vec::new();
        for (idx, &value) in x.iter().enumerate() {
            if value == 0.0 {
                continue;
            }
            let contribution = sign * weights[idx] * value;
            if contribution == 0.0 {
                continue;
            }
            let token = self.vectorizer.feature_name(idx).ok_or_else(|| {
                SpamLensError::VectorizerError(format!("No feature name for column {}", idx))
            })?;
            attributions.push(Attribution::new(token, contribution, method));
        }

        if attributions.is_empty() {
            return Err(SpamLensError::ExplanationError(format!(
                "Classifier '{}' has no weight on any term in the message",
                member.id()
            )));
        }

        debug!(classifier = member.id(), %method, terms = attributions.len(), "Coefficient explanation");
        Ok(StrategyOutput::new(method, attributions))
    }
}

impl ExplanationStrategy for CoefficientExplainer {
    fn name(&self) -> &'static str {
        "coefficients"
    }

    fn explain(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput> {
        self.explain_message(request)
    }
}

/// Tier 2: curated keyword table, independent of any model
#[derive(Debug, Clone, Default)]
pub struct KeywordExplainer;

impl KeywordExplainer {
    pub fn new() -> Self {
        Self
    }

    /// Table weight of a word or phrase, signed by direction
    pub fn keyword_weight(term: &str) -> Option<f64> {
        KEYWORD_TABLE
            .iter()
            .find(|(k, _, _)| *k == term)
            .map(|&(_, w, label)| signed(w, label))
    }

    pub fn explain_message(&self, request: &ExplanationRequest<'_>) -> StrategyOutput {
        let words: Vec<&str> = request.surface.split_whitespace().collect();
        let present: HashSet<&str> = words.iter().copied().collect();
        let padded = format!(" {} ", words.join(" "));

        let attributions = KEYWORD_TABLE
            .iter()
            .filter(|(term, _, _)| {
                if term.contains(' ') {
                    padded.contains(&format!(" {} ", term))
                } else {
                    present.contains(term)
                }
            })
            .map(|&(term, weight, label)| {
                Attribution::new(term, signed(weight, label), ExplanationMethod::Keyword)
            })
            .collect();

        StrategyOutput::new(ExplanationMethod::Keyword, attributions)
    }
}

impl ExplanationStrategy for KeywordExplainer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn explain(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput> {
        Ok(self.explain_message(request))
    }

    fn is_last_resort(&self) -> bool {
        true
    }
}
