//! Classifier pool
//!
//! Classifiers are frozen binary models over a [`FeatureVector`]. Every
//! classifier can vote through [`Classifier::predict`]; the confidence it can
//! report depends on which capability trait it also implements:
//!
//! - [`ProbabilisticClassifier`] exposes class probabilities
//! - [`MarginClassifier`] exposes only a signed decision margin
//!
//! The capability is fixed when a classifier joins a [`ClassifierPool`], so no
//! request ever queries a model for optional methods.

mod models;
mod pool;

pub use models::{
    DecisionStump, KeywordVoter, LinearMarginModel, LogisticModel, MultinomialNaiveBayes,
    StumpEnsemble,
};
pub use pool::{ClassifierPool, PoolBuilder, PoolEvaluation, PoolMember};

use crate::error::{Result, SpamLensError};
use crate::vectorizer::FeatureVector;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Binary class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ham => "ham",
            Label::Spam => "spam",
        }
    }

    /// Column of this label in a `[p_ham, p_spam]` probability pair
    pub fn index(&self) -> usize {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }

    pub fn opposite(&self) -> Label {
        match self {
            Label::Ham => Label::Spam,
            Label::Spam => Label::Ham,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A frozen binary classifier
pub trait Classifier: Send + Sync {
    /// Predict the label of one feature vector
    fn predict(&self, x: &FeatureVector) -> Result<Label>;

    /// Expected input length, if the model knows it
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// Signed per-feature weights (positive pushes toward spam), for linear models
    fn linear_weights(&self) -> Option<&Array1<f64>> {
        None
    }

    /// Unsigned per-feature importances, for tree-ensemble style models
    fn feature_importances(&self) -> Option<&Array1<f64>> {
        None
    }

    /// Spam probability at or above which unsigned importances are read as spam evidence
    fn sign_threshold(&self) -> f64 {
        0.5
    }
}

/// Classifier exposing class probabilities
pub trait ProbabilisticClassifier: Classifier {
    /// `[p_ham, p_spam]`
    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2]>;
}

/// Classifier exposing only a decision margin (positive leans spam)
pub trait MarginClassifier: Classifier {
    fn decision_function(&self, x: &FeatureVector) -> Result<f64>;
}

/// Output capability of a pool member, resolved at pool construction
#[derive(Clone)]
pub enum Capability {
    Probabilistic(Arc<dyn ProbabilisticClassifier>),
    Margin(Arc<dyn MarginClassifier>),
    VoteOnly(Arc<dyn Classifier>),
}

impl Capability {
    pub fn kind(&self) -> &'static str {
        match self {
            Capability::Probabilistic(_) => "probabilistic",
            Capability::Margin(_) => "margin",
            Capability::VoteOnly(_) => "vote_only",
        }
    }

    pub fn predict(&self, x: &FeatureVector) -> Result<Label> {
        match self {
            Capability::Probabilistic(c) => c.predict(x),
            Capability::Margin(c) => c.predict(x),
            Capability::VoteOnly(c) => c.predict(x),
        }
    }

    pub fn n_features(&self) -> Option<usize> {
        match self {
            Capability::Probabilistic(c) => c.n_features(),
            Capability::Margin(c) => c.n_features(),
            Capability::VoteOnly(c) => c.n_features(),
        }
    }

    pub fn linear_weights(&self) -> Option<&Array1<f64>> {
        match self {
            Capability::Probabilistic(c) => c.linear_weights(),
            Capability::Margin(c) => c.linear_weights(),
            Capability::VoteOnly(c) => c.linear_weights(),
        }
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        match self {
            Capability::Probabilistic(c) => c.feature_importances(),
            Capability::Margin(c) => c.feature_importances(),
            Capability::VoteOnly(c) => c.feature_importances(),
        }
    }

    pub fn sign_threshold(&self) -> f64 {
        match self {
            Capability::Probabilistic(c) => c.sign_threshold(),
            Capability::Margin(c) => c.sign_threshold(),
            Capability::VoteOnly(c) => c.sign_threshold(),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Fail with [`SpamLensError::DimensionMismatch`] unless `x` has `expected` entries
pub(crate) fn check_dimension(expected: usize, x: &FeatureVector) -> Result<()> {
    if x.len() != expected {
        return Err(SpamLensError::DimensionMismatch {
            expected,
            actual: x.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_helpers() {
        assert_eq!(Label::Spam.index(), 1);
        assert_eq!(Label::Ham.opposite(), Label::Spam);
        assert_eq!(Label::Spam.to_string(), "spam");
        assert_eq!(serde_json::to_string(&Label::Ham).unwrap(), "\"ham\"");
    }

    #[test]
    fn test_capability_delegates() {
        let model = LogisticModel::new(vec![2.0, -1.0], 0.0);
        let cap = Capability::Probabilistic(Arc::new(model));

        assert_eq!(cap.kind(), "probabilistic");
        assert_eq!(cap.n_features(), Some(2));
        assert!(cap.linear_weights().is_some());
        assert!(cap.feature_importances().is_none());
        assert_eq!(cap.predict(&ndarray::array![1.0, 0.0]).unwrap(), Label::Spam);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(2, &ndarray::array![1.0, 2.0]).is_ok());
        assert!(matches!(
            check_dimension(3, &ndarray::array![1.0]),
            Err(SpamLensError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }
}
