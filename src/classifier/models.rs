//! Frozen model implementations
//!
//! All models here are built from already-fitted parameters. None of them
//! can be refit; they only score feature vectors.

use super::{check_dimension, Classifier, Label, MarginClassifier, ProbabilisticClassifier};
use crate::calibration::sigmoid;
use crate::error::{Result, SpamLensError};
use crate::vectorizer::FeatureVector;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

fn ensure_finite(name: &str, values: &[f64]) -> Result<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SpamLensError::InvalidParameter {
            name: name.to_string(),
            value: "non-finite".to_string(),
            reason: "all parameters must be finite".to_string(),
        });
    }
    Ok(())
}

/// Logistic regression: `p_spam = sigmoid(w·x + b)`
#[derive(Debug, Clone)]
pub struct LogisticModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients: Array1::from_vec(coefficients),
            intercept,
        }
    }

    /// Like [`LogisticModel::new`] but rejects non-finite parameters
    pub fn try_new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        ensure_finite("logistic.coefficients", &coefficients)?;
        ensure_finite("logistic.intercept", &[intercept])?;
        Ok(Self::new(coefficients, intercept))
    }

    fn logit(&self, x: &FeatureVector) -> Result<f64> {
        check_dimension(self.coefficients.len(), x)?;
        Ok(self.coefficients.dot(x) + self.intercept)
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, x: &FeatureVector) -> Result<Label> {
        let [_, p_spam] = self.predict_proba(x)?;
        Ok(if p_spam >= 0.5 { Label::Spam } else { Label::Ham })
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn linear_weights(&self) -> Option<&Array1<f64>> {
        Some(&self.coefficients)
    }
}

impl ProbabilisticClassifier for LogisticModel {
    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2]> {
        let p_spam = sigmoid(self.logit(x)?);
        Ok([1.0 - p_spam, p_spam])
    }
}

/// Multinomial naive Bayes over term counts or TF-IDF weights
#[derive(Debug, Clone)]
pub struct MultinomialNaiveBayes {
    class_log_prior: [f64; 2],
    /// Row 0 is ham, row 1 is spam
    feature_log_prob: Array2<f64>,
    /// `log P(t|spam) - log P(t|ham)` per feature
    log_ratio: Array1<f64>,
}

impl MultinomialNaiveBayes {
    pub fn new(
        class_log_prior: [f64; 2],
        ham_log_prob: Vec<f64>,
        spam_log_prob: Vec<f64>,
    ) -> Result<Self> {
        if ham_log_prob.len() != spam_log_prob.len() {
            return Err(SpamLensError::DimensionMismatch {
                expected: ham_log_prob.len(),
                actual: spam_log_prob.len(),
            });
        }
        ensure_finite("naive_bayes.class_log_prior", &class_log_prior)?;
        ensure_finite("naive_bayes.ham_log_prob", &ham_log_prob)?;
        ensure_finite("naive_bayes.spam_log_prob", &spam_log_prob)?;

        let n = ham_log_prob.len();
        let mut data = ham_log_prob;
        data.extend(spam_log_prob);
        let feature_log_prob = Array2::from_shape_vec((2, n), data)?;
        let log_ratio = &feature_log_prob.row(1) - &feature_log_prob.row(0);

        Ok(Self {
            class_log_prior,
            feature_log_prob,
            log_ratio,
        })
    }

    fn joint_log_likelihood(&self, x: &FeatureVector) -> Result<[f64; 2]> {
        check_dimension(self.feature_log_prob.ncols(), x)?;
        Ok([
            self.class_log_prior[0] + self.feature_log_prob.row(0).dot(x),
            self.class_log_prior[1] + self.feature_log_prob.row(1).dot(x),
        ])
    }
}

impl Classifier for MultinomialNaiveBayes {
    fn predict(&self, x: &FeatureVector) -> Result<Label> {
        let [ham, spam] = self.joint_log_likelihood(x)?;
        Ok(if spam > ham { Label::Spam } else { Label::Ham })
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.feature_log_prob.ncols())
    }

    fn linear_weights(&self) -> Option<&Array1<f64>> {
        Some(&self.log_ratio)
    }
}

impl ProbabilisticClassifier for MultinomialNaiveBayes {
    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2]> {
        let [ham, spam] = self.joint_log_likelihood(x)?;
        // log-sum-exp
        let max = ham.max(spam);
        let p_ham = (ham - max).exp();
        let p_spam = (spam - max).exp();
        let total = p_ham + p_spam;
        Ok([p_ham / total, p_spam / total])
    }
}

/// Linear max-margin model (SVM style); exposes only `w·x + b`
#[derive(Debug, Clone)]
pub struct LinearMarginModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearMarginModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients: Array1::from_vec(coefficients),
            intercept,
        }
    }

    pub fn try_new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        ensure_finite("linear_margin.coefficients", &coefficients)?;
        ensure_finite("linear_margin.intercept", &[intercept])?;
        Ok(Self::new(coefficients, intercept))
    }
}

impl Classifier for LinearMarginModel {
    fn predict(&self, x: &FeatureVector) -> Result<Label> {
        let d = self.decision_function(x)?;
        Ok(if d > 0.0 { Label::Spam } else { Label::Ham })
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn linear_weights(&self) -> Option<&Array1<f64>> {
        Some(&self.coefficients)
    }
}

impl MarginClassifier for LinearMarginModel {
    fn decision_function(&self, x: &FeatureVector) -> Result<f64> {
        check_dimension(self.coefficients.len(), x)?;
        Ok(self.coefficients.dot(x) + self.intercept)
    }
}

/// One weighted threshold split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionStump {
    pub feature: usize,
    pub threshold: f64,
    /// Vote spam when the feature value is above the threshold (otherwise when at or below)
    #[serde(default = "default_true")]
    pub spam_above: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

impl DecisionStump {
    fn votes_spam(&self, x: &FeatureVector) -> bool {
        (x[self.feature] > self.threshold) == self.spam_above
    }
}

/// Weighted vote of decision stumps, a stand-in for boosted or bagged tree ensembles
///
/// Probabilities are the weighted fraction of stumps voting spam. Feature
/// importances are each feature's share of total stump weight, so they carry
/// no sign.
#[derive(Debug, Clone)]
pub struct StumpEnsemble {
    stumps: Vec<DecisionStump>,
    n_features: usize,
    total_weight: f64,
    importances: Array1<f64>,
    sign_threshold: f64,
}

impl StumpEnsemble {
    pub fn new(stumps: Vec<DecisionStump>, n_features: usize) -> Result<Self> {
        if stumps.is_empty() {
            return Err(SpamLensError::InvalidParameter {
                name: "stump_ensemble.stumps".to_string(),
                value: "[]".to_string(),
                reason: "at least one stump is required".to_string(),
            });
        }

        let mut importances = Array1::zeros(n_features);
        for stump in &stumps {
            if stump.feature >= n_features {
                return Err(SpamLensError::DimensionMismatch {
                    expected: n_features,
                    actual: stump.feature + 1,
                });
            }
            if !(stump.weight.is_finite() && stump.weight >= 0.0) || !stump.threshold.is_finite() {
                return Err(SpamLensError::InvalidParameter {
                    name: "stump_ensemble.stumps".to_string(),
                    value: format!("{:?}", stump),
                    reason: "weights must be finite and non-negative, thresholds finite".to_string(),
                });
            }
            importances[stump.feature] += stump.weight;
        }

        let total_weight: f64 = importances.sum();
        if total_weight <= 0.0 {
            return Err(SpamLensError::InvalidParameter {
                name: "stump_ensemble.stumps".to_string(),
                value: "0".to_string(),
                reason: "total stump weight must be positive".to_string(),
            });
        }
        importances.mapv_inplace(|w| w / total_weight);

        Ok(Self {
            stumps,
            n_features,
            total_weight,
            importances,
            sign_threshold: 0.5,
        })
    }

    pub fn with_sign_threshold(mut self, threshold: f64) -> Self {
        self.sign_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

impl Classifier for StumpEnsemble {
    fn predict(&self, x: &FeatureVector) -> Result<Label> {
        let [_, p_spam] = self.predict_proba(x)?;
        Ok(if p_spam >= 0.5 { Label::Spam } else { Label::Ham })
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn feature_importances(&self) -> Option<&Array1<f64>> {
        Some(&self.importances)
    }

    fn sign_threshold(&self) -> f64 {
        self.sign_threshold
    }
}

impl ProbabilisticClassifier for StumpEnsemble {
    fn predict_proba(&self, x: &FeatureVector) -> Result<[f64; 2]> {
        check_dimension(self.n_features, x)?;
        let spam_mass: f64 = self
            .stumps
            .iter()
            .filter(|s| s.votes_spam(x))
            .map(|s| s.weight)
            .sum();
        let p_spam = (spam_mass / self.total_weight).clamp(0.0, 1.0);
        Ok([1.0 - p_spam, p_spam])
    }
}

/// Rule voter: spam when enough keyword columns are non-zero
///
/// Has no probability or margin output, so it only ever contributes a vote.
#[derive(Debug, Clone)]
pub struct KeywordVoter {
    keyword_features: Vec<usize>,
    min_hits: usize,
    n_features: usize,
}

impl KeywordVoter {
    pub fn new(keyword_features: Vec<usize>, min_hits: usize, n_features: usize) -> Result<Self> {
        if let Some(&bad) = keyword_features.iter().find(|&&f| f >= n_features) {
            return Err(SpamLensError::DimensionMismatch {
                expected: n_features,
                actual: bad + 1,
            });
        }
        Ok(Self {
            keyword_features,
            min_hits: min_hits.max(1),
            n_features,
        })
    }
}

impl Classifier for KeywordVoter {
    fn predict(&self, x: &FeatureVector) -> Result<Label> {
        check_dimension(self.n_features, x)?;
        let hits = self
            .keyword_features
            .iter()
            .filter(|&&f| x[f] > 0.0)
            .count();
        Ok(if hits >= self.min_hits {
            Label::Spam
        } else {
            Label::Ham
        })
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }
}
