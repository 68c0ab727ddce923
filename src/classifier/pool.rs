//! Ordered, immutable collection of classifiers

use super::{Capability, Classifier, MarginClassifier, ProbabilisticClassifier};
use crate::calibration::{ConfidenceCalibrator, MarginCalibration};
use crate::consensus::{ClassifierResult, ExcludedClassifier};
use crate::error::{Result, SpamLensError};
use crate::vectorizer::FeatureVector;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// One classifier in the pool with its static quality weight
#[derive(Debug, Clone)]
pub struct PoolMember {
    id: String,
    weight: f64,
    capability: Capability,
    calibration: MarginCalibration,
}

impl PoolMember {
    pub fn new(id: impl Into<String>, weight: f64, capability: Capability) -> Self {
        Self {
            id: id.into(),
            weight,
            capability,
            calibration: MarginCalibration::default(),
        }
    }

    /// Attach Platt parameters used when this member only exposes a margin
    pub fn with_calibration(mut self, calibration: MarginCalibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Offline quality weight (e.g. F1) used by the weighted vote
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn calibration(&self) -> &MarginCalibration {
        &self.calibration
    }

    /// Spam probability for the explainer; margins go through this member's calibration
    pub fn spam_probability(&self, x: &FeatureVector) -> Result<f64> {
        match &self.capability {
            Capability::Probabilistic(c) => {
                let proba = c.predict_proba(x)?;
                ConfidenceCalibrator::check_probabilities(&self.id, &proba)?;
                Ok(proba[1])
            }
            Capability::Margin(_) => {
                let d = self.margin(x)?;
                Ok(self.calibration.spam_probability_clipped(d))
            }
            Capability::VoteOnly(_) => Err(SpamLensError::MissingCapability {
                classifier: self.id.clone(),
                capability: "predict_proba or decision_function",
            }),
        }
    }

    /// Decision margin of a margin member; non-finite margins are rejected
    pub fn margin(&self, x: &FeatureVector) -> Result<f64> {
        let Capability::Margin(c) = &self.capability else {
            return Err(SpamLensError::MissingCapability {
                classifier: self.id.clone(),
                capability: "decision_function",
            });
        };
        let margin = c.decision_function(x)?;
        if !margin.is_finite() {
            return Err(SpamLensError::ClassifierError {
                classifier: self.id.clone(),
                reason: format!("non-finite decision margin {}", margin),
            });
        }
        Ok(margin)
    }
}

/// Builder for [`ClassifierPool`]
#[derive(Debug, Default)]
pub struct PoolBuilder {
    members: Vec<PoolMember>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_probabilistic<C>(self, id: impl Into<String>, weight: f64, model: C) -> Self
    where
        C: ProbabilisticClassifier + 'static,
    {
        let model: Arc<dyn ProbabilisticClassifier> = Arc::new(model);
        self.add_member(PoolMember::new(id, weight, Capability::Probabilistic(model)))
    }

    pub fn add_margin<C>(self, id: impl Into<String>, weight: f64, model: C) -> Self
    where
        C: MarginClassifier + 'static,
    {
        self.add_margin_calibrated(id, weight, model, MarginCalibration::default())
    }

    pub fn add_margin_calibrated<C>(
        self,
        id: impl Into<String>,
        weight: f64,
        model: C,
        calibration: MarginCalibration,
    ) -> Self
    where
        C: MarginClassifier + 'static,
    {
        let model: Arc<dyn MarginClassifier> = Arc::new(model);
        self.add_member(
            PoolMember::new(id, weight, Capability::Margin(model)).with_calibration(calibration),
        )
    }

    pub fn add_vote_only<C>(self, id: impl Into<String>, weight: f64, model: C) -> Self
    where
        C: Classifier + 'static,
    {
        let model: Arc<dyn Classifier> = Arc::new(model);
        self.add_member(PoolMember::new(id, weight, Capability::VoteOnly(model)))
    }

    pub fn add_member(mut self, member: PoolMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn build(self) -> Result<ClassifierPool> {
        let mut seen = HashSet::new();
        for member in &self.members {
            if member.id.is_empty() {
                return Err(SpamLensError::ConfigError(
                    "Classifier ids must be non-empty".to_string(),
                ));
            }
            if !seen.insert(member.id.as_str()) {
                return Err(SpamLensError::ConfigError(format!(
                    "Duplicate classifier id '{}'",
                    member.id
                )));
            }
            if !(member.weight.is_finite() && member.weight >= 0.0) {
                return Err(SpamLensError::InvalidParameter {
                    name: format!("{}.weight", member.id),
                    value: member.weight.to_string(),
                    reason: "quality weights must be finite and non-negative".to_string(),
                });
            }
            if !member.calibration.is_finite() {
                return Err(SpamLensError::InvalidParameter {
                    name: format!("{}.calibration", member.id),
                    value: format!("{:?}", member.calibration),
                    reason: "Platt slope and offset must be finite".to_string(),
                });
            }
        }

        if self.members.is_empty() {
            warn!("Classifier pool is empty; every consensus will be unknown");
        }

        Ok(ClassifierPool {
            members: self.members,
        })
    }
}

/// Outcome of running every pool member on one feature vector
#[derive(Debug, Clone, Default)]
pub struct PoolEvaluation {
    pub results: Vec<ClassifierResult>,
    pub excluded: Vec<ExcludedClassifier>,
}

/// Fixed, ordered set of classifiers shared read-only by all requests
#[derive(Debug, Clone)]
pub struct ClassifierPool {
    members: Vec<PoolMember>,
}

impl ClassifierPool {
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    pub fn members(&self) -> &[PoolMember] {
        &self.members
    }

    pub fn member(&self, id: &str) -> Option<&PoolMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Quality weight of a member, zero for unknown ids
    pub fn weight_of(&self, id: &str) -> f64 {
        self.member(id).map(|m| m.weight).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Run every member on `x`, in pool order
    ///
    /// A member that fails is excluded and logged; it never aborts the others.
    pub fn evaluate(&self, x: &FeatureVector, parallel: bool) -> PoolEvaluation {
        let outcomes: Vec<Result<ClassifierResult>> = if parallel {
            self.members
                .par_iter()
                .map(|m| ConfidenceCalibrator::calibrate(m, x))
                .collect()
        } else {
            self.members
                .iter()
                .map(|m| ConfidenceCalibrator::calibrate(m, x))
                .collect()
        };

        let mut evaluation = PoolEvaluation::default();
        for (member, outcome) in self.members.iter().zip(outcomes) {
            match outcome {
                Ok(result) => evaluation.results.push(result),
                Err(e) => {
                    warn!(classifier = %member.id, error = %e, "Classifier excluded from consensus");
                    evaluation.excluded.push(ExcludedClassifier {
                        classifier_id: member.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{KeywordVoter, Label, LinearMarginModel, LogisticModel};
    use ndarray::array;

    fn sample_pool() -> ClassifierPool {
        ClassifierPool::builder()
            .add_probabilistic("logistic", 0.9, LogisticModel::new(vec![3.0, -3.0], 0.0))
            .add_margin("svm", 0.8, LinearMarginModel::new(vec![1.0, -1.0], 0.0))
            .add_vote_only("rules", 0.5, KeywordVoter::new(vec![0], 1, 2).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_capabilities_resolved_at_build() {
        let pool = sample_pool();
        let kinds: Vec<&str> = pool.members().iter().map(|m| m.capability().kind()).collect();
        assert_eq!(kinds, vec!["probabilistic", "margin", "vote_only"]);
        assert_eq!(pool.weight_of("svm"), 0.8);
        assert_eq!(pool.weight_of("missing"), 0.0);
    }

    #[test]
    fn test_evaluate_keeps_pool_order() {
        let pool = sample_pool();
        let eval = pool.evaluate(&array![1.0, 0.0], true);

        assert!(eval.excluded.is_empty());
        let ids: Vec<&str> = eval.results.iter().map(|r| r.classifier_id.as_str()).collect();
        assert_eq!(ids, vec!["logistic", "svm", "rules"]);
        assert!(eval.results.iter().all(|r| r.verdict == Label::Spam));
        assert!(eval.results[2].confidence.is_none());
    }

    #[test]
    fn test_failing_member_is_excluded() {
        let pool = ClassifierPool::builder()
            .add_probabilistic("good", 1.0, LogisticModel::new(vec![1.0, 1.0], 0.0))
            .add_probabilistic("wrong_width", 1.0, LogisticModel::new(vec![1.0], 0.0))
            .build()
            .unwrap();

        let eval = pool.evaluate(&array![1.0, 1.0], false);
        assert_eq!(eval.results.len(), 1);
        assert_eq!(eval.excluded.len(), 1);
        assert_eq!(eval.excluded[0].classifier_id, "wrong_width");
    }

    #[test]
    fn test_build_rejects_duplicates_and_bad_weights() {
        let dup = ClassifierPool::builder()
            .add_probabilistic("a", 1.0, LogisticModel::new(vec![1.0], 0.0))
            .add_probabilistic("a", 1.0, LogisticModel::new(vec![1.0], 0.0))
            .build();
        assert!(dup.is_err());

        let negative = ClassifierPool::builder()
            .add_probabilistic("a", -0.1, LogisticModel::new(vec![1.0], 0.0))
            .build();
        assert!(negative.is_err());

        let uncalibrated = ClassifierPool::builder()
            .add_margin_calibrated(
                "svm",
                1.0,
                LinearMarginModel::new(vec![1.0], 0.0),
                MarginCalibration::new(f64::NAN, 0.0),
            )
            .build();
        assert!(matches!(
            uncalibrated,
            Err(SpamLensError::InvalidParameter { ref name, .. }) if name == "svm.calibration"
        ));
    }

    struct UnboundedMargin;

    impl Classifier for UnboundedMargin {
        fn predict(&self, _x: &FeatureVector) -> Result<Label> {
            Ok(Label::Spam)
        }
    }

    impl MarginClassifier for UnboundedMargin {
        fn decision_function(&self, _x: &FeatureVector) -> Result<f64> {
            Ok(f64::NAN)
        }
    }

    #[test]
    fn test_non_finite_margin_is_a_classifier_error() {
        let member = PoolMember::new("svm", 1.0, Capability::Margin(Arc::new(UnboundedMargin)));
        let x = array![1.0];

        assert!(matches!(
            member.spam_probability(&x),
            Err(SpamLensError::ClassifierError { ref classifier, .. }) if classifier == "svm"
        ));

        let pool = ClassifierPool::builder()
            .add_member(member)
            .add_probabilistic("logistic", 1.0, LogisticModel::new(vec![1.0], 0.0))
            .build()
            .unwrap();
        let eval = pool.evaluate(&x, false);
        assert_eq!(eval.results.len(), 1);
        assert_eq!(eval.excluded[0].classifier_id, "svm");
    }

    #[test]
    fn test_spam_probability_by_capability() {
        let pool = sample_pool();
        let x = array![1.0, 0.0];

        let p = pool.member("logistic").unwrap().spam_probability(&x).unwrap();
        assert!(p > 0.9);
        let p = pool.member("svm").unwrap().spam_probability(&x).unwrap();
        assert!(p > 0.5 && p <= 0.99);
        assert!(matches!(
            pool.member("rules").unwrap().spam_probability(&x),
            Err(SpamLensError::MissingCapability { .. })
        ));
    }
}
