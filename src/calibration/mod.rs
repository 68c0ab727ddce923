//! Confidence calibration
//!
//! Normalizes each classifier's raw output into a confidence in `[0, 1]` for
//! the label it predicted:
//! - probabilistic classifiers report the probability mass of that label
//! - margin classifiers go through a logistic transform, clipped to `[0.01, 0.99]`
//! - vote-only classifiers report no confidence and are left out of weighting

mod platt;

pub use platt::{sigmoid, MarginCalibration, MARGIN_PROBABILITY_CEILING, MARGIN_PROBABILITY_FLOOR};

use crate::classifier::{Capability, PoolMember};
use crate::consensus::ClassifierResult;
use crate::error::{Result, SpamLensError};
use crate::vectorizer::FeatureVector;

/// Tolerance for probabilities that drift slightly outside `[0, 1]`
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Stateless calibrator; a pure function of (classifier, feature vector)
pub struct ConfidenceCalibrator;

impl ConfidenceCalibrator {
    /// Run one pool member and calibrate its confidence
    pub fn calibrate(member: &PoolMember, x: &FeatureVector) -> Result<ClassifierResult> {
        let capability = member.capability();
        let verdict = capability.predict(x)?;

        let confidence = match capability {
            Capability::Probabilistic(c) => {
                let proba = c.predict_proba(x)?;
                Self::check_probabilities(member.id(), &proba)?;
                Some(proba[verdict.index()].clamp(0.0, 1.0))
            }
            Capability::Margin(_) => {
                let margin = member.margin(x)?;
                let p_spam = member.calibration().spam_probability_clipped(margin);
                Some(if verdict.index() == 1 { p_spam } else { 1.0 - p_spam })
            }
            Capability::VoteOnly(_) => None,
        };

        Ok(ClassifierResult {
            classifier_id: member.id().to_string(),
            verdict,
            confidence,
        })
    }

    /// Reject non-finite or out-of-range probability pairs
    pub(crate) fn check_probabilities(classifier: &str, proba: &[f64; 2]) -> Result<()> {
        let in_range = |p: f64| {
            p.is_finite() && p >= -PROBABILITY_TOLERANCE && p <= 1.0 + PROBABILITY_TOLERANCE
        };
        if !(in_range(proba[0]) && in_range(proba[1])) {
            return Err(SpamLensError::CalibrationError(format!(
                "classifier '{}' returned invalid probabilities {:?}",
                classifier, proba
            )));
        }
        Ok(())
    }
}
