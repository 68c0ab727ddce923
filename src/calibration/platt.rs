//! Logistic (Platt) calibration of decision margins

use serde::{Deserialize, Serialize};

/// Lowest confidence reported for a margin-only classifier
pub const MARGIN_PROBABILITY_FLOOR: f64 = 0.01;

/// Highest confidence reported for a margin-only classifier
pub const MARGIN_PROBABILITY_CEILING: f64 = 0.99;

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Platt parameters mapping a margin `d` to `P(spam) = sigmoid(slope * d + offset)`
///
/// The default (`slope = 1`, `offset = 0`) is the plain logistic transform.
/// Margins are uncalibrated, so reported probabilities are clipped to
/// `[0.01, 0.99]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginCalibration {
    pub slope: f64,
    pub offset: f64,
}

impl Default for MarginCalibration {
    fn default() -> Self {
        Self {
            slope: 1.0,
            offset: 0.0,
        }
    }
}

impl MarginCalibration {
    pub fn new(slope: f64, offset: f64) -> Self {
        Self { slope, offset }
    }

    /// Both parameters are finite
    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.offset.is_finite()
    }

    /// Unclipped spam probability
    pub fn spam_probability(&self, margin: f64) -> f64 {
        sigmoid(self.slope * margin + self.offset)
    }

    /// Spam probability clipped to the margin confidence range
    pub fn spam_probability_clipped(&self, margin: f64) -> f64 {
        self.spam_probability(margin)
            .clamp(MARGIN_PROBABILITY_FLOOR, MARGIN_PROBABILITY_CEILING)
    }
}
