//! Consensus over the classifier pool
//!
//! Turns one [`ClassifierResult`] per pool member into a single verdict:
//! - a majority vote with a fixed, configurable tie-break label
//! - a quality-weighted vote that reports `undetermined` on equal masses
//! - an agreement-discounted consensus confidence

mod voting;

pub use voting::ConsensusAggregator;

use crate::classifier::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One classifier's calibrated vote for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResult {
    pub classifier_id: String,
    pub verdict: Label,
    /// Confidence in `verdict`; `None` when the classifier exposes no score
    pub confidence: Option<f64>,
}

/// A pool member that could not vote on a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedClassifier {
    pub classifier_id: String,
    pub reason: String,
}

/// Majority verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Spam,
    Ham,
    /// No classifier produced a vote
    Unknown,
}

impl From<Label> for Verdict {
    fn from(label: Label) -> Self {
        match label {
            Label::Spam => Verdict::Spam,
            Label::Ham => Verdict::Ham,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Spam => "spam",
            Verdict::Ham => "ham",
            Verdict::Unknown => "unknown",
        })
    }
}

/// Quality-weighted verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightedVerdict {
    Spam,
    Ham,
    /// Spam and ham masses are equal (including both zero)
    Undetermined,
}

impl fmt::Display for WeightedVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WeightedVerdict::Spam => "spam",
            WeightedVerdict::Ham => "ham",
            WeightedVerdict::Undetermined => "undetermined",
        })
    }
}

/// Combined verdict for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub majority_verdict: Verdict,
    pub majority_count: usize,
    pub total_voters: usize,
    pub spam_votes: usize,
    pub ham_votes: usize,
    /// `majority_count / total_voters`, zero without voters
    pub agreement_fraction: f64,
    pub weighted_verdict: WeightedVerdict,
    pub spam_mass: f64,
    pub ham_mass: f64,
    /// Mean confidence of majority voters that reported one, in `[0, 1]`
    pub mean_majority_confidence: f64,
    /// Agreement-discounted confidence as a percentage in `[0, 100]`
    pub consensus_confidence: f64,
    pub per_classifier: Vec<ClassifierResult>,
    pub excluded: Vec<ExcludedClassifier>,
}

impl ConsensusResult {
    /// `true` when no classifier voted
    pub fn is_unknown(&self) -> bool {
        self.majority_verdict == Verdict::Unknown
    }

    pub fn dissenting_count(&self) -> usize {
        self.total_voters - self.majority_count
    }
}
