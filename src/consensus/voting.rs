//! Majority and quality-weighted voting

use super::{ClassifierResult, ConsensusResult, ExcludedClassifier, Verdict, WeightedVerdict};
use crate::classifier::Label;
use crate::config::ConsensusConfig;
use tracing::debug;

/// Aggregates per-classifier results into a [`ConsensusResult`]
#[derive(Debug, Clone, Default)]
pub struct ConsensusAggregator {
    config: ConsensusConfig,
}

impl ConsensusAggregator {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    /// Label that wins a tied majority vote
    pub fn tie_break(&self) -> Label {
        self.config.tie_break
    }

    /// Aggregate `results`; `weight_of` maps a classifier id to its quality weight
    pub fn aggregate<W>(
        &self,
        results: Vec<ClassifierResult>,
        excluded: Vec<ExcludedClassifier>,
        weight_of: W,
    ) -> ConsensusResult
    where
        W: Fn(&str) -> f64,
    {
        let total_voters = results.len();
        let spam_votes = results.iter().filter(|r| r.verdict == Label::Spam).count();
        let ham_votes = total_voters - spam_votes;

        let (spam_mass, ham_mass) = self.weighted_masses(&results, &weight_of);
        let weighted_verdict = self.weighted_verdict(spam_mass, ham_mass);

        if total_voters == 0 {
            debug!(excluded = excluded.len(), "No voters; consensus is unknown");
            return ConsensusResult {
                majority_verdict: Verdict::Unknown,
                majority_count: 0,
                total_voters: 0,
                spam_votes: 0,
                ham_votes: 0,
                agreement_fraction: 0.0,
                weighted_verdict,
                spam_mass,
                ham_mass,
                mean_majority_confidence: 0.0,
                consensus_confidence: 0.0,
                per_classifier: results,
                excluded,
            };
        }

        let majority = if spam_votes > ham_votes {
            Label::Spam
        } else if ham_votes > spam_votes {
            Label::Ham
        } else {
            self.config.tie_break
        };
        let majority_count = spam_votes.max(ham_votes);
        let agreement_fraction = majority_count as f64 / total_voters as f64;

        let majority_confidences: Vec<f64> = results
            .iter()
            .filter(|r| r.verdict == majority)
            .filter_map(|r| r.confidence)
            .collect();
        let mean_majority_confidence = if majority_confidences.is_empty() {
            0.0
        } else {
            majority_confidences.iter().sum::<f64>() / majority_confidences.len() as f64
        };

        let consensus_confidence =
            Self::consensus_confidence(agreement_fraction, mean_majority_confidence);

        debug!(
            majority = %majority,
            majority_count,
            total_voters,
            weighted = %weighted_verdict,
            confidence = consensus_confidence,
            "Consensus computed"
        );

        ConsensusResult {
            majority_verdict: Verdict::from(majority),
            majority_count,
            total_voters,
            spam_votes,
            ham_votes,
            agreement_fraction,
            weighted_verdict,
            spam_mass,
            ham_mass,
            mean_majority_confidence,
            consensus_confidence,
            per_classifier: results,
            excluded,
        }
    }

    /// `agreement × mean confidence` as a percentage, rounded to one decimal
    ///
    /// Never exceeds `mean_confidence × 100`; rounding is capped at that bound.
    pub fn consensus_confidence(agreement_fraction: f64, mean_confidence: f64) -> f64 {
        let agreement = agreement_fraction.clamp(0.0, 1.0);
        let mean = mean_confidence.clamp(0.0, 1.0);
        let raw = agreement * mean * 100.0;
        let rounded = (raw * 10.0).round() / 10.0;
        rounded.min(mean * 100.0).clamp(0.0, 100.0)
    }

    fn weighted_masses<W>(&self, results: &[ClassifierResult], weight_of: &W) -> (f64, f64)
    where
        W: Fn(&str) -> f64,
    {
        let mut spam_mass = 0.0;
        let mut ham_mass = 0.0;
        for result in results {
            if let Some(confidence) = result.confidence {
                let contribution = weight_of(&result.classifier_id) * confidence;
                match result.verdict {
                    Label::Spam => spam_mass += contribution,
                    Label::Ham => ham_mass += contribution,
                }
            }
        }
        (spam_mass, ham_mass)
    }

    fn weighted_verdict(&self, spam_mass: f64, ham_mass: f64) -> WeightedVerdict {
        if (spam_mass - ham_mass).abs() <= self.config.mass_epsilon {
            WeightedVerdict::Undetermined
        } else if spam_mass > ham_mass {
            WeightedVerdict::Spam
        } else {
            WeightedVerdict::Ham
        }
    }
}
