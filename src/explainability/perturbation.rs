//! Perturbation-based local explanations
//!
//! Masks random subsets of the message's distinct tokens, asks the target
//! classifiers for the spam probability of every variant and fits a
//! proximity-weighted linear surrogate on token-presence indicators. The
//! surrogate's coefficients are the token attributions.

use super::chain::{ExplanationRequest, ExplanationStrategy, StrategyOutput};
use super::surrogate::{kernel_weight, WeightedRidge};
use super::types::{Attribution, ExplanationMethod, NEGLIGIBLE_WEIGHT};
use crate::classifier::{Capability, PoolMember};
use crate::config::{ExplainerConfig, SAMPLE_CEILING};
use crate::error::{Result, SpamLensError};
use crate::vectorizer::{FeatureVector, Vectorizer};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Placeholder substituted for masked tokens
pub const MASK_TOKEN: &str = "UNKWORDZ";

/// Message split into positions and distinct tokens
#[derive(Debug, Clone)]
struct TokenLayout {
    /// Distinct tokens, in order of first appearance
    distinct: Vec<String>,
    /// Distinct-token index of every position
    positions: Vec<usize>,
}

impl TokenLayout {
    fn new(cleaned: &str) -> Self {
        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut distinct: Vec<String> = Vec::new();
        let mut positions = Vec::new();
        for word in cleaned.split_whitespace() {
            let id = *ids.entry(word).or_insert_with(|| {
                distinct.push(word.to_string());
                distinct.len() - 1
            });
            positions.push(id);
        }
        Self { distinct, positions }
    }

    /// Render the message with every token whose `present` flag is false masked
    fn render(&self, present: &[bool]) -> String {
        let words: Vec<&str> = self
            .positions
            .iter()
            .map(|&id| {
                if present[id] {
                    self.distinct[id].as_str()
                } else {
                    MASK_TOKEN
                }
            })
            .collect();
        words.join(" ")
    }
}

/// Local explainer over one or more designated pool members
pub struct PerturbationExplainer {
    vectorizer: Arc<dyn Vectorizer>,
    targets: Vec<PoolMember>,
    config: ExplainerConfig,
}

impl PerturbationExplainer {
    /// `targets` are averaged; an empty list makes every request fail over
    pub fn new(
        vectorizer: Arc<dyn Vectorizer>,
        targets: Vec<PoolMember>,
        config: ExplainerConfig,
    ) -> Self {
        Self {
            vectorizer,
            targets,
            config,
        }
    }

    pub fn targets(&self) -> &[PoolMember] {
        &self.targets
    }

    /// Explain `request.cleaned`
    pub fn explain_message(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput> {
        self.check_targets()?;

        let layout = TokenLayout::new(request.cleaned);
        let d = layout.distinct.len();
        if d == 0 {
            return Err(SpamLensError::EmptyMessage);
        }

        let k = request.num_features.min(d).max(1);
        let required = self.config.min_samples.max(k + 2);
        let n_samples = self.sample_count(request);
        if n_samples < required {
            return Err(SpamLensError::InsufficientSamples {
                completed: 0,
                required,
            });
        }

        let masks = Self::sample_masks(d, n_samples, request.seed);
        let (targets, budget_hit) = self.evaluate_masks(&layout, &masks, request)?;
        let completed = targets.len();

        if completed < required {
            return Err(if budget_hit {
                SpamLensError::BudgetExceeded { completed, required }
            } else {
                SpamLensError::InsufficientSamples { completed, required }
            });
        }
        if budget_hit {
            info!(completed, requested = n_samples, "Time budget hit; fitting on completed samples");
        }

        let mut z = Array2::<f64>::zeros((completed, d));
        let mut weights = Array1::<f64>::zeros(completed);
        for (i, mask) in masks.iter().take(completed).enumerate() {
            let mut masked = 0usize;
            for (j, &present) in mask.iter().enumerate() {
                if present {
                    z[[i, j]] = 1.0;
                } else {
                    masked += 1;
                }
            }
            weights[i] = kernel_weight(masked as f64 / d as f64, self.config.kernel_width);
        }
        let y = Array1::from_vec(targets);

        let ridge = WeightedRidge::new(self.config.ridge_alpha);
        let columns = ridge.select(&z, &y, &weights, k, self.config.feature_selection)?;
        let fit = ridge.fit(&z, &y, &weights, &columns)?;

        debug!(
            tokens = d,
            selected = columns.len(),
            samples = completed,
            score = fit.score,
            "Surrogate fitted"
        );

        if !fit
            .coefficients
            .iter()
            .any(|c| c.is_finite() && c.abs() >= NEGLIGIBLE_WEIGHT)
        {
            return Err(SpamLensError::ExplanationError(format!(
                "Surrogate found no influential token among {} candidates",
                d
            )));
        }

        let attributions = columns
            .iter()
            .zip(fit.coefficients.iter())
            .map(|(&col, &coef)| {
                Attribution::new(
                    layout.distinct[col].clone(),
                    coef,
                    ExplanationMethod::Perturbation,
                )
            })
            .collect();

        Ok(StrategyOutput::new(ExplanationMethod::Perturbation, attributions)
            .with_samples_used(completed))
    }

    fn check_targets(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(SpamLensError::ClassifierUnavailable(
                "No classifier designated for explanation".to_string(),
            ));
        }
        for member in &self.targets {
            if let Capability::VoteOnly(_) = member.capability() {
                return Err(SpamLensError::MissingCapability {
                    classifier: member.id().to_string(),
                    capability: "predict_proba or decision_function",
                });
            }
        }
        Ok(())
    }

    fn sample_count(&self, request: &ExplanationRequest<'_>) -> usize {
        let mut n = self.config.num_samples.min(self.config.max_samples).min(SAMPLE_CEILING);
        if let Some(cap) = request.budget.max_samples {
            n = n.min(cap);
        }
        n
    }

    /// Presence masks; mask 0 keeps every token
    fn sample_masks(d: usize, n_samples: usize, seed: u64) -> Vec<Vec<bool>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut masks = Vec::with_capacity(n_samples);
        if n_samples == 0 {
            return masks;
        }
        masks.push(vec![true; d]);
        for _ in 1..n_samples {
            let n_masked = rng.gen_range(1..=d);
            let mut mask = vec![true; d];
            for j in index::sample(&mut rng, d, n_masked).into_iter() {
                mask[j] = false;
            }
            masks.push(mask);
        }
        masks
    }

    /// Spam probabilities of the masked variants, in mask order
    ///
    /// Returns early at a chunk boundary once the time budget is spent; the
    /// flag reports whether that happened.
    fn evaluate_masks(
        &self,
        layout: &TokenLayout,
        masks: &[Vec<bool>],
        request: &ExplanationRequest<'_>,
    ) -> Result<(Vec<f64>, bool)> {
        let start = Instant::now();
        let deadline = request
            .budget
            .max_time_ms
            .map(|ms| start + Duration::from_millis(ms));
        let chunk_size = self.config.chunk_size.max(1);

        let mut targets = Vec::with_capacity(masks.len());
        for chunk in masks.chunks(chunk_size) {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok((targets, true));
                }
            }
            let probs: Vec<f64> = chunk
                .par_iter()
                .map(|mask| {
                    let text = layout.render(mask);
                    let x = self.vectorizer.transform(&text)?;
                    self.spam_probability(&x)
                })
                .collect::<Result<Vec<f64>>>()?;
            targets.extend(probs);
        }
        Ok((targets, false))
    }

    /// Mean spam probability across the targets
    fn spam_probability(&self, x: &FeatureVector) -> Result<f64> {
        let mut total = 0.0;
        for member in &self.targets {
            total += member.spam_probability(x)?;
        }
        Ok(total / self.targets.len() as f64)
    }
}

impl ExplanationStrategy for PerturbationExplainer {
    fn name(&self) -> &'static str {
        "perturbation"
    }

    fn explain(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput> {
        self.explain_message(request)
    }
}
