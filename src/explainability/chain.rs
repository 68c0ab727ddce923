//! Ordered chain of explanation strategies

use super::summary::ExplanationSummarizer;
use super::types::{Attribution, ExplanationBudget, ExplanationMethod, ExplanationResult, FallbackReason};
use crate::error::Result;
use tracing::{debug, warn};

/// Inputs shared by every strategy for one explanation request
#[derive(Debug, Clone, Copy)]
pub struct ExplanationRequest<'a> {
    /// Preprocessed message text, as the vectorizer sees it
    pub cleaned: &'a str,
    /// Lowercased, symbol-free text with every word kept
    pub surface: &'a str,
    pub num_features: usize,
    pub budget: ExplanationBudget,
    pub seed: u64,
}

impl<'a> ExplanationRequest<'a> {
    pub fn new(cleaned: &'a str, num_features: usize, budget: ExplanationBudget, seed: u64) -> Self {
        Self {
            cleaned,
            surface: cleaned,
            num_features,
            budget,
            seed,
        }
    }

    /// Set the surface text; defaults to `cleaned`
    pub fn with_surface(mut self, surface: &'a str) -> Self {
        self.surface = surface;
        self
    }
}

/// Attributions produced by one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub method: ExplanationMethod,
    pub attributions: Vec<Attribution>,
    pub samples_used: Option<usize>,
}

impl StrategyOutput {
    pub fn new(method: ExplanationMethod, attributions: Vec<Attribution>) -> Self {
        Self {
            method,
            attributions,
            samples_used: None,
        }
    }

    pub fn with_samples_used(mut self, samples: usize) -> Self {
        self.samples_used = Some(samples);
        self
    }

    /// Merge two outputs by token; shared tokens get the mean weight
    pub fn combine(self, other: StrategyOutput) -> StrategyOutput {
        let mut merged: Vec<(Attribution, usize)> =
            self.attributions.into_iter().map(|a| (a, 1)).collect();

        for attribution in other.attributions {
            match merged.iter_mut().find(|(a, _)| a.token == attribution.token) {
                Some((existing, count)) => {
                    existing.weight += attribution.weight;
                    for method in attribution.methods {
                        if !existing.methods.contains(&method) {
                            existing.methods.push(method);
                        }
                    }
                    *count += 1;
                }
                None => merged.push((attribution, 1)),
            }
        }

        let attributions = merged
            .into_iter()
            .map(|(mut a, count)| {
                a.weight /= count as f64;
                a
            })
            .collect();

        StrategyOutput {
            method: ExplanationMethod::Combined,
            attributions,
            samples_used: self.samples_used.or(other.samples_used),
        }
    }
}

/// One way of attributing a spam probability to tokens
pub trait ExplanationStrategy: Send + Sync {
    /// Stable name used in fallback reasons and logs
    fn name(&self) -> &'static str;

    fn explain(&self, request: &ExplanationRequest<'_>) -> Result<StrategyOutput>;

    /// Always succeeds; never combined with another strategy
    fn is_last_resort(&self) -> bool {
        false
    }
}

/// Strategies tried in order until one succeeds
pub struct ExplanationChain {
    strategies: Vec<Box<dyn ExplanationStrategy>>,
    summarizer: ExplanationSummarizer,
    combine_methods: bool,
}

impl ExplanationChain {
    pub fn new(summarizer: ExplanationSummarizer) -> Self {
        Self {
            strategies: Vec::new(),
            summarizer,
            combine_methods: false,
        }
    }

    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ExplanationStrategy + 'static,
    {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Merge the first success with the next successful non-last-resort strategy
    pub fn with_combined_methods(mut self, combine: bool) -> Self {
        self.combine_methods = combine;
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn summarizer(&self) -> &ExplanationSummarizer {
        &self.summarizer
    }

    pub fn run(&self, request: &ExplanationRequest<'_>) -> ExplanationResult {
        let mut reasons: Vec<FallbackReason> = Vec::new();
        let mut primary: Option<StrategyOutput> = None;

        for strategy in &self.strategies {
            if primary.is_some() && (!self.combine_methods || strategy.is_last_resort()) {
                break;
            }

            match strategy.explain(request) {
                Ok(output) => {
                    debug!(
                        strategy = strategy.name(),
                        attributions = output.attributions.len(),
                        "Explanation strategy succeeded"
                    );
                    match primary.take() {
                        Some(first) => {
                            primary = Some(first.combine(output));
                            break;
                        }
                        None => primary = Some(output),
                    }
                }
                Err(e) if primary.is_none() => {
                    warn!(strategy = strategy.name(), error = %e, "Explanation strategy failed; falling back");
                    reasons.push(FallbackReason::from_error(strategy.name(), &e));
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "No second method to combine");
                }
            }
        }

        match primary {
            Some(output) => self.summarizer.summarize(output, request.num_features, reasons),
            None => ExplanationResult::unavailable(reasons),
        }
    }
}
