//! Engine configuration
//!
//! Every tunable of the engine lives here: consensus tie-breaking, the
//! perturbation sampling caps, summarizer thresholds and the preprocessing
//! cache. Configurations are plain serde structs, so they can be loaded from
//! JSON or built in code with the `with_*` builder methods.

use crate::classifier::Label;
use crate::error::{Result, SpamLensError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling on perturbation samples, regardless of configuration
pub const SAMPLE_CEILING: usize = 5000;

/// Hard ceiling on returned explanation features
pub const FEATURE_CEILING: usize = 50;

/// Feature-selection heuristic for the surrogate model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    /// Forward selection for small K, highest weights otherwise
    Auto,
    /// Greedy forward selection by weighted fit score
    Forward,
    /// Fit on all tokens, keep the K largest absolute coefficients
    HighestWeights,
    /// Fit on all tokens
    None,
}

/// Consensus aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Label that wins a tied majority vote
    pub tie_break: Label,
    /// Tolerance under which weighted spam and ham masses count as equal
    pub mass_epsilon: f64,
    /// Evaluate pool members on the rayon pool
    pub parallel: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            tie_break: Label::Ham,
            mass_epsilon: 1e-12,
            parallel: true,
        }
    }
}

/// Local explainer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Run the perturbation strategy at all
    pub enable_perturbation: bool,
    /// Perturbed samples drawn per explanation
    pub num_samples: usize,
    /// Upper bound on samples, applied after caller budgets
    pub max_samples: usize,
    /// Minimum completed samples for the surrogate fit to be trusted
    pub min_samples: usize,
    /// Upper bound on returned features
    pub max_features: usize,
    /// Proximity kernel width, in units of masked-token fraction
    pub kernel_width: f64,
    /// Ridge penalty on surrogate coefficients
    pub ridge_alpha: f64,
    /// Feature-selection heuristic
    pub feature_selection: FeatureSelection,
    /// Default RNG seed
    pub seed: u64,
    /// Samples evaluated per parallel batch; budgets are checked between batches
    pub chunk_size: usize,
    /// Pool members whose probabilities are explained; empty picks one automatically
    pub designated_classifiers: Vec<String>,
    /// Merge perturbation and coefficient explanations when both succeed
    pub combine_methods: bool,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            enable_perturbation: true,
            num_samples: 300,
            max_samples: 500,
            min_samples: 25,
            max_features: 10,
            kernel_width: 0.25,
            ridge_alpha: 0.01,
            feature_selection: FeatureSelection::Auto,
            seed: 42,
            chunk_size: 32,
            designated_classifiers: Vec::new(),
            combine_methods: false,
        }
    }
}

/// Summarizer thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Total importance at or above which quality is high
    pub high_threshold: f64,
    /// Total importance at or above which quality is medium
    pub medium_threshold: f64,
    /// Tokens named per side in the synopsis
    pub tokens_per_side: usize,
    /// Ratio to the strongest feature above which a feature is strong
    pub strong_ratio: f64,
    /// Ratio to the strongest feature above which a feature is moderate
    pub moderate_ratio: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.5,
            medium_threshold: 0.15,
            tokens_per_side: 3,
            strong_ratio: 0.7,
            moderate_ratio: 0.3,
        }
    }
}

/// Preprocessing cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached messages
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
        }
    }
}

/// Text preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub lowercase: bool,
    /// Replace everything but ASCII letters, digits and whitespace with spaces
    pub strip_symbols: bool,
    /// Drop NLTK's English stop words
    pub remove_stop_words: bool,
    /// Reduce words to their Porter (Snowball English) stem
    pub stem: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            strip_symbols: true,
            remove_stop_words: false,
            stem: false,
        }
    }
}

impl PreprocessingConfig {
    /// Stop-word removal plus stemming, for bundles fitted on stemmed text
    pub fn stemmed() -> Self {
        Self {
            remove_stop_words: true,
            stem: true,
            ..Self::default()
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub consensus: ConsensusConfig,
    pub explainer: ExplainerConfig,
    pub summary: SummaryConfig,
    pub cache: CacheConfig,
    pub preprocessing: PreprocessingConfig,
}

impl EngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Builder method to set the majority tie-break label
    pub fn with_tie_break(mut self, label: Label) -> Self {
        self.consensus.tie_break = label;
        self
    }

    /// Builder method to set the number of perturbation samples
    pub fn with_num_samples(mut self, n: usize) -> Self {
        self.explainer.num_samples = n;
        self
    }

    /// Builder method to set the sample cap
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.explainer.max_samples = n;
        self
    }

    /// Builder method to set the feature cap
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.explainer.max_features = n;
        self
    }

    /// Builder method to set the explainer seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.explainer.seed = seed;
        self
    }

    /// Builder method to pick the classifiers the explainer queries
    pub fn with_designated_classifiers<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.explainer.designated_classifiers = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the feature-selection heuristic
    pub fn with_feature_selection(mut self, selection: FeatureSelection) -> Self {
        self.explainer.feature_selection = selection;
        self
    }

    /// Builder method to merge perturbation and coefficient explanations
    pub fn with_combined_methods(mut self) -> Self {
        self.explainer.combine_methods = true;
        self
    }

    /// Builder method to disable the perturbation strategy
    pub fn without_perturbation(mut self) -> Self {
        self.explainer.enable_perturbation = false;
        self
    }

    /// Builder method to size the preprocessing cache
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.enabled = capacity > 0;
        self.cache.capacity = capacity;
        self
    }

    /// Builder method to match a vocabulary built from stemmed, stop-word-free text
    pub fn with_stemming(mut self) -> Self {
        self.preprocessing.remove_stop_words = true;
        self.preprocessing.stem = true;
        self
    }

    /// Builder method to run pool evaluation sequentially
    pub fn sequential(mut self) -> Self {
        self.consensus.parallel = false;
        self
    }

    /// Check ranges and cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let e = &self.explainer;
        if e.num_samples == 0 {
            return Err(invalid("explainer.num_samples", e.num_samples, "must be positive"));
        }
        if e.max_samples == 0 || e.max_samples > SAMPLE_CEILING {
            return Err(invalid(
                "explainer.max_samples",
                e.max_samples,
                &format!("must be in 1..={}", SAMPLE_CEILING),
            ));
        }
        if e.max_features == 0 || e.max_features > FEATURE_CEILING {
            return Err(invalid(
                "explainer.max_features",
                e.max_features,
                &format!("must be in 1..={}", FEATURE_CEILING),
            ));
        }
        if !(e.kernel_width.is_finite() && e.kernel_width > 0.0) {
            return Err(invalid("explainer.kernel_width", e.kernel_width, "must be positive"));
        }
        if !(e.ridge_alpha.is_finite() && e.ridge_alpha >= 0.0) {
            return Err(invalid("explainer.ridge_alpha", e.ridge_alpha, "must be non-negative"));
        }
        if e.chunk_size == 0 {
            return Err(invalid("explainer.chunk_size", e.chunk_size, "must be positive"));
        }
        if e.min_samples > e.num_samples.min(e.max_samples) {
            return Err(SpamLensError::ConfigError(format!(
                "explainer.min_samples ({}) exceeds the samples drawn (num_samples {}, max_samples {})",
                e.min_samples, e.num_samples, e.max_samples
            )));
        }

        let s = &self.summary;
        if s.medium_threshold < 0.0 || s.high_threshold < s.medium_threshold {
            return Err(SpamLensError::ConfigError(format!(
                "summary thresholds must satisfy 0 <= medium ({}) <= high ({})",
                s.medium_threshold, s.high_threshold
            )));
        }
        if !(0.0..=1.0).contains(&s.moderate_ratio)
            || !(0.0..=1.0).contains(&s.strong_ratio)
            || s.strong_ratio < s.moderate_ratio
        {
            return Err(SpamLensError::ConfigError(format!(
                "strength ratios must satisfy 0 <= moderate ({}) <= strong ({}) <= 1",
                s.moderate_ratio, s.strong_ratio
            )));
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", 0, "must be positive when the cache is enabled"));
        }
        if !(self.consensus.mass_epsilon >= 0.0) {
            return Err(invalid(
                "consensus.mass_epsilon",
                self.consensus.mass_epsilon,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

fn invalid<V: ToString>(name: &str, value: V, reason: &str) -> SpamLensError {
    SpamLensError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
