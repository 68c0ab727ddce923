//! Spam engine implementation
//!
//! One explicit context object owning everything a request needs:
//! - Immutable vectorizer and classifier pool, shared via `Arc`
//! - Consensus aggregation over the pool
//! - The explanation strategy chain
//! - A bounded preprocessing cache keyed by message hash

use crate::bundle::ModelBundle;
use crate::cache::{BoundedCache, CacheStats};
use crate::classifier::{Capability, ClassifierPool, PoolEvaluation, PoolMember};
use crate::config::{EngineConfig, ExplainerConfig};
use crate::consensus::{ConsensusAggregator, ConsensusResult, ExcludedClassifier};
use crate::error::{Result, SpamLensError};
use crate::explainability::{
    CoefficientExplainer, ExplanationBudget, ExplanationChain, ExplanationRequest,
    ExplanationResult, ExplanationSummarizer, KeywordExplainer, PerturbationExplainer,
};
use crate::vectorizer::{FeatureVector, TextPreprocessor, Vectorizer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

/// A message after cleaning and vectorization
#[derive(Debug, Clone)]
pub struct PreparedMessage {
    pub cleaned: String,
    pub features: FeatureVector,
}

/// Cache entry; the raw text guards against hash collisions
#[derive(Debug, Clone)]
struct CachedMessage {
    raw: Arc<str>,
    prepared: Arc<PreparedMessage>,
}

/// Engine counters snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub predictions: u64,
    pub explanations: u64,
    /// Explanations served by a strategy other than the first in the chain
    pub explanation_fallbacks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_size: usize,
}

/// Consensus spam classification with local explanations
pub struct SpamEngine {
    config: EngineConfig,
    preprocessor: TextPreprocessor,
    vectorizer: Arc<dyn Vectorizer>,
    pool: Arc<ClassifierPool>,
    aggregator: ConsensusAggregator,
    chain: ExplanationChain,
    targets: Vec<String>,
    cache: Option<BoundedCache<u64, CachedMessage>>,
    predictions: AtomicU64,
    explanations: AtomicU64,
    fallbacks: AtomicU64,
}

impl std::fmt::Debug for SpamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpamEngine")
            .field("classifiers", &self.pool.len())
            .field("n_features", &self.vectorizer.n_features())
            .field("explanation_targets", &self.targets)
            .field("strategies", &self.chain.strategy_names())
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

impl SpamEngine {
    /// Create an engine over a frozen vectorizer and classifier pool
    pub fn new(
        config: EngineConfig,
        vectorizer: Arc<dyn Vectorizer>,
        pool: ClassifierPool,
    ) -> Result<Self> {
        config.validate()?;

        let n_features = vectorizer.n_features();
        for member in pool.members() {
            if let Some(expected) = member.capability().n_features() {
                if expected != n_features {
                    warn!(
                        classifier = member.id(),
                        expected,
                        actual = n_features,
                        "Classifier width differs from vectorizer; it will be excluded at prediction time"
                    );
                }
            }
        }

        let targets = resolve_targets(&config.explainer, &pool)?;
        let target_ids: Vec<String> = targets.iter().map(|m| m.id().to_string()).collect();
        let chain = build_chain(&config, &vectorizer, targets);

        let cache = if config.cache.enabled {
            Some(BoundedCache::new(config.cache.capacity))
        } else {
            None
        };

        info!(
            classifiers = pool.len(),
            n_features,
            targets = ?target_ids,
            strategies = ?chain.strategy_names(),
            "Spam engine initialized"
        );

        Ok(Self {
            preprocessor: TextPreprocessor::new(config.preprocessing.clone()),
            aggregator: ConsensusAggregator::new(config.consensus.clone()),
            config,
            vectorizer,
            pool: Arc::new(pool),
            chain,
            targets: target_ids,
            cache,
            predictions: AtomicU64::new(0),
            explanations: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        })
    }

    /// Build an engine from a deserialized model bundle
    ///
    /// A bundle whose vocabulary is stemmed switches stemming on.
    pub fn from_bundle(bundle: &ModelBundle, mut config: EngineConfig) -> Result<Self> {
        if bundle.vectorizer.stemmed && !config.preprocessing.stem {
            info!("Bundle vocabulary is stemmed; enabling stop-word removal and stemming");
            config = config.with_stemming();
        }
        let vectorizer = bundle.build_vectorizer()?;
        let pool = bundle.build_pool(vectorizer.as_ref())?;
        Self::new(config, vectorizer, pool)
    }

    /// Load a JSON model bundle from disk and build an engine
    pub fn from_bundle_file<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let bundle = ModelBundle::from_file(path)?;
        Self::from_bundle(&bundle, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ClassifierPool> {
        &self.pool
    }

    pub fn vectorizer(&self) -> &Arc<dyn Vectorizer> {
        &self.vectorizer
    }

    /// Ids of the classifiers the explainer queries
    pub fn explanation_targets(&self) -> &[String] {
        &self.targets
    }

    /// Clean and vectorize a message, reusing a cached result when present
    pub fn preprocess(&self, message: &str) -> Result<Arc<PreparedMessage>> {
        let key = xxh3_64(message.as_bytes());

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get_where(&key, |c| c.raw.as_ref() == message) {
                return Ok(entry.prepared);
            }
        }

        let cleaned = self.preprocessor.clean(message);
        let features = self.vectorizer.transform(&cleaned)?;
        let prepared = Arc::new(PreparedMessage { cleaned, features });

        if let Some(cache) = &self.cache {
            cache.insert(
                key,
                CachedMessage {
                    raw: Arc::from(message),
                    prepared: Arc::clone(&prepared),
                },
            );
        }
        Ok(prepared)
    }

    /// Majority and weighted consensus of the pool for one message
    ///
    /// Never fails: classifiers that cannot run are listed as excluded, and a
    /// message no classifier can score yields an `unknown` verdict.
    pub fn predict_consensus(&self, message: &str) -> ConsensusResult {
        let start = Instant::now();

        let evaluation = match self.preprocess(message) {
            Ok(prepared) => self
                .pool
                .evaluate(&prepared.features, self.config.consensus.parallel),
            Err(e) => {
                warn!(error = %e, "Vectorization failed; no classifier can vote");
                self.exclude_all(&e)
            }
        };

        let pool = Arc::clone(&self.pool);
        let result = self.aggregator.aggregate(
            evaluation.results,
            evaluation.excluded,
            move |id| pool.weight_of(id),
        );

        self.predictions.fetch_add(1, Ordering::Relaxed);
        info!(
            verdict = %result.majority_verdict,
            weighted = %result.weighted_verdict,
            confidence = result.consensus_confidence,
            voters = result.total_voters,
            excluded = result.excluded.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Consensus prediction"
        );
        result
    }

    /// Token-level explanation of the designated classifiers' spam probability
    ///
    /// `num_features == 0` asks for the configured maximum. Never fails; when
    /// every model-based strategy fails the keyword table answers.
    pub fn explain(
        &self,
        message: &str,
        num_features: usize,
        budget: Option<ExplanationBudget>,
    ) -> ExplanationResult {
        self.explain_with_seed(message, num_features, budget, self.config.explainer.seed)
    }

    /// [`explain`](Self::explain) with an explicit sampling seed
    pub fn explain_with_seed(
        &self,
        message: &str,
        num_features: usize,
        budget: Option<ExplanationBudget>,
        seed: u64,
    ) -> ExplanationResult {
        let start = Instant::now();

        let cleaned = match self.preprocess(message) {
            Ok(prepared) => prepared.cleaned.clone(),
            Err(e) => {
                debug!(error = %e, "Vectorization failed; explaining from cleaned text only");
                self.preprocessor.clean(message)
            }
        };

        let max_features = self.config.explainer.max_features;
        let num_features = if num_features == 0 {
            max_features
        } else {
            num_features.min(max_features)
        };

        let surface = self.preprocessor.surface(message);
        let request = ExplanationRequest::new(&cleaned, num_features, budget.unwrap_or_default(), seed)
            .with_surface(&surface);
        let result = self.chain.run(&request);

        self.explanations.fetch_add(1, Ordering::Relaxed);
        if result.is_fallback() {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            method = %result.method,
            features = result.features.len(),
            quality = %result.quality.confidence_level,
            fallbacks = result.fallback_reasons.len(),
            samples = ?result.samples_used,
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Explanation generated"
        );
        result
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    pub fn stats(&self) -> EngineStats {
        let cache = self.cache_stats();
        EngineStats {
            predictions: self.predictions.load(Ordering::Relaxed),
            explanations: self.explanations.load(Ordering::Relaxed),
            explanation_fallbacks: self.fallbacks.load(Ordering::Relaxed),
            cache_hits: cache.map(|c| c.hits).unwrap_or(0),
            cache_misses: cache.map(|c| c.misses).unwrap_or(0),
            cache_size: cache.map(|c| c.size).unwrap_or(0),
        }
    }

    /// Release the engine, returning its final counters
    pub fn shutdown(self) -> EngineStats {
        let stats = self.stats();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        info!(
            predictions = stats.predictions,
            explanations = stats.explanations,
            fallbacks = stats.explanation_fallbacks,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            "Spam engine shut down"
        );
        stats
    }

    fn exclude_all(&self, error: &SpamLensError) -> PoolEvaluation {
        PoolEvaluation {
            results: Vec::new(),
            excluded: self
                .pool
                .members()
                .iter()
                .map(|m| ExcludedClassifier {
                    classifier_id: m.id().to_string(),
                    reason: error.to_string(),
                })
                .collect(),
        }
    }
}

/// Pool members whose spam probability the explainer reads
///
/// Configured ids win; otherwise the first probabilistic member, then the
/// first margin member, then the first member of any kind.
fn resolve_targets(config: &ExplainerConfig, pool: &ClassifierPool) -> Result<Vec<PoolMember>> {
    if !config.designated_classifiers.is_empty() {
        return config
            .designated_classifiers
            .iter()
            .map(|id| {
                pool.member(id).cloned().ok_or_else(|| {
                    SpamLensError::ConfigError(format!(
                        "Designated classifier '{}' is not in the pool",
                        id
                    ))
                })
            })
            .collect();
    }

    let members = pool.members();
    let pick = members
        .iter()
        .find(|m| matches!(m.capability(), Capability::Probabilistic(_)))
        .or_else(|| {
            members
                .iter()
                .find(|m| matches!(m.capability(), Capability::Margin(_)))
        })
        .or_else(|| members.first());

    Ok(pick.cloned().into_iter().collect())
}

fn build_chain(
    config: &EngineConfig,
    vectorizer: &Arc<dyn Vectorizer>,
    targets: Vec<PoolMember>,
) -> ExplanationChain {
    let summarizer = ExplanationSummarizer::new(config.summary.clone(), config.explainer.max_features);
    let mut chain =
        ExplanationChain::new(summarizer).with_combined_methods(config.explainer.combine_methods);

    if config.explainer.enable_perturbation {
        chain = chain.with_strategy(PerturbationExplainer::new(
            Arc::clone(vectorizer),
            targets.clone(),
            config.explainer.clone(),
        ));
    }

    chain
        .with_strategy(CoefficientExplainer::new(Arc::clone(vectorizer), targets))
        .with_strategy(KeywordExplainer::new())
}
