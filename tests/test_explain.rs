//! Integration tests for local explanations and the fallback chain

use spamlens::classifier::{ClassifierPool, KeywordVoter, LogisticModel};
use spamlens::config::{EngineConfig, FeatureSelection};
use spamlens::engine::SpamEngine;
use spamlens::error::{Result, SpamLensError};
use spamlens::explainability::{
    ExplanationBudget, ExplanationMethod, ReasonCode, Strength,
};
use spamlens::vectorizer::{FeatureVector, TfidfVectorizer, Vectorizer};
use spamlens::classifier::Label;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const VOCAB: [&str; 8] = [
    "free", "prize", "claim", "winner", "meeting", "tomorrow", "lunch", "thanks",
];

fn vectorizer() -> Arc<dyn Vectorizer> {
    Arc::new(TfidfVectorizer::from_vocabulary(VOCAB).unwrap())
}

fn logistic() -> LogisticModel {
    LogisticModel::new(vec![2.2, 2.0, 1.6, 1.8, -1.8, -1.2, -1.0, -1.4], -0.3)
}

fn engine(config: EngineConfig) -> SpamEngine {
    let pool = ClassifierPool::builder()
        .add_probabilistic("logistic", 0.92, logistic())
        .build()
        .unwrap();
    SpamEngine::new(config, vectorizer(), pool).unwrap()
}

/// Vectorizer whose every call fails
struct BrokenVectorizer;

impl Vectorizer for BrokenVectorizer {
    fn transform(&self, _text: &str) -> Result<FeatureVector> {
        Err(SpamLensError::VectorizerError("vocabulary file missing".to_string()))
    }

    fn n_features(&self) -> usize {
        0
    }

    fn feature_index(&self, _term: &str) -> Option<usize> {
        None
    }

    fn feature_name(&self, _index: usize) -> Option<&str> {
        None
    }
}

/// Vocabulary vectorizer that takes a while per message
struct SlowVectorizer {
    inner: TfidfVectorizer,
    delay: Duration,
}

impl Vectorizer for SlowVectorizer {
    fn transform(&self, text: &str) -> Result<FeatureVector> {
        thread::sleep(self.delay);
        self.inner.transform(text)
    }

    fn n_features(&self) -> usize {
        self.inner.n_features()
    }

    fn feature_index(&self, term: &str) -> Option<usize> {
        self.inner.feature_index(term)
    }

    fn feature_name(&self, index: usize) -> Option<&str> {
        self.inner.feature_name(index)
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_same_features() {
    let engine = engine(EngineConfig::default());
    let message = "Congratulations WINNER! Claim your free prize before the meeting tomorrow";

    let first = engine.explain_with_seed(message, 5, None, 1234);
    let second = engine.explain_with_seed(message, 5, None, 1234);

    assert_eq!(first.method, ExplanationMethod::Perturbation);
    assert_eq!(first.features, second.features);
    assert_eq!(first.samples_used, second.samples_used);
}

#[test]
fn test_default_seed_is_stable_across_engines() {
    let message = "free prize for lunch";
    let a = engine(EngineConfig::default()).explain(message, 4, None);
    let b = engine(EngineConfig::default()).explain(message, 4, None);
    assert_eq!(a.features, b.features);
}

#[test]
fn test_selection_modes_respect_feature_count() {
    for mode in [
        FeatureSelection::Auto,
        FeatureSelection::Forward,
        FeatureSelection::HighestWeights,
        FeatureSelection::None,
    ] {
        let engine = engine(EngineConfig::default().with_feature_selection(mode));
        let result = engine.explain("winner claim free prize meeting lunch thanks tomorrow", 3, None);
        assert_eq!(result.method, ExplanationMethod::Perturbation);
        assert!(result.features.len() <= 3, "{:?} returned too many features", mode);
        assert!(!result.features.is_empty());
    }
}

#[test]
fn test_spam_words_point_to_spam() {
    let engine = engine(EngineConfig::default());
    let result = engine.explain("free prize meeting", 3, None);

    let free = result.features.iter().find(|f| f.token == "free").unwrap();
    let meeting = result.features.iter().find(|f| f.token == "meeting").unwrap();
    assert_eq!(free.direction, Label::Spam);
    assert!(free.raw_weight > 0.0);
    assert_eq!(meeting.direction, Label::Ham);
    assert!(meeting.raw_weight < 0.0);
    assert_eq!(result.features[0].strength, Strength::Strong);
}

// ============================================================================
// Fallback chain
// ============================================================================

#[test]
fn test_keyword_fallback_without_classifier_or_vectorizer() {
    let empty_pool = ClassifierPool::builder().build().unwrap();
    let engine = SpamEngine::new(EngineConfig::default(), Arc::new(BrokenVectorizer), empty_pool).unwrap();

    let result = engine.explain("URGENT: claim your free prize now", 5, None);

    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Keyword);
    assert!(!result.features.is_empty());
    let codes: Vec<ReasonCode> = result.fallback_reasons.iter().map(|r| r.code).collect();
    assert_eq!(
        codes,
        vec![ReasonCode::ClassifierUnavailable, ReasonCode::ClassifierUnavailable]
    );
}

#[test]
fn test_keyword_fallback_with_broken_vectorizer() {
    let pool = ClassifierPool::builder()
        .add_probabilistic("logistic", 0.9, logistic())
        .build()
        .unwrap();
    let engine = SpamEngine::new(EngineConfig::default(), Arc::new(BrokenVectorizer), pool).unwrap();

    let result = engine.explain("free prize", 5, None);
    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Keyword);
    assert!(result
        .fallback_reasons
        .iter()
        .all(|r| r.code == ReasonCode::VectorizerMismatch));
}

#[test]
fn test_keyword_fallback_with_no_matches() {
    let empty_pool = ClassifierPool::builder().build().unwrap();
    let engine = SpamEngine::new(EngineConfig::default(), vectorizer(), empty_pool).unwrap();

    let result = engine.explain("the quick brown fox", 5, None);
    assert!(result.success);
    assert!(result.features.is_empty());
    assert!(result.summary.starts_with("No influential tokens identified."));
}

#[test]
fn test_vote_only_target_falls_back() {
    let pool = ClassifierPool::builder()
        .add_vote_only("rules", 0.7, KeywordVoter::new(vec![0, 1], 1, VOCAB.len()).unwrap())
        .build()
        .unwrap();
    let engine = SpamEngine::new(EngineConfig::default(), vectorizer(), pool).unwrap();

    let result = engine.explain("free prize", 5, None);
    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Keyword);
    assert_eq!(result.fallback_reasons[0].code, ReasonCode::IncompatibleClassifier);
}

#[test]
fn test_exhausted_time_budget_uses_coefficients() {
    let engine = engine(EngineConfig::default());
    let budget = ExplanationBudget::default().with_max_time_ms(0);

    let result = engine.explain("free prize meeting", 5, Some(budget));
    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::LinearCoefficients);
    assert_eq!(result.fallback_reasons.len(), 1);
    assert_eq!(result.fallback_reasons[0].code, ReasonCode::BudgetExceeded);
    assert!(result.samples_used.is_none());
}

#[test]
fn test_time_budget_fits_on_completed_samples() {
    let mut config = EngineConfig::default();
    config.explainer.num_samples = 1000;
    config.explainer.max_samples = 1000;
    config.explainer.min_samples = 10;
    config.explainer.chunk_size = 10;

    let slow = SlowVectorizer {
        inner: TfidfVectorizer::from_vocabulary(VOCAB).unwrap(),
        delay: Duration::from_millis(10),
    };
    let pool = ClassifierPool::builder()
        .add_probabilistic("logistic", 0.92, logistic())
        .build()
        .unwrap();
    let engine = SpamEngine::new(config, Arc::new(slow), pool).unwrap();

    let budget = ExplanationBudget::default().with_max_time_ms(300);
    let result = engine.explain("free prize meeting", 3, Some(budget));

    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Perturbation);
    assert!(result.fallback_reasons.is_empty());
    let used = result.samples_used.unwrap();
    assert!(used >= 10, "fit on {} samples", used);
    assert!(used < 1000, "budget ignored, {} samples", used);
    assert_eq!(used % 10, 0);
}

#[test]
fn test_unknown_words_reach_keyword_table() {
    let engine = engine(EngineConfig::default());
    let result = engine.explain("URGENT you have won the lottery jackpot cash", 5, None);

    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Keyword);
    let codes: Vec<ReasonCode> = result.fallback_reasons.iter().map(|r| r.code).collect();
    assert_eq!(codes, vec![ReasonCode::NoSignal, ReasonCode::NoSignal]);
    assert_eq!(result.fallback_reasons[0].strategy, "perturbation");

    let tokens: Vec<&str> = result.features.iter().map(|f| f.token.as_str()).collect();
    for expected in ["urgent", "lottery", "jackpot", "cash"] {
        assert!(tokens.contains(&expected), "missing {} in {:?}", expected, tokens);
    }
    assert!(result.features.iter().all(|f| !f.explanation.is_empty()));
}

#[test]
fn test_sample_budget_caps_samples() {
    let engine = engine(EngineConfig::default());
    let budget = ExplanationBudget::default().with_max_samples(60);

    let result = engine.explain("free prize meeting", 3, Some(budget));
    assert_eq!(result.method, ExplanationMethod::Perturbation);
    assert_eq!(result.samples_used, Some(60));
}

#[test]
fn test_combined_methods() {
    let engine = engine(EngineConfig::default().with_combined_methods());
    let result = engine.explain("free prize meeting", 5, None);

    assert_eq!(result.method, ExplanationMethod::Combined);
    let free = result.features.iter().find(|f| f.token == "free").unwrap();
    assert_eq!(
        free.methods,
        vec![ExplanationMethod::Perturbation, ExplanationMethod::LinearCoefficients]
    );
}

// ============================================================================
// Summary consistency
// ============================================================================

#[test]
fn test_total_importance_is_sum_of_features() {
    let engine = engine(EngineConfig::default());
    let messages = [
        "free prize",
        "thanks for lunch tomorrow",
        "WINNER claim free prize, meeting tomorrow?",
        "nothing in the vocabulary here",
        "",
    ];

    for message in messages {
        for budget in [None, Some(ExplanationBudget::default().with_max_time_ms(0))] {
            let result = engine.explain(message, 5, budget);
            let sum: f64 = result.features.iter().map(|f| f.abs_importance).sum();
            assert!((sum - result.quality.total_importance).abs() < 1e-9);
            assert_eq!(
                result.quality.spam_feature_count + result.quality.ham_feature_count,
                result.features.len()
            );
            assert!(result
                .features
                .windows(2)
                .all(|w| w[0].abs_importance >= w[1].abs_importance));
        }
    }
}
