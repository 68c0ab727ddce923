//! Integration tests for the engine: bundle loading, prediction, caching and threading

use spamlens::bundle::ModelBundle;
use spamlens::classifier::Label;
use spamlens::config::EngineConfig;
use spamlens::consensus::{Verdict, WeightedVerdict};
use spamlens::engine::SpamEngine;
use spamlens::error::SpamLensError;
use spamlens::explainability::ExplanationMethod;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::NamedTempFile;

const BUNDLE: &str = r#"{
    "vectorizer": {
        "vocabulary": ["free", "prize", "claim", "txt", "meeting", "tomorrow", "lunch", "thanks"],
        "idf": [1.6, 2.1, 1.9, 2.4, 1.7, 1.5, 1.8, 1.4]
    },
    "classifiers": [
        { "id": "logistic", "weight": 0.93, "kind": "logistic",
          "coefficients": [3.1, 3.4, 2.6, 2.9, -2.8, -2.2, -2.5, -2.7], "intercept": -0.6 },
        { "id": "naive_bayes", "weight": 0.9, "kind": "naive_bayes",
          "class_log_prior": [-0.15, -1.97],
          "ham_log_prob": [-4.1, -4.6, -4.3, -4.8, -1.9, -2.0, -2.1, -1.8],
          "spam_log_prob": [-1.4, -1.6, -1.8, -1.7, -4.4, -4.2, -4.6, -4.5] },
        { "id": "svm", "weight": 0.91, "kind": "linear_margin",
          "coefficients": [1.2, 1.4, 1.1, 1.3, -1.2, -1.0, -1.1, -1.3], "intercept": -0.2 },
        { "id": "forest", "weight": 0.88, "kind": "stump_ensemble",
          "stumps": [
            { "feature": 0, "threshold": 0.0 },
            { "feature": 1, "threshold": 0.0 },
            { "feature": 4, "threshold": 0.0, "spam_above": false },
            { "feature": 6, "threshold": 0.0, "spam_above": false, "weight": 0.5 }
          ] },
        { "id": "rules", "weight": 0.7, "kind": "keyword_vote",
          "keywords": ["free", "prize", "claim", "txt"], "min_hits": 2 }
    ]
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn engine() -> SpamEngine {
    let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
    SpamEngine::from_bundle(&bundle, EngineConfig::default()).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_engine_from_files() {
    let bundle = write_temp(BUNDLE);
    let config = write_temp(r#"{ "explainer": { "num_samples": 120, "seed": 5 }, "cache": { "capacity": 8 } }"#);

    let config = EngineConfig::from_file(config.path()).unwrap();
    let engine = SpamEngine::from_bundle_file(bundle.path(), config).unwrap();

    assert_eq!(engine.pool().len(), 5);
    assert_eq!(engine.config().explainer.num_samples, 120);
    assert_eq!(engine.explanation_targets(), &["logistic".to_string()]);
    assert_eq!(engine.cache_stats().unwrap().capacity, 8);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = write_temp(r#"{ "explainer": { "max_features": 0 } }"#);
    assert!(matches!(
        EngineConfig::from_file(config.path()),
        Err(SpamLensError::InvalidParameter { .. })
    ));
}

#[test]
fn test_missing_bundle_is_io_error() {
    let result = SpamEngine::from_bundle_file("/definitely/not/here.json", EngineConfig::default());
    assert!(matches!(result, Err(SpamLensError::IoError(_))));
}

// ============================================================================
// Prediction
// ============================================================================

#[test]
fn test_spam_message() {
    let engine = engine();
    let result = engine.predict_consensus("FREE prize!!! Claim now, txt WIN to 80086");

    assert_eq!(result.majority_verdict, Verdict::Spam);
    assert_eq!(result.majority_count, 5);
    assert_eq!(result.weighted_verdict, WeightedVerdict::Spam);
    assert!(result.consensus_confidence > 50.0);
    assert!(result.excluded.is_empty());
}

#[test]
fn test_ham_message() {
    let engine = engine();
    let result = engine.predict_consensus("Thanks! See you at the meeting tomorrow, then lunch?");

    assert_eq!(result.majority_verdict, Verdict::Ham);
    assert_eq!(result.weighted_verdict, WeightedVerdict::Ham);
    assert_eq!(result.dissenting_count(), 0);
}

#[test]
fn test_mismatched_classifier_is_excluded() {
    let json = BUNDLE.replace(
        r#""coefficients": [1.2, 1.4, 1.1, 1.3, -1.2, -1.0, -1.1, -1.3]"#,
        r#""coefficients": [1.2, 1.4, 1.1]"#,
    );
    let bundle = ModelBundle::from_json_str(&json).unwrap();
    let engine = SpamEngine::from_bundle(&bundle, EngineConfig::default()).unwrap();

    let result = engine.predict_consensus("free prize");
    assert_eq!(result.total_voters, 4);
    assert_eq!(result.excluded.len(), 1);
    assert_eq!(result.excluded[0].classifier_id, "svm");
}

#[test]
fn test_sequential_and_parallel_agree() {
    let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
    let parallel = SpamEngine::from_bundle(&bundle, EngineConfig::default()).unwrap();
    let sequential = SpamEngine::from_bundle(&bundle, EngineConfig::default().sequential()).unwrap();

    let message = "claim your prize at lunch";
    assert_eq!(
        parallel.predict_consensus(message),
        sequential.predict_consensus(message)
    );
}

// ============================================================================
// Cache and lifecycle
// ============================================================================

#[test]
fn test_cache_stays_bounded() {
    let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
    let engine =
        SpamEngine::from_bundle(&bundle, EngineConfig::default().with_cache_capacity(4)).unwrap();

    for i in 0..20 {
        engine.predict_consensus(&format!("free prize number {}", i));
    }
    engine.predict_consensus("free prize number 19");

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.size, 4);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 20);
}

#[test]
fn test_cache_can_be_disabled() {
    let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
    let engine =
        SpamEngine::from_bundle(&bundle, EngineConfig::default().with_cache_capacity(0)).unwrap();

    engine.predict_consensus("free prize");
    assert!(engine.cache_stats().is_none());
}

#[test]
fn test_concurrent_requests() {
    let engine = Arc::new(engine());
    let messages = ["free prize claim", "lunch tomorrow thanks", "txt claim prize", "meeting"];

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let message = messages[t].to_string();
            thread::spawn(move || {
                for _ in 0..10 {
                    let consensus = engine.predict_consensus(&message);
                    assert_eq!(consensus.total_voters, 5);
                    let explanation = engine.explain(&message, 3, None);
                    assert!(explanation.success);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let engine = Arc::try_unwrap(engine).unwrap();
    let stats = engine.shutdown();
    assert_eq!(stats.predictions, 40);
    assert_eq!(stats.explanations, 40);
}

#[test]
fn test_explain_through_bundle() {
    let engine = engine();
    let result = engine.explain("free prize meeting", 3, None);

    assert!(result.success);
    assert_eq!(result.method, ExplanationMethod::Perturbation);
    assert_eq!(result.features[0].direction, Label::Spam);
    let meeting = result.features.iter().find(|f| f.token == "meeting").unwrap();
    assert_eq!(meeting.direction, Label::Ham);
}
