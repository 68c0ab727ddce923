//! spamlens - Consensus spam detection with local explanations
//!
//! This crate scores a text message with a fixed pool of frozen binary
//! classifiers and reports both a majority and a quality-weighted verdict,
//! plus a per-token explanation of what drove the spam probability.
//!
//! # Modules
//!
//! ## Models
//! - [`vectorizer`] - Text cleaning and frozen-vocabulary TF-IDF
//! - [`classifier`] - Classifier capability traits, frozen models, the pool
//! - [`bundle`] - JSON model bundle loading
//!
//! ## Scoring
//! - [`calibration`] - Per-classifier confidence calibration
//! - [`consensus`] - Majority and weighted voting
//!
//! ## Explanations
//! - [`explainability`] - Perturbation explainer, fallbacks, summarizer
//!
//! ## Infrastructure
//! - [`engine`] - The [`SpamEngine`](engine::SpamEngine) context object
//! - [`cache`] - Bounded preprocessing cache
//! - [`config`] - Engine configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Models
pub mod vectorizer;
pub mod classifier;
pub mod bundle;

// Scoring
pub mod calibration;
pub mod consensus;

// Explanations
pub mod explainability;

// Infrastructure
pub mod cache;
pub mod engine;

// Services
pub mod cli;

pub use error::{Result, SpamLensError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, SpamLensError};

    // Configuration
    pub use crate::config::{EngineConfig, ExplainerConfig, FeatureSelection};

    // Engine
    pub use crate::engine::{EngineStats, SpamEngine};
    pub use crate::bundle::ModelBundle;

    // Models
    pub use crate::vectorizer::{FeatureVector, TfidfVectorizer, Vectorizer};
    pub use crate::classifier::{
        Classifier, ClassifierPool, Label, MarginClassifier, ProbabilisticClassifier,
    };

    // Consensus
    pub use crate::consensus::{ConsensusResult, Verdict, WeightedVerdict};

    // Explanations
    pub use crate::explainability::{
        ExplanationBudget, ExplanationFeature, ExplanationMethod, ExplanationResult,
    };
}
