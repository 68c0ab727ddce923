//! Model bundle format
//!
//! A bundle is a JSON document holding an already-fitted vectorizer and a
//! list of frozen classifiers, each with its id and offline quality weight:
//!
//! ```json
//! {
//!   "vectorizer": { "vocabulary": ["free", "prize", "meeting"], "idf": [1.2, 1.9, 1.4] },
//!   "classifiers": [
//!     { "id": "logistic", "weight": 0.93, "kind": "logistic",
//!       "coefficients": [1.8, 2.1, -1.5], "intercept": -0.4 },
//!     { "id": "rules", "weight": 0.71, "kind": "keyword_vote",
//!       "keywords": ["free", "prize"], "min_hits": 1 }
//!   ]
//! }
//! ```

use crate::calibration::MarginCalibration;
use crate::classifier::{
    ClassifierPool, DecisionStump, KeywordVoter, LinearMarginModel, LogisticModel,
    MultinomialNaiveBayes, PoolBuilder, StumpEnsemble,
};
use crate::error::{Result, SpamLensError};
use crate::vectorizer::{TfidfVectorizer, Vectorizer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Fitted vectorizer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerSpec {
    /// Ordered vocabulary; term `i` is column `i`
    pub vocabulary: Vec<String>,
    /// IDF weight per term; omitted means raw counts
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default)]
    pub ngram_range: Option<(usize, usize)>,
    /// Defaults to true when IDF weights are present
    #[serde(default)]
    pub normalize: Option<bool>,
    #[serde(default)]
    pub sublinear_tf: bool,
    /// Vocabulary was fitted on stop-word-free, stemmed text
    #[serde(default)]
    pub stemmed: bool,
}

/// Frozen model parameters, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    NaiveBayes {
        class_log_prior: [f64; 2],
        ham_log_prob: Vec<f64>,
        spam_log_prob: Vec<f64>,
    },
    LinearMargin {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        calibration: Option<MarginCalibration>,
    },
    StumpEnsemble {
        stumps: Vec<DecisionStump>,
        #[serde(default)]
        sign_threshold: Option<f64>,
    },
    KeywordVote {
        keywords: Vec<String>,
        #[serde(default = "default_min_hits")]
        min_hits: usize,
    },
}

fn default_min_hits() -> usize {
    1
}

impl ModelSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSpec::Logistic { .. } => "logistic",
            ModelSpec::NaiveBayes { .. } => "naive_bayes",
            ModelSpec::LinearMargin { .. } => "linear_margin",
            ModelSpec::StumpEnsemble { .. } => "stump_ensemble",
            ModelSpec::KeywordVote { .. } => "keyword_vote",
        }
    }
}

/// One pool member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub id: String,
    /// Offline quality weight, e.g. F1 on a held-out set
    pub weight: f64,
    #[serde(flatten)]
    pub model: ModelSpec,
}

/// Vectorizer plus classifier pool, as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub vectorizer: VectorizerSpec,
    pub classifiers: Vec<ClassifierSpec>,
}

impl ModelBundle {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let bundle = Self::from_json_str(&contents)?;
        info!(
            path = %path.display(),
            vocabulary = bundle.vectorizer.vocabulary.len(),
            classifiers = bundle.classifiers.len(),
            "Model bundle loaded"
        );
        Ok(bundle)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build_vectorizer(&self) -> Result<Arc<dyn Vectorizer>> {
        let spec = &self.vectorizer;
        let mut vectorizer = TfidfVectorizer::from_vocabulary(spec.vocabulary.iter().cloned())?
            .with_sublinear_tf(spec.sublinear_tf);
        if let Some(idf) = &spec.idf {
            vectorizer = vectorizer.with_idf(idf.clone())?;
        }
        if let Some((min, max)) = spec.ngram_range {
            vectorizer = vectorizer.with_ngram_range(min, max);
        }
        if let Some(normalize) = spec.normalize {
            vectorizer = vectorizer.with_normalize(normalize);
        }
        Ok(Arc::new(vectorizer))
    }

    /// Build the pool; keyword rules are resolved against `vectorizer`'s vocabulary
    pub fn build_pool(&self, vectorizer: &dyn Vectorizer) -> Result<ClassifierPool> {
        let n_features = vectorizer.n_features();
        let mut builder = PoolBuilder::new();

        for spec in &self.classifiers {
            let id = spec.id.clone();
            builder = match &spec.model {
                ModelSpec::Logistic {
                    coefficients,
                    intercept,
                } => builder.add_probabilistic(
                    id,
                    spec.weight,
                    LogisticModel::try_new(coefficients.clone(), *intercept)?,
                ),
                ModelSpec::NaiveBayes {
                    class_log_prior,
                    ham_log_prob,
                    spam_log_prob,
                } => builder.add_probabilistic(
                    id,
                    spec.weight,
                    MultinomialNaiveBayes::new(
                        *class_log_prior,
                        ham_log_prob.clone(),
                        spam_log_prob.clone(),
                    )?,
                ),
                ModelSpec::LinearMargin {
                    coefficients,
                    intercept,
                    calibration,
                } => builder.add_margin_calibrated(
                    id,
                    spec.weight,
                    LinearMarginModel::try_new(coefficients.clone(), *intercept)?,
                    calibration.unwrap_or_default(),
                ),
                ModelSpec::StumpEnsemble {
                    stumps,
                    sign_threshold,
                } => {
                    let mut model = StumpEnsemble::new(stumps.clone(), n_features)?;
                    if let Some(threshold) = sign_threshold {
                        model = model.with_sign_threshold(*threshold);
                    }
                    builder.add_probabilistic(id, spec.weight, model)
                }
                ModelSpec::KeywordVote { keywords, min_hits } => {
                    let features = resolve_keywords(&spec.id, keywords, vectorizer)?;
                    builder.add_vote_only(
                        id,
                        spec.weight,
                        KeywordVoter::new(features, *min_hits, n_features)?,
                    )
                }
            };
        }

        builder.build()
    }
}

fn resolve_keywords(id: &str, keywords: &[String], vectorizer: &dyn Vectorizer) -> Result<Vec<usize>> {
    let mut features = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        match vectorizer.feature_index(keyword) {
            Some(idx) => features.push(idx),
            None => warn!(classifier = id, keyword = %keyword, "Keyword not in vocabulary; ignored"),
        }
    }
    if features.is_empty() {
        return Err(SpamLensError::ConfigError(format!(
            "Keyword voter '{}' has no keywords in the vocabulary",
            id
        )));
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;

    const BUNDLE: &str = r#"{
        "vectorizer": { "vocabulary": ["free", "prize", "meeting"] },
        "classifiers": [
            { "id": "logistic", "weight": 0.9, "kind": "logistic",
              "coefficients": [2.0, 1.5, -2.0], "intercept": -0.5 },
            { "id": "nb", "weight": 0.85, "kind": "naive_bayes",
              "class_log_prior": [-0.2, -1.7],
              "ham_log_prob": [-3.0, -3.5, -1.0], "spam_log_prob": [-1.0, -1.2, -3.0] },
            { "id": "svm", "weight": 0.8, "kind": "linear_margin",
              "coefficients": [1.0, 1.0, -1.0], "intercept": 0.0,
              "calibration": { "slope": 2.0, "offset": 0.0 } },
            { "id": "forest", "weight": 0.75, "kind": "stump_ensemble",
              "stumps": [ { "feature": 0, "threshold": 0.0 }, { "feature": 2, "threshold": 0.0, "spam_above": false } ] },
            { "id": "rules", "weight": 0.6, "kind": "keyword_vote",
              "keywords": ["free", "prize", "unknownword"] }
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
        let kinds: Vec<&str> = bundle.classifiers.iter().map(|c| c.model.kind()).collect();
        assert_eq!(
            kinds,
            vec!["logistic", "naive_bayes", "linear_margin", "stump_ensemble", "keyword_vote"]
        );

        let vectorizer = bundle.build_vectorizer().unwrap();
        let pool = bundle.build_pool(vectorizer.as_ref()).unwrap();
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.member("svm").unwrap().calibration().slope, 2.0);
        assert_eq!(pool.member("rules").unwrap().capability().kind(), "vote_only");

        let x = vectorizer.transform("free prize").unwrap();
        let eval = pool.evaluate(&x, false);
        assert!(eval.excluded.is_empty());
        assert!(eval.results.iter().all(|r| r.verdict == Label::Spam));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let bundle = ModelBundle::from_json_str(BUNDLE).unwrap();
        let json = bundle.to_json_string().unwrap();
        let again = ModelBundle::from_json_str(&json).unwrap();
        assert_eq!(again.classifiers.len(), 5);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{ "vectorizer": { "vocabulary": ["a"] },
            "classifiers": [ { "id": "x", "weight": 1.0, "kind": "neural_net" } ] }"#;
        assert!(matches!(
            ModelBundle::from_json_str(json),
            Err(SpamLensError::SerializationError(_))
        ));
    }

    #[test]
    fn test_keyword_voter_needs_known_keywords() {
        let json = r#"{ "vectorizer": { "vocabulary": ["a"] },
            "classifiers": [ { "id": "rules", "weight": 1.0, "kind": "keyword_vote", "keywords": ["zzz"] } ] }"#;
        let bundle = ModelBundle::from_json_str(json).unwrap();
        let vectorizer = bundle.build_vectorizer().unwrap();
        assert!(bundle.build_pool(vectorizer.as_ref()).is_err());
    }
}
