//! Frozen-vocabulary TF-IDF vectorizer

use super::{FeatureVector, Vectorizer};
use crate::error::{Result, SpamLensError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Simple text tokenizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTokenizer {
    lowercase: bool,
    min_token_length: usize,
}

impl TextTokenizer {
    pub fn new() -> Self {
        Self {
            lowercase: true,
            min_token_length: 1,
        }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let processed = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        processed
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .filter(|s| s.chars().count() >= self.min_token_length)
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// TF-IDF vectorizer over a fixed vocabulary
///
/// The vocabulary and IDF weights come from an offline fit; nothing here
/// mutates them. Without IDF weights the vectorizer emits raw term counts.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    tokenizer: TextTokenizer,
    vocabulary: HashMap<String, usize>,
    feature_names: Vec<String>,
    idf: Option<Array1<f64>>,
    ngram_range: (usize, usize),
    normalize: bool,
    sublinear_tf: bool,
    binary: bool,
}

impl TfidfVectorizer {
    /// Build a vectorizer from an ordered vocabulary; term `i` maps to column `i`
    pub fn from_vocabulary<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let feature_names: Vec<String> = terms.into_iter().map(Into::into).collect();
        if feature_names.is_empty() {
            return Err(SpamLensError::VectorizerError(
                "Vocabulary is empty".to_string(),
            ));
        }

        let mut vocabulary = HashMap::with_capacity(feature_names.len());
        for (idx, term) in feature_names.iter().enumerate() {
            if vocabulary.insert(term.clone(), idx).is_some() {
                return Err(SpamLensError::VectorizerError(format!(
                    "Duplicate vocabulary term '{}'",
                    term
                )));
            }
        }

        let max_n = feature_names
            .iter()
            .map(|t| t.split(' ').count())
            .max()
            .unwrap_or(1);

        Ok(Self {
            tokenizer: TextTokenizer::new(),
            vocabulary,
            feature_names,
            idf: None,
            ngram_range: (1, max_n),
            normalize: false,
            sublinear_tf: false,
            binary: false,
        })
    }

    /// Attach IDF weights (one per vocabulary term) and enable L2 normalization
    pub fn with_idf(mut self, idf: Vec<f64>) -> Result<Self> {
        if idf.len() != self.feature_names.len() {
            return Err(SpamLensError::DimensionMismatch {
                expected: self.feature_names.len(),
                actual: idf.len(),
            });
        }
        if idf.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SpamLensError::VectorizerError(
                "IDF weights must be finite and positive".to_string(),
            ));
        }
        self.idf = Some(Array1::from_vec(idf));
        self.normalize = true;
        Ok(self)
    }

    pub fn with_ngram_range(mut self, min: usize, max: usize) -> Self {
        self.ngram_range = (min.max(1), max.max(min.max(1)));
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_sublinear_tf(mut self, sublinear: bool) -> Self {
        self.sublinear_tf = sublinear;
        self
    }

    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TextTokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn get_feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn generate_ngrams(&self, tokens: &[String]) -> Vec<String> {
        let mut ngrams = Vec::new();

        for n in self.ngram_range.0..=self.ngram_range.1 {
            if tokens.len() >= n {
                for i in 0..=(tokens.len() - n) {
                    ngrams.push(tokens[i..i + n].join(" "));
                }
            }
        }

        ngrams
    }
}

impl Vectorizer for TfidfVectorizer {
    fn transform(&self, text: &str) -> Result<FeatureVector> {
        let tokens = self.tokenizer.tokenize(text);
        let ngrams = self.generate_ngrams(&tokens);

        let mut row: Array1<f64> = Array1::zeros(self.feature_names.len());
        for ngram in &ngrams {
            if let Some(&idx) = self.vocabulary.get(ngram.as_str()) {
                row[idx] += 1.0;
            }
        }

        if self.binary {
            row.mapv_inplace(|v| if v > 0.0 { 1.0 } else { 0.0 });
        } else if self.sublinear_tf {
            row.mapv_inplace(|v| if v > 0.0 { 1.0 + v.ln() } else { 0.0 });
        }

        if let Some(ref idf) = self.idf {
            row *= idf;
        }

        if self.normalize {
            let norm: f64 = row.iter().map(|&v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        Ok(row)
    }

    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn feature_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    fn feature_name(&self, index: usize) -> Option<&str> {
        self.feature_names.get(index).map(String::as_str)
    }
}
