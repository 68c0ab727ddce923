//! Text vectorization
//!
//! The engine treats the vectorizer as a frozen collaborator: it maps
//! preprocessed text onto a fixed-length feature vector using a vocabulary
//! that never changes after construction.

mod preprocess;
mod tfidf;

pub use preprocess::TextPreprocessor;
pub use tfidf::{TextTokenizer, TfidfVectorizer};

use crate::error::Result;
use ndarray::Array1;

/// Dense feature vector for a single message
pub type FeatureVector = Array1<f64>;

/// Maps text to a fixed-length feature vector
pub trait Vectorizer: Send + Sync {
    /// Vectorize one preprocessed message
    fn transform(&self, text: &str) -> Result<FeatureVector>;

    /// Length of every vector this vectorizer produces
    fn n_features(&self) -> usize;

    /// Column of a vocabulary term
    fn feature_index(&self, term: &str) -> Option<usize>;

    /// Vocabulary term of a column
    fn feature_name(&self, index: usize) -> Option<&str>;
}
