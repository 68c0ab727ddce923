//! Message normalization ahead of vectorization

use crate::config::PreprocessingConfig;
use rust_stemmers::{Algorithm, Stemmer};

/// NLTK's English stop-word list, alphanumeric entries only, sorted for lookup
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "ain", "all", "am", "an", "and", "any",
    "are", "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "m",
    "ma", "me", "mightn", "more", "most", "mustn", "my", "myself", "needn", "no", "nor", "not",
    "now", "o", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "re", "s", "same", "shan", "she", "should", "shouldn", "so", "some",
    "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "ve",
    "very", "was", "wasn", "we", "were", "weren", "what", "when", "where", "which", "while",
    "who", "whom", "why", "will", "with", "won", "wouldn", "y", "you", "your", "yours",
    "yourself", "yourselves",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Normalizes raw message text
#[derive(Debug, Clone, Default)]
pub struct TextPreprocessor {
    config: PreprocessingConfig,
}

impl TextPreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Lowercase, replace symbols with spaces and collapse whitespace
    ///
    /// Every word survives; this is the form keyword phrases are matched against.
    pub fn surface(&self, text: &str) -> String {
        let lowered = if self.config.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let stripped: String = if self.config.strip_symbols {
            lowered
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c.is_whitespace() {
                        c
                    } else {
                        ' '
                    }
                })
                .collect()
        } else {
            lowered
        };

        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// [`surface`](Self::surface), then stop-word removal and stemming when enabled
    ///
    /// This is the form the vectorizer sees, so it must match how the
    /// bundle's vocabulary was built.
    pub fn clean(&self, text: &str) -> String {
        let surface = self.surface(text);
        let stemmer = self
            .config
            .stem
            .then(|| Stemmer::create(Algorithm::English));

        surface
            .split(' ')
            .filter(|w| !w.is_empty())
            .filter(|w| !(self.config.remove_stop_words && is_stop_word(w)))
            .map(|w| match &stemmer {
                Some(stemmer) => stemmer.stem(w).into_owned(),
                None => w.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
