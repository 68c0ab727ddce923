//! Explanation summarizer

use super::chain::StrategyOutput;
use super::narrative::describe_feature;
use super::types::{
    ConfidenceLevel, ExplanationFeature, ExplanationQuality, ExplanationResult, FallbackReason,
    Strength, NEGLIGIBLE_WEIGHT,
};
use crate::classifier::Label;
use crate::config::{SummaryConfig, FEATURE_CEILING};
use serde_json::json;

/// Turns raw attributions into ranked features, a synopsis and a quality grade
#[derive(Debug, Clone)]
pub struct ExplanationSummarizer {
    config: SummaryConfig,
    max_features: usize,
}

impl ExplanationSummarizer {
    pub fn new(config: SummaryConfig, max_features: usize) -> Self {
        Self {
            config,
            max_features: max_features.min(FEATURE_CEILING),
        }
    }

    pub fn summarize(
        &self,
        output: StrategyOutput,
        num_features: usize,
        fallback_reasons: Vec<FallbackReason>,
    ) -> ExplanationResult {
        let mut attributions: Vec<_> = output
            .attributions
            .into_iter()
            .filter(|a| a.weight.is_finite() && a.weight.abs() >= NEGLIGIBLE_WEIGHT)
            .collect();

        attributions.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.token.cmp(&b.token))
        });
        attributions.truncate(num_features.min(self.max_features));

        let max_abs = attributions.first().map(|a| a.weight.abs()).unwrap_or(0.0);
        let features: Vec<ExplanationFeature> = attributions
            .into_iter()
            .map(|a| {
                let abs_importance = a.weight.abs();
                let explanation = describe_feature(&a.token, a.weight);
                ExplanationFeature {
                    direction: if a.weight > 0.0 { Label::Spam } else { Label::Ham },
                    strength: self.strength(abs_importance, max_abs),
                    token: a.token,
                    raw_weight: a.weight,
                    abs_importance,
                    methods: a.methods,
                    explanation,
                }
            })
            .collect();

        let total_importance: f64 = features.iter().map(|f| f.abs_importance).sum();
        let spam_feature_count = features.iter().filter(|f| f.direction == Label::Spam).count();
        let quality = ExplanationQuality {
            confidence_level: self.confidence_level(total_importance),
            total_importance,
            spam_feature_count,
            ham_feature_count: features.len() - spam_feature_count,
        };

        let mut result = ExplanationResult {
            success: true,
            method: output.method,
            features,
            summary: String::new(),
            quality,
            fallback_reasons,
            samples_used: output.samples_used,
        };
        result.summary = self.synopsis(&result);
        result
    }

    pub fn confidence_level(&self, total_importance: f64) -> ConfidenceLevel {
        if total_importance >= self.config.high_threshold {
            ConfidenceLevel::High
        } else if total_importance >= self.config.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    fn strength(&self, abs_importance: f64, max_abs: f64) -> Strength {
        if max_abs <= 0.0 {
            return Strength::Weak;
        }
        let ratio = abs_importance / max_abs;
        if ratio > self.config.strong_ratio {
            Strength::Strong
        } else if ratio > self.config.moderate_ratio {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }

    fn synopsis(&self, result: &ExplanationResult) -> String {
        let confidence = format!(
            "Explanation confidence: {} ({}).",
            result.quality.confidence_level, result.method
        );

        let mut text = if result.features.is_empty() {
            format!("No influential tokens identified. {}", confidence)
        } else {
            format!(
                "Spam indicators: {}. Ham indicators: {}. {}",
                self.top_tokens(result.spam_features()),
                self.top_tokens(result.ham_features()),
                confidence
            )
        };

        if !result.fallback_reasons.is_empty() {
            let failed: Vec<String> = result
                .fallback_reasons
                .iter()
                .map(|r| format!("{} ({})", r.strategy, json!(r.code).as_str().unwrap_or("unknown")))
                .collect();
            text.push_str(&format!(" Fallback after: {}.", failed.join(", ")));
        }
        text
    }

    fn top_tokens<'a>(&self, features: impl Iterator<Item = &'a ExplanationFeature>) -> String {
        let tokens: Vec<&str> = features
            .take(self.config.tokens_per_side)
            .map(|f| f.token.as_str())
            .collect();
        if tokens.is_empty() {
            "none".to_string()
        } else {
            tokens.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpamLensError;
    use crate::explainability::{Attribution, ExplanationMethod};

    fn output(tokens: &[(&str, f64)]) -> StrategyOutput {
        StrategyOutput::new(
            ExplanationMethod::Perturbation,
            tokens
                .iter()
                .map(|&(t, w)| Attribution::new(t, w, ExplanationMethod::Perturbation))
                .collect(),
        )
    }

    fn summarizer() -> ExplanationSummarizer {
        ExplanationSummarizer::new(SummaryConfig::default(), 10)
    }

    #[test]
    fn test_orders_and_grades_features() {
        let result = summarizer().summarize(
            output(&[("meeting", -0.1), ("free", 0.4), ("prize", 0.25), ("win", 0.05)]),
            10,
            Vec::new(),
        );

        let tokens: Vec<&str> = result.features.iter().map(|f| f.token.as_str()).collect();
        assert_eq!(tokens, vec!["free", "prize", "meeting", "win"]);
        assert_eq!(result.features[0].strength, Strength::Strong);
        assert_eq!(result.features[1].strength, Strength::Moderate);
        assert_eq!(result.features[2].strength, Strength::Weak);
        assert_eq!(result.features[2].direction, Label::Ham);
        assert_eq!(result.quality.spam_feature_count, 3);
        assert_eq!(result.quality.ham_feature_count, 1);
        assert_eq!(result.quality.confidence_level, ConfidenceLevel::High);
    }

    #[test]
    fn test_total_importance_matches_features() {
        let result = summarizer().summarize(
            output(&[("a", 0.12), ("b", -0.031), ("c", 0.0007), ("d", -0.2)]),
            3,
            Vec::new(),
        );
        let sum: f64 = result.features.iter().map(|f| f.abs_importance).sum();
        assert_eq!(result.features.len(), 3);
        assert!((sum - result.quality.total_importance).abs() < 1e-12);
        assert_eq!(result.quality.confidence_level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_synopsis_names_top_tokens() {
        let result = summarizer().summarize(
            output(&[("free", 0.5), ("prize", 0.4), ("claim", 0.3), ("now", 0.2), ("mom", -0.1)]),
            10,
            Vec::new(),
        );
        assert_eq!(
            result.summary,
            "Spam indicators: free, prize, claim. Ham indicators: mom. \
             Explanation confidence: high (perturbation)."
        );
    }

    #[test]
    fn test_empty_and_negligible_weights() {
        let result = summarizer().summarize(output(&[("x", 0.0), ("y", f64::NAN)]), 10, Vec::new());
        assert!(result.success);
        assert!(result.features.is_empty());
        assert_eq!(result.quality.total_importance, 0.0);
        assert_eq!(result.quality.confidence_level, ConfidenceLevel::Low);
        assert!(result.summary.starts_with("No influential tokens identified."));
    }

    #[test]
    fn test_fallback_reasons_are_mentioned() {
        let reason = FallbackReason::from_error("perturbation", &SpamLensError::EmptyMessage);
        let result = summarizer().summarize(output(&[("free", 0.3)]), 10, vec![reason]);
        assert!(result.summary.ends_with("Fallback after: perturbation (empty_message)."));
    }

    #[test]
    fn test_features_carry_explanations() {
        let result = summarizer().summarize(
            output(&[("free", 0.5), ("click here", 0.3), ("0800123", 0.2), ("meeting", -0.1)]),
            10,
            Vec::new(),
        );
        let text = |token: &str| {
            result
                .features
                .iter()
                .find(|f| f.token == token)
                .map(|f| f.explanation.clone())
                .unwrap()
        };
        assert!(text("free").contains("'Free' offers"));
        assert!(text("click here").starts_with("The phrase 'click here'"));
        assert!(text("0800123").contains("Phone numbers"));
        assert!(text("meeting").contains("Meeting references"));
    }

    #[test]
    fn test_feature_cap() {
        let many: Vec<(String, f64)> = (0..20).map(|i| (format!("t{}", i), 0.01 * (i + 1) as f64)).collect();
        let borrowed: Vec<(&str, f64)> = many.iter().map(|(t, w)| (t.as_str(), *w)).collect();
        let result = summarizer().summarize(output(&borrowed), 50, Vec::new());
        assert_eq!(result.features.len(), 10);
    }
}
