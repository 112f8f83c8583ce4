// Linguistic Feature Extraction
// Vocabulary diversity, token entropy, burstiness and n-gram repetition.

use std::collections::{HashMap, HashSet};

use crate::models::LinguisticFeatures;
use crate::services::config_store::FeatureConfig;
use crate::services::text_processor::{split_sentences, tokenize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureExtractor {
    ngram_size: usize,
    reference_variance: f64,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(&FeatureConfig::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            ngram_size: config.ngram_size.max(1),
            reference_variance: config.burstiness_reference_variance,
        }
    }

    /// Compute all four features. Total: never fails, every value in [0,1].
    pub fn extract(&self, text: &str) -> LinguisticFeatures {
        let lowered: Vec<String> = tokenize(text).into_iter().map(str::to_lowercase).collect();
        if lowered.is_empty() {
            return LinguisticFeatures::empty();
        }
        let tokens: Vec<&str> = lowered.iter().map(String::as_str).collect();

        LinguisticFeatures {
            vocabulary_diversity: vocabulary_diversity(&tokens),
            entropy: normalized_entropy(&tokens),
            burstiness: self.burstiness(text),
            ngram_repetition: ngram_repeat_rate(&tokens, self.ngram_size),
        }
    }

    fn burstiness(&self, text: &str) -> f64 {
        let lengths: Vec<f64> = split_sentences(text)
            .iter()
            .map(|s| tokenize(&s.text).len())
            .filter(|&n| n > 0)
            .map(|n| n as f64)
            .collect();
        if lengths.len() <= 1 || self.reference_variance <= 0.0 {
            return LinguisticFeatures::NEUTRAL_BURSTINESS;
        }

        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let variance =
            lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
        (variance / self.reference_variance).clamp(0.0, 1.0)
    }
}

pub fn extract_features(text: &str, config: &FeatureConfig) -> LinguisticFeatures {
    FeatureExtractor::new(config).extract(text)
}

// Type-token ratio
fn vocabulary_diversity(tokens: &[&str]) -> f64 {
    let unique: HashSet<&str> = tokens.iter().copied().collect();
    unique.len() as f64 / tokens.len().max(1) as f64
}

/// Shannon entropy over the maximum achievable for the observed vocabulary.
/// A single-word vocabulary has no spread and scores 0.
fn normalized_entropy(tokens: &[&str]) -> f64 {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for t in tokens {
        *freq.entry(*t).or_insert(0) += 1;
    }
    if freq.len() <= 1 {
        return 0.0;
    }

    // HashMap iteration order varies per instance; sum in a fixed order so
    // the float result is bit-for-bit repeatable.
    let mut counts: Vec<usize> = freq.values().copied().collect();
    counts.sort_unstable();

    let total = tokens.len() as f64;
    let entropy = -counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p.ln()
        })
        .sum::<f64>();
    (entropy / (freq.len() as f64).ln()).clamp(0.0, 1.0)
}

fn ngram_repeat_rate(tokens: &[&str], n: usize) -> f64 {
    if n == 0 || tokens.len() < n {
        return 0.0;
    }
    let mut counts: HashMap<&[&str], usize> = HashMap::new();
    let mut total = 0usize;
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
        total += 1;
    }
    let repeats = counts.values().filter(|&&c| c >= 2).map(|&c| c - 1).sum::<usize>();
    repeats as f64 / total.max(1) as f64
}
