// Authentext Data Models
// Structured records exchanged between the scoring engine and its callers.
// Probabilities are in [0,1] everywhere except the display adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============ Prediction ============

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    Human,
    AiGenerated,
    Uncertain,
}

impl Prediction {
    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::Human => "human",
            Prediction::AiGenerated => "ai_generated",
            Prediction::Uncertain => "uncertain",
        }
    }
}

// ============ Pattern Hits ============

/// Character (not byte) offsets, end-exclusive, into the normalized text
/// (`text_processor::normalize_text` of the input) rather than the raw input:
/// whitespace runs are collapsed, ends trimmed, quotes and dashes folded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternHit {
    pub category: String,
    /// Literal text as it appeared at the first occurrence.
    pub matched: String,
    pub span: CharSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    #[serde(rename = "type")]
    pub label: String,
    /// Total occurrences in the text, repeats included.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    /// Number of distinct (category, literal) hits.
    pub total_count: usize,
    pub categories: BTreeMap<String, CategorySummary>,
}

// ============ Linguistic Features ============

/// Scalar text statistics, each normalized into [0,1].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinguisticFeatures {
    /// Type-token ratio over lowercased tokens.
    pub vocabulary_diversity: f64,
    /// Shannon entropy of token frequencies over the maximum for the vocabulary.
    pub entropy: f64,
    /// Sentence-length variance against a reference scale.
    pub burstiness: f64,
    /// Share of trigram occurrences that repeat an earlier trigram.
    pub ngram_repetition: f64,
}

impl LinguisticFeatures {
    pub const NEUTRAL_BURSTINESS: f64 = 0.5;

    pub fn empty() -> Self {
        Self {
            vocabulary_diversity: 0.0,
            entropy: 0.0,
            burstiness: Self::NEUTRAL_BURSTINESS,
            ngram_repetition: 0.0,
        }
    }
}

impl Default for LinguisticFeatures {
    fn default() -> Self {
        Self::empty()
    }
}

// ============ Sentence Results ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceResult {
    pub index: usize,
    pub text: String,
    pub ai_probability: f64,
    pub human_probability: f64,
    pub pattern_hits: Vec<PatternHit>,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergentSentence {
    pub index: usize,
    pub probability_diff: f64,
    pub text_preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceSummary {
    pub scored: usize,
    /// Eligible sentences dropped by the sentence cap or the time budget.
    pub omitted: usize,
    pub flagged: usize,
    pub mean_ai_probability: f64,
    /// Share of sentences leaning the same way as the whole document.
    pub consistency_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_divergent: Option<DivergentSentence>,
    /// Decomposition stopped early because the wall-clock budget ran out.
    pub interrupted: bool,
}

// ============ Score Result ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub human_probability: f64,
    pub ai_probability: f64,
    pub prediction: Prediction,
    /// max(human, ai) on the 0-100 display scale.
    pub confidence: f64,
    pub pattern_hits: Vec<PatternHit>,
    pub pattern_summary: PatternSummary,
    pub features: LinguisticFeatures,
    pub word_count: usize,
    /// Scored on a prefix of the input because it exceeded the size bound.
    pub truncated: bool,
    #[serde(default)]
    pub sentences: Vec<SentenceResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_summary: Option<SentenceSummary>,
    /// Set when the text is too short for a reliable score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Fewer words than this get a [`ScoreResult::warning`].
pub const MIN_RELIABLE_WORDS: usize = 2;

pub fn short_text_warning(word_count: usize) -> Option<String> {
    (word_count < MIN_RELIABLE_WORDS).then(|| {
        format!(
            "Text too short for reliable analysis (min {} words)",
            MIN_RELIABLE_WORDS
        )
    })
}

impl ScoreResult {
    /// Result for empty or whitespace-only input.
    pub fn neutral() -> Self {
        Self {
            human_probability: 0.5,
            ai_probability: 0.5,
            prediction: Prediction::Uncertain,
            confidence: 50.0,
            pattern_hits: Vec::new(),
            pattern_summary: PatternSummary::default(),
            features: LinguisticFeatures::empty(),
            word_count: 0,
            truncated: false,
            sentences: Vec::new(),
            sentence_summary: None,
            warning: None,
        }
    }

    pub fn distinct_categories(&self) -> usize {
        self.pattern_summary.categories.len()
    }
}

// ============ Score Options ============

#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Run sentence-level decomposition (documents under the cutoff only).
    pub detailed: bool,
    /// Overrides the configured sentence cap.
    pub max_sentences: Option<usize>,
    /// Wall-clock budget checked between sentences.
    pub budget: Option<Duration>,
}

impl ScoreOptions {
    pub fn detailed() -> Self {
        Self {
            detailed: true,
            ..Self::default()
        }
    }
}

// ============ Display Adapter ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayScores {
    pub human: f64,
    pub ai_generated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySentence {
    pub text: String,
    pub ai_probability: f64,
    pub flagged: bool,
}

/// Percent-scale view of a [`ScoreResult`], rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDisplay {
    pub prediction: String,
    pub confidence: f64,
    pub scores: DisplayScores,
    pub detected_patterns: PatternSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sentence_analysis: Vec<DisplaySentence>,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn percent(p: f64) -> f64 {
    (p * 10000.0).round() / 100.0
}

impl From<&ScoreResult> for ScoreDisplay {
    fn from(result: &ScoreResult) -> Self {
        Self {
            prediction: result.prediction.as_str().to_string(),
            confidence: (result.confidence * 100.0).round() / 100.0,
            scores: DisplayScores {
                human: percent(result.human_probability),
                ai_generated: percent(result.ai_probability),
            },
            detected_patterns: result.pattern_summary.clone(),
            sentence_analysis: result
                .sentences
                .iter()
                .map(|s| DisplaySentence {
                    text: s.text.clone(),
                    ai_probability: percent(s.ai_probability),
                    flagged: s.flagged,
                })
                .collect(),
            truncated: result.truncated,
            warning: result.warning.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_result_is_balanced() {
        let r = ScoreResult::neutral();
        assert_eq!(r.ai_probability, 0.5);
        assert_eq!(r.human_probability, 0.5);
        assert_eq!(r.prediction, Prediction::Uncertain);
        assert!(r.sentences.is_empty());
    }

    #[test]
    fn test_prediction_serializes_snake_case() {
        let json = serde_json::to_string(&Prediction::AiGenerated).unwrap();
        assert_eq!(json, "\"ai_generated\"");
    }

    #[test]
    fn test_display_rounds_to_percent() {
        let mut r = ScoreResult::neutral();
        r.ai_probability = 0.123456;
        r.human_probability = 1.0 - 0.123456;
        r.confidence = 87.6544;
        let display = ScoreDisplay::from(&r);
        assert_eq!(display.scores.ai_generated, 12.35);
        assert_eq!(display.scores.human, 87.65);
        assert_eq!(display.confidence, 87.65);
        assert_eq!(display.prediction, "uncertain");
    }

    #[test]
    fn test_short_text_warning_threshold() {
        assert!(short_text_warning(0).is_some());
        assert_eq!(
            short_text_warning(1).as_deref(),
            Some("Text too short for reliable analysis (min 2 words)")
        );
        assert!(short_text_warning(2).is_none());

        let mut r = ScoreResult::neutral();
        r.warning = short_text_warning(1);
        let json = serde_json::to_value(ScoreDisplay::from(&r)).unwrap();
        assert!(json["warning"].is_string());
        let quiet = serde_json::to_value(ScoreDisplay::from(&ScoreResult::neutral())).unwrap();
        assert!(quiet.get("warning").is_none());
    }

    #[test]
    fn test_category_summary_uses_type_key() {
        let summary = CategorySummary {
            label: "Hedging language".to_string(),
            count: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "Hedging language");
        assert_eq!(json["count"], 2);
    }
}
