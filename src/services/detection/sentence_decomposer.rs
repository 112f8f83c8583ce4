// Sentence Decomposer
// Per-sentence scores that reuse the document's pattern hits instead of
// re-running the matcher.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::models::SentenceResult;
use crate::services::config_store::DecompositionConfig;
use crate::services::text_processor::{count_words, split_sentences};

use super::fusion::ScoreFusion;
use super::linguistic::FeatureExtractor;
use super::pattern_matcher::PatternMatches;
use super::sensitivity::is_flagged;

/// Optional wall-clock limit, checked between sentences.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(budget: Option<Duration>) -> Self {
        Self {
            at: budget.and_then(|b| Instant::now().checked_add(b)),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposition {
    pub sentences: Vec<SentenceResult>,
    /// Eligible sentences not scored because of the cap or the deadline.
    pub omitted: usize,
    pub interrupted: bool,
}

pub struct SentenceDecomposer<'a> {
    config: &'a DecompositionConfig,
    extractor: &'a FeatureExtractor,
    fusion: &'a ScoreFusion,
}

impl<'a> SentenceDecomposer<'a> {
    pub fn new(config: &'a DecompositionConfig, extractor: &'a FeatureExtractor, fusion: &'a ScoreFusion) -> Self {
        Self {
            config,
            extractor,
            fusion,
        }
    }

    /// Whether a document of this length may be decomposed at all.
    pub fn accepts(&self, text: &str) -> bool {
        text.chars().count() < self.config.cutoff_chars
    }

    pub fn decompose(
        &self,
        text: &str,
        document: &PatternMatches,
        max_sentences: usize,
        deadline: &Deadline,
    ) -> Decomposition {
        if !self.accepts(text) {
            return Decomposition::default();
        }

        let eligible: Vec<String> = split_sentences(text)
            .into_iter()
            .map(|s| s.text)
            .filter(|s| count_words(s) >= self.config.min_sentence_tokens)
            .collect();

        let mut out = Decomposition::default();
        for (index, sentence) in eligible.iter().enumerate().take(max_sentences) {
            if deadline.expired() {
                out.interrupted = true;
                warn!(
                    "[sentence_decomposer] budget exhausted after {} of {} sentences",
                    index,
                    eligible.len()
                );
                break;
            }
            out.sentences.push(self.score_sentence(index, sentence, document));
        }
        out.omitted = eligible.len() - out.sentences.len();

        debug!(
            "[sentence_decomposer] scored={} omitted={} interrupted={}",
            out.sentences.len(),
            out.omitted,
            out.interrupted
        );
        out
    }

    fn score_sentence(&self, index: usize, sentence: &str, document: &PatternMatches) -> SentenceResult {
        let hits = document.restrict_to(sentence);
        let features = self.extractor.extract(sentence);
        let outcome = self.fusion.fuse(&hits, &features, count_words(sentence));

        SentenceResult {
            index,
            text: sentence.to_string(),
            ai_probability: outcome.ai_probability,
            human_probability: outcome.human_probability,
            flagged: is_flagged(outcome.ai_probability, self.fusion.profile()),
            pattern_hits: hits.into_hits(),
        }
    }
}
