// Comparison Logic
// Compares sentence-level scores against the whole-document score.

use crate::models::{DivergentSentence, SentenceSummary};
use crate::services::text_processor::preview;

use super::sentence_decomposer::Decomposition;

const PREVIEW_CHARS: usize = 100;

fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

/// Summarize a decomposition relative to the document's AI probability.
pub fn summarize_sentences(document_ai: f64, decomposition: &Decomposition) -> SentenceSummary {
    let sentences = &decomposition.sentences;
    let scored = sentences.len();

    if scored == 0 {
        return SentenceSummary {
            scored: 0,
            omitted: decomposition.omitted,
            flagged: 0,
            mean_ai_probability: round4(document_ai),
            consistency_score: 1.0,
            most_divergent: None,
            interrupted: decomposition.interrupted,
        };
    }

    let doc_direction = document_ai > 0.5;
    let mut consistent = 0usize;
    let mut flagged = 0usize;
    let mut total = 0.0;
    let mut most_divergent: Option<DivergentSentence> = None;

    for s in sentences {
        total += s.ai_probability;
        if s.flagged {
            flagged += 1;
        }
        if (s.ai_probability > 0.5) == doc_direction {
            consistent += 1;
        }

        let diff = (s.ai_probability - document_ai).abs();
        if most_divergent.as_ref().map_or(true, |d| diff > d.probability_diff) {
            most_divergent = Some(DivergentSentence {
                index: s.index,
                probability_diff: diff,
                text_preview: preview(&s.text, PREVIEW_CHARS),
            });
        }
    }

    SentenceSummary {
        scored,
        omitted: decomposition.omitted,
        flagged,
        mean_ai_probability: round4(total / scored as f64),
        consistency_score: round4(consistent as f64 / scored as f64),
        most_divergent: most_divergent.map(|d| DivergentSentence {
            probability_diff: round4(d.probability_diff),
            ..d
        }),
        interrupted: decomposition.interrupted,
    }
}
