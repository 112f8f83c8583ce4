// Detection Module
// Heuristic scoring core organized into specialized submodules:
// - pattern_catalog / pattern_matcher: named lexical categories and their hits
// - linguistic: vocabulary, entropy, burstiness and repetition statistics
// - fusion: tiered pattern boosting, linguistic mix and short-text calibration
// - sentence_decomposer / comparison: per-sentence scores and their summary
// - engine / batch: cached single-text entry point and bounded batch scoring

pub mod pattern_catalog;
pub mod pattern_matcher;
pub mod linguistic;
pub mod fusion;
pub mod sensitivity;
pub mod sentence_decomposer;
pub mod comparison;
pub mod engine;
pub mod batch;

pub use pattern_catalog::{CatalogError, PatternCatalog, PatternCategory, SkippedMatcher};
pub use pattern_matcher::{match_patterns, PatternMatches};
pub use linguistic::{extract_features, FeatureExtractor};
pub use fusion::{FusionOutcome, ScoreFusion};
pub use sensitivity::{decide_prediction, decision_profile, is_flagged, DecisionProfile, DetectionSensitivity};
pub use sentence_decomposer::{Deadline, Decomposition, SentenceDecomposer};
pub use comparison::summarize_sentences;
pub use engine::ScoringEngine;
pub use batch::{score_batch, DEFAULT_BATCH_CONCURRENCY};
