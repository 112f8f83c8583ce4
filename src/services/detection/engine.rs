// Scoring Engine
// Entry point: normalize -> [pattern matcher, feature extractor] -> fusion
// -> optional sentence decomposition, behind the optional result cache.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::models::{short_text_warning, ScoreOptions, ScoreResult};
use crate::services::config_store::EngineConfig;
use crate::services::result_cache::{CacheKey, Fingerprint, ResultCache};
use crate::services::text_processor::{count_words, normalize_text, truncate_chars};

use super::comparison::summarize_sentences;
use super::fusion::ScoreFusion;
use super::linguistic::FeatureExtractor;
use super::pattern_catalog::{CatalogError, PatternCatalog};
use super::pattern_matcher::match_patterns;
use super::sensitivity::{decision_profile, DetectionSensitivity};
use super::sentence_decomposer::{Deadline, SentenceDecomposer};

pub struct ScoringEngine {
    config: EngineConfig,
    sensitivity: DetectionSensitivity,
    catalog: Arc<PatternCatalog>,
    cache: Option<Arc<ResultCache>>,
    extractor: FeatureExtractor,
    fusion: ScoreFusion,
}

impl ScoringEngine {
    pub fn new(config: EngineConfig, catalog: Arc<PatternCatalog>, cache: Option<Arc<ResultCache>>) -> Self {
        let sensitivity = DetectionSensitivity::from_label(&config.sensitivity);
        let fusion = ScoreFusion::new(&config.fusion, &config.calibration, decision_profile(sensitivity));
        let extractor = FeatureExtractor::new(&config.features);
        Self {
            config,
            sensitivity,
            catalog,
            cache,
            extractor,
            fusion,
        }
    }

    /// Build an engine from configuration: the catalog comes from
    /// `catalogPath` when set (built-in otherwise) and a private cache is
    /// created when `cacheCapacity` is non-zero.
    pub fn from_config(config: EngineConfig) -> Result<Self, CatalogError> {
        let catalog = match &config.catalog_path {
            Some(path) => Arc::new(PatternCatalog::from_file(path)?),
            None => PatternCatalog::builtin(),
        };
        let cache = (config.cache_capacity > 0).then(|| Arc::new(ResultCache::new(config.cache_capacity)));
        info!(
            "[engine] ready: {} categories, sensitivity={}, cache={}",
            catalog.categories().len(),
            DetectionSensitivity::from_label(&config.sensitivity).as_str(),
            config.cache_capacity
        );
        Ok(Self::new(config, catalog, cache))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sensitivity(&self) -> DetectionSensitivity {
        self.sensitivity
    }

    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn score(&self, text: &str, detailed: bool) -> ScoreResult {
        let options = ScoreOptions {
            detailed,
            ..ScoreOptions::default()
        };
        self.score_with_options(text, &options)
    }

    pub fn score_with_options(&self, text: &str, options: &ScoreOptions) -> ScoreResult {
        let deadline = Deadline::after(options.budget);
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return empty_result();
        }

        let Some(cache) = &self.cache else {
            return self.compute(&normalized, options, &deadline);
        };

        let key = self.cache_key(&normalized, options);
        if options.budget.is_none() {
            return cache.get_or_compute(key, || self.compute(&normalized, options, &deadline));
        }

        // Budgeted calls may return partial decompositions, which must not be cached.
        if let Some(hit) = cache.get(&key) {
            return hit;
        }
        let result = self.compute(&normalized, options, &deadline);
        let interrupted = result.sentence_summary.as_ref().is_some_and(|s| s.interrupted);
        if !interrupted {
            cache.insert(key, result.clone());
        }
        result
    }

    /// Score without consulting or filling the cache.
    pub fn score_uncached(&self, text: &str, options: &ScoreOptions) -> ScoreResult {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return empty_result();
        }
        self.compute(&normalized, options, &Deadline::after(options.budget))
    }

    fn max_sentences(&self, options: &ScoreOptions) -> usize {
        options
            .max_sentences
            .unwrap_or(self.config.decomposition.max_sentences)
    }

    fn cache_key(&self, normalized: &str, options: &ScoreOptions) -> CacheKey {
        CacheKey {
            fingerprint: Fingerprint::of(normalized),
            detailed: options.detailed,
            max_sentences: if options.detailed {
                self.max_sentences(options)
            } else {
                0
            },
        }
    }

    fn compute(&self, normalized: &str, options: &ScoreOptions, deadline: &Deadline) -> ScoreResult {
        let started = Instant::now();
        let (text, truncated) = truncate_chars(normalized, self.config.max_input_chars);
        let text = text.trim_end();
        if truncated {
            warn!(
                "[engine] input truncated to {} chars (limit {})",
                text.chars().count(),
                self.config.max_input_chars
            );
        }

        let matches = match_patterns(&self.catalog, text);
        let features = self.extractor.extract(text);
        let word_count = count_words(text);
        let outcome = self.fusion.fuse(&matches, &features, word_count);

        let decomposer = SentenceDecomposer::new(&self.config.decomposition, &self.extractor, &self.fusion);
        let (sentences, sentence_summary) = if options.detailed && decomposer.accepts(text) {
            let decomposition = decomposer.decompose(text, &matches, self.max_sentences(options), deadline);
            let summary = summarize_sentences(outcome.ai_probability, &decomposition);
            (decomposition.sentences, Some(summary))
        } else {
            (Vec::new(), None)
        };

        debug!(
            "[engine] words={} categories={} pattern={:.3} linguistic={:.3} ai={:.4} prediction={} in {:?}",
            word_count,
            matches.distinct_categories(),
            outcome.pattern_component,
            outcome.linguistic_component,
            outcome.ai_probability,
            outcome.prediction.as_str(),
            started.elapsed()
        );

        ScoreResult {
            human_probability: outcome.human_probability,
            ai_probability: outcome.ai_probability,
            prediction: outcome.prediction,
            confidence: outcome.ai_probability.max(outcome.human_probability) * 100.0,
            pattern_summary: matches.summary(),
            pattern_hits: matches.into_hits(),
            features,
            word_count,
            truncated,
            sentences,
            sentence_summary,
            warning: short_text_warning(word_count),
        }
    }
}

fn empty_result() -> ScoreResult {
    ScoreResult {
        warning: short_text_warning(0),
        ..ScoreResult::neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prediction;
    use std::time::Duration;

    const FORMAL: &str = "Furthermore, it is important to note that this necessitates a comprehensive, \
                          multifaceted approach; in conclusion, the implications warrant further analysis.";

    fn engine() -> ScoringEngine {
        ScoringEngine::from_config(EngineConfig::default()).unwrap()
    }

    fn uncached() -> ScoringEngine {
        ScoringEngine::new(EngineConfig::default(), PatternCatalog::builtin(), None)
    }

    #[test]
    fn test_empty_input_is_neutral() {
        let e = engine();
        for text in ["", "   ", "\n\t  \n"] {
            let r = e.score(text, true);
            assert_eq!(r.ai_probability, 0.5);
            assert_eq!(r.human_probability, 0.5);
            assert_eq!(r.prediction, Prediction::Uncertain);
            assert!(r.sentences.is_empty());
        }
        assert!(e.cache().unwrap().is_empty());
        assert!(e.score("", false).warning.is_some());
    }

    #[test]
    fn test_single_word_carries_warning() {
        let e = engine();
        let one = e.score("Hello!", false);
        assert_eq!(one.word_count, 1);
        assert!(one.warning.is_some());
        assert!((one.ai_probability + one.human_probability - 1.0).abs() < 1e-9);
        assert!(e.score("Hello there", false).warning.is_none());
    }

    #[test]
    fn test_spans_index_the_normalized_text() {
        let raw = "  Furthermore,\n\n it holds.";
        let r = engine().score(raw, false);
        let normalized = normalize_text(raw);
        let hit = r
            .pattern_hits
            .iter()
            .find(|h| h.category == "formal_transitions")
            .unwrap();
        assert_eq!((hit.span.start, hit.span.end), (0, 11));
        let located: String = normalized
            .chars()
            .skip(hit.span.start)
            .take(hit.span.end - hit.span.start)
            .collect();
        assert_eq!(located, hit.matched);
    }

    #[test]
    fn test_uncached_scoring_is_repeatable() {
        let e = uncached();
        let text = "I went to the shop. Furthermore, it was closed. The implications were dire for my dinner.";
        let first = e.score(text, true);
        for _ in 0..50 {
            assert_eq!(e.score(text, true), first);
        }
    }

    #[test]
    fn test_casual_text_scores_human() {
        let r = engine().score("hey whats up buddy, lol", false);
        assert_eq!(r.prediction, Prediction::Human);
        assert!(r.ai_probability < 0.3, "ai={}", r.ai_probability);
        assert!(r.pattern_hits.is_empty());
        assert_eq!(r.word_count, 5);
    }

    #[test]
    fn test_formal_text_scores_ai_generated() {
        let r = engine().score(FORMAL, false);
        assert!(r.distinct_categories() >= 4, "categories: {:?}", r.pattern_summary);
        assert!(r.ai_probability >= 0.55);
        assert_eq!(r.prediction, Prediction::AiGenerated);
        assert!((r.confidence - r.ai_probability * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_are_complementary() {
        let e = engine();
        let samples = [
            "hey whats up buddy, lol",
            FORMAL,
            "I went to the shop. It was closed! So I walked home in the rain, annoyed.",
            "Moreover, stakeholders must leverage synergies. Additionally, it is crucial to foster innovation.",
            "a",
        ];
        for text in samples {
            let r = e.score(text, true);
            assert!((r.ai_probability + r.human_probability - 1.0).abs() < 1e-9);
            assert!((0.0..=1.0).contains(&r.ai_probability));
            for s in &r.sentences {
                assert!((s.ai_probability + s.human_probability - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_cached_and_uncached_results_match() {
        let cached = engine();
        let plain = uncached();
        let text = "I went to the shop. Furthermore, it was closed. The implications were dire for my dinner.";
        let first = cached.score(text, true);
        let second = cached.score(text, true);
        let fresh = plain.score(text, true);
        assert_eq!(first, second);
        assert_eq!(first, fresh);
        assert_eq!(cached.cache().unwrap().stats().hits, 1);
    }

    #[test]
    fn test_whitespace_variants_share_cache_entry() {
        let e = engine();
        let a = e.score("Hello   world,\n this is   me.", false);
        let b = e.score("Hello world, this is me.", false);
        assert_eq!(a, b);
        assert_eq!(e.cache().unwrap().len(), 1);
    }

    #[test]
    fn test_detail_flag_is_cached_separately() {
        let e = engine();
        let text = "One two three four. Five six seven eight.";
        let plain = e.score(text, false);
        let detailed = e.score(text, true);
        assert!(plain.sentences.is_empty());
        assert_eq!(detailed.sentences.len(), 2);
        assert_eq!(plain.ai_probability, detailed.ai_probability);
        assert_eq!(e.cache().unwrap().len(), 2);
    }

    #[test]
    fn test_long_document_skips_sentence_analysis() {
        let text = "This is a plain sentence of moderate length. ".repeat(67);
        assert!(text.trim().chars().count() >= 3000);
        let e = engine();
        let detailed = e.score(&text, true);
        let plain = e.score(&text, false);
        assert!(detailed.sentences.is_empty());
        assert!(detailed.sentence_summary.is_none());
        assert_eq!(detailed.ai_probability, plain.ai_probability);
        assert!(!detailed.truncated);
    }

    #[test]
    fn test_sentence_hits_are_subset_of_document() {
        let text = "Furthermore, the plan works. It is important to note the implications. We had lunch after.";
        let r = engine().score(text, true);
        assert_eq!(r.sentences.len(), 3);
        for s in &r.sentences {
            for hit in &s.pattern_hits {
                assert!(r.pattern_summary.categories.contains_key(&hit.category));
            }
        }
        let summary = r.sentence_summary.unwrap();
        assert_eq!(summary.scored, 3);
        assert!(!summary.interrupted);
    }

    #[test]
    fn test_max_sentences_override() {
        let text = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let options = ScoreOptions {
            detailed: true,
            max_sentences: Some(1),
            budget: None,
        };
        let r = engine().score_with_options(text, &options);
        assert_eq!(r.sentences.len(), 1);
        assert_eq!(r.sentence_summary.unwrap().omitted, 2);
    }

    #[test]
    fn test_oversized_input_is_truncated() {
        let config = EngineConfig {
            max_input_chars: 20,
            ..EngineConfig::default()
        };
        let e = ScoringEngine::new(config, PatternCatalog::builtin(), None);
        let r = e.score("alpha beta gamma delta epsilon zeta eta theta", false);
        assert!(r.truncated);
        assert_eq!(r.word_count, 4);
    }

    #[test]
    fn test_exhausted_budget_is_not_cached() {
        let e = engine();
        let options = ScoreOptions {
            detailed: true,
            max_sentences: None,
            budget: Some(Duration::ZERO),
        };
        let text = "One two three four. Five six seven eight.";
        let r = e.score_with_options(text, &options);
        let summary = r.sentence_summary.unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.omitted, 2);
        assert!(e.cache().unwrap().is_empty());
        // document-level score is unaffected by the budget
        assert_eq!(r.ai_probability, e.score(text, false).ai_probability);
    }

    #[test]
    fn test_custom_catalog_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"categories":[{"name":"greeting","label":"Greeting","patterns":["\\bhello\\b"]}]}"#,
        )
        .unwrap();
        let config = EngineConfig {
            catalog_path: Some(path),
            ..EngineConfig::default()
        };
        let e = ScoringEngine::from_config(config).unwrap();
        assert_eq!(e.catalog().categories().len(), 1);
        let r = e.score("Hello there, furthermore, hello again.", false);
        assert_eq!(r.distinct_categories(), 1);
        assert_eq!(r.pattern_summary.categories["greeting"].count, 2);
        assert_eq!(r.pattern_summary.total_count, 1);
    }

    #[test]
    fn test_missing_catalog_file_is_an_error() {
        let config = EngineConfig {
            catalog_path: Some("/nonexistent/authentext/catalog.json".into()),
            ..EngineConfig::default()
        };
        assert!(matches!(
            ScoringEngine::from_config(config),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let config = EngineConfig {
            cache_capacity: 0,
            ..EngineConfig::default()
        };
        let e = ScoringEngine::from_config(config).unwrap();
        assert!(e.cache().is_none());
        assert_eq!(e.score(FORMAL, true), e.score(FORMAL, true));
    }
}
