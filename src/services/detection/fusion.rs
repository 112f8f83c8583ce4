// Score Fusion & Calibration
// Combines the categorical pattern signal with the continuous linguistic one.
//
// raw = patternWeight * tier(weighted k) + linguisticWeight * linguistic
// then: boost floor (k >= 4) OR short-text shrink toward 0.5, never both.

use crate::models::{LinguisticFeatures, Prediction};
use crate::services::config_store::{BoostStep, CalibrationConfig, FusionConfig, TierStep};

use super::pattern_matcher::PatternMatches;
use super::sensitivity::{decide_prediction, DecisionProfile};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutcome {
    pub ai_probability: f64,
    pub human_probability: f64,
    pub prediction: Prediction,
    pub pattern_component: f64,
    pub linguistic_component: f64,
    /// Weighted mix before boost or calibration.
    pub raw_probability: f64,
    pub boost_floor: Option<f64>,
    pub calibration_factor: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ScoreFusion {
    fusion: FusionConfig,
    calibration: CalibrationConfig,
    profile: DecisionProfile,
}

impl ScoreFusion {
    pub fn new(fusion: &FusionConfig, calibration: &CalibrationConfig, profile: DecisionProfile) -> Self {
        let mut fusion = fusion.clone();
        fusion.pattern_tiers.sort_by(|a, b| a.at.total_cmp(&b.at));
        fusion.boost_floors.sort_by_key(|b| b.min_categories);
        Self {
            fusion,
            calibration: calibration.clone(),
            profile,
        }
    }

    pub fn profile(&self) -> &DecisionProfile {
        &self.profile
    }

    pub fn fuse(&self, matches: &PatternMatches, features: &LinguisticFeatures, word_count: usize) -> FusionOutcome {
        self.fuse_counts(
            matches.distinct_categories(),
            matches.weighted_categories(),
            features,
            word_count,
        )
    }

    /// Core fusion over category counts. `distinct` drives the boost table,
    /// `weighted` (sum of tier weights) drives the pattern tiers.
    pub fn fuse_counts(
        &self,
        distinct: usize,
        weighted: f64,
        features: &LinguisticFeatures,
        word_count: usize,
    ) -> FusionOutcome {
        let pattern_component = self.pattern_component(weighted);
        let linguistic_component = self.linguistic_component(features);
        let raw = (self.fusion.pattern_weight * pattern_component
            + self.fusion.linguistic_weight * linguistic_component)
            .clamp(0.0, 1.0);

        let boost_floor = self.boost_floor(distinct);
        let mut calibration_factor = None;
        let ai = match boost_floor {
            Some(floor) => raw.max(floor),
            None => match self.calibration_factor(word_count) {
                Some(factor) => {
                    calibration_factor = Some(factor);
                    0.5 + (raw - 0.5) * factor
                }
                None => raw,
            },
        }
        .clamp(0.0, 1.0);

        FusionOutcome {
            ai_probability: ai,
            human_probability: 1.0 - ai,
            prediction: decide_prediction(ai, &self.profile),
            pattern_component,
            linguistic_component,
            raw_probability: raw,
            boost_floor,
            calibration_factor,
        }
    }

    /// Tier lookup: value of the last step reached, plus a per-category
    /// increment past the final step. Capped at 1.0.
    pub fn pattern_component(&self, weighted: f64) -> f64 {
        tier_value(&self.fusion.pattern_tiers, self.fusion.extra_category_step, weighted)
    }

    /// Linguistic evidence normalized by its weight budget, in [0,1].
    pub fn linguistic_component(&self, f: &LinguisticFeatures) -> f64 {
        let cfg = &self.fusion;
        let budget = cfg.diversity_weight + cfg.entropy_weight + cfg.burstiness_weight + cfg.repetition_weight;
        if budget <= 0.0 {
            return 0.0;
        }
        let sum = cfg.diversity_weight * (1.0 - f.vocabulary_diversity)
            + cfg.entropy_weight * (1.0 - f.entropy)
            + cfg.burstiness_weight * (1.0 - f.burstiness)
            + cfg.repetition_weight * f.ngram_repetition;
        (sum / budget).clamp(0.0, 1.0)
    }

    pub fn boost_floor(&self, distinct: usize) -> Option<f64> {
        boost_value(&self.fusion.boost_floors, distinct)
    }

    /// Shrink factor for texts under the short-text threshold, `None` otherwise.
    pub fn calibration_factor(&self, word_count: usize) -> Option<f64> {
        let threshold = self.calibration.short_text_words;
        if word_count >= threshold {
            return None;
        }
        let min = self.calibration.min_shrink_factor;
        Some(min + (1.0 - min) * word_count as f64 / threshold as f64)
    }
}

fn tier_value(tiers: &[TierStep], extra_step: f64, weighted: f64) -> f64 {
    let Some(step) = tiers.iter().rev().find(|t| weighted >= t.at) else {
        return 0.0;
    };
    let mut value = step.value;
    if let Some(last) = tiers.last() {
        if weighted > last.at {
            value += extra_step * (weighted - last.at);
        }
    }
    value.min(1.0)
}

fn boost_value(table: &[BoostStep], distinct: usize) -> Option<f64> {
    table
        .iter()
        .rev()
        .find(|b| distinct >= b.min_categories)
        .map(|b| b.floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::sensitivity::{decision_profile, DetectionSensitivity};

    fn fusion() -> ScoreFusion {
        ScoreFusion::new(
            &FusionConfig::default(),
            &CalibrationConfig::default(),
            decision_profile(DetectionSensitivity::Medium),
        )
    }

    fn human_like() -> LinguisticFeatures {
        LinguisticFeatures {
            vocabulary_diversity: 1.0,
            entropy: 1.0,
            burstiness: 1.0,
            ngram_repetition: 0.0,
        }
    }

    fn machine_like() -> LinguisticFeatures {
        LinguisticFeatures {
            vocabulary_diversity: 0.0,
            entropy: 0.0,
            burstiness: 0.0,
            ngram_repetition: 1.0,
        }
    }

    #[test]
    fn test_pattern_tiers_exhaustive() {
        let f = fusion();
        let expected = [
            (0.0, 0.0),
            (1.0, 0.10),
            (2.0, 0.25),
            (3.0, 0.45),
            (4.0, 0.65),
            (5.0, 0.65),
            (6.0, 0.75),
            (7.0, 0.80),
            (8.0, 0.85),
            (11.0, 1.0),
            (30.0, 1.0),
        ];
        for (k, value) in expected {
            assert!(
                (f.pattern_component(k) - value).abs() < 1e-9,
                "k={} got {}",
                k,
                f.pattern_component(k)
            );
        }
    }

    #[test]
    fn test_pattern_component_is_monotone() {
        let f = fusion();
        let mut prev = 0.0;
        for i in 0..40 {
            let v = f.pattern_component(i as f64 * 0.5);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_boost_table() {
        let f = fusion();
        assert_eq!(f.boost_floor(3), None);
        assert_eq!(f.boost_floor(4), Some(0.55));
        assert_eq!(f.boost_floor(5), Some(0.60));
        assert_eq!(f.boost_floor(9), Some(0.65));
    }

    #[test]
    fn test_boost_invariant_holds_for_any_features() {
        let f = fusion();
        for k in 4..10 {
            for features in [human_like(), machine_like(), LinguisticFeatures::empty()] {
                for words in [1, 10, 39, 40, 500] {
                    let out = f.fuse_counts(k, k as f64, &features, words);
                    assert!(out.ai_probability >= 0.55, "k={} words={}", k, words);
                    assert!(out.calibration_factor.is_none());
                }
            }
        }
    }

    #[test]
    fn test_linguistic_component_bounds() {
        let f = fusion();
        assert_eq!(f.linguistic_component(&human_like()), 0.0);
        assert!((f.linguistic_component(&machine_like()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_text_calibration_pulls_toward_half() {
        let f = fusion();
        let long = f.fuse_counts(0, 0.0, &machine_like(), 200);
        let short = f.fuse_counts(0, 0.0, &machine_like(), 10);
        assert!((long.ai_probability - 0.5).abs() > (short.ai_probability - 0.5).abs());
        assert_eq!(f.calibration_factor(0), Some(0.5));
        assert_eq!(f.calibration_factor(20), Some(0.75));
        assert_eq!(f.calibration_factor(40), None);
    }

    #[test]
    fn test_casual_chat_scores_human() {
        // "hey whats up buddy, lol": all-distinct tokens, one sentence
        let features = LinguisticFeatures {
            vocabulary_diversity: 1.0,
            entropy: 1.0,
            burstiness: 0.5,
            ngram_repetition: 0.0,
        };
        let out = fusion().fuse_counts(0, 0.0, &features, 5);
        assert!(out.ai_probability < 0.3);
        assert_eq!(out.prediction, Prediction::Human);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let f = fusion();
        for k in 0..8 {
            for features in [human_like(), machine_like()] {
                let out = f.fuse_counts(k, k as f64, &features, 25);
                assert!((out.ai_probability + out.human_probability - 1.0).abs() < 1e-12);
                assert!((0.0..=1.0).contains(&out.ai_probability));
            }
        }
    }

    #[test]
    fn test_more_categories_never_lowers_score() {
        let f = fusion();
        let features = LinguisticFeatures {
            vocabulary_diversity: 0.7,
            entropy: 0.9,
            burstiness: 0.3,
            ngram_repetition: 0.05,
        };
        let mut prev = 0.0;
        for k in 0..10 {
            let out = f.fuse_counts(k, k as f64, &features, 100);
            assert!(out.ai_probability >= prev);
            prev = out.ai_probability;
        }
    }
}
