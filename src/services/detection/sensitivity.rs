// Sensitivity utilities
// Sensitivity influences the label margin and sentence flagging, not raw probabilities.

use crate::models::Prediction;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DetectionSensitivity {
    Low,
    Medium,
    High,
}

impl DetectionSensitivity {
    /// Unknown labels fall back to `Medium`.
    pub fn from_label(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DecisionProfile {
    /// Half-width of the `uncertain` band around 0.5.
    pub margin: f64,
    /// Sentences strictly above this AI probability are flagged.
    pub flag_threshold: f64,
}

pub fn decision_profile(sensitivity: DetectionSensitivity) -> DecisionProfile {
    match sensitivity {
        DetectionSensitivity::Low => DecisionProfile {
            margin: 0.10,
            flag_threshold: 0.70,
        },
        DetectionSensitivity::Medium => DecisionProfile {
            margin: 0.05,
            flag_threshold: 0.60,
        },
        DetectionSensitivity::High => DecisionProfile {
            margin: 0.03,
            flag_threshold: 0.55,
        },
    }
}

pub fn decide_prediction(ai_probability: f64, profile: &DecisionProfile) -> Prediction {
    if ai_probability > 0.5 + profile.margin {
        Prediction::AiGenerated
    } else if ai_probability < 0.5 - profile.margin {
        Prediction::Human
    } else {
        Prediction::Uncertain
    }
}

pub fn is_flagged(ai_probability: f64, profile: &DecisionProfile) -> bool {
    ai_probability > profile.flag_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margins_order() {
        let low = decision_profile(DetectionSensitivity::Low);
        let mid = decision_profile(DetectionSensitivity::Medium);
        let high = decision_profile(DetectionSensitivity::High);
        assert!(low.margin > mid.margin);
        assert!(mid.margin > high.margin);
        assert!(low.flag_threshold > mid.flag_threshold);
    }

    #[test]
    fn test_from_label_defaults_to_medium() {
        assert_eq!(DetectionSensitivity::from_label(" HIGH "), DetectionSensitivity::High);
        assert_eq!(DetectionSensitivity::from_label("bogus"), DetectionSensitivity::Medium);
    }

    #[test]
    fn test_decide_prediction_medium_band() {
        let p = decision_profile(DetectionSensitivity::Medium);
        assert_eq!(decide_prediction(0.56, &p), Prediction::AiGenerated);
        assert_eq!(decide_prediction(0.55, &p), Prediction::Uncertain);
        assert_eq!(decide_prediction(0.5, &p), Prediction::Uncertain);
        assert_eq!(decide_prediction(0.44, &p), Prediction::Human);
    }

    #[test]
    fn test_flag_threshold_is_strict() {
        let p = decision_profile(DetectionSensitivity::Medium);
        assert!(!is_flagged(0.6, &p));
        assert!(is_flagged(0.61, &p));
    }
}
