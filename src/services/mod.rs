// Authentext Core Services

pub mod text_processor;
pub mod config_store;
pub mod result_cache;
pub mod detection;

pub use text_processor::*;
pub use config_store::*;
pub use result_cache::{CacheKey, CacheStats, Fingerprint, ResultCache};

pub use detection::{
    match_patterns,
    extract_features,
    score_batch,
    summarize_sentences,
    CatalogError,
    DetectionSensitivity,
    FeatureExtractor,
    PatternCatalog,
    PatternMatches,
    ScoreFusion,
    ScoringEngine,
};
