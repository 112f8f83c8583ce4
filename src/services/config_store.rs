// Configuration Storage Service
// Engine tuning constants, config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError + '_ {
    move |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Step of the pattern tier table: once the weighted category count reaches
/// `at`, the pattern component is `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierStep {
    pub at: f64,
    pub value: f64,
}

/// Step of the boost table: `min_categories` distinct categories floor the
/// AI probability at `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostStep {
    pub min_categories: usize,
    pub floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    #[serde(default = "default_pattern_weight")]
    pub pattern_weight: f64,
    #[serde(default = "default_linguistic_weight")]
    pub linguistic_weight: f64,
    #[serde(default = "default_diversity_weight")]
    pub diversity_weight: f64,
    #[serde(default = "default_entropy_weight")]
    pub entropy_weight: f64,
    #[serde(default = "default_burstiness_weight")]
    pub burstiness_weight: f64,
    #[serde(default = "default_repetition_weight")]
    pub repetition_weight: f64,
    #[serde(default = "default_pattern_tiers")]
    pub pattern_tiers: Vec<TierStep>,
    /// Added per category beyond the last tier step.
    #[serde(default = "default_extra_category_step")]
    pub extra_category_step: f64,
    #[serde(default = "default_boost_floors")]
    pub boost_floors: Vec<BoostStep>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            pattern_weight: default_pattern_weight(),
            linguistic_weight: default_linguistic_weight(),
            diversity_weight: default_diversity_weight(),
            entropy_weight: default_entropy_weight(),
            burstiness_weight: default_burstiness_weight(),
            repetition_weight: default_repetition_weight(),
            pattern_tiers: default_pattern_tiers(),
            extra_category_step: default_extra_category_step(),
            boost_floors: default_boost_floors(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    /// Texts with fewer words are pulled toward 0.5.
    #[serde(default = "default_short_text_words")]
    pub short_text_words: usize,
    /// Shrink factor applied to a zero-word text; rises linearly to 1.0.
    #[serde(default = "default_min_shrink")]
    pub min_shrink_factor: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            short_text_words: default_short_text_words(),
            min_shrink_factor: default_min_shrink(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    /// Sentence-length variance (words^2) that saturates burstiness at 1.0.
    #[serde(default = "default_burstiness_reference")]
    pub burstiness_reference_variance: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            ngram_size: default_ngram_size(),
            burstiness_reference_variance: default_burstiness_reference(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionConfig {
    /// Documents at or above this many characters are never decomposed.
    #[serde(default = "default_cutoff_chars")]
    pub cutoff_chars: usize,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    #[serde(default = "default_min_sentence_tokens")]
    pub min_sentence_tokens: usize,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            cutoff_chars: default_cutoff_chars(),
            max_sentences: default_max_sentences(),
            min_sentence_tokens: default_min_sentence_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: String,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub decomposition: DecompositionConfig,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// JSON catalog replacing the built-in one.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            sensitivity: default_sensitivity(),
            fusion: FusionConfig::default(),
            calibration: CalibrationConfig::default(),
            features: FeatureConfig::default(),
            decomposition: DecompositionConfig::default(),
            cache_capacity: default_cache_capacity(),
            max_input_chars: default_max_input_chars(),
            catalog_path: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.fusion;
        let weights = [
            ("patternWeight", f.pattern_weight),
            ("linguisticWeight", f.linguistic_weight),
            ("diversityWeight", f.diversity_weight),
            ("entropyWeight", f.entropy_weight),
            ("burstinessWeight", f.burstiness_weight),
            ("repetitionWeight", f.repetition_weight),
            ("extraCategoryStep", f.extra_category_step),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!("{} must be a non-negative number", name)));
            }
        }
        if (f.pattern_weight + f.linguistic_weight - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(
                "patternWeight + linguisticWeight must equal 1.0".to_string(),
            ));
        }
        if f.pattern_tiers.is_empty() {
            return Err(ConfigError::Invalid("patternTiers must not be empty".to_string()));
        }
        if f.pattern_tiers.windows(2).any(|w| w[1].at <= w[0].at || w[1].value < w[0].value) {
            return Err(ConfigError::Invalid(
                "patternTiers must be strictly ascending and non-decreasing".to_string(),
            ));
        }
        if f.pattern_tiers.iter().any(|t| !(0.0..=1.0).contains(&t.value)) {
            return Err(ConfigError::Invalid("patternTiers values must lie in [0,1]".to_string()));
        }
        if f.boost_floors.windows(2).any(|w| {
            w[1].min_categories <= w[0].min_categories || w[1].floor < w[0].floor
        }) {
            return Err(ConfigError::Invalid(
                "boostFloors must be strictly ascending and non-decreasing".to_string(),
            ));
        }
        if f.boost_floors.iter().any(|b| !(0.0..=1.0).contains(&b.floor)) {
            return Err(ConfigError::Invalid("boostFloors floors must lie in [0,1]".to_string()));
        }
        if !(0.0..=1.0).contains(&self.calibration.min_shrink_factor) {
            return Err(ConfigError::Invalid("minShrinkFactor must lie in [0,1]".to_string()));
        }
        if self.features.ngram_size == 0 {
            return Err(ConfigError::Invalid("ngramSize must be at least 1".to_string()));
        }
        let reference = self.features.burstiness_reference_variance;
        if !reference.is_finite() || reference <= 0.0 {
            return Err(ConfigError::Invalid(
                "burstinessReferenceVariance must be positive".to_string(),
            ));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::Invalid("maxInputChars must be positive".to_string()));
        }
        Ok(())
    }

    /// Environment overrides, applied after the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AUTHENTEXT_SENSITIVITY") {
            if !val.trim().is_empty() {
                self.sensitivity = val.trim().to_string();
            }
        }
        if let Ok(val) = std::env::var("AUTHENTEXT_CACHE_CAPACITY") {
            match val.trim().parse::<usize>() {
                Ok(n) => self.cache_capacity = n,
                Err(_) => warn!("[config] ignoring AUTHENTEXT_CACHE_CAPACITY={:?}", val),
            }
        }
        if let Ok(val) = std::env::var("AUTHENTEXT_CATALOG_PATH") {
            if !val.trim().is_empty() {
                self.catalog_path = Some(PathBuf::from(val.trim()));
            }
        }
    }
}

fn default_version() -> String { "1".to_string() }
fn default_sensitivity() -> String { "medium".to_string() }
fn default_pattern_weight() -> f64 { 0.40 }
fn default_linguistic_weight() -> f64 { 0.60 }
fn default_diversity_weight() -> f64 { 0.20 }
fn default_entropy_weight() -> f64 { 0.20 }
fn default_burstiness_weight() -> f64 { 0.10 }
fn default_repetition_weight() -> f64 { 0.10 }
fn default_extra_category_step() -> f64 { 0.05 }
fn default_short_text_words() -> usize { 40 }
fn default_min_shrink() -> f64 { 0.5 }
fn default_ngram_size() -> usize { 3 }
fn default_burstiness_reference() -> f64 { 64.0 }
fn default_cutoff_chars() -> usize { 2000 }
fn default_max_sentences() -> usize { 15 }
fn default_min_sentence_tokens() -> usize { 3 }
fn default_cache_capacity() -> usize { 256 }
fn default_max_input_chars() -> usize { 100_000 }

fn default_pattern_tiers() -> Vec<TierStep> {
    vec![
        TierStep { at: 0.0, value: 0.0 },
        TierStep { at: 1.0, value: 0.10 },
        TierStep { at: 2.0, value: 0.25 },
        TierStep { at: 3.0, value: 0.45 },
        TierStep { at: 4.0, value: 0.65 },
        TierStep { at: 6.0, value: 0.75 },
    ]
}

fn default_boost_floors() -> Vec<BoostStep> {
    vec![
        BoostStep { min_categories: 4, floor: 0.55 },
        BoostStep { min_categories: 5, floor: 0.60 },
        BoostStep { min_categories: 6, floor: 0.65 },
    ]
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Store backed by an explicit file; backups go next to it.
    pub fn from_file(config_file: PathBuf) -> Self {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("authentext"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir).map_err(io_err(&self.config_dir))
    }

    /// Load configuration; a missing file yields defaults.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        if !self.config_file.exists() {
            return Ok(EngineConfig::default());
        }

        let content = fs::read_to_string(&self.config_file).map_err(io_err(&self.config_file))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("[config] loaded {}", self.config_file.display());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_file, content).map_err(io_err(&self.config_file))
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file).map_err(io_err(&backup_file))?;

        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(io_err(backup_dir))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        entries.sort_by_key(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}
