// Pattern Catalog
// Named lexical categories loaded once from JSON (built-in or user supplied).

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

/// Compiled-program budget per matcher. Anything larger is treated as a
/// malformed matcher and skipped.
const MATCHER_SIZE_LIMIT: usize = 1 << 20;

const BUILTIN_CATALOG: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/data/pattern_catalog.json"
));

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("duplicate category name: {0}")]
    DuplicateCategory(String),
    #[error("catalog has no usable categories")]
    Empty,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    #[allow(dead_code)]
    source: String,
    categories: Vec<CatalogCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogCategory {
    name: String,
    #[serde(default)]
    label: String,
    #[serde(default = "default_tier_weight")]
    tier_weight: f64,
    patterns: Vec<String>,
}

fn default_tier_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct PatternCategory {
    name: String,
    label: String,
    tier_weight: f64,
    matchers: Vec<Regex>,
}

impl PatternCategory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tier_weight(&self) -> f64 {
        self.tier_weight
    }

    pub fn matchers(&self) -> &[Regex] {
        &self.matchers
    }
}

/// A matcher dropped at load time, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMatcher {
    pub category: String,
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PatternCatalog {
    version: u32,
    categories: Vec<PatternCategory>,
    skipped: Vec<SkippedMatcher>,
}

static BUILTIN: OnceLock<Arc<PatternCatalog>> = OnceLock::new();

impl PatternCatalog {
    /// The catalog shipped with the crate, compiled on first use.
    pub fn builtin() -> Arc<PatternCatalog> {
        BUILTIN
            .get_or_init(|| {
                let catalog = PatternCatalog::from_json(BUILTIN_CATALOG)
                    .expect("built-in pattern_catalog.json parse failed");
                Arc::new(catalog)
            })
            .clone()
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&raw)?;
        info!(
            "[pattern_catalog] loaded {} categories from {}",
            catalog.categories.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse and compile a catalog. Matchers that fail to compile are skipped
    /// with a warning; a category left without matchers is dropped.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parsed: CatalogFile = serde_json::from_str(raw)?;

        let mut names = HashSet::new();
        let mut categories = Vec::new();
        let mut skipped = Vec::new();

        for entry in parsed.categories {
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            if !names.insert(name.clone()) {
                return Err(CatalogError::DuplicateCategory(name));
            }

            let mut matchers = Vec::with_capacity(entry.patterns.len());
            for pattern in entry.patterns {
                match compile_matcher(&pattern) {
                    Ok(re) => matchers.push(re),
                    Err(e) => {
                        warn!(
                            "[pattern_catalog] skipping matcher {:?} in category {}: {}",
                            pattern, name, e
                        );
                        skipped.push(SkippedMatcher {
                            category: name.clone(),
                            pattern,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if matchers.is_empty() {
                warn!("[pattern_catalog] category {} has no usable matchers, skipped", name);
                continue;
            }

            let label = if entry.label.trim().is_empty() {
                name.clone()
            } else {
                entry.label.trim().to_string()
            };
            let tier_weight = if entry.tier_weight.is_finite() && entry.tier_weight > 0.0 {
                entry.tier_weight
            } else {
                default_tier_weight()
            };

            categories.push(PatternCategory {
                name,
                label,
                tier_weight,
                matchers,
            });
        }

        if categories.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self {
            version: parsed.version,
            categories,
            skipped,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn categories(&self) -> &[PatternCategory] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&PatternCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn skipped(&self) -> &[SkippedMatcher] {
        &self.skipped
    }
}

fn compile_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(MATCHER_SIZE_LIMIT)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = PatternCatalog::builtin();
        assert!(catalog.categories().len() >= 6);
        assert!(catalog.skipped().is_empty());
        for name in ["hedging", "formal_transitions", "formal_vocabulary", "meta_awareness", "academic_filler", "list_connectors"] {
            assert!(catalog.get(name).is_some(), "missing category {}", name);
        }
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = PatternCatalog::builtin();
        let b = PatternCatalog::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_invalid_matcher_is_skipped() {
        let raw = r#"{"categories":[{"name":"broken","patterns":["(unclosed","\\bokay\\b"]}]}"#;
        let catalog = PatternCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.categories().len(), 1);
        assert_eq!(catalog.categories()[0].matchers().len(), 1);
        assert_eq!(catalog.skipped().len(), 1);
        assert_eq!(catalog.skipped()[0].category, "broken");
    }

    #[test]
    fn test_category_without_valid_matchers_is_dropped() {
        let raw = r#"{"categories":[
            {"name":"broken","patterns":["[z-a]"]},
            {"name":"fine","label":"Fine","tierWeight":2.0,"patterns":["\\bfine\\b"]}
        ]}"#;
        let catalog = PatternCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.categories().len(), 1);
        let fine = catalog.get("fine").unwrap();
        assert_eq!(fine.label(), "Fine");
        assert_eq!(fine.tier_weight(), 2.0);
    }

    #[test]
    fn test_oversized_matcher_is_skipped() {
        let huge = format!("\\b(?:{})\\b", "\\w{100}".repeat(200));
        let raw = serde_json::json!({
            "categories": [{"name": "huge", "patterns": [huge, "\\bsmall\\b"]}]
        })
        .to_string();
        let catalog = PatternCatalog::from_json(&raw).unwrap();
        assert_eq!(catalog.get("huge").unwrap().matchers().len(), 1);
        assert_eq!(catalog.skipped().len(), 1);
    }

    #[test]
    fn test_duplicate_category_is_rejected() {
        let raw = r#"{"categories":[{"name":"a","patterns":["x"]},{"name":"a","patterns":["y"]}]}"#;
        assert!(matches!(
            PatternCatalog::from_json(raw),
            Err(CatalogError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        assert!(matches!(
            PatternCatalog::from_json(r#"{"categories":[]}"#),
            Err(CatalogError::Empty)
        ));
    }
}
