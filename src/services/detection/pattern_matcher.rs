// Pattern Matcher
// Runs every catalog category over a text and collects deduplicated hits.

use std::collections::{BTreeMap, HashSet};

use crate::models::{CategorySummary, CharSpan, PatternHit, PatternSummary};
use crate::services::text_processor::char_offset;

use super::pattern_catalog::PatternCatalog;

#[derive(Debug, Clone, PartialEq)]
struct CategoryStats {
    label: String,
    tier_weight: f64,
    /// Raw match count, repeats included.
    occurrences: usize,
}

/// Hits for one text, grouped by category.
///
/// A category appears here only when it matched at least once, so
/// `distinct_categories` is the number of categories with a hit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatternMatches {
    hits: Vec<PatternHit>,
    categories: BTreeMap<String, CategoryStats>,
}

/// Match `text` against every category of `catalog`.
///
/// Within a category, hits with the same lowercased literal collapse into
/// one, keeping the earliest span. Hits come out in catalog order, then by
/// position.
pub fn match_patterns(catalog: &PatternCatalog, text: &str) -> PatternMatches {
    let mut matches = PatternMatches::default();
    if text.is_empty() {
        return matches;
    }

    for category in catalog.categories() {
        let mut found: Vec<(usize, usize)> = category
            .matchers()
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
            .filter(|(s, e)| e > s)
            .collect();
        if found.is_empty() {
            continue;
        }
        found.sort_unstable();

        let mut seen = HashSet::new();
        for &(start, end) in &found {
            let literal = &text[start..end];
            if !seen.insert(literal.to_lowercase()) {
                continue;
            }
            matches.hits.push(PatternHit {
                category: category.name().to_string(),
                matched: literal.to_string(),
                span: CharSpan {
                    start: char_offset(text, start),
                    end: char_offset(text, end),
                },
            });
        }

        matches.categories.insert(
            category.name().to_string(),
            CategoryStats {
                label: category.label().to_string(),
                tier_weight: category.tier_weight(),
                occurrences: found.len(),
            },
        );
    }

    matches
}

impl PatternMatches {
    pub fn hits(&self) -> &[PatternHit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<PatternHit> {
        self.hits
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn distinct_categories(&self) -> usize {
        self.categories.len()
    }

    /// Sum of tier weights over the matched categories.
    pub fn weighted_categories(&self) -> f64 {
        self.categories.values().map(|c| c.tier_weight).sum()
    }

    pub fn contains_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Hits attributable to `sentence`: those whose literal occurs in it,
    /// case-insensitively. Never yields a category the document lacks.
    pub fn restrict_to(&self, sentence: &str) -> PatternMatches {
        let haystack = sentence.to_lowercase();
        let mut restricted = PatternMatches::default();

        for hit in &self.hits {
            if !haystack.contains(&hit.matched.to_lowercase()) {
                continue;
            }
            let Some(stats) = self.categories.get(&hit.category) else {
                continue;
            };
            restricted.hits.push(hit.clone());
            restricted
                .categories
                .entry(hit.category.clone())
                .or_insert_with(|| CategoryStats {
                    label: stats.label.clone(),
                    tier_weight: stats.tier_weight,
                    occurrences: 0,
                })
                .occurrences += 1;
        }

        restricted
    }

    pub fn summary(&self) -> PatternSummary {
        PatternSummary {
            total_count: self.hits.len(),
            categories: self
                .categories
                .iter()
                .map(|(name, stats)| {
                    (
                        name.clone(),
                        CategorySummary {
                            label: stats.label.clone(),
                            count: stats.occurrences,
                        },
                    )
                })
                .collect(),
        }
    }
}
