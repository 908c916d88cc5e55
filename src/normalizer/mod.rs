//! Product recognition for listing titles
//!
//! This module maps noisy marketplace titles to canonical products:
//! - `text`: canonical text folding and keyword matching
//! - `catalog`: curated patterns, set detectors and type groups
//! - `types`: categories, patterns and recognition results

mod catalog;
pub mod text;
mod types;

pub use catalog::{default_patterns, EXCLUDE_KEYWORDS, SET_DETECTORS, TYPE_GROUPS};
pub use types::{NormalizedProduct, ProductCategory, ProductPattern, ScoringConfig};

use text::{canonicalize, contains_term, contains_word};

/// Generic names longer than this are truncated
const MAX_GENERIC_NAME_CHARS: usize = 50;

/// Recognizes which product a listing title refers to
///
/// Matching runs in three steps. Titles containing an exclusion keyword are
/// rejected with confidence 0. Otherwise every curated pattern is scored and
/// the best positive score wins. If none scores, a generic match assigns a
/// category from broad type keywords and a set from regex detectors.
#[derive(Debug, Clone)]
pub struct Normalizer {
    patterns: Vec<ProductPattern>,
    exclusions: Vec<String>,
    type_groups: Vec<(ProductCategory, Vec<String>)>,
    scoring: ScoringConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Creates a normalizer with the built-in catalogue and default scoring
    pub fn new() -> Self {
        Self::with_scoring(ScoringConfig::default())
    }

    pub fn with_scoring(scoring: ScoringConfig) -> Self {
        let mut normalizer = Self {
            patterns: Vec::new(),
            exclusions: EXCLUDE_KEYWORDS.iter().map(|k| canonicalize(k)).collect(),
            type_groups: TYPE_GROUPS
                .iter()
                .map(|(category, keywords)| {
                    (*category, keywords.iter().map(|k| canonicalize(k)).collect())
                })
                .collect(),
            scoring,
        };
        for pattern in default_patterns() {
            normalizer.add_pattern(pattern);
        }
        normalizer
    }

    /// Adds exclusion keywords on top of the built-in list
    pub fn with_exclusions<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions.extend(
            keywords
                .into_iter()
                .map(|k| canonicalize(k.as_ref()))
                .filter(|k| !k.is_empty()),
        );
        self
    }

    /// Registers a curated pattern; its keywords are folded on the way in
    pub fn add_pattern(&mut self, mut pattern: ProductPattern) {
        let fold = |keywords: &mut Vec<String>| {
            *keywords = keywords
                .iter()
                .map(|k| canonicalize(k))
                .filter(|k| !k.is_empty())
                .collect();
        };
        fold(&mut pattern.set_keywords);
        fold(&mut pattern.type_keywords);
        fold(&mut pattern.exclude_keywords);
        self.patterns.push(pattern);
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Recognizes a title, returning the product and its confidence
    pub fn normalize(&self, title: &str) -> (NormalizedProduct, f64) {
        let canonical = canonicalize(title);

        if self.is_excluded(&canonical) {
            return (NormalizedProduct::rejected(), 0.0);
        }

        let product = match self.match_known_pattern(&canonical) {
            Some(product) => product,
            None => self.generic_match(&canonical, title),
        };
        let confidence = product.confidence;
        (product, confidence)
    }

    fn is_excluded(&self, canonical: &str) -> bool {
        self.exclusions.iter().any(|k| contains_word(canonical, k))
    }

    fn match_known_pattern(&self, canonical: &str) -> Option<NormalizedProduct> {
        let mut best: Option<(&ProductPattern, f64)> = None;

        for pattern in &self.patterns {
            let score = self.pattern_score(canonical, pattern);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((pattern, score));
            }
        }

        best.map(|(pattern, score)| NormalizedProduct {
            canonical_name: pattern.canonical_name.clone(),
            category: pattern.category,
            set_name: pattern.set_name.clone(),
            set_code: pattern.set_code.clone(),
            msrp: pattern.msrp,
            confidence: score,
        })
    }

    /// Scores one pattern; 0 unless both keyword groups contribute a hit
    fn pattern_score(&self, canonical: &str, pattern: &ProductPattern) -> f64 {
        if pattern
            .exclude_keywords
            .iter()
            .any(|k| contains_term(canonical, k))
        {
            return 0.0;
        }

        let hits = |keywords: &[String]| keywords.iter().filter(|k| contains_term(canonical, k)).count();
        let set_hits = hits(&pattern.set_keywords);
        let type_hits = hits(&pattern.type_keywords);
        if set_hits == 0 || type_hits == 0 {
            return 0.0;
        }

        let set_ratio = set_hits as f64 / pattern.set_keywords.len() as f64;
        let type_ratio = type_hits as f64 / pattern.type_keywords.len() as f64;
        let score = self.scoring.set_weight * set_ratio + self.scoring.type_weight * type_ratio;
        score.min(self.scoring.pattern_ceiling).clamp(0.0, 1.0)
    }

    fn generic_match(&self, canonical: &str, title: &str) -> NormalizedProduct {
        let mut confidence = self.scoring.generic_base;

        let category = self
            .type_groups
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_term(canonical, k)))
            .map(|(category, _)| *category);
        if category.is_some() {
            confidence = self.scoring.generic_category;
        }
        let category = category.unwrap_or_default();

        let set = SET_DETECTORS.iter().find(|d| d.regex.is_match(canonical));
        if set.is_some() {
            confidence += self.scoring.set_bonus;
        }

        let canonical_name = match set {
            Some(detector) => format!("{} {}", category.name_prefix(), detector.name),
            None => truncate_title(title.trim()),
        };

        NormalizedProduct {
            canonical_name,
            category,
            set_name: set.map(|d| d.name.to_string()),
            set_code: set.map(|d| d.code.to_string()),
            msrp: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_GENERIC_NAME_CHARS {
        let head: String = title.chars().take(MAX_GENERIC_NAME_CHARS).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}
