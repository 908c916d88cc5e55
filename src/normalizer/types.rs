use std::fmt;

/// Kind of sealed or single product a listing refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ProductCategory {
    Booster,
    Display,
    Etb,
    Collection,
    Bundle,
    Tin,
    #[default]
    Single,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 7] = [
        Self::Booster,
        Self::Display,
        Self::Etb,
        Self::Collection,
        Self::Bundle,
        Self::Tin,
        Self::Single,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Booster => "booster",
            Self::Display => "display",
            Self::Etb => "etb",
            Self::Collection => "collection",
            Self::Bundle => "bundle",
            Self::Tin => "tin",
            Self::Single => "single",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.to_db_string() == s)
    }

    /// Prefix used when synthesizing a product name
    pub fn name_prefix(&self) -> &'static str {
        match self {
            Self::Booster => "Booster",
            Self::Display => "Display",
            Self::Etb => "ETB",
            Self::Collection => "Coffret",
            Self::Bundle => "Bundle",
            Self::Tin => "Tin",
            Self::Single => "Carte",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A curated recognition rule for one known product
///
/// A title matches when at least one set keyword and one type keyword are
/// present and none of the exclusion keywords are.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPattern {
    pub canonical_name: String,
    pub category: ProductCategory,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub msrp: Option<f64>,
    pub set_keywords: Vec<String>,
    pub type_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

impl ProductPattern {
    pub fn new(canonical_name: impl Into<String>, category: ProductCategory) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            category,
            set_name: None,
            set_code: None,
            msrp: None,
            set_keywords: Vec::new(),
            type_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }

    pub fn in_set(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.set_code = Some(code.into());
        self.set_name = Some(name.into());
        self
    }

    pub fn msrp(mut self, msrp: f64) -> Self {
        self.msrp = Some(msrp);
        self
    }

    pub fn set_keywords(mut self, keywords: &[&str]) -> Self {
        self.set_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn type_keywords(mut self, keywords: &[&str]) -> Self {
        self.type_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn excluding(mut self, keywords: &[&str]) -> Self {
        self.exclude_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }
}

/// Result of recognizing one listing title
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedProduct {
    pub canonical_name: String,
    pub category: ProductCategory,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub msrp: Option<f64>,
    /// Heuristic score in [0, 1]; not a probability
    pub confidence: f64,
}

impl NormalizedProduct {
    /// Output for titles rejected outright
    pub fn rejected() -> Self {
        Self::default()
    }
}

/// Heuristic constants used by [`Normalizer`](super::Normalizer)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Weight of the set keyword hit ratio in a curated pattern score
    pub set_weight: f64,
    /// Weight of the type keyword hit ratio in a curated pattern score
    pub type_weight: f64,
    /// Upper bound for curated pattern scores
    pub pattern_ceiling: f64,
    /// Generic match with no recognized product type
    pub generic_base: f64,
    /// Generic match once a product type is recognized
    pub generic_category: f64,
    /// Added to a generic match when a set is recognized
    pub set_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            set_weight: 0.4,
            type_weight: 0.6,
            pattern_ceiling: 0.9,
            generic_base: 0.3,
            generic_category: 0.5,
            set_bonus: 0.2,
        }
    }
}
