//! Built-in recognition data for Scarlet & Violet era products
//!
//! Keywords are written the way sellers type them. The normalizer folds them
//! to canonical form when it loads them.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{ProductCategory, ProductPattern};

const DISPLAY_MSRP: f64 = 159.99;
const ETB_MSRP: f64 = 54.99;
const UPC_MSRP: f64 = 119.99;

const DISPLAY_TYPES: &[&str] = &["display", "boite 36", "36 boosters"];
const ETB_TYPES: &[&str] = &["etb", "elite trainer", "coffret dresseur"];
const UPC_TYPES: &[&str] = &["ultra premium", "upc"];

/// Keywords that mark a listing as off-topic, counterfeit, or a mixed lot
pub const EXCLUDE_KEYWORDS: &[&str] = &[
    "lot de",
    "bundle lot",
    "fake",
    "proxy",
    "custom",
    "yugioh",
    "yu-gi-oh",
    "magic",
    "mtg",
    "one piece",
    "digimon",
    "dragon ball",
    "weiss schwarz",
];

/// Broad product-type keywords, checked in this order by generic matching
pub const TYPE_GROUPS: &[(ProductCategory, &[&str])] = &[
    (
        ProductCategory::Display,
        &[
            "display",
            "boite 36",
            "box 36",
            "booster box",
            "36 boosters",
            "36 packs",
            "coffret 36",
        ],
    ),
    (
        ProductCategory::Etb,
        &[
            "etb",
            "elite trainer",
            "coffret dresseur",
            "trainer box",
            "coffret d'entrainement",
            "coffret entrainement",
        ],
    ),
    (
        ProductCategory::Collection,
        &[
            "coffret",
            "collection",
            "premium collection",
            "ultra premium",
            "upc",
            "special collection",
        ],
    ),
    (
        ProductCategory::Bundle,
        &["bundle", "pack 6", "6 boosters", "pack boosters"],
    ),
    (
        ProductCategory::Tin,
        &["tin", "pokebox", "poke box", "metal box", "boite metal"],
    ),
    (
        ProductCategory::Booster,
        &["booster", "pack", "pochette", "sachet"],
    ),
    (
        ProductCategory::Single,
        &[
            "carte",
            "card",
            "holo",
            "reverse",
            "full art",
            "alt art",
            "secret rare",
            "illustration rare",
            "special art",
        ],
    ),
];

/// Regex-based set recognizer used by generic matching
#[derive(Debug)]
pub struct SetDetector {
    pub code: &'static str,
    pub name: &'static str,
    pub regex: Regex,
}

fn detector(code: &'static str, name: &'static str, pattern: &str) -> SetDetector {
    SetDetector {
        code,
        name,
        regex: Regex::new(pattern).expect("set detector regex is valid"),
    }
}

/// Set detectors in evaluation order, most specific first
///
/// Patterns run against canonical text, so they carry no accents or
/// punctuation.
pub static SET_DETECTORS: LazyLock<Vec<SetDetector>> = LazyLock::new(|| {
    vec![
        detector("sv-151", "Écarlate et Violet 151", r"\b151\b"),
        detector(
            "sv-paldean-fates",
            "Destinées de Paldea",
            r"\b(paldea|paldean|destinees? de paldea|paldean fates)\b",
        ),
        detector(
            "sv-prismatic-evo",
            "Évolutions Prismatiques",
            r"\b(evolutions? prismatiques?|prismatic evolutions?)\b",
        ),
        detector(
            "sv-twilight",
            "Masques du Crépuscule",
            r"\b(masques? du crepuscule|twilight masquerade)\b",
        ),
        detector(
            "sv-temporal",
            "Forces Temporelles",
            r"\b(forces? temporelles?|temporal forces?)\b",
        ),
        detector(
            "sv-obsidian",
            "Flammes Obsidiennes",
            r"\b(flammes? obsidiennes?|obsidian flames?)\b",
        ),
        detector(
            "sv-paradox",
            "Faille Paradoxe",
            r"\b(faille paradoxe?|paradox rift)\b",
        ),
        detector(
            "sv-base",
            "Écarlate et Violet",
            r"\b(ecarlate\b.*\bviolet|scarlet\b.*\bviolet)\b",
        ),
    ]
});

/// The curated product patterns shipped with the normalizer
pub fn default_patterns() -> Vec<ProductPattern> {
    vec![
        ProductPattern::new("Display Écarlate et Violet 151", ProductCategory::Display)
            .in_set("sv-151", "Écarlate et Violet 151")
            .msrp(DISPLAY_MSRP)
            .set_keywords(&["151"])
            .type_keywords(DISPLAY_TYPES),
        ProductPattern::new("Display Destinées de Paldea", ProductCategory::Display)
            .in_set("sv-paldean-fates", "Destinées de Paldea")
            .msrp(DISPLAY_MSRP)
            .set_keywords(&["paldea", "paldean", "destinées"])
            .type_keywords(DISPLAY_TYPES),
        ProductPattern::new("Display Évolutions Prismatiques", ProductCategory::Display)
            .in_set("sv-prismatic-evo", "Évolutions Prismatiques")
            .msrp(DISPLAY_MSRP)
            .set_keywords(&["prismatique", "prismatic"])
            .type_keywords(DISPLAY_TYPES),
        ProductPattern::new("Display Masques du Crépuscule", ProductCategory::Display)
            .in_set("sv-twilight", "Masques du Crépuscule")
            .msrp(DISPLAY_MSRP)
            .set_keywords(&["crépuscule", "twilight", "masque"])
            .type_keywords(DISPLAY_TYPES),
        ProductPattern::new("Display Forces Temporelles", ProductCategory::Display)
            .in_set("sv-temporal", "Forces Temporelles")
            .msrp(DISPLAY_MSRP)
            .set_keywords(&["temporelles", "temporal"])
            .type_keywords(DISPLAY_TYPES),
        ProductPattern::new("ETB Écarlate et Violet 151", ProductCategory::Etb)
            .in_set("sv-151", "Écarlate et Violet 151")
            .msrp(ETB_MSRP)
            .set_keywords(&["151"])
            .type_keywords(ETB_TYPES),
        ProductPattern::new("ETB Destinées de Paldea", ProductCategory::Etb)
            .in_set("sv-paldean-fates", "Destinées de Paldea")
            .msrp(ETB_MSRP)
            .set_keywords(&["paldea", "paldean", "destinées"])
            .type_keywords(ETB_TYPES),
        ProductPattern::new("ETB Évolutions Prismatiques", ProductCategory::Etb)
            .in_set("sv-prismatic-evo", "Évolutions Prismatiques")
            .msrp(ETB_MSRP)
            .set_keywords(&["prismatique", "prismatic"])
            .type_keywords(ETB_TYPES),
        ProductPattern::new("Coffret Dracaufeu Ultra Premium", ProductCategory::Collection)
            .in_set("sv-charizard-upc", "Écarlate et Violet")
            .msrp(UPC_MSRP)
            .set_keywords(&["dracaufeu", "charizard"])
            .type_keywords(UPC_TYPES),
        ProductPattern::new("Coffret Mew Ultra Premium", ProductCategory::Collection)
            .in_set("sv-151-upc", "Écarlate et Violet 151")
            .msrp(UPC_MSRP)
            .set_keywords(&["mew", "151"])
            .type_keywords(UPC_TYPES),
    ]
}
