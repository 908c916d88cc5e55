//! Text folding shared by the listing parser and the normalizer

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Removes diacritics: decompose, drop combining marks, recompose
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Folds a title into matching form
///
/// Lowercases, strips diacritics, turns every run of non-alphanumeric
/// characters into one space, and trims. "Coffret Dresseur Scellé!" becomes
/// "coffret dresseur scelle".
pub fn canonicalize(text: &str) -> String {
    let folded = strip_diacritics(&text.to_lowercase());
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// True if `term` appears in `text` starting on a word boundary
///
/// Both arguments must already be canonical. "booster" matches "boosters" but
/// "tin" does not match "destinees".
pub fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    format!(" {}", text).contains(&format!(" {}", term))
}

/// True if `term` appears in `text` as whole words
pub fn contains_word(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    format!(" {} ", text).contains(&format!(" {} ", term))
}
