//! Built-in text transforms and the presets composed from them.

use crate::transform::Transform;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub const NFD: &str = "nfd";
pub const STRIP_DIACRITICS: &str = "strip-diacritics";
pub const GERMAN: &str = "german";
pub const LOWERCASE: &str = "lowercase";
pub const ALNUM: &str = "alnum";
pub const DEFAULT: &str = "default";
pub const STRICT: &str = "strict";

pub fn nfd(text: &str) -> String {
    text.nfd().collect()
}

pub fn strip_diacritics(text: &str) -> String {
    text.chars().filter(|c| !is_combining_mark(*c)).collect()
}

/// German transliteration: ß → ss, ä → ae, ö → oe, ü → ue (and capitals).
pub fn transliterate_german(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'ß' => out.push_str("ss"),
            'ẞ' => out.push_str("SS"),
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

pub fn alnum_only(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// `(name, steps)` for every built-in preset, atomic presets first.
pub(crate) fn builtin_presets() -> Vec<(&'static str, Vec<Transform>)> {
    let nfd = Transform::new(NFD, nfd);
    let strip = Transform::new(STRIP_DIACRITICS, strip_diacritics);
    let german = Transform::new(GERMAN, transliterate_german);
    let lower = Transform::new(LOWERCASE, lowercase);
    let alnum = Transform::new(ALNUM, alnum_only);
    vec![
        (NFD, vec![nfd.clone()]),
        (STRIP_DIACRITICS, vec![strip.clone()]),
        (GERMAN, vec![german.clone()]),
        (LOWERCASE, vec![lower.clone()]),
        (ALNUM, vec![alnum.clone()]),
        (
            DEFAULT,
            vec![nfd.clone(), strip.clone(), german.clone(), lower.clone()],
        ),
        (STRICT, vec![nfd, strip, german, lower, alnum]),
    ]
}
