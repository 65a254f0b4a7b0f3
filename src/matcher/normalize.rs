//! Text normalization shared by every index: transliteration, case folding and tokenization.

use deunicode::deunicode;
use regex::Regex;
use std::sync::LazyLock;

static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("Invalid regex"));

/// Transliterate to Latin, lowercase, turn punctuation into spaces and collapse whitespace.
///
/// `"Кама Grant (HK-241)"` becomes `"kama grant hk 241"`.
pub fn normalize(text: &str) -> String {
    let latin = deunicode(text).to_lowercase();
    let clean = RE_NON_ALNUM.replace_all(&latin, " ");
    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Normalized text with all separators removed, so `"Hakkapeliitta 9"` and
/// `"hakkapeliitta9"` share one form.
pub fn compact(text: &str) -> String {
    normalize(text).replace(' ', "")
}

/// Case-insensitive key for exact-name lookups. Only trims and folds case;
/// punctuation stays significant.
pub fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}
