//! Name normalization and matching.
//!
//! Name-based lookups accept URL-friendly input such as `cox's-bazar` or
//! `DHAKA`; these helpers turn that into something comparable with the
//! stored names.

/// Normalizes a name taken from a URL path.
///
/// Hyphens become spaces, surrounding whitespace is trimmed, and the first
/// ASCII letter or digit of every word is uppercased. The rest of each word
/// is left untouched, so comparisons must still go through [`same_name`].
pub fn normalize_name(raw: &str) -> String {
    let spaced = raw.replace('-', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_is_word = false;

    for ch in spaced.trim().chars() {
        let is_word = ch.is_ascii_alphanumeric() || ch == '_';
        if is_word && !prev_is_word {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        prev_is_word = is_word;
    }

    out
}

/// Case-insensitive name equality.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Case-insensitive substring test.
///
/// `needle_lower` must already be lowercased; callers matching many entities
/// against one term lowercase it once.
pub fn matches_term(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
