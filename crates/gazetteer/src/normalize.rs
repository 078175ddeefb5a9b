//! Place-name normalization
//!
//! Every key in the index and every lookup goes through [`normalize_name`],
//! so "São Paulo", "SAO PAULO" and "sao-paulo" all land on `sao paulo`.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a place name into its index key.
///
/// Decomposes to NFKD and drops every combining mark, lowercases, folds the
/// Latin letters that carry no decomposition (ß, æ, ø, ł, þ ...), turns every
/// non-alphanumeric character into a separator and collapses runs of
/// separators into a single space.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.nfkd().flat_map(char::to_lowercase) {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            match fold_letter(ch) {
                Some(folded) => out.push_str(folded),
                None => out.push(ch),
            }
        } else {
            pending_space = true;
        }
    }

    out
}

/// Number of space-separated tokens in an already normalized key
pub fn token_count(normalized: &str) -> usize {
    normalized.split(' ').filter(|t| !t.is_empty()).count()
}

/// ASCII fold for lowercase letters NFKD leaves intact
fn fold_letter(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'æ' => "ae",
        'đ' | 'ð' => "d",
        'ħ' => "h",
        'ı' => "i",
        'ŀ' | 'ł' => "l",
        'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ŧ' => "t",
        'þ' => "th",
        _ => return None,
    };
    Some(folded)
}
