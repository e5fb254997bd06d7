// Utility helpers for parsing, name handling and display formatting.
//
// This module centralizes the "dirty" cell and label handling so the rest of
// the code can assume clean, typed values.
use num_format::{Locale, ToFormattedString};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Parse a vote count under the given separators.
///
/// - Trims whitespace.
/// - The missing-value token counts as zero.
/// - Rejects values that contain alphabetic characters.
/// - Strips the thousands separator, then reads the decimal separator as `.`.
/// - Only whole, non-negative numbers are accepted (`"12,0"` is fine,
///   `"12,5"` is not).
pub fn parse_count(
    s: &str,
    decimal: char,
    thousands: Option<char>,
    missing_token: &str,
) -> Option<u64> {
    let s = s.trim();
    if s == missing_token {
        return Some(0);
    }
    if s.is_empty() || s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let mut cleaned: String = match thousands {
        Some(sep) => s.chars().filter(|c| *c != sep).collect(),
        None => s.to_string(),
    };
    if decimal != '.' {
        if cleaned.contains('.') {
            // A dot that is neither separator makes the token ambiguous.
            return None;
        }
        cleaned = cleaned.replace(decimal, ".");
    }
    if let Ok(v) = cleaned.parse::<u64>() {
        return Some(v);
    }
    let v = cleaned.parse::<f64>().ok()?;
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v > u64::MAX as f64 {
        return None;
    }
    Some(v as u64)
}

/// Upper-case the first letter and leave the rest untouched.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical display label for entities and candidates read from a table.
pub fn canonical_label(s: &str) -> String {
    capitalize_first(s.trim())
}

/// Join key shared by vote tables and boundary files: trimmed, inner
/// whitespace collapsed, lower-cased, diacritics stripped. Precomposed and
/// decomposed spellings of the same name give the same key.
pub fn normalize_name(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identifier-safe slug, used for chart element ids.
pub fn slug(s: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for c in normalize_name(s).chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Thin wrapper around `num-format` for vote counts shown to readers
/// (e.g., `12.345 votos`).
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::es)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_count_handles_plain_and_missing() {
        assert_eq!(parse_count("42", '.', None, "-"), Some(42));
        assert_eq!(parse_count(" 7 ", '.', None, "-"), Some(7));
        assert_eq!(parse_count("-", '.', None, "-"), Some(0));
        assert_eq!(parse_count("", '.', None, "-"), None);
        assert_eq!(parse_count("abc", '.', None, "-"), None);
        assert_eq!(parse_count("5.0", '.', None, "-"), Some(5));
        assert_eq!(parse_count("5.5", '.', None, "-"), None);
    }

    #[test]
    fn parse_count_handles_locale_separators() {
        assert_eq!(parse_count("1.234", ',', Some('.'), "-"), Some(1234));
        assert_eq!(parse_count("12.345.678", ',', Some('.'), "-"), Some(12_345_678));
        assert_eq!(parse_count("1.234,0", ',', Some('.'), "-"), Some(1234));
        assert_eq!(parse_count("12,5", ',', Some('.'), "-"), None);
        assert_eq!(parse_count("1,234", '.', Some(','), "-"), Some(1234));
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert_eq!(parse_count("-3", '.', None, "-"), None);
    }

    #[test]
    fn capitalize_keeps_the_rest() {
        assert_eq!(capitalize_first("chos malal"), "Chos malal");
        assert_eq!(capitalize_first("ñorquin"), "Ñorquin");
        assert_eq!(capitalize_first("McDonald"), "McDonald");
        assert_eq!(capitalize_first(""), "");
        assert_eq!(canonical_label("  minas "), "Minas");
    }

    #[test]
    fn normalize_folds_case_accents_and_whitespace() {
        assert_eq!(normalize_name("  Loncopué "), "loncopue");
        assert_eq!(normalize_name("LONCOPUE"), "loncopue");
        assert_eq!(normalize_name("Chos   Malal"), "chos malal");
        assert_eq!(normalize_name("Ñorquín"), "norquin");
        assert_eq!(normalize_name("Chos malal"), normalize_name("chos MALAL "));
    }

    #[test]
    fn normalize_matches_decomposed_spellings() {
        assert_eq!(normalize_name("Loncopue\u{0301}"), "loncopue");
        assert_eq!(
            normalize_name("Loncopue\u{0301}"),
            normalize_name("Loncopu\u{00e9}")
        );
        assert_eq!(normalize_name("N\u{0303}orqui\u{0301}n"), "norquin");
        assert_eq!(normalize_name("Ýáå"), "yaa");
    }

    #[test]
    fn slug_is_id_safe() {
        assert_eq!(slug("Varvarco-Invernada Vieja"), "varvarco-invernada-vieja");
        assert_eq!(slug("Cajón del Curí Leuvú"), "cajon-del-curi-leuvu");
        assert_eq!(slug("  --Rincón De Los Sauces "), "rincon-de-los-sauces");
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#39;Neil &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn format_int_groups_thousands() {
        assert_eq!(format_int(5u64), "5");
        assert_eq!(format_int(1_234u64), "1.234");
        assert_eq!(format_int(1_234_567u64), "1.234.567");
    }
}
