//! Shared text utilities: filename sanitization, markup escaping, slugs and
//! line wrapping.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Longest filename stem produced by [`sanitize_filename`], in characters.
pub const MAX_FILENAME_LEN: usize = 100;

/// Stem used when a title sanitizes to nothing.
const FALLBACK_STEM: &str = "rapport";

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Turn a report title into a filesystem-safe filename stem.
///
/// Strips `< > : " / \ | ? *`, collapses whitespace runs into a single
/// underscore and caps the result at [`MAX_FILENAME_LEN`] characters.
///
/// ```
/// assert_eq!(rapport::text::sanitize_filename("Q1 Report: Sales/Ops"), "Q1_Report_SalesOps");
/// ```
pub fn sanitize_filename(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    let collapsed = whitespace_regex().replace_all(stripped.trim(), "_");
    let stem: String = collapsed.chars().take(MAX_FILENAME_LEN).collect();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Escape the five markup-reserved characters `& < > " '`.
pub fn escape_markup(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape text for an XML part, also dropping characters XML 1.0 forbids.
pub fn escape_xml(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || c >= ' ')
        .collect();
    escape_markup(&cleaned).replace("&#39;", "&apos;")
}

/// Build a URL anchor slug.
///
/// Lowercases, strips accents, collapses every run of non-alphanumeric
/// characters into one hyphen and trims leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// Explicit newlines are kept; words longer than a line are split.
pub fn wrap_lines(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;
        for word in raw_line.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current_len += word.len();
            current.extend(word);
        }
        if current_len > 0 {
            lines.push(current);
        }
    }
    lines
}

/// Shorten text to `max_chars` characters, ending with an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Q1 Report: Sales/Ops"), "Q1_Report_SalesOps");
        assert_eq!(sanitize_filename("a  \t b"), "a_b");
        assert_eq!(sanitize_filename(r#"<>:"/\|?*"#), "rapport");
        assert_eq!(sanitize_filename("  Bilan annuel  "), "Bilan_annuel");
    }

    #[test]
    fn test_sanitize_filename_cap() {
        let long = "é".repeat(150);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(
            escape_markup(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
        assert_eq!(escape_xml("l'été\u{0001}"), "l&apos;été");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Résumé exécutif"), "resume-executif");
        assert_eq!(slugify("  --Q1: Ventes & Opérations!-- "), "q1-ventes-operations");
        assert_eq!(slugify("Ça coûte 100 €"), "ca-coute-100");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_wrap_lines() {
        let lines = wrap_lines("le chiffre d'affaires progresse fortement", 16);
        assert_eq!(lines, vec!["le chiffre", "d'affaires", "progresse", "fortement"]);
        assert!(wrap_lines("", 10).is_empty());
        assert_eq!(wrap_lines("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_lines("un\ndeux", 40), vec!["un", "deux"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Région", 10), "Région");
        assert_eq!(truncate("Chiffre d'affaires", 8), "Chiffre…");
    }
}
