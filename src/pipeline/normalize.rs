//! Input normalisation: free-form phrase → `word.word` form.
//!
//! The user may type `Hello Moto`, `hello.moto` or `  HELLO   moto!! `; all
//! three spell the same document. Normalisation reduces every variant to a
//! lowercase string over `a`–`z` with single `.` separators and no leading or
//! trailing dot, so the tokenizer only ever sees one shape.
//!
//! ## Rule Order
//!
//! Whitespace becomes `.` *before* foreign characters are stripped, so
//! `"a - b"` keeps its word break (`a.b`) instead of fusing into `ab`.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\x1c-\x1f]+").unwrap());
static RE_FOREIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z.]").unwrap());
static RE_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());

/// The word separator of a normalised phrase.
pub const SEPARATOR: char = '.';

/// Whitespace, counting the ASCII information separators U+001C..U+001F
/// as spaces too.
fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// Normalise a raw phrase.
///
/// Rules (applied in order):
/// 1. Trim surrounding whitespace and lowercase
/// 2. Replace each whitespace run with `.`
/// 3. Drop every character other than `a`–`z` and `.`
/// 4. Collapse each run of `.` into one
/// 5. Trim leading and trailing `.`
///
/// An empty result means there is nothing to spell. The function is
/// idempotent.
pub fn normalize(raw: &str) -> String {
    let s = raw.trim_matches(is_space).to_lowercase();
    let s = RE_WHITESPACE.replace_all(&s, ".");
    let s = RE_FOREIGN.replace_all(&s, "");
    let s = RE_DOTS.replace_all(&s, ".");
    s.trim_matches(SEPARATOR).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_dots() {
        assert_eq!(normalize("hello moto"), "hello.moto");
        assert_eq!(normalize("hello \t\n moto"), "hello.moto");
    }

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(normalize("  Red.Ear  "), "red.ear");
        assert_eq!(normalize("A B"), "a.b");
    }

    #[test]
    fn test_strips_foreign_characters() {
        assert_eq!(normalize("r2-d2!"), "rd");
        assert_eq!(normalize("café"), "caf");
    }

    #[test]
    fn test_word_break_survives_punctuation() {
        assert_eq!(normalize("a - b"), "a.b");
    }

    #[test]
    fn test_collapses_and_trims_dots() {
        assert_eq!(normalize("..a...b.."), "a.b");
        assert_eq!(normalize(". a . . b ."), "a.b");
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("123 !?"), "");
        assert_eq!(normalize("..."), "");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "Hello Moto",
            "  ..Red...Ear.. ",
            "x\u{00A0}y",
            "ÀBC déf",
            "a1b2 c3",
            "",
            "...",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_information_separators_split_words() {
        assert_eq!(normalize("a\x1fb"), "a.b");
        assert_eq!(normalize("\x1cred\x1d\x1eear\x1f"), "red.ear");
    }

    #[test]
    fn test_output_alphabet() {
        let s = normalize("The Quick, Brown Fox! 42 -- jumps");
        assert!(s.chars().all(|c| c.is_ascii_lowercase() || c == SEPARATOR));
        assert!(!s.contains(".."));
        assert!(!s.starts_with('.') && !s.ends_with('.'));
    }
}
