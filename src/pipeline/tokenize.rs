//! Tokenisation: normalised phrase → one [`Token`] per character.
//!
//! Two glyphs are drawn differently when they open a word: `e` and `r`. The
//! tokenizer records that context once, so the validator and assembler can
//! treat every token as a plain registry key without looking at neighbours.
//!
//! Word-start detection is a pure function of the previous character
//! ([`classify`]); there is no index bookkeeping.

use crate::pipeline::normalize::SEPARATOR;
use serde::{Serialize, Serializer};
use std::fmt;

/// Registry key of the word separator.
pub const SEPARATOR_KEY: &str = "dot";
/// Registry key of an `e` that opens a word.
pub const WORD_INITIAL_E_KEY: &str = "e3";
/// Registry key of an `r` that opens a word.
pub const WORD_INITIAL_R_KEY: &str = "r21";

/// One character position of a normalised phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// A lowercase letter in its ordinary form.
    Letter(char),
    /// `e` at the start of a word.
    WordInitialE,
    /// `r` at the start of a word.
    WordInitialR,
    /// The `.` between words.
    Separator,
}

impl Token {
    /// The registry key for this token, before alias resolution.
    pub fn key(self) -> String {
        match self {
            Token::Letter(c) => c.to_string(),
            Token::WordInitialE => WORD_INITIAL_E_KEY.to_string(),
            Token::WordInitialR => WORD_INITIAL_R_KEY.to_string(),
            Token::Separator => SEPARATOR_KEY.to_string(),
        }
    }

    /// The character a person would recognise for this token.
    pub fn display_char(self) -> char {
        match self {
            Token::Letter(c) => c,
            Token::WordInitialE => 'e',
            Token::WordInitialR => 'r',
            Token::Separator => SEPARATOR,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

/// Whether a character following `prev` starts a word.
pub fn is_word_start(prev: Option<char>) -> bool {
    matches!(prev, None | Some(SEPARATOR))
}

/// Classify `ch` given the character before it (`None` at the start).
pub fn classify(prev: Option<char>, ch: char) -> Token {
    match ch {
        SEPARATOR => Token::Separator,
        'e' if is_word_start(prev) => Token::WordInitialE,
        'r' if is_word_start(prev) => Token::WordInitialR,
        c => Token::Letter(c),
    }
}

/// Tokenise a normalised phrase.
///
/// Emits exactly one token per input character, in input order.
pub fn tokenize(normalized: &str) -> Vec<Token> {
    let mut prev = None;
    normalized
        .chars()
        .map(|ch| {
            let token = classify(prev, ch);
            prev = Some(ch);
            token
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;

    #[test]
    fn test_single_e_is_word_initial() {
        assert_eq!(tokenize("e"), vec![Token::WordInitialE]);
    }

    #[test]
    fn test_second_char_is_not_word_start() {
        assert_eq!(
            tokenize("re"),
            vec![Token::WordInitialR, Token::Letter('e')]
        );
        assert_eq!(
            tokenize("er"),
            vec![Token::WordInitialE, Token::Letter('r')]
        );
    }

    #[test]
    fn test_separator_resets_word_start() {
        assert_eq!(
            tokenize("a.e"),
            vec![Token::Letter('a'), Token::Separator, Token::WordInitialE]
        );
    }

    #[test]
    fn test_red_ear() {
        assert_eq!(
            tokenize("red.ear"),
            vec![
                Token::WordInitialR,
                Token::Letter('e'),
                Token::Letter('d'),
                Token::Separator,
                Token::WordInitialE,
                Token::Letter('a'),
                Token::Letter('r'),
            ]
        );
    }

    #[test]
    fn test_one_token_per_char() {
        for raw in ["hello moto", "red ear", "a", "e.r.e.r", "the quick brown fox"] {
            let s = normalize(raw);
            assert_eq!(tokenize(&s).len(), s.chars().count(), "input {s:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_classify_is_positional_only() {
        assert_eq!(classify(None, 'r'), Token::WordInitialR);
        assert_eq!(classify(Some('.'), 'r'), Token::WordInitialR);
        assert_eq!(classify(Some('a'), 'r'), Token::Letter('r'));
        assert_eq!(classify(Some('a'), 'l'), Token::Letter('l'));
        assert_eq!(classify(None, 'l'), Token::Letter('l'));
        assert_eq!(classify(Some('x'), '.'), Token::Separator);
    }

    #[test]
    fn test_keys_and_display_chars() {
        assert_eq!(Token::Separator.key(), "dot");
        assert_eq!(Token::WordInitialE.key(), "e3");
        assert_eq!(Token::WordInitialR.key(), "r21");
        assert_eq!(Token::Letter('q').key(), "q");

        assert_eq!(Token::Separator.display_char(), '.');
        assert_eq!(Token::WordInitialE.display_char(), 'e');
        assert_eq!(Token::WordInitialR.display_char(), 'r');
        assert_eq!(Token::Letter('l').display_char(), 'l');
    }

    #[test]
    fn test_token_serialises_as_key() {
        let json = serde_json::to_string(&tokenize("re")).unwrap();
        assert_eq!(json, r#"["r21","e"]"#);
    }
}
