//! Validation: every token must resolve to a fragment before any fetch.
//!
//! The validator reports *all* missing characters at once so the user can
//! fix the phrase (or an operator can extend the registry) in a single pass.
//! Characters are reported the way a person typed them: both drawings of `e`
//! collapse to `e`, the separator to `.`.

use crate::error::CryptextError;
use crate::pipeline::tokenize::Token;
use crate::registry::Registry;
use std::collections::BTreeSet;

/// The sorted, duplicate-free set of characters the registry cannot spell.
pub fn find_unsupported(tokens: &[Token], registry: &Registry) -> Vec<char> {
    tokens
        .iter()
        .filter(|t| !registry.supports(**t))
        .map(|t| t.display_char())
        .collect::<BTreeSet<char>>()
        .into_iter()
        .collect()
}

/// Fail with [`CryptextError::UnsupportedCharacters`] if any token is unresolvable.
pub fn validate(tokens: &[Token], registry: &Registry) -> Result<(), CryptextError> {
    let chars = find_unsupported(tokens, registry);
    if chars.is_empty() {
        Ok(())
    } else {
        Err(CryptextError::UnsupportedCharacters { chars })
    }
}
