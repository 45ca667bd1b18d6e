//! The fragment registry: which remote page spells which token.
//!
//! A registry holds two tables:
//!
//! * `fragments` — registry key → fragment identifier (the opaque id that
//!   addresses one single-page PDF in the remote store).
//! * `aliases` — registry key → registry key, applied once before the
//!   fragment lookup. Plain letters whose glyph comes in several drawings are
//!   routed to the drawing used mid-word (`e → e2`, `l → l7`, `r → r1`).
//!
//! The table is loaded once and never mutated. [`Registry::builtin`] returns
//! the production table embedded from `assets/registry.json`; operators can
//! point the CLI at their own file, and tests build small fixture registries
//! with [`Registry::builder`].

use crate::error::CryptextError;
use crate::pipeline::tokenize::Token;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

static BUILTIN_JSON: &str = include_str!("../assets/registry.json");

static BUILTIN: Lazy<Registry> = Lazy::new(|| {
    Registry::from_json_str(BUILTIN_JSON).expect("embedded registry.json is valid")
});

/// Immutable token-key → fragment-identifier table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    fragments: BTreeMap<String, String>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

impl Registry {
    /// The production registry shipped with the crate.
    pub fn builtin() -> Registry {
        BUILTIN.clone()
    }

    /// Parse a registry from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Registry, CryptextError> {
        let registry: Registry = serde_json::from_str(json)?;
        registry.validate()?;
        debug!(
            "Loaded registry: {} fragments, {} aliases",
            registry.fragments.len(),
            registry.aliases.len()
        );
        Ok(registry)
    }

    /// Read and parse a registry file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Registry, CryptextError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CryptextError::RegistryLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Start building a registry in code.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            registry: Registry::default(),
        }
    }

    /// Apply the alias table to a registry key.
    ///
    /// Aliases are not chained: `e → e2` is applied once, and `e2` is looked
    /// up as-is.
    pub fn resolve_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map(String::as_str).unwrap_or(key)
    }

    /// The fragment identifier for a token, after alias resolution.
    pub fn fragment_for(&self, token: Token) -> Option<&str> {
        let key = token.key();
        self.fragments
            .get(self.resolve_key(&key))
            .map(String::as_str)
    }

    /// Whether the token resolves to a fragment.
    pub fn supports(&self, token: Token) -> bool {
        self.fragment_for(token).is_some()
    }

    /// Raw lookup by resolved key, bypassing aliases.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fragments.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialise back to pretty JSON (the same shape [`Self::from_json_str`] reads).
    pub fn to_json_string(&self) -> Result<String, CryptextError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), CryptextError> {
        for (key, id) in &self.fragments {
            if key.is_empty() {
                return Err(CryptextError::InvalidConfig(
                    "registry contains an empty fragment key".into(),
                ));
            }
            if id.trim().is_empty() {
                return Err(CryptextError::InvalidConfig(format!(
                    "registry key '{key}' has an empty fragment identifier"
                )));
            }
        }
        for (from, to) in &self.aliases {
            if from.is_empty() || to.is_empty() {
                return Err(CryptextError::InvalidConfig(format!(
                    "registry alias '{from}' → '{to}' has an empty side"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn fragment(mut self, key: impl Into<String>, id: impl Into<String>) -> Self {
        self.registry.fragments.insert(key.into(), id.into());
        self
    }

    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.registry.aliases.insert(from.into(), to.into());
        self
    }

    /// Install the standard `e → e2`, `l → l7`, `r → r1` aliases.
    pub fn default_aliases(self) -> Self {
        self.alias("e", "e2").alias("l", "l7").alias("r", "r1")
    }

    pub fn build(self) -> Result<Registry, CryptextError> {
        self.registry.validate()?;
        Ok(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokenize::{tokenize, Token};

    #[test]
    fn builtin_covers_alphabet_and_separator() {
        let registry = Registry::builtin();
        for c in 'a'..='z' {
            assert!(registry.supports(Token::Letter(c)), "missing '{c}'");
        }
        assert!(registry.supports(Token::Separator));
        assert!(registry.supports(Token::WordInitialE));
        assert!(registry.supports(Token::WordInitialR));
    }

    #[test]
    fn builtin_routes_plain_letters_through_aliases() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.fragment_for(Token::Letter('e')),
            registry.get("e2")
        );
        assert_eq!(
            registry.fragment_for(Token::Letter('l')),
            registry.get("l7")
        );
        assert_eq!(
            registry.fragment_for(Token::Letter('r')),
            registry.get("r1")
        );
        assert_eq!(registry.fragment_for(Token::WordInitialE), registry.get("e3"));
        assert_eq!(registry.fragment_for(Token::WordInitialR), registry.get("r21"));
        assert_ne!(
            registry.fragment_for(Token::Letter('e')),
            registry.fragment_for(Token::WordInitialE)
        );
    }

    #[test]
    fn json_round_trip_preserves_tables() {
        let registry = Registry::builder()
            .fragment("a", "F_a")
            .fragment("dot", "F_dot")
            .alias("x", "a")
            .build()
            .unwrap();
        let json = registry.to_json_string().unwrap();
        assert_eq!(Registry::from_json_str(&json).unwrap(), registry);
    }

    #[test]
    fn aliases_are_optional_in_json() {
        let registry = Registry::from_json_str(r#"{"fragments": {"a": "F_a"}}"#).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.aliases().count(), 0);
    }

    #[test]
    fn aliases_are_not_chained() {
        let registry = Registry::builder()
            .fragment("b", "F_b")
            .alias("a", "x")
            .alias("x", "b")
            .build()
            .unwrap();
        assert_eq!(registry.resolve_key("a"), "x");
        assert!(!registry.supports(Token::Letter('a')));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Registry::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CryptextError::RegistryParse(_)));
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let err = Registry::builder().fragment("a", "  ").build().unwrap_err();
        assert!(matches!(err, CryptextError::InvalidConfig(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = Registry::from_path("/definitely/not/a/registry.json").unwrap_err();
        assert!(matches!(err, CryptextError::RegistryLoad { .. }));
    }

    #[test]
    fn every_builtin_token_of_a_phrase_resolves() {
        let registry = Registry::builtin();
        for token in tokenize("red.ear") {
            assert!(registry.supports(token));
        }
    }
}
