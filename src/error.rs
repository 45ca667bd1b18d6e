//! Error types for the cryptext-pdf library.
//!
//! Everything that can stop a generation is a [`CryptextError`]. The variants
//! fall into three groups that fail at different points of the pipeline:
//!
//! * **Input** — [`CryptextError::UnsupportedCharacters`] is raised by the
//!   validator before any network traffic. It is cheap, deterministic and
//!   fully recoverable: change the phrase or extend the registry.
//!
//! * **Fragment I/O** — retrieval, timeout and assembly failures name the
//!   fragment identifier that broke. They abort the in-flight request only;
//!   the shared fragment cache never stores a failure.
//!
//! * **Setup** — registry loading, configuration and output-file errors.
//!
//! An empty phrase is *not* an error. It is reported as
//! [`crate::output::Generation::Empty`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the cryptext-pdf library.
#[derive(Debug, Error)]
pub enum CryptextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// One or more characters of the phrase have no fragment in the registry.
    ///
    /// `chars` is sorted and free of duplicates.
    #[error(
        "Unsupported character(s): {}\nAdd their fragment identifiers to the registry, or remove them from the input.",
        format_chars(.chars)
    )]
    UnsupportedCharacters { chars: Vec<char> },

    /// A token reached the assembler without a registry entry.
    ///
    /// Only possible when validation was skipped.
    #[error("No fragment registered for token key '{key}'")]
    UnknownToken { key: String },

    // ── Fragment errors ───────────────────────────────────────────────────
    /// The remote store did not return a usable fragment.
    #[error("Failed to retrieve fragment '{fragment_id}': {reason}")]
    FragmentRetrieval { fragment_id: String, reason: String },

    /// The fetch exceeded the configured timeout.
    #[error("Retrieving fragment '{fragment_id}' timed out after {secs}s\nIncrease --timeout.")]
    FragmentTimeout { fragment_id: String, secs: u64 },

    /// The fragment was retrieved but is not a usable single-page PDF.
    #[error("Fragment '{fragment_id}' could not be assembled: {detail}")]
    AssemblyFailed { fragment_id: String, detail: String },

    // ── Registry errors ───────────────────────────────────────────────────
    /// The registry file could not be read.
    #[error("Failed to read registry '{path}': {source}")]
    RegistryLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry document is not valid JSON of the expected shape.
    #[error("Invalid registry document: {0}")]
    RegistryParse(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or registry validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CryptextError {
    /// Whether repeating the same request may succeed.
    ///
    /// Fragment fetches are idempotent GETs, so transport failures and
    /// timeouts are worth another attempt. Everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CryptextError::FragmentRetrieval { .. } | CryptextError::FragmentTimeout { .. }
        )
    }

    /// The fragment identifier involved in the failure, if any.
    pub fn fragment_id(&self) -> Option<&str> {
        match self {
            CryptextError::FragmentRetrieval { fragment_id, .. }
            | CryptextError::FragmentTimeout { fragment_id, .. }
            | CryptextError::AssemblyFailed { fragment_id, .. } => Some(fragment_id),
            _ => None,
        }
    }
}

fn format_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display_lists_every_char() {
        let e = CryptextError::UnsupportedCharacters {
            chars: vec!['q', 'z'],
        };
        let msg = e.to_string();
        assert!(msg.contains("`q`, `z`"), "got: {msg}");
        assert!(msg.contains("registry"));
    }

    #[test]
    fn timeout_display() {
        let e = CryptextError::FragmentTimeout {
            fragment_id: "abc".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("abc"));
    }

    #[test]
    fn retryable_classification() {
        assert!(CryptextError::FragmentRetrieval {
            fragment_id: "x".into(),
            reason: "HTTP 503".into(),
        }
        .is_retryable());
        assert!(!CryptextError::AssemblyFailed {
            fragment_id: "x".into(),
            detail: "bad xref".into(),
        }
        .is_retryable());
        assert!(!CryptextError::UnsupportedCharacters { chars: vec!['z'] }.is_retryable());
    }

    #[test]
    fn fragment_id_is_exposed() {
        let e = CryptextError::AssemblyFailed {
            fragment_id: "F_a".into(),
            detail: "no pages".into(),
        };
        assert_eq!(e.fragment_id(), Some("F_a"));
        assert_eq!(CryptextError::Internal("x".into()).fragment_id(), None);
    }
}
