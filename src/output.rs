//! Result types returned by the generator.

use crate::pipeline::tokenize::Token;
use serde::Serialize;

/// Extension of every generated file.
pub const FILE_EXTENSION: &str = "pdf";

/// Outcome of one generation request.
#[derive(Debug)]
pub enum Generation {
    /// The phrase normalised to nothing; there is nothing to build.
    Empty,
    /// The assembled document.
    Document(CryptextDocument),
}

impl Generation {
    /// The document, if one was built.
    pub fn into_document(self) -> Option<CryptextDocument> {
        match self {
            Generation::Empty => None,
            Generation::Document(doc) => Some(doc),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Generation::Empty)
    }
}

/// An assembled PDF and its suggested file name.
#[derive(Debug, Clone)]
pub struct CryptextDocument {
    /// Serialised PDF.
    pub bytes: Vec<u8>,
    /// `<tag>_<words joined by '_'>.pdf`
    pub file_name: String,
    /// The normalised phrase the document spells.
    pub normalized: String,
    /// Equal to the number of characters of `normalized`.
    pub page_count: usize,
    pub stats: GenerationStats,
}

/// Counters and timings for one generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    /// Tokens in the phrase (= pages in the document).
    pub tokens: usize,
    /// Distinct fragments the phrase needed.
    pub distinct_fragments: usize,
    /// Fragments downloaded during this request.
    pub fetched: usize,
    /// Fragments served from the cache.
    pub cache_hits: usize,
    /// Size of the output PDF.
    pub output_bytes: usize,
    pub fetch_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A validated phrase, ready to be fetched and assembled.
///
/// Produced without any I/O by [`crate::generate::Generator::prepare`].
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// The normalised phrase.
    pub normalized: String,
    /// Tokens in input order.
    pub tokens: Vec<Token>,
    /// Fragment identifier of every output page, in page order (last token first).
    pub page_fragments: Vec<String>,
    /// Suggested output file name.
    pub file_name: String,
}

impl Plan {
    /// Fragment identifiers in first-use page order, without repeats.
    pub fn distinct_fragments(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.page_fragments
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Suggested file name for a normalised phrase.
///
/// Word separators become underscores: `a.b` → `cryptext_a_b.pdf`. An empty
/// phrase yields `cryptext.pdf`.
pub fn suggested_file_name(product_tag: &str, normalized: &str) -> String {
    if normalized.is_empty() {
        format!("{product_tag}.{FILE_EXTENSION}")
    } else {
        format!(
            "{product_tag}_{}.{FILE_EXTENSION}",
            normalized.replace(crate::pipeline::normalize::SEPARATOR, "_")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_replaces_separators() {
        assert_eq!(suggested_file_name("cryptext", "a.b"), "cryptext_a_b.pdf");
        assert_eq!(
            suggested_file_name("cryptext", "hello.moto"),
            "cryptext_hello_moto.pdf"
        );
        assert_eq!(suggested_file_name("zine", "red"), "zine_red.pdf");
    }

    #[test]
    fn file_name_for_empty_phrase() {
        assert_eq!(suggested_file_name("cryptext", ""), "cryptext.pdf");
    }

    #[test]
    fn distinct_fragments_keep_first_use_order() {
        let plan = Plan {
            normalized: "oboe".into(),
            tokens: Vec::new(),
            page_fragments: vec!["F_e".into(), "F_o".into(), "F_b".into(), "F_o".into()],
            file_name: "cryptext_oboe.pdf".into(),
        };
        assert_eq!(plan.distinct_fragments(), vec!["F_e", "F_o", "F_b"]);
    }

    #[test]
    fn stats_serialise() {
        let json = serde_json::to_value(GenerationStats {
            tokens: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["tokens"], 3);
    }

    #[test]
    fn generation_accessors() {
        assert!(Generation::Empty.is_empty());
        assert!(Generation::Empty.into_document().is_none());
    }
}
