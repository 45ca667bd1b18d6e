//! # cryptext-pdf
//!
//! Spell a phrase as a PDF, one pre-rendered page per character, last
//! character first.
//!
//! Every letter (and the word separator) has a single-page PDF "fragment"
//! stored remotely and addressed by an opaque identifier. This crate
//! normalises the phrase, maps each character to its fragment, downloads the
//! fragments once and caches them, and stitches their pages together in
//! reverse order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! "Red Ear"
//!  │
//!  ├─ 1. Normalize  "red.ear"
//!  ├─ 2. Tokenize   [r21 e d dot e3 a r]   (word-initial e/r get their own drawing)
//!  ├─ 3. Validate   every token must resolve through the registry
//!  ├─ 4. Fetch      one GET per distinct fragment, shared cache
//!  └─ 5. Assemble   pages r, a, e3, dot, d, e, r21  →  cryptext_red_ear.pdf
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cryptext_pdf::{Generation, Generator, GeneratorConfig, Registry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Generator::new(Registry::builtin(), GeneratorConfig::default())?;
//!     if let Generation::Document(doc) = generator.generate("Red Ear").await? {
//!         std::fs::write(&doc.file_name, &doc.bytes)?;
//!         eprintln!("{}: {} pages", doc.file_name, doc.page_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cryptext` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder, DEFAULT_URL_TEMPLATE};
pub use error::CryptextError;
pub use generate::{generate_sync, save_document, Generator};
pub use output::{suggested_file_name, CryptextDocument, Generation, GenerationStats, Plan};
pub use pipeline::assemble::{DocumentWriter, PdfPageWriter};
pub use pipeline::fetch::{FragmentCache, FragmentFetcher, FragmentSource, HttpFragmentSource};
pub use pipeline::normalize::normalize;
pub use pipeline::tokenize::{tokenize, Token};
pub use pipeline::validate::find_unsupported;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{Registry, RegistryBuilder};
