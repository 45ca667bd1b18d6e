//! Progress-callback trait for per-fragment generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events while fragments are downloaded and the document is assembled.
//!
//! # Example
//!
//! ```rust
//! use cryptext_pdf::{GenerationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_fragment_complete(&self, fragment_id: &str, bytes: usize, from_cache: bool) {
//!         let n = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{n} {fragment_id}: {bytes} bytes (cached: {from_cache})");
//!     }
//! }
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { fetched: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generation pipeline as it works through a phrase.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the fragment
/// events arrive from concurrently running downloads. All methods default to
/// no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once after validation, before the first download.
    ///
    /// # Arguments
    /// * `distinct_fragments` — number of different fragments the phrase needs
    /// * `pages`              — number of pages the document will have
    fn on_generation_start(&self, distinct_fragments: usize, pages: usize) {
        let _ = (distinct_fragments, pages);
    }

    /// Called before a fragment is looked up in the cache or downloaded.
    fn on_fragment_start(&self, fragment_id: &str) {
        let _ = fragment_id;
    }

    /// Called when a fragment's bytes are available.
    ///
    /// # Arguments
    /// * `fragment_id` — the identifier that was resolved
    /// * `bytes`       — size of the fragment
    /// * `from_cache`  — `true` if no network request was made
    fn on_fragment_complete(&self, fragment_id: &str, bytes: usize, from_cache: bool) {
        let _ = (fragment_id, bytes, from_cache);
    }

    /// Called when a fragment failed for good; generation aborts afterwards.
    fn on_fragment_error(&self, fragment_id: &str, error: &str) {
        let _ = (fragment_id, error);
    }

    /// Called once the document has been serialised.
    fn on_generation_complete(&self, pages: usize, bytes: usize) {
        let _ = (pages, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
