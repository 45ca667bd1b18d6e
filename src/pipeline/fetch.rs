//! Fragment retrieval: fragment identifier → single-page PDF bytes.
//!
//! Three pieces cooperate here:
//!
//! * [`FragmentSource`] — where bytes come from. [`HttpFragmentSource`] issues
//!   one `GET` per identifier; tests plug in an in-memory source.
//! * [`FragmentCache`] — a process-wide, shareable store of fetched bytes.
//!   Identical letters recur across phrases and inside one phrase, so each
//!   fragment is downloaded once and reused.
//! * [`FragmentFetcher`] — get-or-fetch over the two, with optional retry.
//!
//! ## Failure policy
//!
//! A failed fetch is never cached: the next call for the same identifier goes
//! back to the network. Concurrent first fetches of one identifier may both
//! hit the source; the second insert overwrites the first with identical
//! bytes.

use crate::config::GeneratorConfig;
use crate::error::CryptextError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Raw bytes of one fetched fragment, shared between cache and callers.
pub type FragmentBytes = Arc<Vec<u8>>;

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8] = b"%PDF";

/// Upper bound of a single retry delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// A place fragments can be retrieved from.
///
/// Retrieval must be idempotent: asking twice for the same identifier yields
/// the same bytes.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Retrieve the bytes of one fragment.
    async fn retrieve(&self, fragment_id: &str) -> Result<Vec<u8>, CryptextError>;
}

// ── HTTP source ──────────────────────────────────────────────────────────

/// Downloads fragments with `GET` from a URL template.
pub struct HttpFragmentSource {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl HttpFragmentSource {
    /// Build a source with its own HTTP client using the config's timeout.
    pub fn new(config: &GeneratorConfig) -> Result<Self, CryptextError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| CryptextError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Build a source around an existing client.
    ///
    /// The client's own timeout applies; `config.fetch_timeout_secs` is only
    /// used in error messages.
    pub fn with_client(client: reqwest::Client, config: &GeneratorConfig) -> Self {
        Self {
            client,
            config: GeneratorConfig {
                progress_callback: None,
                ..config.clone()
            },
        }
    }

    fn url_for(&self, fragment_id: &str) -> String {
        self.config.fragment_url(fragment_id)
    }

    fn request_error(&self, fragment_id: &str, e: reqwest::Error) -> CryptextError {
        if e.is_timeout() {
            CryptextError::FragmentTimeout {
                fragment_id: fragment_id.to_string(),
                secs: self.config.fetch_timeout_secs,
            }
        } else {
            CryptextError::FragmentRetrieval {
                fragment_id: fragment_id.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl FragmentSource for HttpFragmentSource {
    async fn retrieve(&self, fragment_id: &str) -> Result<Vec<u8>, CryptextError> {
        let url = self.url_for(fragment_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(fragment_id, e))?;

        if !response.status().is_success() {
            return Err(CryptextError::FragmentRetrieval {
                fragment_id: fragment_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_error(fragment_id, e))?;

        Ok(bytes.to_vec())
    }
}

// ── Cache ────────────────────────────────────────────────────────────────

struct CacheEntry {
    bytes: FragmentBytes,
    stored_at: Instant,
}

/// Shared store of fetched fragments, keyed by fragment identifier.
///
/// Construct once per process and pass it (as `Arc<FragmentCache>`) to every
/// [`FragmentFetcher`] that should share downloads.
pub struct FragmentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FragmentCache {
    /// A cache whose entries never expire.
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    /// A cache whose entries expire `ttl` after being stored.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The cached bytes for `fragment_id`, if present and fresh.
    pub fn get(&self, fragment_id: &str) -> Option<FragmentBytes> {
        let found = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            entries
                .get(fragment_id)
                .filter(|entry| self.is_fresh(entry))
                .map(|entry| Arc::clone(&entry.bytes))
        };
        match found {
            Some(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store bytes for `fragment_id`, replacing any previous entry.
    pub fn insert(&self, fragment_id: &str, bytes: FragmentBytes) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            fragment_id.to_string(),
            CacheEntry {
                bytes,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, including expired ones not yet replaced.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to go to the source.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .map(|ttl| entry.stored_at.elapsed() < ttl)
            .unwrap_or(true)
    }
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────────

/// One resolved fragment and where it came from.
#[derive(Clone, Debug)]
pub struct Fetched {
    pub bytes: FragmentBytes,
    pub from_cache: bool,
}

/// Get-or-fetch access to fragments.
#[derive(Clone)]
pub struct FragmentFetcher {
    source: Arc<dyn FragmentSource>,
    cache: Arc<FragmentCache>,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl FragmentFetcher {
    pub fn new(source: Arc<dyn FragmentSource>, cache: Arc<FragmentCache>) -> Self {
        Self {
            source,
            cache,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }

    /// Retry retryable failures up to `max_retries` times with exponential backoff.
    pub fn with_retries(mut self, max_retries: u32, retry_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    pub fn cache(&self) -> &Arc<FragmentCache> {
        &self.cache
    }

    /// The bytes of `fragment_id`, from the cache when possible.
    pub async fn fetch(&self, fragment_id: &str) -> Result<Fetched, CryptextError> {
        if let Some(bytes) = self.cache.get(fragment_id) {
            debug!("Fragment {}: cache hit ({} bytes)", fragment_id, bytes.len());
            return Ok(Fetched {
                bytes,
                from_cache: true,
            });
        }

        let bytes = Arc::new(self.retrieve_with_retry(fragment_id).await?);
        self.cache.insert(fragment_id, Arc::clone(&bytes));
        debug!("Fragment {}: fetched {} bytes", fragment_id, bytes.len());

        Ok(Fetched {
            bytes,
            from_cache: false,
        })
    }

    async fn retrieve_with_retry(&self, fragment_id: &str) -> Result<Vec<u8>, CryptextError> {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Fragment {}: retry {}/{} after {}ms",
                    fragment_id, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let result = self
                .source
                .retrieve(fragment_id)
                .await
                .and_then(|bytes| check_pdf_magic(fragment_id, bytes));

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!("Fragment {}: attempt {} failed: {}", fragment_id, attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Reject bodies that are not PDFs (e.g. an HTML interstitial served with 200).
fn check_pdf_magic(fragment_id: &str, bytes: Vec<u8>) -> Result<Vec<u8>, CryptextError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(bytes)
    } else {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4)]).into_owned();
        Err(CryptextError::FragmentRetrieval {
            fragment_id: fragment_id.to_string(),
            reason: format!("response is not a PDF (starts with {head:?})"),
        })
    }
}
