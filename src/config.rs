//! Configuration types for phrase-to-PDF generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. The fragment registry is *not* part of
//! the config: it is data, loaded once and handed to
//! [`crate::generate::Generator`] next to the config.

use crate::error::CryptextError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Where fragments are downloaded from by default.
///
/// `{id}` is replaced by the fragment identifier.
pub const DEFAULT_URL_TEMPLATE: &str = "https://drive.google.com/uc?export=download&id={id}";

/// Placeholder substituted with the fragment identifier.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Default product tag prefixed to suggested file names.
pub const DEFAULT_PRODUCT_TAG: &str = "cryptext";

/// Configuration for phrase-to-PDF generation.
///
/// # Example
/// ```rust
/// use cryptext_pdf::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .fetch_timeout_secs(10)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// URL of a fragment, with `{id}` standing for its identifier.
    /// Default: [`DEFAULT_URL_TEMPLATE`].
    pub url_template: String,

    /// Per-fetch timeout in seconds. Default: 30.
    ///
    /// A fetch that runs longer fails with
    /// [`CryptextError::FragmentTimeout`] instead of hanging the request.
    pub fetch_timeout_secs: u64,

    /// Maximum number of fragment downloads in flight for one request. Default: 4.
    ///
    /// `1` fetches strictly one after another. Page order never depends on
    /// this value.
    pub concurrency: usize,

    /// Extra attempts per fragment after a retryable failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// How long a cached fragment stays fresh, in seconds. Default: None (forever).
    pub cache_ttl_secs: Option<u64>,

    /// Prefix of the suggested output file name. Default: `"cryptext"`.
    pub product_tag: String,

    /// Optional per-fragment progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            fetch_timeout_secs: 30,
            concurrency: 4,
            max_retries: 0,
            retry_backoff_ms: 500,
            cache_ttl_secs: None,
            product_tag: DEFAULT_PRODUCT_TAG.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("url_template", &self.url_template)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("product_tag", &self.product_tag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }

    /// The download URL of one fragment.
    pub fn fragment_url(&self, fragment_id: &str) -> String {
        self.url_template.replace(ID_PLACEHOLDER, fragment_id)
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn url_template(mut self, template: impl Into<String>) -> Self {
        self.config.url_template = template.into();
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = Some(secs);
        self
    }

    pub fn product_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.product_tag = tag.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, CryptextError> {
        let c = &self.config;
        if !c.url_template.contains(ID_PLACEHOLDER) {
            return Err(CryptextError::InvalidConfig(format!(
                "URL template must contain {ID_PLACEHOLDER}, got '{}'",
                c.url_template
            )));
        }
        if !(c.url_template.starts_with("http://") || c.url_template.starts_with("https://")) {
            return Err(CryptextError::InvalidConfig(format!(
                "URL template must be an HTTP/HTTPS URL, got '{}'",
                c.url_template
            )));
        }
        if c.concurrency == 0 {
            return Err(CryptextError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.product_tag.is_empty()
            || !c
                .product_tag
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(CryptextError::InvalidConfig(format!(
                "Product tag must be non-empty ASCII letters, digits, '-' or '_', got '{}'",
                c.product_tag
            )));
        }
        Ok(self.config)
    }
}
