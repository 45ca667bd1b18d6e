//! Generation entry points: phrase in, PDF out.
//!
//! A [`Generator`] owns the three long-lived collaborators of the pipeline:
//! the immutable [`Registry`], the shared [`FragmentCache`] (inside its
//! [`FragmentFetcher`]) and the [`GeneratorConfig`]. Build one per process and
//! reuse it for every request so repeated letters are downloaded only once.
//!
//! ## Request flow
//!
//! 1. [`Generator::prepare`] normalises, tokenises and validates. No I/O; an
//!    unsupported character fails here with the full list of offenders.
//! 2. Each *distinct* fragment is fetched once (up to `concurrency` at a
//!    time). The first failure aborts the request.
//! 3. Pages are appended last-token-first on a blocking thread and the
//!    document is serialised.

use crate::config::GeneratorConfig;
use crate::error::CryptextError;
use crate::output::{suggested_file_name, CryptextDocument, Generation, GenerationStats, Plan};
use crate::pipeline::assemble::{DocumentWriter, PdfPageWriter};
use crate::pipeline::fetch::{
    Fetched, FragmentBytes, FragmentCache, FragmentFetcher, FragmentSource, HttpFragmentSource,
};
use crate::pipeline::normalize::normalize;
use crate::pipeline::tokenize::tokenize;
use crate::pipeline::validate::validate;
use crate::registry::Registry;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Phrase-to-PDF generator.
pub struct Generator {
    registry: Arc<Registry>,
    fetcher: FragmentFetcher,
    config: GeneratorConfig,
}

impl Generator {
    /// A generator that downloads fragments over HTTP into a fresh cache.
    pub fn new(registry: Registry, config: GeneratorConfig) -> Result<Self, CryptextError> {
        let source = Arc::new(HttpFragmentSource::new(&config)?);
        let cache = Arc::new(FragmentCache::with_ttl(
            config.cache_ttl_secs.map(Duration::from_secs),
        ));
        Ok(Self::with_source(registry, source, cache, config))
    }

    /// A generator over an arbitrary fragment source and a caller-owned cache.
    pub fn with_source(
        registry: Registry,
        source: Arc<dyn FragmentSource>,
        cache: Arc<FragmentCache>,
        config: GeneratorConfig,
    ) -> Self {
        let fetcher = FragmentFetcher::new(source, cache)
            .with_retries(config.max_retries, config.retry_backoff_ms);
        Self {
            registry: Arc::new(registry),
            fetcher,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The fragment cache shared by every request of this generator.
    pub fn cache(&self) -> &Arc<FragmentCache> {
        self.fetcher.cache()
    }

    /// Normalise, tokenise and validate `raw` without touching the network.
    ///
    /// Returns `Ok(None)` when the phrase normalises to nothing.
    ///
    /// # Errors
    /// [`CryptextError::UnsupportedCharacters`] listing every character the
    /// registry cannot spell.
    pub fn prepare(&self, raw: &str) -> Result<Option<Plan>, CryptextError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Ok(None);
        }

        let tokens = tokenize(&normalized);
        validate(&tokens, &self.registry)?;

        let page_fragments = tokens
            .iter()
            .rev()
            .map(|token| {
                self.registry
                    .fragment_for(*token)
                    .map(str::to_string)
                    .ok_or_else(|| CryptextError::UnknownToken { key: token.key() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let file_name = suggested_file_name(&self.config.product_tag, &normalized);
        debug!(
            "Prepared '{}': {} tokens → {}",
            normalized,
            tokens.len(),
            file_name
        );

        Ok(Some(Plan {
            normalized,
            tokens,
            page_fragments,
            file_name,
        }))
    }

    /// Build the PDF for `raw`.
    ///
    /// # Returns
    /// `Ok(Generation::Empty)` if the phrase normalises to nothing, otherwise
    /// the assembled document.
    ///
    /// # Errors
    /// - unsupported characters (before any network request)
    /// - the first fragment that cannot be retrieved or parsed; no partial
    ///   document is ever returned
    pub async fn generate(&self, raw: &str) -> Result<Generation, CryptextError> {
        let total_start = Instant::now();

        let Some(plan) = self.prepare(raw)? else {
            info!("Input normalises to nothing; no document generated");
            return Ok(Generation::Empty);
        };

        let pages = plan.page_fragments.len();
        let distinct: Vec<String> = plan
            .distinct_fragments()
            .into_iter()
            .map(str::to_string)
            .collect();
        info!(
            "Generating '{}': {} pages from {} distinct fragments",
            plan.normalized,
            pages,
            distinct.len()
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_generation_start(distinct.len(), pages);
        }

        // ── Fetch distinct fragments ─────────────────────────────────────────
        let fetch_start = Instant::now();
        let fetched = self.fetch_all(distinct).await?;
        let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

        let cache_hits = fetched.iter().filter(|(_, f)| f.from_cache).count();
        let stats_fetched = fetched.len() - cache_hits;
        let fragments: HashMap<String, FragmentBytes> = fetched
            .into_iter()
            .map(|(id, f)| (id, f.bytes))
            .collect();

        // ── Assemble in reverse token order ──────────────────────────────────
        let assemble_start = Instant::now();
        let page_fragments = plan.page_fragments.clone();
        let bytes = tokio::task::spawn_blocking(move || assemble(&page_fragments, &fragments))
            .await
            .map_err(|e| CryptextError::Internal(format!("Assembly task panicked: {e}")))??;
        let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

        let stats = GenerationStats {
            tokens: plan.tokens.len(),
            distinct_fragments: stats_fetched + cache_hits,
            fetched: stats_fetched,
            cache_hits,
            output_bytes: bytes.len(),
            fetch_duration_ms,
            assemble_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "Generated {}: {} pages, {} bytes, {} fetched / {} cached, {}ms",
            plan.file_name,
            pages,
            bytes.len(),
            stats.fetched,
            stats.cache_hits,
            stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_generation_complete(pages, bytes.len());
        }

        Ok(Generation::Document(CryptextDocument {
            bytes,
            file_name: plan.file_name,
            normalized: plan.normalized,
            page_count: pages,
            stats,
        }))
    }

    /// Build the PDF for `raw` and write it to `output_path`.
    ///
    /// If `output_path` is an existing directory the suggested file name is
    /// used inside it. Uses atomic write (temp file + rename) so a failed
    /// request never leaves a partial file behind.
    ///
    /// Returns `Ok(None)` without writing anything when the phrase is empty.
    pub async fn generate_to_file(
        &self,
        raw: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<Option<CryptextDocument>, CryptextError> {
        let Generation::Document(doc) = self.generate(raw).await? else {
            return Ok(None);
        };

        save_document(&doc, output_path).await?;
        Ok(Some(doc))
    }

    /// Fetch each identifier once, keeping at most `concurrency` in flight.
    async fn fetch_all(
        &self,
        distinct: Vec<String>,
    ) -> Result<Vec<(String, Fetched)>, CryptextError> {
        let fetcher = &self.fetcher;
        let callback = &self.config.progress_callback;

        stream::iter(distinct)
            .map(|id| async move {
                if let Some(cb) = callback {
                    cb.on_fragment_start(&id);
                }
                match fetcher.fetch(&id).await {
                    Ok(fetched) => {
                        if let Some(cb) = callback {
                            cb.on_fragment_complete(&id, fetched.bytes.len(), fetched.from_cache);
                        }
                        Ok((id, fetched))
                    }
                    Err(e) => {
                        if let Some(cb) = callback {
                            cb.on_fragment_error(&id, &e.to_string());
                        }
                        Err(e)
                    }
                }
            })
            .buffered(self.config.concurrency)
            .try_collect()
            .await
    }
}

/// Write a generated document to `output_path` and return the final path.
///
/// An existing directory receives the document under its suggested file
/// name. The bytes go to a temp file first and are renamed into place.
pub async fn save_document(
    doc: &CryptextDocument,
    output_path: impl AsRef<Path>,
) -> Result<PathBuf, CryptextError> {
    let path = resolve_output_path(output_path.as_ref(), &doc.file_name).await;
    write_atomic(&path, &doc.bytes).await?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Append the first page of every fragment, in the given page order.
fn assemble(
    page_fragments: &[String],
    fragments: &HashMap<String, FragmentBytes>,
) -> Result<Vec<u8>, CryptextError> {
    let mut writer = PdfPageWriter::new();
    for id in page_fragments {
        let bytes = fragments
            .get(id)
            .ok_or_else(|| CryptextError::Internal(format!("fragment '{id}' was not fetched")))?;
        writer.append_first_page(id, bytes)?;
    }
    debug!("Assembled {} pages", writer.page_count());
    writer.finish()
}

async fn resolve_output_path(path: &Path, file_name: &str) -> PathBuf {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => path.join(file_name),
        _ => path.to_path_buf(),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CryptextError> {
    let write_err = |e| CryptextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    let written = match tokio::fs::write(&tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        // Never leave a partial temp file behind.
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

/// Synchronous wrapper: build a [`Generator`] and run one request.
///
/// Creates a temporary tokio runtime internally, so it must not be called
/// from inside an async context.
pub fn generate_sync(
    raw: &str,
    registry: Registry,
    config: GeneratorConfig,
) -> Result<Generation, CryptextError> {
    let generator = Generator::new(registry, config)?;
    tokio::runtime::Runtime::new()
        .map_err(|e| CryptextError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(generator.generate(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokenize::Token;

    struct UnreachableSource;

    #[async_trait::async_trait]
    impl FragmentSource for UnreachableSource {
        async fn retrieve(&self, fragment_id: &str) -> Result<Vec<u8>, CryptextError> {
            panic!("prepare must not fetch (asked for {fragment_id})");
        }
    }

    fn generator(registry: Registry) -> Generator {
        Generator::with_source(
            registry,
            Arc::new(UnreachableSource),
            Arc::new(FragmentCache::new()),
            GeneratorConfig::default(),
        )
    }

    fn abc_registry() -> Registry {
        Registry::builder()
            .fragment("a", "F_a")
            .fragment("b", "F_b")
            .fragment("dot", "F_dot")
            .build()
            .unwrap()
    }

    #[test]
    fn prepare_reverses_page_order() {
        let plan = generator(abc_registry()).prepare("A B").unwrap().unwrap();
        assert_eq!(plan.normalized, "a.b");
        assert_eq!(
            plan.tokens,
            vec![Token::Letter('a'), Token::Separator, Token::Letter('b')]
        );
        assert_eq!(plan.page_fragments, vec!["F_b", "F_dot", "F_a"]);
        assert_eq!(plan.file_name, "cryptext_a_b.pdf");
    }

    #[test]
    fn prepare_empty_input_is_none() {
        assert!(generator(abc_registry()).prepare("  !!  ").unwrap().is_none());
    }

    #[test]
    fn prepare_reports_unsupported() {
        let err = generator(abc_registry()).prepare("zab").unwrap_err();
        assert!(matches!(
            err,
            CryptextError::UnsupportedCharacters { ref chars } if chars == &vec!['z']
        ));
    }

    #[test]
    fn prepare_uses_configured_tag() {
        let generator = Generator::with_source(
            abc_registry(),
            Arc::new(UnreachableSource),
            Arc::new(FragmentCache::new()),
            GeneratorConfig::builder().product_tag("zine").build().unwrap(),
        );
        assert_eq!(generator.prepare("ab").unwrap().unwrap().file_name, "zine_ab.pdf");
    }

    #[tokio::test]
    async fn generate_empty_input_is_a_no_op() {
        let result = generator(abc_registry()).generate("...").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn output_path_directory_gets_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_output_path(dir.path(), "cryptext_a.pdf").await;
        assert_eq!(path, dir.path().join("cryptext_a.pdf"));

        let file = dir.path().join("custom.pdf");
        assert_eq!(resolve_output_path(&file, "cryptext_a.pdf").await, file);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.pdf");
        write_atomic(&path, b"%PDF-1.5").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert!(!path.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cryptext_ab.pdf");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), b"occupied").unwrap();

        let err = write_atomic(&path, b"%PDF-1.5").await.unwrap_err();
        assert!(matches!(err, CryptextError::OutputWriteFailed { .. }));
        assert!(!path.with_extension("pdf.tmp").exists());
        assert!(path.join("keep.txt").exists());
    }
}
