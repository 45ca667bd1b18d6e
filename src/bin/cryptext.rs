//! CLI binary for cryptext-pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig`, writes the PDF and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use cryptext_pdf::{
    normalize, save_document, CryptextError, Generation, GenerationProgressCallback, Generator,
    GeneratorConfig, ProgressCallback, Registry, DEFAULT_URL_TEMPLATE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the distinct fragments, with a
/// log line for every fragment that had to be downloaded.
struct CliProgressCallback {
    bar: ProgressBar,
    downloaded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len} fragments  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Fetching");

        Arc::new(Self {
            bar,
            downloaded: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, distinct_fragments: usize, _pages: usize) {
        // Validation has passed; only now is there something to draw.
        self.bar.set_length(distinct_fragments as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_fragment_start(&self, fragment_id: &str) {
        self.bar.set_message(fragment_id.to_string());
    }

    fn on_fragment_complete(&self, fragment_id: &str, bytes: usize, from_cache: bool) {
        if !from_cache {
            self.downloaded.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} {}  {}",
                green("✓"),
                fragment_id,
                dim(&format!("{:.1} KiB", bytes as f64 / 1024.0)),
            ));
        }
        self.bar.inc(1);
    }

    fn on_fragment_error(&self, fragment_id: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), fragment_id, red(error)));
    }

    fn on_generation_complete(&self, _pages: usize, _bytes: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Writes cryptext_red.pdf in the current directory
  cryptext red

  # Separate words with dots; spaces also work
  cryptext red.ear
  cryptext hello moto          (same as hello.moto)

  # Choose the output file or directory
  cryptext -o ~/Desktop/ "Red Ear"

  # Write the PDF to stdout
  cryptext -o - red > red.pdf

  # Check a phrase against the registry without downloading anything
  cryptext --check --json "zoo"

  # Use your own fragments
  cryptext --registry my-registry.json \
           --url-template "https://blobs.example.com/{id}.pdf" red

REGISTRY FORMAT:
  {
    "fragments": { "a": "<id>", "dot": "<id>", "e2": "<id>", "e3": "<id>", ... },
    "aliases":   { "e": "e2", "l": "l7", "r": "r1" }
  }

  Keys: a–z, "dot" for the word separator, "e3"/"r21" for an e/r that
  starts a word. Plain letters are routed through "aliases" first.

ENVIRONMENT VARIABLES:
  CRYPTEXT_OUTPUT         Output file or directory
  CRYPTEXT_REGISTRY       Registry JSON file
  CRYPTEXT_URL_TEMPLATE   Fragment URL; {id} is replaced by the identifier
  RUST_LOG                Overrides the log filter (e.g. cryptext_pdf=debug)
"#;

/// Spell a phrase as a PDF, one pre-rendered page per letter, last letter first.
#[derive(Parser, Debug)]
#[command(
    name = "cryptext",
    version,
    about = "Spell a phrase as a PDF, one pre-rendered page per letter, last letter first",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// The phrase. Several arguments are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,

    /// Output file or directory; `-` writes the PDF to stdout.
    #[arg(short, long, env = "CRYPTEXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Registry JSON file (default: the built-in registry).
    #[arg(long, env = "CRYPTEXT_REGISTRY")]
    registry: Option<PathBuf>,

    /// Fragment download URL; `{id}` is replaced by the fragment identifier.
    #[arg(long, env = "CRYPTEXT_URL_TEMPLATE", default_value = DEFAULT_URL_TEMPLATE)]
    url_template: String,

    /// Per-fragment download timeout in seconds.
    #[arg(long, env = "CRYPTEXT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Number of concurrent fragment downloads.
    #[arg(short, long, env = "CRYPTEXT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per fragment on a transient download failure.
    #[arg(long, env = "CRYPTEXT_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Prefix of the suggested file name.
    #[arg(long, env = "CRYPTEXT_TAG", default_value = "cryptext")]
    tag: String,

    /// Validate the phrase and print the plan; no downloads.
    #[arg(long)]
    check: bool,

    /// Print the plan or the generation stats as JSON.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CRYPTEXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CRYPTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CRYPTEXT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let to_stdout = cli.output.as_deref() == Some(std::path::Path::new("-"));
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let raw = cli.text.join(" ");

    // Tell the user when their input was rewritten.
    let normalized = normalize(&raw);
    let lowered = raw.trim().to_lowercase();
    if !cli.quiet && !lowered.is_empty() && normalized != lowered {
        eprintln!("Using: {}", bold(&normalized));
    }

    let registry = match cli.registry {
        Some(ref path) => Registry::from_path(path)
            .with_context(|| format!("Failed to load registry {}", path.display()))?,
        None => Registry::builtin(),
    };

    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = progress.clone().map(|cb| cb as ProgressCallback);

    let config = build_config(&cli, progress_cb)?;
    let generator = Generator::new(registry, config).context("Failed to set up generator")?;

    // ── Check-only mode ──────────────────────────────────────────────────
    if cli.check {
        let plan = match generator.prepare(&raw) {
            Ok(plan) => plan,
            Err(e) => return report(e),
        };
        match plan {
            None => nothing_to_do(cli.quiet),
            Some(plan) if cli.json => println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
            ),
            Some(plan) => {
                println!("Phrase:     {}", plan.normalized);
                println!("Pages:      {}", plan.page_fragments.len());
                println!("Fragments:  {} distinct", plan.distinct_fragments().len());
                println!("File:       {}", plan.file_name);
            }
        }
        return Ok(());
    }

    // ── Generate ─────────────────────────────────────────────────────────
    let generation = match generator.generate(&raw).await {
        Ok(generation) => generation,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.bar.finish_and_clear();
            }
            return report(e);
        }
    };
    let Generation::Document(doc) = generation else {
        nothing_to_do(cli.quiet);
        return Ok(());
    };

    let written_to = if to_stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&doc.bytes)
            .context("Failed to write to stdout")?;
        handle.flush().ok();
        None
    } else {
        let target = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
        let path = save_document(&doc, &target)
            .await
            .context("Failed to save PDF")?;
        Some(path)
    };

    if cli.json {
        let summary = serde_json::json!({
            "file_name": doc.file_name,
            "path": written_to.as_ref().map(|p| p.display().to_string()),
            "normalized": doc.normalized,
            "pages": doc.page_count,
            "stats": doc.stats,
        });
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        if to_stdout {
            eprintln!("{json}");
        } else {
            println!("{json}");
        }
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            doc.page_count,
            doc.stats.total_duration_ms,
            bold(
                &written_to
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "stdout".to_string())
            ),
        );
        eprintln!(
            "   {} fetched  /  {} cached",
            dim(&doc.stats.fetched.to_string()),
            dim(&doc.stats.cache_hits.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .url_template(cli.url_template.clone())
        .fetch_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .product_tag(cli.tag.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn nothing_to_do(quiet: bool) {
    if !quiet {
        eprintln!("Nothing to do: the input contains no letters.");
    }
}

/// Print unsupported characters the way a user can act on; everything else
/// goes through anyhow.
fn report(e: CryptextError) -> Result<()> {
    if let CryptextError::UnsupportedCharacters { .. } = e {
        eprintln!("{} {}", red("✘"), e);
        std::process::exit(2);
    }
    Err(e).context("Generation failed")
}
