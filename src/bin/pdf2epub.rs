//! CLI binary for pdf2epub.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2epub::config::{DEFAULT_AUTHOR, DEFAULT_TITLE};
use pdf2epub::pipeline::input::default_output_path;
use pdf2epub::{
    convert_to_file, inspect, ConversionConfig, ConversionProgressCallback, PageSelection,
    PageSummary, PageWarning, ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page currently being processed.
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_image_skipped(&self, warning: &PageWarning) {
        self.bar
            .println(format!("  {} {}", yellow("⚠"), dim(&warning.to_string())));
    }

    fn on_page_complete(&self, summary: &PageSummary, total: usize) {
        let low_text = if summary.below_threshold {
            yellow(" low text")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}{}  {}",
            green("✓"),
            summary.page_num,
            total,
            dim(&format!("{:>5} words", summary.word_count)),
            dim(&format!("{:>2} images", summary.embedded_images)),
            low_text,
            dim(&format!("{:.1}s", self.page_elapsed())),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _fullpage_images: usize, _embedded_images: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes document.epub next to the input)
  pdf2epub document.pdf

  # Explicit output path and metadata
  pdf2epub scan.pdf book.epub --title "Field Notes" --author "A. Naturalist"

  # Lower resolution renders for a smaller book
  pdf2epub --dpi 150 --quality 85 atlas.pdf

  # Only some pages
  pdf2epub --pages 3-15 report.pdf
  pdf2epub --pages 1,4-9,12 report.pdf

  # Inspect PDF metadata only
  pdf2epub --inspect-only document.pdf

  # Machine-readable statistics
  pdf2epub --json document.pdf > stats.json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (or the directory containing it)
  RUST_LOG          Override the log filter (e.g. pdf2epub=debug)
  PDF2EPUB_*        Every flag, e.g. PDF2EPUB_DPI=200

PDFIUM:
  pdfium is loaded at runtime from PDFIUM_LIB_PATH, then the current
  directory, then the system library path. Pre-built libraries:
  https://github.com/bblanchon/pdfium-binaries/releases
"#;

/// Convert PDF files to EPUB: full-page images, embedded images and text.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2epub",
    version,
    about = "Convert PDF files to EPUB, keeping full-page images, embedded images and text",
    long_about = "Convert a PDF document to an EPUB e-book. Every page is rendered as a \
full-page image, followed by its extracted text (headings and paragraphs) and every \
embedded image found on the page, all in a single chapter.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Output EPUB file. Default: input with the extension replaced by .epub.
    output: Option<PathBuf>,

    /// Book title.
    #[arg(long, env = "PDF2EPUB_TITLE", default_value = DEFAULT_TITLE)]
    title: String,

    /// Book author.
    #[arg(long, env = "PDF2EPUB_AUTHOR", default_value = DEFAULT_AUTHOR)]
    author: String,

    /// Word count under which a page is reported as low-text.
    #[arg(long, env = "PDF2EPUB_THRESHOLD", default_value_t = 100)]
    threshold: usize,

    /// Rendering DPI for full-page images (72–600).
    #[arg(long, env = "PDF2EPUB_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// JPEG quality for all images (1–100).
    #[arg(long, env = "PDF2EPUB_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Page selection: all, 5, 3-15, 12- (to the end), or lists like 1,3-5,9.
    #[arg(long, env = "PDF2EPUB_PAGES", default_value = "all")]
    pages: PageSelection,

    /// Print PDF metadata only, no conversion.
    #[arg(long, env = "PDF2EPUB_INSPECT_ONLY")]
    inspect_only: bool,

    /// Print conversion statistics as JSON on stdout.
    #[arg(long, env = "PDF2EPUB_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2EPUB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2EPUB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2EPUB_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO library logs would interleave with the progress bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    // ── Run conversion ───────────────────────────────────────────────────
    let stats = convert_to_file(&cli.input, &output_path, &config)
        .await
        .with_context(|| format!("Conversion of {} failed", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise statistics")?
        );
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            green("✔"),
            stats.processed_pages,
            stats.total_pages,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!("   Full-page images:  {}", stats.fullpage_images);
        eprintln!("   Embedded images:   {}", stats.embedded_images);
        if stats.skipped_images > 0 {
            eprintln!(
                "   {}",
                yellow(&format!("{} embedded images skipped", stats.skipped_images))
            );
        }
        eprintln!(
            "   All text preserved  {}",
            dim(&format!("({} blocks)", stats.text_blocks))
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .title(&cli.title)
        .author(&cli.author)
        .word_threshold(cli.threshold)
        .dpi(cli.dpi)
        .jpeg_quality(cli.quality)
        .pages(cli.pages.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_flag_parses_into_a_selection() {
        let cli = Cli::parse_from(["pdf2epub", "--pages", "2-4,7", "in.pdf"]);
        assert_eq!(cli.pages, PageSelection::Set(vec![2, 3, 4, 7]));

        let cli = Cli::parse_from(["pdf2epub", "--pages", "10-", "in.pdf"]);
        assert_eq!(cli.pages, PageSelection::Range(10, usize::MAX));
    }

    #[test]
    fn bad_pages_flag_is_a_usage_error() {
        for bad in ["0", "9-3", "1,x"] {
            assert!(Cli::try_parse_from(["pdf2epub", "--pages", bad, "in.pdf"]).is_err(), "{bad}");
        }
    }

    #[test]
    fn defaults_follow_library_defaults() {
        let cli = Cli::parse_from(["pdf2epub", "in.pdf"]);
        assert_eq!(cli.title, DEFAULT_TITLE);
        assert_eq!(cli.author, DEFAULT_AUTHOR);
        assert_eq!(cli.threshold, 100);
        assert_eq!(cli.dpi, 300);
        assert_eq!(cli.quality, 95);
        assert!(cli.output.is_none());
        assert_eq!(cli.pages, PageSelection::All);
    }
}
