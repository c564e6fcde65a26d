//! CLI binary for edgequake-voterlist.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_voterlist::{
    extract, extract_to_files, inspect, progress_channel, ArtifactConfig, CancelToken,
    ExtractionConfig, ExtractionStats, MetadataProfile, OcrMode, ProgressEvent, ProgressReceiver,
    TesseractCli,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Progress bar fed by the progress channel ─────────────────────────────────

/// Bar resolution: fractions are mapped onto 0..=1000.
const BAR_STEPS: u64 = 1000;

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(BAR_STEPS);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold:>16}  [{bar:42.green/238}] {percent:>3}%  \
         ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Preparing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Drain progress events into `bar` until every sender is dropped.
fn spawn_progress(bar: ProgressBar, mut rx: ProgressReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            render_event(&bar, &event);
        }
        bar.finish_and_clear();
    })
}

fn render_event(bar: &ProgressBar, event: &ProgressEvent) {
    let position = (event.fraction * BAR_STEPS as f32).round() as u64;
    // Concurrent pages can report slightly out of order; never move back.
    if position > bar.position() {
        bar.set_position(position);
    }
    bar.set_prefix(event.stage.to_string());
    bar.set_message(event.label.clone());
}

// ── Ctrl-C handling ──────────────────────────────────────────────────────────

/// First Ctrl-C requests cancellation between pages; the second exits.
fn install_ctrl_c(cancel: CancelToken, bar: Option<ProgressBar>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        cancel.cancel();
        let notice = format!(
            "{} Cancelling after the pages in flight (Ctrl-C again to abort)",
            cyan("⚠")
        );
        match bar {
            Some(ref b) => b.println(notice),
            None => eprintln!("{notice}"),
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract records + searchable PDF into ./out
  voterlist roll_106.pdf -o out/

  # Records only, printed to stdout
  voterlist --json roll_106.pdf > roll_106.json

  # Scanned roll: force OCR, embed a Devanagari font in the searchable PDF
  voterlist --ocr always --font /usr/share/fonts/NotoSansDevanagari-Regular.ttf scan.pdf -o out/

  # Another state's cover page layout
  voterlist --profile profiles/up.json roll.pdf -o out/

  # Download and extract
  voterlist https://example.org/rolls/part_106.pdf -o out/

  # Inspect the PDF information dictionary only
  voterlist --inspect-only roll_106.pdf

OUTPUT FILES (in the output directory):
  <stem>_extracted.json                 cover metadata + per-page voter records
  <stem>_searchable_structured.pdf      page images with an invisible text layer

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         pdfium shared library (file or directory)
  RUST_LOG                log filter, overrides -v / -q
  VOTERLIST_*             every flag can also be set through the environment

SETUP:
  1. Install pdfium:    https://github.com/bblanchon/pdfium-binaries
  2. For scanned rolls: apt install tesseract-ocr tesseract-ocr-hin
"#;

/// Recover voter records from Hindi electoral-roll PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "voterlist",
    version,
    about = "Recover voter records and a searchable PDF from Hindi electoral-roll PDFs",
    long_about = "Infer the row/column structure of Hindi voter-list PDFs (native text or \
scanned), validate the recovered tables and export them as structured JSON plus a searchable PDF.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the JSON and searchable-PDF artifacts.
    #[arg(short, long, env = "VOTERLIST_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Print the record set as JSON to stdout instead of writing files.
    #[arg(long, env = "VOTERLIST_JSON")]
    json: bool,

    /// Skip the searchable PDF; write the JSON record set only.
    #[arg(long, env = "VOTERLIST_NO_PDF")]
    no_pdf: bool,

    /// When to run OCR.
    #[arg(long, env = "VOTERLIST_OCR", value_enum, default_value = "auto")]
    ocr: OcrArg,

    /// OCR language model.
    #[arg(long, env = "VOTERLIST_LANGUAGE", default_value = "hin")]
    language: String,

    /// Path to the tesseract executable.
    #[arg(long, env = "VOTERLIST_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// TrueType font for the invisible text layer. Required for a searchable
    /// Hindi text layer: the built-in Helvetica has no Devanagari glyphs.
    #[arg(long, env = "VOTERLIST_FONT")]
    font: Option<PathBuf>,

    /// JSON metadata profile (cover-page anchors and fallbacks).
    #[arg(long, env = "VOTERLIST_PROFILE")]
    profile: Option<PathBuf>,

    /// Pages OCR'd concurrently.
    #[arg(short, long, env = "VOTERLIST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "VOTERLIST_PASSWORD")]
    password: Option<String>,

    /// pdfium shared library (file or directory).
    #[arg(long, env = "VOTERLIST_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "VOTERLIST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "VOTERLIST_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "VOTERLIST_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "VOTERLIST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OcrArg {
    Auto,
    Always,
    Never,
}

impl From<OcrArg> for OcrMode {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Auto => OcrMode::Auto,
            OcrArg::Always => OcrMode::Always,
            OcrArg::Never => OcrMode::Never,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
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

    let cancel = CancelToken::new();
    let (tx, rx) = progress_channel();
    let config = build_config(&cli, show_progress.then_some(tx), cancel.clone())?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = info.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = info.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = info.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
            if let Some(ref p) = info.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = info.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Progress + cancellation ──────────────────────────────────────────
    let bar = show_progress.then(new_bar);
    let progress_task = bar.clone().map(|b| spawn_progress(b, rx));
    install_ctrl_c(cancel, bar);

    // ── Run extraction ───────────────────────────────────────────────────
    if cli.json {
        let result = extract(&cli.input, &config).await;
        finish_progress(config, progress_task).await;
        let output = result.context("Extraction failed")?;

        println!(
            "{}",
            output
                .document
                .to_json_pretty()
                .context("Failed to serialise records")?
        );
        if !cli.quiet {
            print_summary(&output.stats);
        }
    } else {
        let result = extract_to_files(&cli.input, &cli.output_dir, &config).await;
        finish_progress(config, progress_task).await;
        let written = result.context("Extraction failed")?;

        if !cli.quiet {
            print_summary(&written.stats);
            for path in written.json.iter().chain(written.searchable_pdf.iter()) {
                eprintln!("   →  {}", bold(&path.display().to_string()));
            }
        }
    }

    Ok(())
}

/// Close the progress channel and wait for the bar to clear.
async fn finish_progress(config: ExtractionConfig, task: Option<JoinHandle<()>>) {
    drop(config);
    if let Some(task) = task {
        if let Err(e) = task.await {
            warn!("progress task ended abnormally: {e}");
        }
    }
}

fn print_summary(stats: &ExtractionStats) {
    let mark = if stats.cancelled {
        cyan("⚠")
    } else if stats.failed_pages > 0 {
        red("⚠")
    } else {
        green("✔")
    };
    eprintln!(
        "{}  {}/{} pages  {} tables  {} records  {}ms",
        mark,
        stats.analysed_pages,
        stats.total_pages,
        bold(&stats.tables_detected.to_string()),
        bold(&stats.total_records.to_string()),
        stats.total_duration_ms,
    );
    if stats.ocr_pages > 0 || stats.failed_pages > 0 {
        eprintln!(
            "   {}",
            dim(&format!(
                "{} pages via OCR, {} degraded",
                stats.ocr_pages, stats.failed_pages
            ))
        );
    }
    if stats.cancelled {
        eprintln!("   {}", red("cancelled: later pages were not analysed"));
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<edgequake_voterlist::ProgressSender>,
    cancel: CancelToken,
) -> Result<ExtractionConfig> {
    let tesseract = TesseractCli::new(&cli.tesseract);
    let mode: OcrMode = cli.ocr.clone().into();
    if mode != OcrMode::Never && !tesseract.is_available() {
        warn!(
            "{} is not runnable; scanned pages will keep their native text",
            cli.tesseract.display()
        );
    }

    let mut builder = ExtractionConfig::builder()
        .ocr_mode(mode)
        .ocr_engine(Arc::new(tesseract))
        .ocr_language(cli.language.clone())
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .artifacts(ArtifactConfig {
            json: true,
            searchable_pdf: !cli.no_pdf,
        })
        .cancel_token(cancel);

    if let Some(ref font) = cli.font {
        builder = builder.overlay_font(font);
    }
    if let Some(ref path) = cli.profile {
        let profile = MetadataProfile::from_json_file(path)
            .with_context(|| format!("Failed to load metadata profile {:?}", path))?;
        builder = builder.metadata(profile);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(tx) = progress {
        builder = builder.progress(tx);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_voterlist::Stage;

    #[test]
    fn defaults_write_both_artifacts() {
        let cli = Cli::try_parse_from(["voterlist", "roll.pdf"]).unwrap();
        let config = build_config(&cli, None, CancelToken::new()).unwrap();
        assert_eq!(config.ocr_mode, OcrMode::Auto);
        assert!(config.artifacts.json);
        assert!(config.artifacts.searchable_pdf);
        assert_eq!(config.ocr_language, "hin");
    }

    #[test]
    fn no_pdf_and_ocr_flags_apply() {
        let cli = Cli::try_parse_from([
            "voterlist",
            "--no-pdf",
            "--ocr",
            "never",
            "--concurrency",
            "2",
            "roll.pdf",
        ])
        .unwrap();
        let config = build_config(&cli, None, CancelToken::new()).unwrap();
        assert!(!config.artifacts.searchable_pdf);
        assert_eq!(config.ocr_mode, OcrMode::Never);
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn bar_never_moves_backwards() {
        let bar = ProgressBar::hidden();
        bar.set_length(BAR_STEPS);
        let event = |fraction| ProgressEvent {
            stage: Stage::Ocr,
            fraction,
            label: String::new(),
            page: None,
        };
        render_event(&bar, &event(0.6));
        render_event(&bar, &event(0.5));
        assert_eq!(bar.position(), 600);
    }
}
