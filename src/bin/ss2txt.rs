//! CLI binary for edgequake-ss2txt.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ss2txt::{
    convert, convert_to_file, BatchStats, ConversionConfig, ConversionProgressCallback, OcrEngine,
    OutputLayout, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// File name of the combined output, inside the output folder.
const COMBINED_FILE_NAME: &str = "all_extracted_structured_text.txt";

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// image, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-image start times and file names, keyed by image number.
    started: Mutex<HashMap<usize, (Instant, String)>>,
    errors: AtomicUsize,
}

const SPINNER: [&str; 8] = ["◐", "◓", "◑", "◒", "◐", "◓", "◑", "●"];

impl CliProgressCallback {
    /// Starts as a spinner; `on_batch_start` turns it into a bar once the
    /// folder has been listed.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(style("{spinner:.cyan} {msg}", ProgressStyle::default_spinner()));
        bar.set_message("Listing screenshots…");
        bar.enable_steady_tick(Duration::from_millis(100));

        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let template = "{spinner:.cyan} OCR [{bar:36.cyan/240}] {pos}/{len}  {msg:.dim}  ({elapsed}, ETA {eta})";
        self.bar.set_style(style(template, ProgressStyle::default_bar()).progress_chars("=> "));
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
    }

    fn finish_image(&self, image_num: usize) -> (f64, String) {
        let entry = self
            .started
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&image_num));
        match entry {
            Some((t, name)) => (t.elapsed().as_millis() as f64 / 1000.0, name),
            None => (0.0, String::new()),
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_images} image(s) to process…"))
        ));
    }

    fn on_image_start(&self, image_num: usize, _total: usize, file_name: &str) {
        if let Ok(mut m) = self.started.lock() {
            m.insert(image_num, (Instant::now(), file_name.to_string()));
        }
        self.bar.set_message(file_name.to_string());
    }

    fn on_image_complete(&self, image_num: usize, total: usize, text_len: usize) {
        let (secs, name) = self.finish_image(image_num);
        let status = if text_len == 0 {
            dim("   (no text)")
        } else {
            dim(&format!("{text_len:>5} chars"))
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            image_num,
            total,
            name,
            status,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, image_num: usize, total: usize, error: &str) {
        let (secs, name) = self.finish_image(image_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep one line per image.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            image_num,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        self.bar.finish_and_clear();
        print_summary(total_images, success_count);
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or(fallback)
        .tick_strings(&SPINNER)
}

fn print_summary(total: usize, succeeded: usize) {
    let failed = total.saturating_sub(succeeded);
    if failed == 0 {
        eprintln!(
            "{} {} image(s) converted successfully",
            green("✔"),
            bold(&succeeded.to_string())
        );
    } else {
        eprintln!(
            "{} {}/{} image(s) converted  ({} failed)",
            if failed == total { red("✘") } else { cyan("⚠") },
            bold(&succeeded.to_string()),
            total,
            red(&failed.to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every screenshot in ./input into output/all_extracted_structured_text.txt
  ss2txt

  # Another folder, explicit output file
  ss2txt shots/ -o notes.txt

  # One text file per screenshot
  ss2txt shots/ --per-image -o out/

  # Print to stdout instead of writing a file
  ss2txt quiz.png --stdout

  # Structured JSON (tables, cell counts, shapes, errors)
  ss2txt shots/ --json > result.json

  # Four screenshots at a time, German OCR
  ss2txt shots/ --concurrency 4 --lang deu

REQUIREMENTS:
  Tesseract must be installed:
    Debian/Ubuntu:  apt install tesseract-ocr
    macOS:          brew install tesseract
  Extra languages come as separate packages (e.g. tesseract-ocr-deu).

ENVIRONMENT VARIABLES:
  TESSERACT_PATH   Path to the tesseract executable
  RUST_LOG         Override log filtering (e.g. RUST_LOG=edgequake_ss2txt=debug)
"#;

/// Convert folders of screenshots to plain text, recovering tables.
#[derive(Parser, Debug)]
#[command(
    name = "ss2txt",
    version,
    about = "Convert folders of screenshots to plain text, recovering tables as pipe-delimited rows",
    long_about = "Convert screenshots (png, jpg, jpeg, gif, bmp, tiff, webp) to plain text with \
Tesseract OCR. Ruled and borderless tables are detected and emitted as `| cell | cell |` rows; \
surrounding text such as a question above an answer grid is kept.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder of screenshots, or a single image file.
    #[arg(default_value = "input", env = "SS2TXT_INPUT")]
    input: PathBuf,

    /// Output file (combined) or folder (--per-image).
    /// Default: output/all_extracted_structured_text.txt, or output/ with --per-image.
    #[arg(short, long, env = "SS2TXT_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the combined text to stdout instead of writing a file.
    #[arg(long, env = "SS2TXT_STDOUT", conflicts_with = "per_image")]
    stdout: bool,

    /// Write one <image stem>.txt per screenshot.
    #[arg(long, env = "SS2TXT_PER_IMAGE")]
    per_image: bool,

    /// Output structured JSON (BatchOutput) on stdout instead of text.
    #[arg(long, env = "SS2TXT_JSON", conflicts_with = "per_image")]
    json: bool,

    /// Number of screenshots processed at once.
    #[arg(short, long, env = "SS2TXT_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Time budget per screenshot in seconds.
    #[arg(long, env = "SS2TXT_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Tesseract language(s), e.g. eng, deu, eng+fra.
    #[arg(short, long, env = "SS2TXT_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract OCR engine mode (0–3).
    #[arg(long, env = "SS2TXT_OEM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    oem: u8,

    /// OCR engine: tesseract (executable) or leptess (in-process, feature `leptess`).
    #[arg(long, env = "SS2TXT_ENGINE", value_enum, default_value = "tesseract")]
    engine: EngineArg,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_PATH")]
    tesseract: Option<PathBuf>,

    /// Drop table cells with no text instead of keeping an empty slot.
    #[arg(long, env = "SS2TXT_SKIP_EMPTY_CELLS")]
    skip_empty_cells: bool,

    /// Skip shape classification.
    #[arg(long, env = "SS2TXT_NO_SHAPES")]
    no_shapes: bool,

    /// Disable progress bar.
    #[arg(long, env = "SS2TXT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SS2TXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SS2TXT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum EngineArg {
    Tesseract,
    Leptess,
}

impl From<EngineArg> for OcrEngine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Tesseract => OcrEngine::TesseractCli,
            EngineArg::Leptess => OcrEngine::Leptess,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; --verbose always wins.
    let to_stdout = cli.stdout || cli.json;
    let show_progress = !cli.quiet && !cli.no_progress && !to_stdout;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let stats = if to_stdout {
        let output = convert(&cli.input, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
        output.stats
    } else {
        let output_path = cli.output.clone().unwrap_or_else(|| default_output(cli.per_image));
        let stats = convert_to_file(&cli.input, &output_path, &config)
            .await
            .context("Conversion failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} images  {}ms  →  {}",
                if stats.failed == 0 { green("✔") } else { cyan("⚠") },
                stats.succeeded,
                stats.total_images,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        stats
    };

    // The progress callback already printed the summary.
    if !cli.quiet && !show_progress {
        print_summary(stats.total_images, stats.succeeded);
    }
    report_empty(&stats, cli.quiet);

    if stats.succeeded == 0 {
        anyhow::bail!("No text extracted from any image");
    }
    Ok(())
}

fn default_output(per_image: bool) -> PathBuf {
    let dir = PathBuf::from("output");
    if per_image {
        dir
    } else {
        dir.join(COMBINED_FILE_NAME)
    }
}

fn report_empty(stats: &BatchStats, quiet: bool) {
    if !quiet && stats.empty > 0 {
        eprintln!(
            "   {}",
            dim(&format!("{} image(s) had no readable text", stats.empty))
        );
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .concurrency(cli.concurrency)
        .image_timeout_secs(cli.timeout)
        .language(cli.lang.clone())
        .engine_mode(cli.oem)
        .engine(cli.engine.clone().into())
        .detect_shapes(!cli.no_shapes)
        .output_layout(if cli.per_image {
            OutputLayout::PerImage
        } else {
            OutputLayout::Combined
        });

    if cli.skip_empty_cells {
        builder = builder.empty_cells(edgequake_ss2txt::EmptyCellPolicy::Skip);
    }
    if let Some(ref path) = cli.tesseract {
        builder = builder.tesseract_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
