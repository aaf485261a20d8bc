//! Eager (whole-batch) conversion entry points.
//!
//! [`convert`] waits for every image, then returns the assembled text with
//! per-image results. Use [`crate::stream::convert_stream`] to receive
//! results as they finish instead.
//!
//! Each image runs on the blocking thread pool under its own time budget.
//! A corrupt file, an engine failure or a timeout is recorded on that
//! image's [`ImageResult`] and the batch moves on.

use crate::config::{ConversionConfig, OcrEngine, OutputLayout};
use crate::error::{ImageError, Ss2TxtError};
use crate::output::{assemble_text, BatchOutput, BatchStats, ImageResult};
use crate::pipeline::extract::extract_structured_text_cancellable;
use crate::pipeline::input;
use crate::pipeline::ocr::{CancelFlag, OcrBackend, TesseractCli};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert a folder of screenshots (or a single screenshot) to text.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchOutput)` even if some images failed
/// (check `output.stats.failed` or call [`BatchOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Ss2TxtError)` only for fatal errors:
/// - input not found / permission denied / no images
/// - OCR engine not available
pub async fn convert(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchOutput, Ss2TxtError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    info!("Starting conversion: {}", input_path.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let images = input::resolve_input(input_path)?;
    let total = images.len();

    // ── Step 2: Get/create OCR backend ───────────────────────────────────
    let backend = resolve_backend(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Step 3: Process images in input order ────────────────────────────
    let results: Vec<ImageResult> = stream::iter(images.into_iter().enumerate().map(|(index, path)| {
        let backend = Arc::clone(&backend);
        let config = config.clone();
        async move {
            let file_name = input::file_name(&path);
            let load_path = path.clone();
            process_image(
                backend,
                file_name,
                Some(path),
                index,
                total,
                &config,
                move || input::load_image(&load_path),
            )
            .await
        }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await;

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let text = assemble_text(&results);
    let stats = BatchStats::from_results(&results, total_start.elapsed().as_millis() as u64);

    info!(
        "Conversion complete: {}/{} images, {} failed, {}ms total",
        stats.succeeded, stats.total_images, stats.failed, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    Ok(BatchOutput {
        text,
        images: results,
        stats,
    })
}

/// Convert and write the result to disk.
///
/// With [`OutputLayout::Combined`] `output_path` is the text file; with
/// [`OutputLayout::PerImage`] it is a directory receiving one
/// `<image stem>.txt` per successfully processed image. Every file is
/// written atomically (temp file + rename).
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchStats, Ss2TxtError> {
    let output = convert(input_path, config).await?;
    let path = output_path.as_ref();

    match config.output_layout {
        OutputLayout::Combined => write_atomic(path, &output.text).await?,
        OutputLayout::PerImage => {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| Ss2TxtError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            for image in output.images.iter().filter(|r| r.is_success()) {
                let target = path.join(per_image_file_name(&image.file_name));
                write_atomic(&target, &image.text).await?;
            }
        }
    }
    info!("Wrote output to {}", path.display());

    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally. The runtime is shut down
/// without waiting for blocking work, so a timed-out image does not delay
/// the return.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<BatchOutput, Ss2TxtError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Ss2TxtError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let output = rt.block_on(convert(input_path, config));
    rt.shutdown_background();
    output
}

/// Convert one encoded screenshot held in memory.
///
/// The format is guessed from the bytes. Decode and recognition failures
/// are reported on the returned [`ImageResult`], like in a batch.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ss2txt::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("screenshot.png")?;
/// let result = convert_from_bytes(&bytes, &ConversionConfig::default()).await?;
/// println!("{}", result.text);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ImageResult, Ss2TxtError> {
    let backend = resolve_backend(config)?;
    let bytes = bytes.to_vec();
    let name = "<bytes>".to_string();
    let load_name = name.clone();
    Ok(process_image(backend, name, None, 0, 1, config, move || {
        image::load_from_memory(&bytes).map_err(|e| ImageError::Decode {
            file: load_name,
            detail: e.to_string(),
        })
    })
    .await)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the OCR backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`) is used as-is.
/// 2. **`OcrEngine::Leptess`** links libtesseract (feature `leptess`).
/// 3. **`OcrEngine::TesseractCli`** runs the executable at
///    `config.tesseract_path`, or `tesseract` on `PATH`. The executable is
///    checked once so a missing install fails the batch up front instead of
///    failing every image.
pub(crate) fn resolve_backend(config: &ConversionConfig) -> Result<Arc<dyn OcrBackend>, Ss2TxtError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    match config.engine {
        OcrEngine::Leptess => leptess_backend(config),
        OcrEngine::TesseractCli => {
            let program = config
                .tesseract_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("tesseract"));
            let cli = TesseractCli::new(program, config.language.clone(), config.engine_mode);
            let version = cli.version().map_err(|e| Ss2TxtError::OcrEngineUnavailable {
                engine: "tesseract".to_string(),
                hint: format!(
                    "{e}\n\
                    Install Tesseract (e.g. `apt install tesseract-ocr` or `brew install tesseract`)\n\
                    or point --tesseract / TESSERACT_PATH at the executable."
                ),
            })?;
            info!("Using {} ({})", cli.program().display(), version);
            Ok(Arc::new(cli))
        }
    }
}

#[cfg(feature = "leptess")]
fn leptess_backend(config: &ConversionConfig) -> Result<Arc<dyn OcrBackend>, Ss2TxtError> {
    let backend = crate::pipeline::ocr::LeptessBackend::new(config.language.clone()).map_err(|e| {
        Ss2TxtError::OcrEngineUnavailable {
            engine: "leptess".to_string(),
            hint: e.to_string(),
        }
    })?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "leptess"))]
fn leptess_backend(_config: &ConversionConfig) -> Result<Arc<dyn OcrBackend>, Ss2TxtError> {
    Err(Ss2TxtError::OcrEngineUnavailable {
        engine: "leptess".to_string(),
        hint: "This build does not include libtesseract support. Rebuild with `--features leptess`."
            .to_string(),
    })
}

/// Decode and convert one image on the blocking pool, bounded by the
/// per-image timeout. Never fails: errors end up in the result.
///
/// On timeout the image's [`CancelFlag`] is set, so the blocking task
/// starts no further OCR attempts and a running engine process is killed.
pub(crate) async fn process_image<F>(
    backend: Arc<dyn OcrBackend>,
    file_name: String,
    path: Option<PathBuf>,
    index: usize,
    total: usize,
    config: &ConversionConfig,
    load: F,
) -> ImageResult
where
    F: FnOnce() -> Result<DynamicImage, ImageError> + Send + 'static,
{
    let start = Instant::now();
    let image_num = index + 1;
    if let Some(ref cb) = config.progress_callback {
        cb.on_image_start(image_num, total, &file_name);
    }
    debug!("Processing {} ({}/{})", file_name, image_num, total);

    let task_config = config.clone();
    let task_name = file_name.clone();
    let cancel = CancelFlag::new();
    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || {
        let img = load()?;
        extract_structured_text_cancellable(&img, backend.as_ref(), &task_config, &task_cancel)
            .map_err(|e| ImageError::Recognition {
                file: task_name,
                detail: e.to_string(),
            })
    });

    let secs = config.image_timeout_secs;
    let outcome = match tokio::time::timeout(Duration::from_secs(secs), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ImageError::Panicked {
            file: file_name.clone(),
            detail: join_err.to_string(),
        }),
        Err(_) => {
            cancel.cancel();
            Err(ImageError::Timeout {
                file: file_name.clone(),
                secs,
            })
        }
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(extraction) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_complete(image_num, total, extraction.text.chars().count());
            }
            debug!(
                "{}: {:?}, {} chars in {}ms",
                file_name,
                extraction.table,
                extraction.text.chars().count(),
                duration_ms
            );
            ImageResult {
                file_name,
                path,
                index,
                text: extraction.text,
                table: extraction.table,
                cell_count: extraction.cell_count,
                row_count: extraction.row_count,
                shapes: extraction.shapes,
                duration_ms,
                error: None,
            }
        }
        Err(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_image_error(image_num, total, &e.to_string());
            }
            ImageResult::failed(file_name, path, index, e, duration_ms)
        }
    }
}

/// `shot.png` → `shot.txt`.
fn per_image_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    format!("{stem}.txt")
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), Ss2TxtError> {
    let write_err = |e| Ss2TxtError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
