//! Streaming conversion API: emit image results as they complete.
//!
//! Folders of a few hundred screenshots take minutes. [`convert_stream`]
//! yields each image's result as soon as it is ready, so callers can show
//! partial output or write files incrementally. Results arrive in input
//! order, even with `concurrency > 1`.
//!
//! Failed images are yielded as `Err(ImageError)`; the stream carries on
//! with the next file.

use crate::config::ConversionConfig;
use crate::convert::{process_image, resolve_backend};
use crate::error::{ImageError, Ss2TxtError};
use crate::output::ImageResult;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of image results.
pub type ImageStream = Pin<Box<dyn Stream<Item = Result<ImageResult, ImageError>> + Send>>;

/// Convert a folder of screenshots, streaming results in input order.
///
/// # Returns
/// - `Ok(ImageStream)`: a stream of `Result<ImageResult, ImageError>`
/// - `Err(Ss2TxtError)`: fatal error (input missing, no images, no OCR engine)
///
/// # Example
/// ```rust,no_run
/// use edgequake_ss2txt::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut results = convert_stream("screenshots/", &ConversionConfig::default()).await?;
/// while let Some(item) = results.next().await {
///     match item {
///         Ok(r) => println!("{}: {} chars", r.file_name, r.text.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    input_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ImageStream, Ss2TxtError> {
    let input_path = input_path.as_ref();
    info!("Starting streaming conversion: {}", input_path.display());

    // ── Resolve input and backend ────────────────────────────────────────
    let images = input::resolve_input(input_path)?;
    let backend = resolve_backend(config)?;
    let total = images.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Build the stream ─────────────────────────────────────────────────
    let concurrency = config.concurrency.max(1);
    let config_clone = config.clone();

    let s = stream::iter(images.into_iter().enumerate().map(move |(index, path)| {
        let backend = Arc::clone(&backend);
        let cfg = config_clone.clone();
        async move {
            let file_name = input::file_name(&path);
            let load_path = path.clone();
            let mut result = process_image(
                backend,
                file_name,
                Some(path),
                index,
                total,
                &cfg,
                move || input::load_image(&load_path),
            )
            .await;
            match result.error.take() {
                None => Ok(result),
                Some(err) => Err(err),
            }
        }
    }))
    .buffered(concurrency);

    Ok(Box::pin(s))
}
