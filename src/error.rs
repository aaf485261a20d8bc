//! Error types for the edgequake-ss2txt library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Ss2TxtError`]: **Fatal**: the batch cannot proceed at all (input
//!   folder missing, no images, OCR engine not installed, output not
//!   writable). Returned as `Err(Ss2TxtError)` from the top-level
//!   `convert*` functions.
//!
//! * [`ImageError`]: **Non-fatal**: a single screenshot failed (corrupt
//!   file, OCR engine crashed, timed out) but every other image is fine.
//!   Stored inside [`crate::output::ImageResult`] so one bad file never
//!   loses the rest of the folder.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ss2txt library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::ImageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Ss2TxtError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input folder or file was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A single-file input whose extension is not a supported image type.
    #[error(
        "Unsupported image format: '{path}'\n\
         Supported extensions: png, jpg, jpeg, gif, bmp, tiff, webp"
    )]
    UnsupportedFormat { path: PathBuf },

    /// The folder holds no supported image files.
    #[error("No image files found in '{dir}'")]
    NoImages { dir: PathBuf },

    /// The folder holds no images, but does hold text files.
    #[error("No image files found in '{dir}', but {text_files} .txt file(s) are present; the folder appears to be converted already")]
    AlreadyText { dir: PathBuf, text_files: usize },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR engine could not be located or initialised.
    #[error("OCR engine '{engine}' is not available.\n{hint}")]
    OcrEngineUnavailable { engine: String, hint: String },

    /// Some images succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::BatchOutput::into_result`] when the
    /// caller wants to treat any image failure as an error.
    #[error("{failed}/{total} images failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// Stored alongside [`crate::output::ImageResult`] when an image fails.
/// The batch always continues with the next file.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The file could not be read or decoded as an image.
    #[error("{file}: could not decode image: {detail}")]
    Decode { file: String, detail: String },

    /// Every OCR attempt for the image failed.
    #[error("{file}: text recognition failed: {detail}")]
    Recognition { file: String, detail: String },

    /// The per-image time budget was exhausted.
    #[error("{file}: processing timed out after {secs}s")]
    Timeout { file: String, secs: u64 },

    /// The worker processing the image panicked.
    #[error("{file}: processing aborted: {detail}")]
    Panicked { file: String, detail: String },
}

impl ImageError {
    /// File name of the image this error belongs to.
    pub fn file(&self) -> &str {
        match self {
            ImageError::Decode { file, .. }
            | ImageError::Recognition { file, .. }
            | ImageError::Timeout { file, .. }
            | ImageError::Panicked { file, .. } => file,
        }
    }
}
