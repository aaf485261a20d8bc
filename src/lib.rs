//! # edgequake-ss2txt
//!
//! Convert folders of screenshots to plain text, recovering tables as
//! pipe-delimited rows.
//!
//! Plain OCR flattens a table into a column of loose tokens. This crate
//! first looks for table structure (ruled grid lines, or failing that,
//! aligned blocks of text), reads each cell on its own, and emits
//! `| cell | cell |` rows. Free text around the table, such as a quiz
//! question above an answer grid, is kept in front of it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! folder
//!  │
//!  ├─ 1. Input       list png/jpg/jpeg/gif/bmp/tiff/webp, sorted by name
//!  ├─ 2. Preprocess  grayscale, upscale narrow shots, binarise, enhance
//!  ├─ 3. Detect      ruled grid cells, else aligned text blocks
//!  ├─ 4. OCR         every cell, then the whole image (Tesseract)
//!  ├─ 5. Reconcile   table text vs. free text
//!  ├─ 6. Normalize   recognition fixes, row reconstruction, whitespace
//!  └─ 7. Output      texts joined by blank lines + per-image stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ss2txt::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("screenshots/", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("{} succeeded, {} failed", output.stats.succeeded, output.stats.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `ss2txt` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `leptess` | off     | In-process libtesseract backend instead of spawning `tesseract` |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ss2txt = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, EmptyCellPolicy, OcrEngine, OutputLayout};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_to_file};
pub use error::{ImageError, Ss2TxtError};
pub use output::{BatchOutput, BatchStats, ImageResult};
pub use pipeline::extract::{extract_structured_text, extract_structured_text_cancellable, Extraction};
pub use pipeline::ocr::{CancelFlag, OcrBackend, OcrError, SegmentationMode, TesseractCli};
pub use pipeline::reconcile::TableKind;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ImageStream};

#[cfg(feature = "leptess")]
pub use pipeline::ocr::LeptessBackend;
