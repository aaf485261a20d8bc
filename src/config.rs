//! Configuration types for screenshot-to-text conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One config is built per batch and
//! cloned read-only into every image task; nothing in the pipeline reads
//! global state or the environment.

use crate::error::Ss2TxtError;
use crate::pipeline::ocr::{OcrBackend, SegmentationMode};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a screenshot-to-text batch.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ss2txt::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .concurrency(4)
///     .language("eng")
///     .image_timeout_secs(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Number of images processed at once. Default: 1 (strictly sequential).
    ///
    /// Output order always follows input order regardless of this value.
    pub concurrency: usize,

    /// Time budget per image in seconds. Default: 120.
    ///
    /// An image that exceeds it is reported as failed and the batch moves on.
    pub image_timeout_secs: u64,

    /// Screenshots narrower than this are upscaled before detection. Default: 1000 px.
    pub upscale_below_width: u32,

    /// Upscale factor for narrow screenshots. Range: 1.0–4.0. Default: 2.0.
    pub upscale_factor: f32,

    /// Tesseract language code. Default: "eng".
    pub language: String,

    /// Tesseract OCR engine mode (`--oem`). Range: 0–3. Default: 3.
    pub engine_mode: u8,

    /// OCR engine used when no pre-built backend is supplied. Default: [`OcrEngine::TesseractCli`].
    pub engine: OcrEngine,

    /// Path of the `tesseract` executable. Default: looked up on `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Pre-constructed OCR backend. Takes precedence over `engine`.
    pub backend: Option<Arc<dyn OcrBackend>>,

    /// Segmentation modes tried for each table cell.
    pub cell_modes: Vec<SegmentationMode>,

    /// Segmentation modes tried for the whole screenshot.
    pub page_modes: Vec<SegmentationMode>,

    /// Pixels of context added around each cell before recognition. Default: 5.
    pub cell_padding: u32,

    /// Whole-image candidates shorter than this (in characters) are discarded. Default: 10.
    pub min_page_text_chars: usize,

    /// Similarity above which two whole-image candidates are duplicates. Default: 0.7.
    pub dedup_threshold: f32,

    /// Free text at least this similar to the table text is dropped as a
    /// re-reading of the table. Default: 0.3.
    pub caption_similarity_threshold: f32,

    /// Column counts tried, in order of preference, when a table came back as
    /// a flat list of short tokens. Default: `[3, 2, 4]`.
    pub token_column_preference: Vec<usize>,

    /// What to emit for a cell with no readable text. Default: [`EmptyCellPolicy::Placeholder`].
    pub empty_cells: EmptyCellPolicy,

    /// Classify simple shapes (triangles, rectangles, ellipses). Default: true.
    pub detect_shapes: bool,

    /// One combined text file, or one file per image. Default: [`OutputLayout::Combined`].
    pub output_layout: OutputLayout,

    /// Receives per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            image_timeout_secs: 120,
            upscale_below_width: 1000,
            upscale_factor: 2.0,
            language: "eng".to_string(),
            engine_mode: 3,
            engine: OcrEngine::default(),
            tesseract_path: None,
            backend: None,
            cell_modes: SegmentationMode::DEFAULT_SET.to_vec(),
            page_modes: SegmentationMode::DEFAULT_SET.to_vec(),
            cell_padding: 5,
            min_page_text_chars: 10,
            dedup_threshold: 0.7,
            caption_similarity_threshold: 0.3,
            token_column_preference: vec![3, 2, 4],
            empty_cells: EmptyCellPolicy::default(),
            detect_shapes: true,
            output_layout: OutputLayout::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("concurrency", &self.concurrency)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("upscale_below_width", &self.upscale_below_width)
            .field("upscale_factor", &self.upscale_factor)
            .field("language", &self.language)
            .field("engine_mode", &self.engine_mode)
            .field("engine", &self.engine)
            .field("tesseract_path", &self.tesseract_path)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("cell_modes", &self.cell_modes)
            .field("page_modes", &self.page_modes)
            .field("cell_padding", &self.cell_padding)
            .field("empty_cells", &self.empty_cells)
            .field("detect_shapes", &self.detect_shapes)
            .field("output_layout", &self.output_layout)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs.max(1);
        self
    }

    pub fn upscale_below_width(mut self, px: u32) -> Self {
        self.config.upscale_below_width = px;
        self
    }

    pub fn upscale_factor(mut self, factor: f32) -> Self {
        self.config.upscale_factor = factor.clamp(1.0, 4.0);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn engine_mode(mut self, oem: u8) -> Self {
        self.config.engine_mode = oem.min(3);
        self
    }

    pub fn engine(mut self, engine: OcrEngine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn cell_modes(mut self, modes: Vec<SegmentationMode>) -> Self {
        self.config.cell_modes = modes;
        self
    }

    pub fn page_modes(mut self, modes: Vec<SegmentationMode>) -> Self {
        self.config.page_modes = modes;
        self
    }

    pub fn cell_padding(mut self, px: u32) -> Self {
        self.config.cell_padding = px;
        self
    }

    pub fn min_page_text_chars(mut self, n: usize) -> Self {
        self.config.min_page_text_chars = n;
        self
    }

    pub fn dedup_threshold(mut self, t: f32) -> Self {
        self.config.dedup_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn caption_similarity_threshold(mut self, t: f32) -> Self {
        self.config.caption_similarity_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn token_column_preference(mut self, columns: Vec<usize>) -> Self {
        self.config.token_column_preference = columns;
        self
    }

    pub fn empty_cells(mut self, policy: EmptyCellPolicy) -> Self {
        self.config.empty_cells = policy;
        self
    }

    pub fn detect_shapes(mut self, v: bool) -> Self {
        self.config.detect_shapes = v;
        self
    }

    pub fn output_layout(mut self, layout: OutputLayout) -> Self {
        self.config.output_layout = layout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Ss2TxtError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Ss2TxtError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.cell_modes.is_empty() || c.page_modes.is_empty() {
            return Err(Ss2TxtError::InvalidConfig(
                "At least one segmentation mode is required for cells and pages".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(Ss2TxtError::InvalidConfig("OCR language must not be empty".into()));
        }
        if c.token_column_preference.iter().any(|&n| n < 2) {
            return Err(Ss2TxtError::InvalidConfig(format!(
                "Token column counts must be ≥ 2, got {:?}",
                c.token_column_preference
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which OCR engine to construct when no backend is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrEngine {
    /// Spawn the `tesseract` executable. (default)
    #[default]
    TesseractCli,
    /// Link libtesseract in-process. Requires the `leptess` feature.
    Leptess,
}

/// How a table cell with no readable text is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyCellPolicy {
    /// Keep an empty `|  |` slot so columns stay aligned. (default)
    #[default]
    Placeholder,
    /// Leave the cell out of its row.
    Skip,
}

/// Where converted text is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// All texts joined by a blank line into one file. (default)
    #[default]
    Combined,
    /// One `<image stem>.txt` per screenshot in an output directory.
    PerImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.upscale_below_width, 1000);
        assert_eq!(c.cell_padding, 5);
        assert_eq!(c.token_column_preference, vec![3, 2, 4]);
        assert_eq!(c.cell_modes, SegmentationMode::DEFAULT_SET.to_vec());
        assert_eq!(c.empty_cells, EmptyCellPolicy::Placeholder);
    }

    #[test]
    fn builder_clamps_values() {
        let c = ConversionConfig::builder()
            .concurrency(0)
            .upscale_factor(9.0)
            .engine_mode(7)
            .dedup_threshold(1.5)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.upscale_factor, 4.0);
        assert_eq!(c.engine_mode, 3);
        assert_eq!(c.dedup_threshold, 1.0);
    }

    #[test]
    fn builder_rejects_empty_modes() {
        let err = ConversionConfig::builder()
            .page_modes(vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("segmentation mode"));
    }

    #[test]
    fn builder_rejects_single_column_preference() {
        assert!(ConversionConfig::builder()
            .token_column_preference(vec![3, 1])
            .build()
            .is_err());
    }

    #[test]
    fn debug_hides_backend_object() {
        let c = ConversionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("backend: None"));
    }
}
