//! Single-image driver: run every stage on one decoded screenshot.

use crate::config::ConversionConfig;
use crate::pipeline::blocks::{detect_text_blocks, BlockDetection};
use crate::pipeline::cells::recognize_table;
use crate::pipeline::grouping::{group_into_rows, CellRegion};
use crate::pipeline::lines::detect_lines;
use crate::pipeline::normalize::normalize_with;
use crate::pipeline::ocr::{CancelFlag, OcrBackend, OcrError};
use crate::pipeline::page::recognize_page;
use crate::pipeline::preprocess::preprocess;
use crate::pipeline::reconcile::{reconcile, TableKind};
use crate::pipeline::shapes::{detect_shapes, DetectedShape};
use image::DynamicImage;
use tracing::{debug, warn};

/// Everything recovered from one screenshot.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub table: TableKind,
    pub cell_count: usize,
    pub row_count: usize,
    pub shapes: Vec<DetectedShape>,
}

/// Recover the text of one screenshot, tables as pipe-delimited rows.
///
/// Fails only when recognition failed outright: page OCR errored and there
/// was no table, or both table and page OCR errored. Empty results are not
/// failures.
pub fn extract_structured_text(
    img: &DynamicImage,
    backend: &dyn OcrBackend,
    config: &ConversionConfig,
) -> Result<Extraction, OcrError> {
    extract_structured_text_cancellable(img, backend, config, &CancelFlag::new())
}

/// [`extract_structured_text`] that gives up with [`OcrError::Cancelled`]
/// once `cancel` is set, checked between stages and between OCR attempts.
pub fn extract_structured_text_cancellable(
    img: &DynamicImage,
    backend: &dyn OcrBackend,
    config: &ConversionConfig,
    cancel: &CancelFlag,
) -> Result<Extraction, OcrError> {
    let pre = preprocess(img, config);
    debug!(
        "Preprocessed {}x{} (upscaled: {}, scale {:.2})",
        pre.gray.width(),
        pre.gray.height(),
        pre.was_upscaled(),
        pre.scale
    );

    let lines = detect_lines(&pre);
    let (cells, borderless_valid): (Vec<CellRegion>, bool) = if lines.is_table() {
        (lines.cells.clone(), false)
    } else {
        match detect_text_blocks(&pre.binary, pre.scale) {
            BlockDetection::Table(cells) => (cells, true),
            BlockDetection::Rejected(_) => (Vec::new(), false),
        }
    };
    let kind = TableKind::classify(lines.cells.len(), borderless_valid);
    let rows = if kind.has_table() {
        group_into_rows(&cells)
    } else {
        Vec::new()
    };
    debug!("{:?}: {} cells in {} rows", kind, cells.len(), rows.len());
    if cancel.is_cancelled() {
        return Err(OcrError::Cancelled);
    }

    let table = if kind.has_table() {
        Some(recognize_table(&pre.gray, &rows, backend, config, cancel))
    } else {
        None
    };
    if matches!(table, Some(Err(OcrError::Cancelled))) {
        return Err(OcrError::Cancelled);
    }
    let page = recognize_page(&pre.enhanced, backend, config, cancel);
    if matches!(page, Err(OcrError::Cancelled)) {
        return Err(OcrError::Cancelled);
    }

    let (table_text, page_text) = match (table, page) {
        (None, Err(e)) | (Some(Err(_)), Err(e)) => return Err(e),
        (None, Ok(page)) => (String::new(), page),
        (Some(Ok(table)), Ok(page)) => (table, page),
        (Some(Ok(table)), Err(e)) => {
            warn!("Whole-image OCR failed, keeping table text: {}", e);
            (table, String::new())
        }
        (Some(Err(e)), Ok(page)) => {
            warn!("Table OCR failed, keeping whole-image text: {}", e);
            (String::new(), page)
        }
    };

    let merged = reconcile(
        kind,
        &table_text,
        &page_text,
        config.caption_similarity_threshold,
    );
    let text = normalize_with(&merged.text, merged.is_table, &config.token_column_preference);

    let shapes = if config.detect_shapes {
        detect_shapes(&pre.gray)
    } else {
        Vec::new()
    };

    Ok(Extraction {
        text,
        table: kind,
        cell_count: if kind.has_table() { cells.len() } else { 0 },
        row_count: rows.len(),
        shapes,
    })
}
