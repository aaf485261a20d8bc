//! Per-cell OCR and row formatting.
//!
//! Each cell is cropped from the original grayscale image with a few pixels
//! of context, re-enhanced on its own (contrast differs a lot between a
//! header row and a white body cell) and read under every configured
//! segmentation mode. The longest corrected reading wins.

use crate::config::{ConversionConfig, EmptyCellPolicy};
use crate::pipeline::grouping::CellRegion;
use crate::pipeline::imgops;
use crate::pipeline::normalize::{fix_recognition_errors, format_row};
use crate::pipeline::ocr::{recognize_candidates, CancelFlag, OcrBackend, OcrError};
use crate::pipeline::preprocess::enhance_cell;
use image::GrayImage;
use tracing::{debug, warn};

/// Crops smaller than this many pixels are not worth an OCR call.
const MIN_CROP_AREA: u64 = 100;

/// Read the text of one cell.
///
/// Returns an empty string when the crop is too small or nothing was read.
/// Fails only when every recognition attempt failed.
pub fn recognize_cell(
    gray: &GrayImage,
    region: &CellRegion,
    backend: &dyn OcrBackend,
    config: &ConversionConfig,
    cancel: &CancelFlag,
) -> Result<String, OcrError> {
    let crop = imgops::crop_padded(
        gray,
        region.x,
        region.y,
        region.width,
        region.height,
        config.cell_padding,
    );
    if (crop.width() as u64) * (crop.height() as u64) < MIN_CROP_AREA {
        return Ok(String::new());
    }
    let enhanced = enhance_cell(&crop);

    let candidates = recognize_candidates(backend, &enhanced, &config.cell_modes, cancel)?;
    let mut best = String::new();
    let mut best_len = 0usize;
    for candidate in candidates {
        let fixed = single_line(&fix_recognition_errors(&candidate.text));
        let len = fixed.chars().count();
        if len > best_len {
            best_len = len;
            best = fixed;
        }
    }
    Ok(best)
}

/// Read every cell and render the rows as `| c1 | c2 | … |` lines.
///
/// Rows whose cells are all empty are dropped. Fails only when every cell
/// of the table failed to recognise, or at once when `cancel` is set.
pub fn recognize_table(
    gray: &GrayImage,
    rows: &[Vec<CellRegion>],
    backend: &dyn OcrBackend,
    config: &ConversionConfig,
    cancel: &CancelFlag,
) -> Result<String, OcrError> {
    let total: usize = rows.iter().map(Vec::len).sum();
    let mut failures = 0usize;
    let mut last_err: Option<OcrError> = None;
    let mut lines = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        let mut texts = Vec::with_capacity(row.len());
        for region in row {
            match recognize_cell(gray, region, backend, config, cancel) {
                Ok(text) => texts.push(text),
                Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
                Err(e) => {
                    warn!("Cell {:?} in row {} failed: {}", region, r + 1, e);
                    failures += 1;
                    last_err = Some(e);
                    texts.push(String::new());
                }
            }
        }

        if texts.iter().all(|t| t.is_empty()) {
            debug!("Row {} has no readable cells, dropped", r + 1);
            continue;
        }
        if config.empty_cells == EmptyCellPolicy::Skip {
            texts.retain(|t| !t.is_empty());
        }
        lines.push(format_row(&texts));
    }

    match last_err {
        Some(e) if failures == total => Err(e),
        _ => Ok(lines.join("\n")),
    }
}

/// A cell is one table slot; line breaks inside it would split the row.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
