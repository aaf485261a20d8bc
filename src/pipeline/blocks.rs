//! Borderless table detection from aligned text blocks.
//!
//! Used only when the ruled-line detector finds fewer than two cells.
//! Glyphs are merged into blobs in two steps: a small square dilation joins
//! the strokes of a word, then a horizontal dilation as wide as the text is
//! tall joins words separated by ordinary spacing. Gaps of
//! [`MIN_COLUMN_GAP`] original pixels or more survive both steps and become
//! column boundaries. The candidates are accepted as a table only if they
//! form a consistent grid:
//!
//! 1. at least two rows, and a modal column count of at least two,
//! 2. most rows (≥ 70 %) have the modal column count, give or take one,
//! 3. most multi-block rows (≥ 70 %) keep every gap at the column minimum,
//! 4. most rows (≥ 60 %) put each block on a column anchor, where anchor
//!    `i` is the median left edge of block `i` over the full-width rows.
//!
//! A line of prose merges into a single blob that is either too wide to be
//! a cell or alone in its row, so running text is never taken for a table.

use crate::pipeline::grouping::{group_into_rows, CellRegion};
use crate::pipeline::imgops;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;
use tracing::debug;

/// Radius of the square dilation that joins the strokes of a word.
const MERGE_RADIUS: u8 = 4;
/// Narrowest whitespace, in original pixels, that separates two columns.
pub const MIN_COLUMN_GAP: u32 = 20;
const MIN_BLOCK_SIDE: u32 = 5;
const MAX_WIDTH_FRACTION: f32 = 0.3;
const MAX_HEIGHT_FRACTION: f32 = 0.2;
const MAX_AREA_FRACTION: f64 = 0.1;
const MIN_CONSISTENT_ROWS: f32 = 0.7;
const MIN_GAPPED_ROWS: f32 = 0.7;
const MIN_ALIGNED_ROWS: f32 = 0.6;
/// Upper bound on column alignment tolerance, as a fraction of image width.
const ALIGN_TOLERANCE: f32 = 0.15;

/// Why a set of text blocks was not accepted as a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Fewer than two rows of candidate blocks.
    TooFewRows { rows: usize },
    /// Rows mostly hold a single block.
    SingleColumn,
    /// Rows disagree on how many columns they have.
    InconsistentColumns { consistent: f32 },
    /// Blocks within rows sit closer than a column gap.
    NarrowGaps { gapped: f32 },
    /// Blocks do not line up on shared column positions.
    Misaligned { aligned: f32 },
}

/// Outcome of borderless detection.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockDetection {
    /// Blocks form a table; cells are in original-image coordinates.
    Table(Vec<CellRegion>),
    Rejected(Rejection),
}

impl BlockDetection {
    pub fn cells(&self) -> &[CellRegion] {
        match self {
            BlockDetection::Table(cells) => cells,
            BlockDetection::Rejected(_) => &[],
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, BlockDetection::Table(_))
    }
}

/// Candidate cells plus the narrowest gap between them, in detection
/// pixels, that still corresponds to [`MIN_COLUMN_GAP`] original pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub blocks: Vec<CellRegion>,
    pub min_gap: u32,
}

/// Detect a borderless table in a binary mask at detection resolution.
///
/// `scale` maps detection coordinates back to the original image.
pub fn detect_text_blocks(binary: &GrayImage, scale: f32) -> BlockDetection {
    let found = candidate_blocks(binary, scale);
    let rows = group_into_rows(&found.blocks);
    debug!(
        "Borderless: {} blocks in {} rows (min gap {} px)",
        found.blocks.len(),
        rows.len(),
        found.min_gap
    );

    match validate(&rows, binary.width(), found.min_gap) {
        Ok(()) => {
            BlockDetection::Table(found.blocks.iter().map(|b| b.unscale(scale)).collect())
        }
        Err(reason) => {
            debug!("Borderless candidates rejected: {:?}", reason);
            BlockDetection::Rejected(reason)
        }
    }
}

/// Bounding boxes of merged text blobs that are plausible cell contents.
pub fn candidate_blocks(binary: &GrayImage, scale: f32) -> Candidates {
    let (w, h) = binary.dimensions();
    let column_gap = (MIN_COLUMN_GAP as f32 * scale.max(1.0)).round() as u32;
    let growth = 2 * MERGE_RADIUS as u32;

    let words = dilate(binary, Norm::LInf, MERGE_RADIUS);
    let mut heights: Vec<u32> = component_boxes(&words)
        .into_iter()
        .filter(|b| b.width > MIN_BLOCK_SIDE && b.height > MIN_BLOCK_SIDE)
        .map(|b| b.height)
        .collect();
    if heights.is_empty() {
        return Candidates {
            blocks: Vec::new(),
            min_gap: column_gap,
        };
    }
    heights.sort_unstable();
    let text_height = heights[heights.len() / 2];

    // A horizontal kernel of `kw` closes blob gaps up to `kw - 1`, i.e. ink
    // gaps up to `growth + kw - 1`, which stays below `column_gap`.
    let kw = text_height.min(column_gap.saturating_sub(growth)).max(1);
    let lines = imgops::dilate_rect(&words, kw, 1, 1);
    let min_gap = column_gap.saturating_sub(growth + kw - 1).max(1);

    let max_w = MAX_WIDTH_FRACTION * w as f32;
    let max_h = MAX_HEIGHT_FRACTION * h as f32;
    let max_area = MAX_AREA_FRACTION * w as f64 * h as f64;

    let blocks = component_boxes(&lines)
        .into_iter()
        .filter(|block| {
            block.width > MIN_BLOCK_SIDE
                && block.height > MIN_BLOCK_SIDE
                && block.width as f32 <= max_w
                && block.height as f32 <= max_h
                && block.area() as f64 <= max_area
        })
        .collect();
    Candidates { blocks, min_gap }
}

/// Bounding box of every 8-connected foreground component, in label order.
fn component_boxes(mask: &GrayImage) -> Vec<CellRegion> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // label → (min_x, min_y, max_x, max_y)
    let mut extents: HashMap<u32, (u32, u32, u32, u32)> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label[0];
        if id == 0 {
            continue;
        }
        extents
            .entry(id)
            .and_modify(|e| {
                e.0 = e.0.min(x);
                e.1 = e.1.min(y);
                e.2 = e.2.max(x);
                e.3 = e.3.max(y);
            })
            .or_insert((x, y, x, y));
    }

    let mut boxes: Vec<(u32, CellRegion)> = extents
        .into_iter()
        .map(|(id, (x0, y0, x1, y1))| {
            (id, CellRegion::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
        })
        .collect();
    boxes.sort_unstable_by_key(|&(id, _)| id);
    boxes.into_iter().map(|(_, b)| b).collect()
}

/// Check that grouped blocks form a consistent grid.
///
/// `min_gap` is the narrowest horizontal gap between neighbouring blocks
/// that counts as a column boundary.
pub fn validate(
    rows: &[Vec<CellRegion>],
    image_width: u32,
    min_gap: u32,
) -> Result<(), Rejection> {
    if rows.len() < 2 {
        return Err(Rejection::TooFewRows { rows: rows.len() });
    }

    let modal = modal_column_count(rows);
    if modal < 2 {
        return Err(Rejection::SingleColumn);
    }

    let consistent = fraction(
        rows.iter().filter(|r| r.len().abs_diff(modal) <= 1).count(),
        rows.len(),
    );
    if consistent < MIN_CONSISTENT_ROWS {
        return Err(Rejection::InconsistentColumns { consistent });
    }

    let multi: Vec<&Vec<CellRegion>> = rows.iter().filter(|r| r.len() >= 2).collect();
    let gapped = fraction(
        multi
            .iter()
            .filter(|row| row.windows(2).all(|p| gap_between(&p[0], &p[1]) >= min_gap as i64))
            .count(),
        multi.len(),
    );
    if gapped < MIN_GAPPED_ROWS {
        return Err(Rejection::NarrowGaps { gapped });
    }

    let anchors = column_anchors(rows, modal);
    let spacing = anchors.windows(2).map(|p| p[1] - p[0]).min().unwrap_or(0);
    let tolerance = (ALIGN_TOLERANCE * image_width as f32).min(spacing as f32 / 2.0);
    let aligned = fraction(
        rows.iter().filter(|row| on_anchors(row, &anchors, tolerance)).count(),
        rows.len(),
    );
    if aligned < MIN_ALIGNED_ROWS {
        return Err(Rejection::Misaligned { aligned });
    }

    Ok(())
}

fn fraction(count: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    count as f32 / total as f32
}

fn gap_between(left: &CellRegion, right: &CellRegion) -> i64 {
    right.x as i64 - (left.x as i64 + left.width as i64)
}

/// Median left edge of the `i`-th block over rows of modal length.
fn column_anchors(rows: &[Vec<CellRegion>], modal: usize) -> Vec<i64> {
    let full: Vec<&Vec<CellRegion>> = rows.iter().filter(|r| r.len() == modal).collect();
    let mut anchors: Vec<i64> = (0..modal)
        .map(|i| {
            let mut xs: Vec<i64> = full.iter().map(|r| r[i].x as i64).collect();
            xs.sort_unstable();
            xs[xs.len() / 2]
        })
        .collect();
    anchors.sort_unstable();
    anchors
}

/// Every block sits within `tolerance` of an anchor, left to right, with no
/// two blocks on the same anchor.
fn on_anchors(row: &[CellRegion], anchors: &[i64], tolerance: f32) -> bool {
    let mut next = 0;
    for block in row {
        let x = block.x as i64;
        let Some(offset) = anchors[next..]
            .iter()
            .position(|&a| (x - a).abs() as f32 <= tolerance)
        else {
            return false;
        };
        next += offset + 1;
    }
    true
}

/// Most common row length; ties go to the larger count.
fn modal_column_count(rows: &[Vec<CellRegion>]) -> usize {
    let mut freq: HashMap<usize, usize> = HashMap::new();
    for row in rows {
        *freq.entry(row.len()).or_insert(0) += 1;
    }
    freq.into_iter()
        .max_by_key(|&(len, count)| (count, len))
        .map(|(len, _)| len)
        .unwrap_or(0)
}
