//! Ruled-table detection from horizontal and vertical line masks.
//!
//! ```text
//!  binary ─┬─ open(kw×1) ─ dilate(kw×1) ─▶ horizontal lines ─┐
//!          └─ open(1×kh) ─ dilate(1×kh) ─▶ vertical lines ───┴─ average ─▶ grid mask
//!  grid mask ─▶ contours ─▶ enclosed regions ─▶ size filter ─▶ cells
//! ```
//!
//! Opening with a kernel one tenth of the image wide (or tall) erases text
//! and keeps only long strokes. A ruled grid is a single connected line
//! structure whose *holes* are the cells, so the cells are read from the
//! hole borders of the grid mask.

use crate::pipeline::grouping::CellRegion;
use crate::pipeline::imgops;
use crate::pipeline::preprocess::Preprocessed;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::contour_area;
use tracing::debug;

const MIN_KERNEL: u32 = 20;
const MORPH_ITERATIONS: u32 = 2;
const MIN_CELL_SIDE: u32 = 20;
/// Minimum cell area as a fraction of the image area.
const MIN_AREA_FRACTION: f64 = 0.001;
/// Maximum cell extent as a fraction of the image side.
const MAX_SIDE_FRACTION: f32 = 0.9;

/// Result of ruled-table detection.
#[derive(Debug, Clone, Default)]
pub struct LineDetection {
    /// Cells in original-image coordinates, unordered.
    pub cells: Vec<CellRegion>,
    /// Number of enclosed regions before size filtering.
    pub candidates: usize,
}

impl LineDetection {
    /// Two or more cells make a bordered table.
    pub fn is_table(&self) -> bool {
        self.cells.len() >= 2
    }
}

/// Detect the cells of a ruled table.
pub fn detect_lines(pre: &Preprocessed) -> LineDetection {
    let mask = grid_mask(&pre.binary);
    let (w, h) = mask.dimensions();

    let contours: Vec<Contour<i32>> = find_contours(&mask);
    let holes: Vec<&Contour<i32>> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Hole)
        .collect();

    let min_area = MIN_AREA_FRACTION * w as f64 * h as f64;
    let max_w = MAX_SIDE_FRACTION * w as f32;
    let max_h = MAX_SIDE_FRACTION * h as f32;

    let cells: Vec<CellRegion> = holes
        .iter()
        .filter(|c| contour_area(&c.points) > min_area)
        .filter_map(|c| imgops::bounding_box(&c.points))
        .filter(|&(_, _, bw, bh)| {
            bw > MIN_CELL_SIDE && bh > MIN_CELL_SIDE && (bw as f32) < max_w && (bh as f32) < max_h
        })
        .map(|(x, y, bw, bh)| CellRegion::new(x, y, bw, bh).unscale(pre.scale))
        .collect();

    debug!(
        "Line grid: {} enclosed regions, {} cells kept",
        holes.len(),
        cells.len()
    );

    LineDetection {
        cells,
        candidates: holes.len(),
    }
}

/// Horizontal and vertical stroke masks blended into one grid mask.
pub fn grid_mask(binary: &GrayImage) -> GrayImage {
    let (w, h) = binary.dimensions();
    let kw = (w / 10).max(MIN_KERNEL);
    let kh = (h / 10).max(MIN_KERNEL);

    let horizontal = imgops::dilate_rect(
        &imgops::open_rect(binary, kw, 1, MORPH_ITERATIONS),
        kw,
        1,
        MORPH_ITERATIONS,
    );
    let vertical = imgops::dilate_rect(
        &imgops::open_rect(binary, 1, kh, MORPH_ITERATIONS),
        1,
        kh,
        MORPH_ITERATIONS,
    );
    imgops::average(&horizontal, &vertical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::pipeline::preprocess::preprocess;
    use image::{DynamicImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    /// White page with a `cols × rows` grid of 3 px black lines.
    fn ruled_grid(cols: u32, rows: u32, cell_w: u32, cell_h: u32) -> GrayImage {
        let (x0, y0) = (60u32, 45u32);
        let mut img = GrayImage::from_pixel(x0 * 2 + cols * cell_w, y0 * 2 + rows * cell_h, Luma([255]));
        for r in 0..=rows {
            let y = y0 + r * cell_h;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(x0 as i32, y as i32).of_size(cols * cell_w + 3, 3),
                Luma([0]),
            );
        }
        for c in 0..=cols {
            let x = x0 + c * cell_w;
            draw_filled_rect_mut(
                &mut img,
                Rect::at(x as i32, y0 as i32).of_size(3, rows * cell_h + 3),
                Luma([0]),
            );
        }
        img
    }

    fn detect(img: GrayImage) -> LineDetection {
        let pre = preprocess(&DynamicImage::ImageLuma8(img), &ConversionConfig::default());
        detect_lines(&pre)
    }

    #[test]
    fn two_by_three_grid_yields_six_cells() {
        let found = detect(ruled_grid(2, 3, 140, 70));
        assert_eq!(found.cells.len(), 6, "cells: {:?}", found.cells);
        assert!(found.is_table());
        for cell in &found.cells {
            assert!((120..=150).contains(&cell.width), "width {}", cell.width);
            assert!((55..=80).contains(&cell.height), "height {}", cell.height);
        }
    }

    #[test]
    fn four_by_four_grid_yields_sixteen_cells() {
        let found = detect(ruled_grid(4, 4, 100, 60));
        assert_eq!(found.cells.len(), 16);
    }

    #[test]
    fn blank_page_has_no_cells() {
        let found = detect(GrayImage::from_pixel(400, 300, Luma([255])));
        assert!(found.cells.is_empty());
        assert!(!found.is_table());
    }

    #[test]
    fn text_blocks_are_not_lines() {
        let mut img = GrayImage::from_pixel(400, 300, Luma([255]));
        for i in 0..5 {
            draw_filled_rect_mut(
                &mut img,
                Rect::at(40 + i * 60, 100).of_size(40, 12),
                Luma([0]),
            );
        }
        assert!(detect(img).cells.is_empty());
    }
}
