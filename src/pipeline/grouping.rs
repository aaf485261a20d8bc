//! Cell regions and their grouping into table rows.
//!
//! Detectors emit cells in arbitrary order. Rows are recovered by walking
//! the cells top-to-bottom and attaching each one to the current row while
//! its vertical centre stays within a tolerance of the row's running mean
//! centre. The tolerance scales with the cell height so both dense
//! spreadsheets and airy layouts group correctly.

use serde::{Deserialize, Serialize};

/// Minimum row tolerance in pixels.
const MIN_ROW_TOLERANCE: f32 = 15.0;

/// An axis-aligned rectangle in original-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.height as f32 / 2.0
    }

    /// Map a region found at detection resolution back to the original
    /// image by dividing every coordinate by `scale`.
    pub fn unscale(&self, scale: f32) -> Self {
        if scale <= 1.0 {
            return *self;
        }
        let x = (self.x as f32 / scale).floor() as u32;
        let y = (self.y as f32 / scale).floor() as u32;
        let right = ((self.x + self.width) as f32 / scale).ceil() as u32;
        let bottom = ((self.y + self.height) as f32 / scale).ceil() as u32;
        Self::new(x, y, right.saturating_sub(x).max(1), bottom.saturating_sub(y).max(1))
    }
}

/// Vertical tolerance for row membership: half the mean cell height,
/// but never less than 15 px.
pub fn row_tolerance(cells: &[CellRegion]) -> f32 {
    if cells.is_empty() {
        return MIN_ROW_TOLERANCE;
    }
    let avg_h = cells.iter().map(|c| c.height as f32).sum::<f32>() / cells.len() as f32;
    (avg_h * 0.5).max(MIN_ROW_TOLERANCE)
}

/// Group cells into rows, top to bottom, each row sorted left to right.
pub fn group_into_rows(cells: &[CellRegion]) -> Vec<Vec<CellRegion>> {
    if cells.is_empty() {
        return Vec::new();
    }
    let tolerance = row_tolerance(cells);

    let mut sorted = cells.to_vec();
    sorted.sort_by_key(|c| (c.y, c.x));

    let mut rows: Vec<Vec<CellRegion>> = Vec::new();
    let mut current: Vec<CellRegion> = Vec::new();
    let mut center_sum = 0.0f32;

    for cell in sorted {
        let center = cell.center_y();
        if !current.is_empty() {
            let mean = center_sum / current.len() as f32;
            if (center - mean).abs() > tolerance {
                rows.push(std::mem::take(&mut current));
                center_sum = 0.0;
            }
        }
        center_sum += center;
        current.push(cell);
    }
    if !current.is_empty() {
        rows.push(current);
    }

    for row in &mut rows {
        row.sort_by_key(|c| c.x);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_grid_into_sorted_rows() {
        let cells = vec![
            CellRegion::new(200, 102, 80, 30),
            CellRegion::new(10, 10, 80, 30),
            CellRegion::new(10, 100, 80, 30),
            CellRegion::new(200, 12, 80, 30),
        ];
        let rows = group_into_rows(&cells);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iter().map(|c| c.x).collect::<Vec<_>>(), vec![10, 200]);
        assert_eq!(rows[1].iter().map(|c| c.x).collect::<Vec<_>>(), vec![10, 200]);
    }

    #[test]
    fn tolerance_has_a_floor() {
        let cells = vec![CellRegion::new(0, 0, 10, 8)];
        assert_eq!(row_tolerance(&cells), 15.0);
        let tall = vec![CellRegion::new(0, 0, 10, 100)];
        assert_eq!(row_tolerance(&tall), 50.0);
    }

    #[test]
    fn slightly_misaligned_cells_share_a_row() {
        let cells = vec![
            CellRegion::new(0, 50, 40, 20),
            CellRegion::new(60, 58, 40, 20),
            CellRegion::new(120, 44, 40, 20),
        ];
        let rows = group_into_rows(&cells);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].x, 0);
        assert_eq!(rows[0][2].x, 120);
    }

    #[test]
    fn grouping_is_deterministic() {
        let cells: Vec<CellRegion> = (0..12)
            .map(|i| CellRegion::new((i % 3) * 100, (i / 3) * 60, 50, 20))
            .rev()
            .collect();
        assert_eq!(group_into_rows(&cells), group_into_rows(&cells));
        assert_eq!(group_into_rows(&cells).len(), 4);
    }

    #[test]
    fn unscale_maps_back_to_original() {
        let r = CellRegion::new(100, 40, 60, 21).unscale(2.0);
        assert_eq!(r, CellRegion::new(50, 20, 30, 11));
        assert_eq!(r.unscale(1.0), r);
    }
}
