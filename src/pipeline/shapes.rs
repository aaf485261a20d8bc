//! Simple shape classification for diagram-style screenshots.
//!
//! Dark regions are traced, their outlines simplified to polygons
//! (Douglas–Peucker, tolerance 2 % of the perimeter) and classified by
//! vertex count. The result is reported alongside the text; it never
//! changes the text itself.

use crate::pipeline::imgops;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::{approximate_polygon_dp, arc_length, contour_area};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DARK_THRESHOLD: u8 = 127;
const MIN_SHAPE_AREA: f64 = 100.0;
const EPSILON_FRACTION: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Triangle,
    Rectangle,
    CircleOrEllipse,
    Unknown,
}

impl ShapeKind {
    pub fn from_vertices(n: usize) -> Self {
        match n {
            3 => ShapeKind::Triangle,
            4 => ShapeKind::Rectangle,
            n if n > 4 => ShapeKind::CircleOrEllipse,
            _ => ShapeKind::Unknown,
        }
    }
}

/// One classified outline, in original-image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedShape {
    pub kind: ShapeKind,
    pub vertices: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: f64,
}

/// Trace and classify the dark shapes of a grayscale screenshot.
pub fn detect_shapes(gray: &GrayImage) -> Vec<DetectedShape> {
    let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] <= DARK_THRESHOLD {
            Luma([imgops::FOREGROUND])
        } else {
            Luma([0])
        }
    });

    let contours: Vec<Contour<i32>> = find_contours(&mask);
    let shapes: Vec<DetectedShape> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 3)
        .filter_map(|c| {
            let area = contour_area(&c.points);
            if area <= MIN_SHAPE_AREA {
                return None;
            }
            let (x, y, width, height) = imgops::bounding_box(&c.points)?;
            let vertices = simplify(&c.points).len();
            Some(DetectedShape {
                kind: ShapeKind::from_vertices(vertices),
                vertices,
                x,
                y,
                width,
                height,
                area,
            })
        })
        .collect();

    debug!("Shapes: {} outlines, {} classified", contours.len(), shapes.len());
    shapes
}

/// Polygon approximation of a closed outline with near-coincident
/// vertices merged (including across the start/end seam).
fn simplify(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let epsilon = EPSILON_FRACTION * arc_length(points, true);
    if epsilon <= 0.0 {
        return points.to_vec();
    }
    let approx = approximate_polygon_dp(points, epsilon, true);

    let mut merged: Vec<Point<i32>> = Vec::with_capacity(approx.len());
    for p in approx {
        if merged.last().map_or(true, |q| distance(*q, p) > epsilon) {
            merged.push(p);
        }
    }
    while merged.len() > 1 {
        let (first, last) = (merged[0], merged[merged.len() - 1]);
        if distance(first, last) > epsilon {
            break;
        }
        merged.pop();
    }
    merged
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}
