//! Low-level grayscale image operations shared by the detectors.
//!
//! Thin wrappers over `imageproc` (integral images, `filter3x3`, the median
//! filter, Otsu) plus the two operations it has no form of: morphology
//! with thin `kw × kh` rectangles, and CLAHE.
//!
//! Binary masks use `255` for foreground and `0` for background; any
//! non-zero pixel counts as foreground when a mask is read.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::{filter3x3, median_filter};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::point::Point;

pub const FOREGROUND: u8 = 255;

// ── Thresholding ─────────────────────────────────────────────────────────

/// Inverted mean-C adaptive threshold.
///
/// A pixel becomes foreground when it is at most `mean - c`, where `mean`
/// is the average of the `block_size × block_size` window around it
/// (clipped at the image edge). Dark ink on a light page becomes `255`.
pub fn adaptive_threshold_inv(img: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let integral = integral_image::<_, u64>(img);
    let r = block_size / 2;
    for y in 0..h {
        let top = y.saturating_sub(r);
        let bottom = (y + r).min(h - 1);
        for x in 0..w {
            let left = x.saturating_sub(r);
            let right = (x + r).min(w - 1);
            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0] as i64;
            let n = ((right - left + 1) * (bottom - top + 1)) as i64;
            let p = img.get_pixel(x, y)[0] as i64;
            if p * n <= sum - c as i64 * n {
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    out
}

/// Inverted global Otsu threshold. A flat image yields an empty mask.
pub fn otsu_threshold_inv(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let lo = img.pixels().map(|p| p[0]).min().unwrap_or(0);
    let hi = img.pixels().map(|p| p[0]).max().unwrap_or(0);
    if lo == hi {
        return GrayImage::new(w, h);
    }
    let level = otsu_level(img);
    GrayImage::from_fn(w, h, |x, y| {
        if img.get_pixel(x, y)[0] <= level {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Pixel-wise OR of two masks of equal size.
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        if a.get_pixel(x, y)[0] > 0 || b.get_pixel(x, y)[0] > 0 {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Equal-weight blend of two images of equal size.
pub fn average(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let s = a.get_pixel(x, y)[0] as u16 + b.get_pixel(x, y)[0] as u16;
        Luma([s.div_ceil(2) as u8])
    })
}

pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

// ── Morphology with rectangular kernels ──────────────────────────────────

#[derive(Clone, Copy)]
enum MorphOp {
    Erode,
    Dilate,
}

/// One erosion or dilation pass along a single axis with a 1-D kernel of
/// `len` pixels anchored at its centre. Pixels outside the image count as
/// foreground for erosion and background for dilation.
fn morph_axis(mask: &GrayImage, len: u32, horizontal: bool, op: MorphOp) -> GrayImage {
    let (w, h) = mask.dimensions();
    if len <= 1 || w == 0 || h == 0 {
        return mask.clone();
    }
    let (n, lines) = if horizontal { (w, h) } else { (h, w) };
    let k = len as i64;
    let anchor = k / 2;
    let mut out = GrayImage::new(w, h);
    let mut prefix = vec![0u32; n as usize + 1];

    for line in 0..lines {
        let at = |i: u32| if horizontal { (i, line) } else { (line, i) };
        for i in 0..n {
            let (x, y) = at(i);
            prefix[i as usize + 1] = prefix[i as usize] + u32::from(mask.get_pixel(x, y)[0] > 0);
        }
        for i in 0..n {
            let lo = (i as i64 - anchor).max(0) as usize;
            let hi = (i as i64 - anchor + k - 1).min(n as i64 - 1) as usize;
            let count = prefix[hi + 1] - prefix[lo];
            let on = match op {
                MorphOp::Erode => count as usize == hi - lo + 1,
                MorphOp::Dilate => count > 0,
            };
            if on {
                let (x, y) = at(i);
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    out
}

/// Erode with a `kw × kh` rectangle, `iterations` times.
pub fn erode_rect(mask: &GrayImage, kw: u32, kh: u32, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = morph_axis(&out, kw, true, MorphOp::Erode);
        out = morph_axis(&out, kh, false, MorphOp::Erode);
    }
    out
}

/// Dilate with a `kw × kh` rectangle, `iterations` times.
pub fn dilate_rect(mask: &GrayImage, kw: u32, kh: u32, iterations: u32) -> GrayImage {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = morph_axis(&out, kw, true, MorphOp::Dilate);
        out = morph_axis(&out, kh, false, MorphOp::Dilate);
    }
    out
}

/// Morphological opening: `iterations` erosions followed by as many dilations.
pub fn open_rect(mask: &GrayImage, kw: u32, kh: u32, iterations: u32) -> GrayImage {
    dilate_rect(&erode_rect(mask, kw, kh, iterations), kw, kh, iterations)
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// 3×3 median filter.
pub fn denoise(img: &GrayImage) -> GrayImage {
    median_filter(img, 1, 1)
}

const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// 3×3 sharpening kernel `[-1 -1 -1; -1 9 -1; -1 -1 -1]`, edges padded by
/// continuity.
pub fn sharpen(img: &GrayImage) -> GrayImage {
    filter3x3(img, &SHARPEN_KERNEL)
}

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `tiles_x × tiles_y` grid; each tile gets a
/// clipped, equalised lookup table and pixels blend the four nearest
/// tables bilinearly. `clip_limit` is relative to a flat histogram.
pub fn clahe(img: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let tile_w = w.div_ceil(tiles_x.max(1)).max(1);
    let tile_h = h.div_ceil(tiles_y.max(1)).max(1);
    let nx = w.div_ceil(tile_w);
    let ny = h.div_ceil(tile_h);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((nx * ny) as usize);
    for ty in 0..ny {
        for tx in 0..nx {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts.push(tile_lut(&mut hist, area, clip_limit));
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y)[0] as usize;
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor().max(0.0) as u32).min(nx - 1);
        let ty0 = (fy.floor().max(0.0) as u32).min(ny - 1);
        let tx1 = (tx0 + 1).min(nx - 1);
        let ty1 = (ty0 + 1).min(ny - 1);
        let wx = (fx - tx0 as f32).clamp(0.0, 1.0);
        let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

        let lut = |tx: u32, ty: u32| luts[(ty * nx + tx) as usize][p] as f32;
        let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
        let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
        Luma([(top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count as u64;
        lut[i] = ((cdf * 255 + area as u64 / 2) / area.max(1) as u64).min(255) as u8;
    }
    lut
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// Resize by a uniform factor: Catmull-Rom when enlarging, triangle
/// (area-like) filtering when shrinking.
pub fn resize_by(img: &GrayImage, factor: f32) -> GrayImage {
    let w = ((img.width() as f32 * factor).round() as u32).max(1);
    let h = ((img.height() as f32 * factor).round() as u32).max(1);
    if factor > 1.0 {
        imageops::resize(img, w, h, FilterType::CatmullRom)
    } else {
        imageops::resize(img, w, h, FilterType::Triangle)
    }
}

/// Crop `(x, y, w, h)` grown by `pad` on every side, clamped to the image.
pub fn crop_padded(img: &GrayImage, x: u32, y: u32, w: u32, h: u32, pad: u32) -> GrayImage {
    let x0 = x.saturating_sub(pad).min(img.width());
    let y0 = y.saturating_sub(pad).min(img.height());
    let x1 = x.saturating_add(w).saturating_add(pad).min(img.width());
    let y1 = y.saturating_add(h).saturating_add(pad).min(img.height());
    imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Inclusive bounding box `(x, y, width, height)` of a point set.
pub fn bounding_box(points: &[Point<i32>]) -> Option<(u32, u32, u32, u32)> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some((
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
