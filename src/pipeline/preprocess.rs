//! Grayscale conversion, upscaling, enhancement and binarisation.
//!
//! Every screenshot passes through [`preprocess`] exactly once. It produces
//! the buffers the rest of the pipeline reads from:
//!
//! ```text
//!  DynamicImage ─▶ gray (original size) ─────────────────────────▶ cell crops
//!                   │
//!                   └▶ working (upscaled when narrow) ─▶ binary ─▶ detectors
//!                             │
//!                             └▶ denoise ▶ CLAHE ▶ sharpen ▶ shrink ─▶ page OCR
//! ```
//!
//! Small screenshots have glyph strokes only one or two pixels wide; the
//! detectors and the engine both behave better at double size.

use crate::config::ConversionConfig;
use crate::pipeline::imgops;
use image::{imageops, DynamicImage, GrayImage};
use tracing::debug;

/// CLAHE clip limit for the whole screenshot.
pub const PAGE_CLIP_LIMIT: f32 = 2.0;
/// CLAHE clip limit for individual cell crops.
pub const CELL_CLIP_LIMIT: f32 = 3.0;
/// Adaptive threshold window and offset.
const THRESHOLD_BLOCK: u32 = 11;
const THRESHOLD_C: i32 = 2;

/// All derived buffers for one screenshot.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// 8-bit grayscale at original resolution.
    pub gray: GrayImage,
    /// Grayscale at detection resolution (`gray` scaled by `scale`).
    pub working: GrayImage,
    /// Factor from original to working coordinates (1.0 when not upscaled).
    pub scale: f32,
    /// Inverted binary mask of `working`: adaptive threshold OR Otsu.
    pub binary: GrayImage,
    /// Enhanced image at original resolution, fed to whole-image OCR.
    pub enhanced: GrayImage,
}

impl Preprocessed {
    pub fn was_upscaled(&self) -> bool {
        self.scale > 1.0
    }
}

/// Convert, upscale, binarise and enhance a decoded screenshot.
pub fn preprocess(img: &DynamicImage, config: &ConversionConfig) -> Preprocessed {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();

    let scale = if w < config.upscale_below_width && config.upscale_factor > 1.0 {
        config.upscale_factor
    } else {
        1.0
    };
    let working = if scale > 1.0 {
        imgops::resize_by(&gray, scale)
    } else {
        gray.clone()
    };
    debug!(
        "Preprocess {}x{} → working {}x{} (scale {:.1})",
        w,
        h,
        working.width(),
        working.height(),
        scale
    );

    let binary = binarize(&working);

    let mut enhanced = enhance(&working, PAGE_CLIP_LIMIT);
    if enhanced.dimensions() != (w, h) {
        enhanced = imageops::resize(&enhanced, w, h, imageops::FilterType::Triangle);
    }

    Preprocessed {
        gray,
        working,
        scale,
        binary,
        enhanced,
    }
}

/// Inverted binary mask: adaptive mean-C threshold OR global Otsu.
///
/// The adaptive pass catches thin strokes on uneven backgrounds, the Otsu
/// pass catches large dark areas the local mean washes out.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let adaptive = imgops::adaptive_threshold_inv(gray, THRESHOLD_BLOCK, THRESHOLD_C);
    let otsu = imgops::otsu_threshold_inv(gray);
    imgops::union(&adaptive, &otsu)
}

/// Denoise, equalise contrast locally, then sharpen.
pub fn enhance(gray: &GrayImage, clip_limit: f32) -> GrayImage {
    let denoised = imgops::denoise(gray);
    let equalised = imgops::clahe(&denoised, clip_limit, 8, 8);
    imgops::sharpen(&equalised)
}

/// Enhance a cell crop, enlarging tiny crops first.
///
/// Crops narrower than 50 px or shorter than 20 px are scaled by
/// `max(50 / w, 20 / h, 2)`.
pub fn enhance_cell(crop: &GrayImage) -> GrayImage {
    let (w, h) = crop.dimensions();
    if w == 0 || h == 0 {
        return crop.clone();
    }
    let resized = if w < 50 || h < 20 {
        let factor = (50.0 / w as f32).max(20.0 / h as f32).max(2.0);
        imgops::resize_by(crop, factor)
    } else {
        crop.clone()
    };
    enhance(&resized, CELL_CLIP_LIMIT)
}
