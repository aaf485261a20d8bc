//! Whole-image OCR: read the full enhanced screenshot and keep the best pass.

use crate::config::ConversionConfig;
use crate::pipeline::normalize::fix_recognition_errors;
use crate::pipeline::ocr::{recognize_candidates, CancelFlag, OcrBackend, OcrError};
use crate::pipeline::similarity::similar;
use image::GrayImage;
use tracing::debug;

/// Read the whole screenshot under every configured page mode.
///
/// Returns `""` when no pass produced enough text.
pub fn recognize_page(
    enhanced: &GrayImage,
    backend: &dyn OcrBackend,
    config: &ConversionConfig,
    cancel: &CancelFlag,
) -> Result<String, OcrError> {
    let candidates = recognize_candidates(backend, enhanced, &config.page_modes, cancel)?;
    let texts: Vec<String> = candidates.into_iter().map(|c| c.text).collect();
    Ok(select_page_text(
        &texts,
        config.min_page_text_chars,
        config.dedup_threshold,
    ))
}

/// Correct, filter, de-duplicate and pick the longest candidate.
///
/// Candidates under `min_chars` characters after correction are discarded.
/// Of two candidates similar at `dedup_threshold` only the longer survives.
/// Ties keep the earlier candidate.
pub fn select_page_text<S: AsRef<str>>(candidates: &[S], min_chars: usize, dedup_threshold: f32) -> String {
    let mut unique: Vec<String> = Vec::new();

    for raw in candidates {
        let text = fix_recognition_errors(raw.as_ref());
        if text.chars().count() < min_chars {
            continue;
        }
        match unique.iter_mut().find(|kept| similar(&text, kept, dedup_threshold)) {
            Some(kept) => {
                if text.chars().count() > kept.chars().count() {
                    *kept = text;
                }
            }
            None => unique.push(text),
        }
    }
    debug!(
        "Page OCR: {} candidates, {} distinct",
        candidates.len(),
        unique.len()
    );

    let mut best: Option<String> = None;
    for text in unique {
        let longer = best
            .as_ref()
            .map_or(true, |b| text.chars().count() > b.chars().count());
        if longer {
            best = Some(text);
        }
    }
    best.unwrap_or_default()
}
