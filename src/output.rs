//! Result types returned by the conversion entry points.
//!
//! [`BatchOutput`] is what [`crate::convert::convert`] returns: the combined
//! text ready to be written out, every [`ImageResult`] in input order, and
//! summary [`BatchStats`]. All three serialise to JSON for `--json` output.

use crate::error::{ImageError, Ss2TxtError};
use crate::pipeline::reconcile::TableKind;
use crate::pipeline::shapes::DetectedShape;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome for one screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// File name without directory (or `"<bytes>"` for in-memory input).
    pub file_name: String,
    /// Full path of the source file, when there is one.
    pub path: Option<PathBuf>,
    /// 0-based position in processing order.
    pub index: usize,
    /// Final normalised text. Empty when the image failed or had no text.
    pub text: String,
    pub table: TableKind,
    pub cell_count: usize,
    pub row_count: usize,
    pub shapes: Vec<DetectedShape>,
    /// Wall-clock time spent on this image.
    pub duration_ms: u64,
    /// Set when the image could not be processed.
    pub error: Option<ImageError>,
}

impl ImageResult {
    /// An empty result carrying `error`.
    pub fn failed(file_name: String, path: Option<PathBuf>, index: usize, error: ImageError, duration_ms: u64) -> Self {
        Self {
            file_name,
            path,
            index,
            text: String::new(),
            table: TableKind::NoTable,
            cell_count: 0,
            row_count: 0,
            shapes: Vec::new(),
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded but produced no text.
    pub empty: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_results(images: &[ImageResult], total_duration_ms: u64) -> Self {
        let succeeded = images.iter().filter(|r| r.is_success()).count();
        Self {
            total_images: images.len(),
            succeeded,
            failed: images.len() - succeeded,
            empty: images
                .iter()
                .filter(|r| r.is_success() && r.text.is_empty())
                .count(),
            total_duration_ms,
        }
    }
}

/// Everything produced by one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Non-empty image texts joined by a blank line, in input order.
    pub text: String,
    pub images: Vec<ImageResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Treat any failed image as an error.
    pub fn into_result(self) -> Result<Self, Ss2TxtError> {
        if self.stats.failed > 0 {
            return Err(Ss2TxtError::PartialFailure {
                success: self.stats.succeeded,
                failed: self.stats.failed,
                total: self.stats.total_images,
            });
        }
        Ok(self)
    }

    /// Errors of the failed images, in input order.
    pub fn errors(&self) -> impl Iterator<Item = &ImageError> {
        self.images.iter().filter_map(|r| r.error.as_ref())
    }
}

/// Join the non-empty texts with a blank line.
pub fn assemble_text(images: &[ImageResult]) -> String {
    images
        .iter()
        .map(|r| r.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(index: usize, text: &str) -> ImageResult {
        ImageResult {
            file_name: format!("{index}.png"),
            path: None,
            index,
            text: text.to_string(),
            table: TableKind::NoTable,
            cell_count: 0,
            row_count: 0,
            shapes: Vec::new(),
            duration_ms: 5,
            error: None,
        }
    }

    fn bad(index: usize) -> ImageResult {
        ImageResult::failed(
            format!("{index}.png"),
            None,
            index,
            ImageError::Decode {
                file: format!("{index}.png"),
                detail: "bad header".into(),
            },
            1,
        )
    }

    #[test]
    fn assemble_skips_empty_texts() {
        let images = vec![ok(0, "first"), ok(1, ""), bad(2), ok(3, "| a | 1 |")];
        assert_eq!(assemble_text(&images), "first\n\n| a | 1 |");
    }

    #[test]
    fn stats_count_outcomes() {
        let images = vec![ok(0, "first"), ok(1, ""), bad(2)];
        let stats = BatchStats::from_results(&images, 40);
        assert_eq!(
            stats,
            BatchStats {
                total_images: 3,
                succeeded: 2,
                failed: 1,
                empty: 1,
                total_duration_ms: 40,
            }
        );
    }

    #[test]
    fn into_result_reports_partial_failure() {
        let images = vec![ok(0, "x"), bad(1)];
        let out = BatchOutput {
            text: assemble_text(&images),
            stats: BatchStats::from_results(&images, 0),
            images,
        };
        assert_eq!(out.errors().count(), 1);
        match out.into_result() {
            Err(Ss2TxtError::PartialFailure { success, failed, total }) => {
                assert_eq!((success, failed, total), (1, 1, 2));
            }
            other => panic!("expected PartialFailure, got {other:?}"),
        }
    }

    #[test]
    fn output_serialises_to_json() {
        let images = vec![ok(0, "text")];
        let out = BatchOutput {
            text: assemble_text(&images),
            stats: BatchStats::from_results(&images, 0),
            images,
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"table\":\"no_table\""), "{json}");
        assert!(json.contains("\"succeeded\":1"));
    }
}
