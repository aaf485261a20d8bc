//! Input resolution: turn a folder or file path into an ordered image list.
//!
//! A folder is scanned one level deep. Files are kept when their lower-cased
//! extension is a supported image type and are sorted by file name, so two
//! runs over the same folder always process images in the same order.

use crate::error::{ImageError, Ss2TxtError};
use image::DynamicImage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lower-case extensions treated as screenshots.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

/// Whether `path` has a supported image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, &SUPPORTED_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

/// Resolve `path` to the list of images to convert.
///
/// * a directory yields its supported images, sorted by file name;
/// * a file yields itself if its extension is supported.
pub fn resolve_input(path: &Path) -> Result<Vec<PathBuf>, Ss2TxtError> {
    let meta = std::fs::metadata(path).map_err(|e| map_io(e.kind(), path))?;

    if meta.is_file() {
        if !is_supported_image(path) {
            return Err(Ss2TxtError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
        debug!("Resolved single image: {}", path.display());
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path).map_err(|e| map_io(e.kind(), path))?;
    let mut images = Vec::new();
    let mut text_files = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| map_io(e.kind(), path))?;
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        if is_supported_image(&p) {
            images.push(p);
        } else if has_extension(&p, &["txt"]) {
            text_files += 1;
        }
    }

    if images.is_empty() {
        return Err(if text_files > 0 {
            Ss2TxtError::AlreadyText {
                dir: path.to_path_buf(),
                text_files,
            }
        } else {
            Ss2TxtError::NoImages {
                dir: path.to_path_buf(),
            }
        });
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    info!("Found {} image(s) in {}", images.len(), path.display());
    Ok(images)
}

fn map_io(kind: ErrorKind, path: &Path) -> Ss2TxtError {
    match kind {
        ErrorKind::PermissionDenied => Ss2TxtError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Ss2TxtError::InputNotFound {
            path: path.to_path_buf(),
        },
    }
}

/// Decode one image file.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImageError> {
    image::open(path).map_err(|e| ImageError::Decode {
        file: file_name(path),
        detail: e.to_string(),
    })
}

/// Display name of a path: its final component, or the whole path.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
