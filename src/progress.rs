//! Progress-callback trait for per-image conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch works through the folder.
//!
//! The callback is the only integration point: callers forward events to a
//! terminal progress bar, a channel or a log without the library knowing how
//! the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ss2txt::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, image_num: usize, total: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} done ({} chars)", image_num, total, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch driver as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// With `concurrency > 1`, `on_image_start`, `on_image_complete` and
/// `on_image_error` may be called concurrently from different tasks.
/// Shared mutable state needs `Mutex` or atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the input folder has been scanned.
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called before an image is decoded.
    ///
    /// # Arguments
    /// * `image_num`: 1-indexed position in processing order
    /// * `total`    : number of images in the batch
    /// * `file_name`: file name without directory
    fn on_image_start(&self, image_num: usize, total: usize, file_name: &str) {
        let _ = (image_num, total, file_name);
    }

    /// Called when an image produced a result (possibly empty text).
    ///
    /// `text_len` is the character count of the final text.
    fn on_image_complete(&self, image_num: usize, total: usize, text_len: usize) {
        let _ = (image_num, total, text_len);
    }

    /// Called when an image failed to decode, recognise or finish in time.
    fn on_image_error(&self, image_num: usize, total: usize, error: &str) {
        let _ = (image_num, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_batch_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
