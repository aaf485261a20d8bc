//! Pipeline stages for screenshot-to-text conversion.
//!
//! Each submodule implements one transformation step and is testable on
//! its own with synthetic images and fake OCR backends.
//!
//! ## Data Flow
//!
//! ```text
//! input ─▶ preprocess ─┬─▶ lines ──(< 2 cells)──▶ blocks ─┐
//!                      │                                  ├─▶ grouping ─▶ cells ─┐
//!                      │                       (ruled) ───┘                      ├─▶ reconcile ─▶ normalize
//!                      └─▶ page ─────────────────────────────────────────────────┘
//! ```
//!
//! 1. [`input`]     : list the images of a folder and decode them
//! 2. [`preprocess`]: grayscale, upscale, binarise, enhance
//! 3. [`lines`]     : ruled-table cells from line masks
//! 4. [`blocks`]    : borderless-table cells from aligned text blocks
//! 5. [`grouping`]  : cells into rows, top to bottom, left to right
//! 6. [`cells`]     : per-cell OCR and `| a | b |` row rendering
//! 7. [`page`]      : whole-image OCR with de-duplication
//! 8. [`reconcile`] : choose between table text and free text
//! 9. [`normalize`] : deterministic text cleanup
//!
//! [`extract`] chains the stages for one image. [`ocr`] defines the engine
//! seam, [`imgops`] the image primitives `imageproc` does not provide, and
//! [`shapes`] the optional shape classification.

pub mod blocks;
pub mod cells;
pub mod encode;
pub mod extract;
pub mod grouping;
pub mod imgops;
pub mod input;
pub mod lines;
pub mod normalize;
pub mod ocr;
pub mod page;
pub mod preprocess;
pub mod reconcile;
pub mod shapes;
pub mod similarity;
