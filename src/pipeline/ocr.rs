//! OCR backends: turn a grayscale image into text under one segmentation mode.
//!
//! The pipeline never talks to Tesseract directly. It goes through the
//! [`OcrBackend`] trait so tests can substitute deterministic fakes and
//! callers can plug in any engine. Two implementations ship with the crate:
//!
//! * [`TesseractCli`]: spawns the `tesseract` executable on a temporary PNG.
//!   Needs nothing at build time, only the binary on `PATH` at run time.
//! * [`LeptessBackend`] *(feature `leptess`)*: links libtesseract in-process.
//!
//! Backends are called from the blocking thread pool and must be
//! `Send + Sync`; they are shared read-only across concurrent images.
//! A [`CancelFlag`] lets the async side stop an image whose deadline has
//! passed: no further attempts are started, and [`TesseractCli`] kills the
//! engine process it is waiting on.

use crate::pipeline::encode;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Tesseract page-segmentation mode used for one recognition attempt.
///
/// Only the modes the pipeline actually tries are modelled; the numeric
/// value is what `--psm` / `tessedit_pageseg_mode` expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fully automatic page segmentation (PSM 3).
    Auto,
    /// A single column of text of variable sizes (PSM 4).
    SingleColumn,
    /// A single uniform block of text (PSM 6).
    UniformBlock,
    /// A single text line (PSM 7).
    SingleLine,
    /// A single word (PSM 8).
    SingleWord,
    /// As much text as possible, in no particular order (PSM 11).
    SparseText,
}

impl SegmentationMode {
    /// The four modes tried for both table cells and whole screenshots.
    pub const DEFAULT_SET: [SegmentationMode; 4] = [
        SegmentationMode::SingleLine,
        SegmentationMode::SingleWord,
        SegmentationMode::UniformBlock,
        SegmentationMode::SparseText,
    ];

    pub fn psm(self) -> u8 {
        match self {
            SegmentationMode::Auto => 3,
            SegmentationMode::SingleColumn => 4,
            SegmentationMode::UniformBlock => 6,
            SegmentationMode::SingleLine => 7,
            SegmentationMode::SingleWord => 8,
            SegmentationMode::SparseText => 11,
        }
    }

    /// Parse a Tesseract PSM number.
    pub fn from_psm(psm: u8) -> Option<Self> {
        match psm {
            3 => Some(SegmentationMode::Auto),
            4 => Some(SegmentationMode::SingleColumn),
            6 => Some(SegmentationMode::UniformBlock),
            7 => Some(SegmentationMode::SingleLine),
            8 => Some(SegmentationMode::SingleWord),
            11 => Some(SegmentationMode::SparseText),
            _ => None,
        }
    }
}

/// Failure of a single recognition attempt.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine process could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but reported failure.
    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    /// The image could not be handed over to the engine.
    #[error("could not prepare image for OCR: {0}")]
    Input(String),

    /// Engine-specific failure (initialisation, recognition).
    #[error("OCR engine error: {0}")]
    Engine(String),

    /// The caller gave up on this image.
    #[error("recognition cancelled")]
    Cancelled,
}

/// Shared stop signal for the recognition work of one image.
///
/// Clones observe the same flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A text-recognition engine.
pub trait OcrBackend: Send + Sync {
    /// Short engine name used in logs and error messages.
    fn name(&self) -> &str;

    /// Recognise the text in `image` using segmentation `mode`.
    ///
    /// An empty (or whitespace-only) result is not an error; it simply
    /// means the engine saw nothing it could read.
    fn recognize(&self, image: &GrayImage, mode: SegmentationMode) -> Result<String, OcrError>;

    /// Like [`recognize`](OcrBackend::recognize), but may stop early with
    /// [`OcrError::Cancelled`] once `cancel` is set.
    ///
    /// The default runs the attempt to completion; engines that can be
    /// interrupted mid-attempt override it.
    fn recognize_cancellable(
        &self,
        image: &GrayImage,
        mode: SegmentationMode,
        _cancel: &CancelFlag,
    ) -> Result<String, OcrError> {
        self.recognize(image, mode)
    }
}

/// One non-empty recognition result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrCandidate {
    pub text: String,
    pub mode: SegmentationMode,
    /// Length in characters, not bytes.
    pub length: usize,
}

impl OcrCandidate {
    pub fn new(text: String, mode: SegmentationMode) -> Self {
        let length = text.chars().count();
        Self { text, mode, length }
    }
}

/// Run `image` through every mode in `modes`, keeping the non-empty
/// trimmed results in mode order.
///
/// Individual failures are logged and skipped. The call only fails when
/// *every* attempt failed, so a caller can tell "engine broken" apart from
/// "nothing to read". Cancellation is checked before each attempt and is
/// returned at once.
pub fn recognize_candidates(
    backend: &dyn OcrBackend,
    image: &GrayImage,
    modes: &[SegmentationMode],
    cancel: &CancelFlag,
) -> Result<Vec<OcrCandidate>, OcrError> {
    let mut candidates = Vec::with_capacity(modes.len());
    let mut last_err: Option<OcrError> = None;
    let mut failures = 0usize;

    for &mode in modes {
        if cancel.is_cancelled() {
            return Err(OcrError::Cancelled);
        }
        match backend.recognize_cancellable(image, mode, cancel) {
            Err(OcrError::Cancelled) => return Err(OcrError::Cancelled),
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("{}: psm {} produced no text", backend.name(), mode.psm());
                    continue;
                }
                candidates.push(OcrCandidate::new(text.to_string(), mode));
            }
            Err(e) => {
                warn!("{}: psm {} failed: {}", backend.name(), mode.psm(), e);
                failures += 1;
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) if failures == modes.len() => Err(e),
        _ => Ok(candidates),
    }
}

// ── Tesseract executable ─────────────────────────────────────────────────

/// How often a running engine process is checked for exit or cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(20);

/// Runs the `tesseract` command-line program once per attempt.
///
/// Equivalent to `tesseract <dir>/in.png <dir>/out --oem <oem> --psm <psm> -l <lang>`
/// in a fresh temporary directory; the text is read back from `out.txt`.
/// While the process runs its exit is polled, so a cancelled attempt kills
/// the child instead of waiting for it.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    language: String,
    engine_mode: u8,
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>, language: impl Into<String>, engine_mode: u8) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            engine_mode,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the executable can be started, returning its version line.
    pub fn version(&self) -> Result<String, OcrError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(OcrError::Exit {
                program: self.program.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn spawn_error(&self, source: std::io::Error) -> OcrError {
        OcrError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng", 3)
    }
}

impl OcrBackend for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, mode: SegmentationMode) -> Result<String, OcrError> {
        self.recognize_cancellable(image, mode, &CancelFlag::default())
    }

    fn recognize_cancellable(
        &self,
        image: &GrayImage,
        mode: SegmentationMode,
        cancel: &CancelFlag,
    ) -> Result<String, OcrError> {
        // Removed with everything in it when it goes out of scope
        let dir = tempfile::Builder::new()
            .prefix("ss2txt-")
            .tempdir()
            .map_err(|e| OcrError::Input(format!("tempdir: {e}")))?;
        let input = dir.path().join("in.png");
        let png = encode::encode_png(image).map_err(|e| OcrError::Input(e.to_string()))?;
        std::fs::write(&input, png).map_err(|e| OcrError::Input(format!("write: {e}")))?;

        let out_base = dir.path().join("out");
        let stderr_path = dir.path().join("stderr.log");
        let stderr = File::create(&stderr_path).map_err(|e| OcrError::Input(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .arg(&input)
            .arg(&out_base)
            .arg("--oem")
            .arg(self.engine_mode.to_string())
            .arg("--psm")
            .arg(mode.psm().to_string())
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        let status = loop {
            if cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    debug!("{}: kill after cancel: {}", self.program.display(), e);
                }
                let _ = child.wait();
                return Err(OcrError::Cancelled);
            }
            match child.try_wait().map_err(|source| self.spawn_error(source))? {
                Some(status) => break status,
                None => std::thread::sleep(CANCEL_POLL),
            }
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrError::Exit {
                program: self.program.display().to_string(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let text = std::fs::read(out_base.with_extension("txt"))
            .map_err(|e| OcrError::Engine(format!("no output from tesseract: {e}")))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

// ── libtesseract (in-process) ────────────────────────────────────────────

/// In-process Tesseract through `leptess`.
///
/// A fresh engine handle is created per attempt; handles are not
/// thread-safe and images are processed on several blocking threads.
#[cfg(feature = "leptess")]
#[derive(Debug, Clone)]
pub struct LeptessBackend {
    language: String,
}

#[cfg(feature = "leptess")]
impl LeptessBackend {
    /// Create the backend, verifying that the language data can be loaded.
    pub fn new(language: impl Into<String>) -> Result<Self, OcrError> {
        let language = language.into();
        leptess::LepTess::new(None, &language).map_err(|e| {
            OcrError::Engine(format!(
                "failed to initialise Tesseract with language '{language}': {e}"
            ))
        })?;
        Ok(Self { language })
    }
}

#[cfg(feature = "leptess")]
impl OcrBackend for LeptessBackend {
    fn name(&self) -> &str {
        "leptess"
    }

    fn recognize(&self, image: &GrayImage, mode: SegmentationMode) -> Result<String, OcrError> {
        use leptess::{LepTess, Variable};

        let mut lt = LepTess::new(None, &self.language)
            .map_err(|e| OcrError::Engine(format!("failed to initialise Tesseract: {e}")))?;
        lt.set_variable(Variable::TesseditPagesegMode, &mode.psm().to_string())
            .map_err(|e| OcrError::Engine(format!("failed to set PSM: {e}")))?;

        let png = encode::encode_png(image).map_err(|e| OcrError::Input(e.to_string()))?;
        lt.set_image_from_mem(&png)
            .map_err(|e| OcrError::Input(format!("failed to load image: {e}")))?;

        lt.get_utf8_text()
            .map_err(|e| OcrError::Engine(format!("recognition failed: {e}")))
    }
}
