//! Integration tests for edgequake-ss2txt.
//!
//! Screenshots are synthesised with `imageproc::drawing` and written to temp
//! folders. OCR is replaced by deterministic fake backends, so these tests
//! need no Tesseract install:
//!
//! * [`DotCounter`] reads a crop as a letter or digit according to how many
//!   ink dots it contains, which makes every table cell machine-readable.
//! * [`Fixed`] returns the same text for every call.
//!
//! The `real_tesseract_*` test runs only with `E2E_ENABLED` set.

use edgequake_ss2txt::{
    convert, convert_from_bytes, convert_stream, convert_sync, convert_to_file, CancelFlag,
    ConversionConfig, ConversionProgressCallback, ImageError, OcrBackend, OcrError, OutputLayout,
    SegmentationMode, Ss2TxtError, TableKind,
};
use futures::StreamExt;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Fake OCR backends ────────────────────────────────────────────────────────

/// Labels for 1..=6 dots.
const DOT_LABELS: [&str; 6] = ["a", "1", "b", "2", "c", "3"];

/// Reads `n` isolated ink dots as `DOT_LABELS[n - 1]`; anything else is blank.
///
/// Ink touching the crop edge (grid lines, neighbouring cells) is ignored.
struct DotCounter;

impl OcrBackend for DotCounter {
    fn name(&self) -> &str {
        "dot-counter"
    }

    fn recognize(&self, image: &GrayImage, _mode: SegmentationMode) -> Result<String, OcrError> {
        let n = count_dots(image);
        Ok(DOT_LABELS
            .get(n.wrapping_sub(1))
            .copied()
            .unwrap_or("")
            .to_string())
    }
}

fn count_dots(image: &GrayImage) -> usize {
    let (w, h) = image.dimensions();
    let mask = GrayImage::from_fn(w, h, |x, y| {
        if image.get_pixel(x, y)[0] < 128 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut all = HashSet::new();
    let mut touching = HashSet::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label[0];
        if id == 0 {
            continue;
        }
        all.insert(id);
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            touching.insert(id);
        }
    }
    all.difference(&touching).count()
}

struct Fixed(&'static str);

impl OcrBackend for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _: &GrayImage, _: SegmentationMode) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

/// Echoes the image width, sleeping longer for narrower images so later
/// images finish first under concurrency.
struct WidthEcho;

impl OcrBackend for WidthEcho {
    fn name(&self) -> &str {
        "width-echo"
    }

    fn recognize(&self, image: &GrayImage, _: SegmentationMode) -> Result<String, OcrError> {
        let w = image.width();
        std::thread::sleep(Duration::from_millis(400u64.saturating_sub(w as u64) / 2));
        Ok(format!("Screenshot width {w}"))
    }
}

/// Takes three seconds per attempt and cannot be interrupted.
struct Sluggish;

impl OcrBackend for Sluggish {
    fn name(&self) -> &str {
        "sluggish"
    }

    fn recognize(&self, _: &GrayImage, _: SegmentationMode) -> Result<String, OcrError> {
        std::thread::sleep(Duration::from_secs(3));
        Ok("Too late to matter".to_string())
    }
}

/// Waits on every attempt until it is cancelled, counting attempts.
#[derive(Default)]
struct WaitsForCancel {
    calls: AtomicUsize,
    stopped: AtomicBool,
}

impl OcrBackend for WaitsForCancel {
    fn name(&self) -> &str {
        "waits-for-cancel"
    }

    fn recognize(&self, _: &GrayImage, _: SegmentationMode) -> Result<String, OcrError> {
        std::thread::sleep(Duration::from_secs(5));
        Ok("Uncancellable reading".to_string())
    }

    fn recognize_cancellable(
        &self,
        _: &GrayImage,
        _: SegmentationMode,
        cancel: &CancelFlag,
    ) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(10));
        }
        self.stopped.store(true, Ordering::SeqCst);
        Err(OcrError::Cancelled)
    }
}

/// Hangs on its very first call, then behaves like [`Fixed`].
struct SlowFirst {
    slept: AtomicBool,
}

impl OcrBackend for SlowFirst {
    fn name(&self) -> &str {
        "slow-first"
    }

    fn recognize(&self, _: &GrayImage, _: SegmentationMode) -> Result<String, OcrError> {
        if !self.slept.swap(true, Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1500));
        }
        Ok("Second screenshot text".to_string())
    }
}

// ── Synthetic screenshots ────────────────────────────────────────────────────

fn white(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([255]))
}

fn ink(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32) {
    draw_filled_rect_mut(img, Rect::at(x as i32, y as i32).of_size(w, h), Luma([0]));
}

/// 400×300 ruled grid, 2 columns × 3 rows, with 1..=6 dots per cell in
/// row-major order. Reads as `| a | 1 |`, `| b | 2 |`, `| c | 3 |`.
fn grid3x2() -> GrayImage {
    let (x0, y0, cw, ch) = (40u32, 30u32, 160u32, 80u32);
    let mut img = white(400, 300);
    for r in 0..=3 {
        ink(&mut img, x0, y0 + r * ch, 2 * cw + 3, 3);
    }
    for c in 0..=2 {
        ink(&mut img, x0 + c * cw, y0, 3, 3 * ch + 3);
    }
    for r in 0..3 {
        for c in 0..2 {
            let dots = r * 2 + c + 1;
            for k in 0..dots {
                ink(&mut img, x0 + c * cw + 30 + k * 16, y0 + r * ch + 36, 8, 8);
            }
        }
    }
    img
}

/// Four lines of word-shaped ink, like a paragraph of prose.
fn paragraph() -> GrayImage {
    let mut img = white(600, 200);
    for line in 0..4 {
        let y = 30 + line * 35;
        let mut x = 40;
        for word in [60, 45, 70, 35, 80, 50, 65, 40] {
            ink(&mut img, x, y, word, 10);
            x += word + 3;
        }
    }
    img
}

/// Five lines of words with ordinary 5–9 px word spacing.
fn spaced_prose() -> GrayImage {
    let widths = [58u32, 26, 90, 41, 33, 72, 47, 64, 29, 55];
    let gaps = [5u32, 9, 7, 6, 8];
    let mut img = white(800, 260);
    for line in 0..5u32 {
        let y = 30 + line * 40;
        let mut x = 40 + (line % 2) * 15;
        for i in 0.. {
            let word = widths[(i + line as usize) % widths.len()];
            if x + word > 760 {
                break;
            }
            ink(&mut img, x, y, word, 12);
            x += word + gaps[i % gaps.len()];
        }
    }
    img
}

fn save(img: &GrayImage, dir: &Path, name: &str) {
    img.save(dir.join(name)).unwrap();
}

/// Route library logs through the test harness; `RUST_LOG=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with(backend: Arc<dyn OcrBackend>) -> ConversionConfig {
    ConversionConfig::builder().backend(backend).build().unwrap()
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ruled_grid_becomes_pipe_rows() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    save(&grid3x2(), dir.path(), "grid3x2.png");

    let out = convert(dir.path(), &config_with(Arc::new(DotCounter)))
        .await
        .unwrap();

    assert_eq!(out.text, "| a | 1 |\n| b | 2 |\n| c | 3 |");
    let image = &out.images[0];
    assert_eq!(image.table, TableKind::BorderedTable);
    assert_eq!(image.cell_count, 6);
    assert_eq!(image.row_count, 3);
}

#[tokio::test]
async fn paragraph_passes_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    save(&paragraph(), dir.path(), "paragraph.png");
    let sentence = "The quick brown fox jumps over the lazy dog.";

    let out = convert(dir.path(), &config_with(Arc::new(Fixed(sentence))))
        .await
        .unwrap();

    assert_eq!(out.text, sentence);
    assert_eq!(out.images[0].table, TableKind::NoTable);
    assert!(!out.text.contains('|'));
}

#[tokio::test]
async fn prose_with_word_spacing_is_not_a_table() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    save(&spaced_prose(), dir.path(), "prose.png");
    let sentence = "The quick brown fox jumps over the lazy dog.";

    let out = convert(dir.path(), &config_with(Arc::new(Fixed(sentence))))
        .await
        .unwrap();

    assert_eq!(out.images[0].table, TableKind::NoTable);
    assert_eq!(out.images[0].cell_count, 0);
    assert_eq!(out.text, sentence);
    assert!(!out.text.contains('|'));
}

#[tokio::test]
async fn corrupt_file_does_not_abort_the_batch() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    save(&grid3x2(), dir.path(), "a_grid.png");
    std::fs::write(dir.path().join("b_broken.png"), b"definitely not a png").unwrap();

    let out = convert(dir.path(), &config_with(Arc::new(DotCounter)))
        .await
        .unwrap();

    assert_eq!(out.text, "| a | 1 |\n| b | 2 |\n| c | 3 |");
    assert_eq!(out.stats.total_images, 2);
    assert_eq!(out.stats.succeeded, 1);
    assert_eq!(out.stats.failed, 1);
    assert!(matches!(
        out.images[1].error,
        Some(ImageError::Decode { ref file, .. }) if file == "b_broken.png"
    ));
    assert!(out.into_result().is_err());
}

#[tokio::test]
async fn slow_image_times_out_and_batch_continues() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    save(&white(300, 200), dir.path(), "1.png");
    save(&white(300, 200), dir.path(), "2.png");

    let config = ConversionConfig::builder()
        .backend(Arc::new(SlowFirst {
            slept: AtomicBool::new(false),
        }))
        .image_timeout_secs(1)
        .build()
        .unwrap();
    let out = convert(dir.path(), &config).await.unwrap();

    assert!(matches!(out.images[0].error, Some(ImageError::Timeout { secs: 1, .. })));
    assert!(out.images[1].error.is_none());
    assert_eq!(out.text, "Second screenshot text");
}

#[test]
fn sync_conversion_returns_at_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(300, 200), dir.path(), "slow.png");
    let config = ConversionConfig::builder()
        .backend(Arc::new(Sluggish))
        .image_timeout_secs(1)
        .detect_shapes(false)
        .build()
        .unwrap();

    let started = Instant::now();
    let out = convert_sync(dir.path(), &config).unwrap();
    let elapsed = started.elapsed();

    assert!(matches!(out.images[0].error, Some(ImageError::Timeout { secs: 1, .. })));
    assert!(elapsed < Duration::from_millis(2500), "took {elapsed:?}");
}

#[tokio::test]
async fn timed_out_image_stops_recognising() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(300, 200), dir.path(), "stuck.png");
    let backend = Arc::new(WaitsForCancel::default());
    let config = ConversionConfig::builder()
        .backend(backend.clone())
        .image_timeout_secs(2)
        .detect_shapes(false)
        .build()
        .unwrap();

    let started = Instant::now();
    let out = convert(dir.path(), &config).await.unwrap();
    assert!(matches!(out.images[0].error, Some(ImageError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(3));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(backend.stopped.load(Ordering::SeqCst), "attempt still running");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1, "no attempt after the deadline");
}

#[tokio::test]
async fn zero_concurrency_in_a_literal_config_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(300, 200), dir.path(), "one.png");
    save(&white(300, 200), dir.path(), "two.png");
    let config = ConversionConfig {
        concurrency: 0,
        backend: Some(Arc::new(Fixed("Plain words on a page."))),
        detect_shapes: false,
        ..Default::default()
    };

    let out = tokio::time::timeout(Duration::from_secs(10), convert(dir.path(), &config))
        .await
        .expect("conversion hung")
        .unwrap();
    assert_eq!(out.images.len(), 2);
    assert_eq!(out.text, "Plain words on a page.\n\nPlain words on a page.");

    let streamed: Vec<_> = convert_stream(dir.path(), &config)
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(streamed.len(), 2);
}

#[tokio::test]
async fn concurrent_batch_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    for (i, w) in [300u32, 320, 340, 360, 380].iter().enumerate() {
        save(&white(*w, 120), dir.path(), &format!("{i:02}.png"));
    }
    let config = ConversionConfig::builder()
        .backend(Arc::new(WidthEcho))
        .concurrency(4)
        .detect_shapes(false)
        .build()
        .unwrap();

    let out = convert(dir.path(), &config).await.unwrap();
    let expected: Vec<String> = [300, 320, 340, 360, 380]
        .iter()
        .map(|w| format!("Screenshot width {w}"))
        .collect();
    assert_eq!(out.text, expected.join("\n\n"));
    let indices: Vec<usize> = out.images.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn per_image_layout_writes_one_file_each() {
    let input = tempfile::tempdir().unwrap();
    save(&grid3x2(), input.path(), "table.png");
    save(&white(300, 200), input.path(), "blank.png");
    let output = tempfile::tempdir().unwrap();
    let target = output.path().join("texts");

    let config = ConversionConfig::builder()
        .backend(Arc::new(DotCounter))
        .output_layout(OutputLayout::PerImage)
        .build()
        .unwrap();
    let stats = convert_to_file(input.path(), &target, &config).await.unwrap();

    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.empty, 1);
    assert_eq!(
        std::fs::read_to_string(target.join("table.txt")).unwrap(),
        "| a | 1 |\n| b | 2 |\n| c | 3 |"
    );
    assert_eq!(std::fs::read_to_string(target.join("blank.txt")).unwrap(), "");
}

#[tokio::test]
async fn combined_layout_writes_single_file() {
    let input = tempfile::tempdir().unwrap();
    save(&grid3x2(), input.path(), "a.png");
    save(&grid3x2(), input.path(), "b.png");
    let output = tempfile::tempdir().unwrap();
    let target = output.path().join("all_extracted_structured_text.txt");

    convert_to_file(input.path(), &target, &config_with(Arc::new(DotCounter)))
        .await
        .unwrap();

    let table = "| a | 1 |\n| b | 2 |\n| c | 3 |";
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        format!("{table}\n\n{table}")
    );
}

#[tokio::test]
async fn stream_yields_results_and_errors_in_order() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(300, 200), dir.path(), "a.png");
    std::fs::write(dir.path().join("b.png"), b"junk").unwrap();
    save(&white(300, 200), dir.path(), "c.png");

    let config = config_with(Arc::new(Fixed("Some readable text here")));
    let items: Vec<_> = convert_stream(dir.path(), &config)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap().file_name, "a.png");
    assert_eq!(items[1].as_ref().unwrap_err().file(), "b.png");
    assert_eq!(items[2].as_ref().unwrap().text, "Some readable text here");
}

#[tokio::test]
async fn bytes_input_is_converted() {
    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(grid3x2())
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let result = convert_from_bytes(&png, &config_with(Arc::new(DotCounter)))
        .await
        .unwrap();
    assert_eq!(result.text, "| a | 1 |\n| b | 2 |\n| c | 3 |");
    assert!(result.path.is_none());
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_only_folder_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("all_extracted_structured_text.txt"), "x").unwrap();

    let err = convert(dir.path(), &config_with(Arc::new(Fixed("x"))))
        .await
        .unwrap_err();
    assert!(matches!(err, Ss2TxtError::AlreadyText { .. }), "got: {err}");
}

#[tokio::test]
async fn missing_engine_fails_up_front() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(100, 100), dir.path(), "a.png");

    let config = ConversionConfig::builder()
        .tesseract_path("/nonexistent/ss2txt-tesseract")
        .build()
        .unwrap();
    let err = convert(dir.path(), &config).await.unwrap_err();
    assert!(matches!(err, Ss2TxtError::OcrEngineUnavailable { .. }), "got: {err}");
}

// ── Progress callback ────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    batch_total: AtomicUsize,
    batch_success: AtomicUsize,
}

impl ConversionProgressCallback for Counting {
    fn on_batch_start(&self, total_images: usize) {
        self.batch_total.store(total_images, Ordering::SeqCst);
    }
    fn on_image_start(&self, _: usize, _: usize, _: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_image_complete(&self, _: usize, _: usize, _: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_image_error(&self, _: usize, _: usize, _: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _: usize, success_count: usize) {
        self.batch_success.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_events_cover_every_image() {
    let dir = tempfile::tempdir().unwrap();
    save(&white(200, 100), dir.path(), "a.png");
    std::fs::write(dir.path().join("b.gif"), b"GIF89a?").unwrap();
    save(&white(200, 100), dir.path(), "c.bmp");

    let counter = Arc::new(Counting::default());
    let config = ConversionConfig::builder()
        .backend(Arc::new(Fixed("Some readable text here")))
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    convert(dir.path(), &config).await.unwrap();

    assert_eq!(counter.batch_total.load(Ordering::SeqCst), 3);
    assert_eq!(counter.started.load(Ordering::SeqCst), 3);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.batch_success.load(Ordering::SeqCst), 2);
}

#[test]
fn config_and_callback_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConversionConfig>();
    assert_send_sync::<Counting>();
}

// ── Real Tesseract ───────────────────────────────────────────────────────────

#[tokio::test]
async fn real_tesseract_finds_the_grid() {
    init_tracing();
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run against a real tesseract install");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    save(&grid3x2(), dir.path(), "grid.png");

    let out = convert(dir.path(), &ConversionConfig::default()).await.unwrap();
    assert_eq!(out.stats.failed, 0, "errors: {:?}", out.errors().collect::<Vec<_>>());
    assert_eq!(out.images[0].table, TableKind::BorderedTable);
}
