//! High-level engine tying decoding, reconstruction and document surgery together.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::generic::{GenericReport, GenericStripper, StripOptions};
use crate::pixel::{PixelBuffer, Rect};
use crate::region::{self, ReconstructOptions, Strategy};
use crate::session::{Progress, Session};
use crate::vendor::{VendorOutcome, VendorReport, VendorStripper};

/// Local file header signature of a zip archive.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Which document pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentMode {
    /// Pattern-driven slide stripping with the given removals.
    Generic(StripOptions),
    /// Signature-driven layout stripping.
    Vendor,
}

/// Result of processing a single file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Where the output was written, if anything was written.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was left alone (nothing to remove).
    pub skipped: bool,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            output: None,
            success: false,
            skipped: false,
            message: String::new(),
        }
    }
}

/// Summary of a presentation before processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    /// Slide part names in slide order.
    pub slides: Vec<String>,
    /// Source size in bytes.
    pub size: usize,
}

/// The watermark engine.
///
/// Create once and reuse for many files; it holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct WatermarkEngine {
    reconstruct: ReconstructOptions,
    vendor: VendorStripper,
}

impl WatermarkEngine {
    /// Engine with default radii and the built-in vendor signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom reconstruction radii.
    #[must_use]
    pub fn with_options(reconstruct: ReconstructOptions) -> Self {
        Self {
            reconstruct,
            vendor: VendorStripper::new(),
        }
    }

    /// Reconstruction radii in use.
    #[must_use]
    pub fn reconstruct_options(&self) -> &ReconstructOptions {
        &self.reconstruct
    }

    /// Decode `bytes`, reconstruct `rect` with `strategy`, and encode the result as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] if `bytes` is not a decodable
    /// image, any region error from [`region::reconstruct`], or
    /// [`Error::Image`] if encoding fails.
    pub fn clean_image(
        &self,
        bytes: &[u8],
        rect: Rect,
        strategy: Strategy,
        mut progress: impl FnMut(Progress),
    ) -> Result<Vec<u8>> {
        let mut buffer = decode_image(bytes)?;
        region::reconstruct(&mut buffer, rect, strategy, &self.reconstruct)?;
        progress(Progress { done: 1, total: 1 });
        encode_png(buffer)
    }

    /// Run a document pass over presentation `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] if `bytes` is not a zip archive or
    /// no generic removal is selected, and [`Error::CorruptArchive`] if the
    /// archive cannot be read.
    pub fn strip_document(
        &self,
        session: &mut Session,
        bytes: &[u8],
        mode: DocumentMode,
        progress: impl FnMut(Progress),
    ) -> Result<DocumentReport> {
        check_document(bytes)?;
        match mode {
            DocumentMode::Generic(options) => GenericStripper::new(options)
                .run(session, bytes, progress)
                .map(DocumentReport::Generic),
            DocumentMode::Vendor => self
                .vendor
                .run(session, bytes, progress)
                .map(DocumentReport::Vendor),
        }
    }

    /// Load an image file, reconstruct `rect`, and save the result as PNG.
    #[must_use]
    pub fn process_image_file(
        &self,
        input: &Path,
        output: &Path,
        rect: Rect,
        strategy: Strategy,
    ) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        if !is_supported_image(input) {
            result.message = Error::UnsupportedInput(input.display().to_string()).to_string();
            return result;
        }

        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let cleaned = match self.clean_image(&bytes, rect, strategy, |_| {}) {
            Ok(c) => c,
            Err(e) => {
                result.message = e.to_string();
                return result;
            }
        };

        match write_output(output, &cleaned) {
            Ok(()) => {
                result.success = true;
                result.output = Some(output.to_path_buf());
                result.message = format!("{strategy:?} applied to {rect}");
            }
            Err(e) => result.message = format!("Failed to save: {e}"),
        }
        result
    }

    /// Load a presentation file, run `mode`, and save the rewritten archive.
    ///
    /// The run's log is left in `session`.
    pub fn process_document_file(
        &self,
        session: &mut Session,
        input: &Path,
        output: &Path,
        mode: DocumentMode,
        progress: impl FnMut(Progress),
    ) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        if !is_supported_document(input) {
            result.message = Error::UnsupportedInput(format!(
                "{} is not a .pptx file",
                input.display()
            ))
            .to_string();
            return result;
        }

        let bytes = match std::fs::read(input) {
            Ok(b) => b,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let report = match self.strip_document(session, &bytes, mode, progress) {
            Ok(r) => r,
            Err(e) => {
                result.message = e.to_string();
                return result;
            }
        };

        result.skipped = !report.changed();
        result.message = report.summary();
        match write_output(output, report.output()) {
            Ok(()) => {
                result.success = true;
                result.output = Some(output.to_path_buf());
            }
            Err(e) => result.message = format!("Failed to save: {e}"),
        }
        result
    }

    /// Reconstruct the same region in every supported image of a directory.
    ///
    /// Uses parallel iteration when the `cli` feature is enabled (via rayon).
    /// Each file is processed independently.
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        rect: Rect,
        strategy: Strategy,
    ) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                let mut failed = ProcessResult::new(input_dir);
                failed.message = format!("Failed to read directory: {e}");
                return vec![failed];
            }
        };

        let process = |input: &PathBuf| {
            let output = output_dir.join(image_output_name(input));
            self.process_image_file(input, &output, rect, strategy)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(process).collect()
        }
    }
}

/// Outcome of [`WatermarkEngine::strip_document`].
#[derive(Debug, Clone)]
pub enum DocumentReport {
    /// Generic pass report.
    Generic(GenericReport),
    /// Vendor pass report.
    Vendor(VendorReport),
}

impl DocumentReport {
    /// Rewritten archive bytes.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        match self {
            DocumentReport::Generic(r) => &r.output,
            DocumentReport::Vendor(r) => &r.output,
        }
    }

    /// Whether any part was rewritten.
    #[must_use]
    pub fn changed(&self) -> bool {
        match self {
            DocumentReport::Generic(r) => !r.modified_parts.is_empty(),
            DocumentReport::Vendor(r) => r.outcome == VendorOutcome::Cleaned,
        }
    }

    /// One-line description of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            DocumentReport::Generic(r) => format!(
                "{} of {} slide(s) modified, {} element(s) removed",
                r.modified_parts.len(),
                r.slides,
                r.removed_nodes
            ),
            DocumentReport::Vendor(r) => match r.outcome {
                VendorOutcome::NoLayout => "No slide layouts found".to_string(),
                VendorOutcome::NoWatermark => "No vendor watermark found".to_string(),
                VendorOutcome::Cleaned => format!(
                    "Removed {} picture(s) and {} relationship(s) ({:+} bytes)",
                    r.pictures_removed, r.relationships_removed, r.size_delta
                ),
            },
        }
    }
}

/// Decode any supported bitmap format into an RGBA buffer.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInput`] if the format is not recognised and
/// [`Error::Image`] if decoding fails.
pub fn decode_image(bytes: &[u8]) -> Result<PixelBuffer> {
    let format = image::guess_format(bytes)
        .map_err(|e| Error::UnsupportedInput(format!("not an image: {e}")))?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    Ok(PixelBuffer::from(img.to_rgba8()))
}

/// Encode a buffer as PNG.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding fails.
pub fn encode_png(buffer: PixelBuffer) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(buffer.into_image()).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Reject bytes that do not start like a zip archive.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInput`].
pub fn check_document(bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(ZIP_MAGIC) {
        Ok(())
    } else {
        Err(Error::UnsupportedInput(
            "document is not a zip-packaged presentation".to_string(),
        ))
    }
}

/// Slide inventory of a presentation.
///
/// # Errors
///
/// Returns [`Error::UnsupportedInput`] or [`Error::CorruptArchive`] for unreadable input.
pub fn summarize_document(bytes: &[u8]) -> Result<DocumentSummary> {
    check_document(bytes)?;
    let archive = Archive::load(bytes)?;
    Ok(DocumentSummary {
        slides: archive.slide_parts(),
        size: bytes.len(),
    })
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif" | "tiff" | "tif"
        ),
        None => false,
    }
}

/// Check if a file has the `.pptx` extension.
#[must_use]
pub fn is_supported_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pptx"))
}

fn image_output_name(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    format!("no-watermark-{stem}.png")
}

/// Default output path for a cleaned image.
///
/// Example: `"photo.jpg"` becomes `"no-watermark-photo.png"`.
#[must_use]
pub fn default_image_output(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(image_output_name(input))
}

/// Default output path for a cleaned presentation.
///
/// Example: `"deck.pptx"` becomes `"deck-no-watermark.pptx"`.
#[must_use]
pub fn default_document_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}-no-watermark.pptx"))
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32, fill: Rgba<u8>) -> Vec<u8> {
        encode_png(PixelBuffer::from(RgbaImage::from_pixel(width, height, fill))).unwrap()
    }

    #[test]
    fn default_outputs_follow_naming_convention() {
        assert_eq!(
            default_image_output(Path::new("/tmp/photo.jpg")),
            PathBuf::from("/tmp/no-watermark-photo.png")
        );
        assert_eq!(
            default_document_output(Path::new("/tmp/deck.pptx")),
            PathBuf::from("/tmp/deck-no-watermark.pptx")
        );
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn is_supported_document_requires_pptx() {
        assert!(is_supported_document(Path::new("deck.pptx")));
        assert!(is_supported_document(Path::new("DECK.PPTX")));
        assert!(!is_supported_document(Path::new("deck.ppt")));
        assert!(!is_supported_document(Path::new("deck.pdf")));
    }

    #[test]
    fn non_image_bytes_are_unsupported() {
        assert!(matches!(
            decode_image(b"hello world"),
            Err(Error::UnsupportedInput(_))
        ));
    }

    #[test]
    fn non_zip_documents_are_unsupported() {
        let mut session = Session::new();
        let err = WatermarkEngine::new().strip_document(
            &mut session,
            b"%PDF-1.7",
            DocumentMode::Vendor,
            |_| {},
        );
        assert!(matches!(err, Err(Error::UnsupportedInput(_))));
    }

    #[test]
    fn clean_image_round_trips_through_png() {
        let engine = WatermarkEngine::new();
        let png = png_bytes(32, 16, Rgba([10, 20, 30, 255]));
        let out = engine
            .clean_image(&png, Rect::new(4, 0, 8, 16), Strategy::Crop, |_| {})
            .unwrap();
        let decoded = decode_image(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn clean_image_rejects_degenerate_region() {
        let engine = WatermarkEngine::new();
        let png = png_bytes(8, 8, Rgba([0, 0, 0, 255]));
        let err = engine.clean_image(&png, Rect::new(1, 1, 0, 4), Strategy::Blur, |_| {});
        assert!(matches!(err, Err(Error::InvalidRegion { .. })));
    }

    #[test]
    fn process_image_file_writes_png_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("shot.png");
        std::fs::write(&input, png_bytes(20, 20, Rgba([200, 0, 0, 255]))).unwrap();

        let output = default_image_output(&input);
        let result = WatermarkEngine::new().process_image_file(
            &input,
            &output,
            Rect::new(5, 5, 4, 4),
            Strategy::Inpaint,
        );
        assert!(result.success, "{}", result.message);
        assert!(output.exists());
    }

    #[test]
    fn process_directory_cleans_every_supported_image() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            std::fs::write(input_dir.path().join(name), png_bytes(16, 16, Rgba([0, 90, 0, 255])))
                .unwrap();
        }
        std::fs::write(input_dir.path().join("notes.txt"), b"not an image").unwrap();

        let mut results = WatermarkEngine::new().process_directory(
            input_dir.path(),
            output_dir.path(),
            Rect::new(2, 2, 4, 4),
            Strategy::Blur,
        );
        results.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success), "{results:?}");
        for name in ["no-watermark-a.png", "no-watermark-b.png"] {
            let written = std::fs::read(output_dir.path().join(name)).unwrap();
            let decoded = decode_image(&written).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (16, 16));
        }
        assert!(!output_dir.path().join("no-watermark-notes.png").exists());
    }

    #[test]
    fn process_document_file_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.docx");
        std::fs::write(&input, b"PK\x03\x04").unwrap();
        let result = WatermarkEngine::new().process_document_file(
            &mut Session::new(),
            &input,
            &dir.path().join("out.pptx"),
            DocumentMode::Vendor,
            |_| {},
        );
        assert!(!result.success);
        assert!(result.message.contains("unsupported input"));
    }
}
