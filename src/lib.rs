//! Remove watermarks from images and PPTX presentations.
//!
//! Two independent engines:
//!
//! - **Region reconstruction** rewrites a rectangle of an RGBA [`PixelBuffer`]
//!   by inpaint-fill, crop-splice or box-blur.
//! - **Document surgery** loads a zip-packaged presentation into an
//!   [`Archive`], deletes watermark-carrying XML nodes from selected parts, and
//!   re-serializes the archive with every other entry unchanged.
//!
//! # Quick Start
//!
//! ```no_run
//! use watermark_surgeon::{Rect, Strategy, WatermarkEngine};
//!
//! let engine = WatermarkEngine::new();
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let png = engine
//!     .clean_image(&bytes, Rect::new(10, 10, 120, 40), Strategy::Inpaint, |_| {})
//!     .unwrap();
//! std::fs::write("no-watermark-photo.png", png).unwrap();
//! ```
//!
//! # Documents
//!
//! ```no_run
//! use watermark_surgeon::{DocumentMode, Session, StripOptions, WatermarkEngine};
//!
//! let engine = WatermarkEngine::new();
//! let mut session = Session::new();
//! let deck = std::fs::read("deck.pptx").unwrap();
//! let options = StripOptions { text: true, background: true, ..StripOptions::default() };
//! let report = engine
//!     .strip_document(&mut session, &deck, DocumentMode::Generic(options), |p| {
//!         eprintln!("{:.0}%", p.percent());
//!     })
//!     .unwrap();
//! for entry in session.log().entries() {
//!     println!("{entry}");
//! }
//! std::fs::write("deck-no-watermark.pptx", report.output()).unwrap();
//! ```

#![deny(missing_docs)]

pub mod archive;
mod engine;
pub mod error;
pub mod generic;
pub mod pixel;
pub mod region;
pub mod session;
pub mod vendor;
pub mod xml;

pub use archive::{Archive, ArchiveEntry};
pub use engine::{
    check_document, decode_image, default_document_output, default_image_output, encode_png,
    is_supported_document, is_supported_image, summarize_document, DocumentMode, DocumentReport,
    DocumentSummary, ProcessResult, WatermarkEngine,
};
pub use error::{Error, Result};
pub use generic::{GenericReport, GenericStripper, MarkupTextClassifier, ShapeClassifier, StripOptions};
pub use pixel::{PixelBuffer, Rect};
pub use region::{ReconstructOptions, Strategy};
pub use session::{LogEntry, Progress, RemovalLog, Session, Severity};
pub use vendor::{VendorOutcome, VendorReport, VendorSignature, VendorStripper};
