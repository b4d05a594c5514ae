//! Pattern-driven watermark removal over presentation slide parts.
//!
//! Three independent removals, selected through [`StripOptions`]:
//!
//! - **text**: table blocks (a `graphicFrame` holding a `tbl` together with an
//!   `extLst` marker) and every `sp` shape the [`ShapeClassifier`] flags;
//! - **background**: every `bg` element;
//! - **image**: accepted but has no slide-level transformation. The run logs a
//!   warning and continues.
//!
//! Only slide parts that actually lost a node are replaced in the archive.

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::session::{Progress, Session};
use crate::xml::{edit_part, NodeId, XmlPart};

/// Terms searched for by [`MarkupTextClassifier::default`].
pub const DEFAULT_WATERMARK_TERMS: [&str; 2] = ["watermark", "水印"];

/// Which removals a generic run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StripOptions {
    /// Remove watermark tables and shapes.
    pub text: bool,
    /// Remove image watermarks. No slide transformation exists for this yet.
    pub image: bool,
    /// Remove slide backgrounds.
    pub background: bool,
}

impl StripOptions {
    /// Whether no removal was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.text || self.image || self.background)
    }
}

/// Decides whether a shape element carries a watermark.
pub trait ShapeClassifier {
    /// Whether the `sp` element `shape` of `part` is a watermark.
    ///
    /// # Errors
    ///
    /// Implementations may fail if the shape cannot be inspected.
    fn is_watermark(&self, part: &XmlPart, shape: NodeId) -> Result<bool>;
}

/// Flags a shape when its serialized markup contains any of the given terms.
///
/// This is a plain, case-sensitive substring test over the XML text, so it
/// also matches attribute values and element names, and misses terms split
/// across runs.
#[derive(Debug, Clone)]
pub struct MarkupTextClassifier {
    terms: Vec<String>,
}

impl MarkupTextClassifier {
    /// Classifier matching `terms`.
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for MarkupTextClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_WATERMARK_TERMS)
    }
}

impl ShapeClassifier for MarkupTextClassifier {
    fn is_watermark(&self, part: &XmlPart, shape: NodeId) -> Result<bool> {
        let markup = part.subtree_markup(shape)?;
        Ok(self.terms.iter().any(|term| markup.contains(term.as_str())))
    }
}

/// Outcome of a generic run.
#[derive(Debug, Clone)]
pub struct GenericReport {
    /// Re-serialized archive.
    pub output: Vec<u8>,
    /// Number of slide parts inspected.
    pub slides: usize,
    /// Slide parts that were rewritten, in processing order.
    pub modified_parts: Vec<String>,
    /// Slide parts skipped because they could not be parsed.
    pub failed_parts: Vec<String>,
    /// Total subtrees removed across all slides.
    pub removed_nodes: usize,
}

/// Generic watermark stripper over `ppt/slides/slideN.xml` parts.
#[derive(Debug, Clone)]
pub struct GenericStripper<C = MarkupTextClassifier> {
    options: StripOptions,
    classifier: C,
}

impl GenericStripper<MarkupTextClassifier> {
    /// Stripper using the default markup classifier.
    #[must_use]
    pub fn new(options: StripOptions) -> Self {
        Self::with_classifier(options, MarkupTextClassifier::default())
    }
}

impl<C: ShapeClassifier> GenericStripper<C> {
    /// Stripper using a custom shape classifier.
    #[must_use]
    pub fn with_classifier(options: StripOptions, classifier: C) -> Self {
        Self {
            options,
            classifier,
        }
    }

    /// Selected removals.
    #[must_use]
    pub fn options(&self) -> StripOptions {
        self.options
    }

    /// Strip every slide part of the archive in `source`.
    ///
    /// `progress` is called once per slide part. Slide parts that fail to
    /// parse are logged and left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] if no removal is selected,
    /// [`Error::CorruptArchive`] if `source` is not a zip archive, and
    /// [`Error::Io`] if the archive cannot be re-serialized.
    pub fn run(
        &self,
        session: &mut Session,
        source: &[u8],
        mut progress: impl FnMut(Progress),
    ) -> Result<GenericReport> {
        if self.options.is_empty() {
            return Err(Error::UnsupportedInput(
                "select at least one removal mode (text, image, background)".to_string(),
            ));
        }

        session.reset();
        let mut archive = Archive::load(source)?;
        let slides = archive.slide_parts();
        let log = session.log_mut();
        log.info(format!("found {} slide part(s)", slides.len()));
        if self.options.image {
            log.warn("image removal has no slide-level transformation; skipped");
        }

        let mut replacements = Vec::new();
        let mut failed_parts = Vec::new();
        let mut removed_nodes = 0;

        for (i, name) in slides.iter().enumerate() {
            let bytes = archive.get(name).unwrap_or_default();
            let mut removed = 0;
            let edited = edit_part(name, bytes, |part| {
                removed = self.strip(part)?;
                Ok(removed)
            });

            match edited {
                Ok(Some(out)) => {
                    log.success(format!("{name}: removed {removed} element(s)"));
                    removed_nodes += removed;
                    replacements.push((name.clone(), out));
                }
                Ok(None) => log.info(format!("{name}: nothing to remove")),
                Err(e) => {
                    log.error(format!("{e}; part left unchanged"));
                    failed_parts.push(name.clone());
                }
            }

            progress(Progress {
                done: i + 1,
                total: slides.len(),
            });
        }

        let modified_parts: Vec<String> = replacements.iter().map(|(n, _)| n.clone()).collect();
        for (name, out) in replacements {
            archive.replace(&name, out);
        }

        let output = archive.serialize()?;
        log.info(format!(
            "{} of {} slide part(s) modified",
            modified_parts.len(),
            slides.len()
        ));

        Ok(GenericReport {
            output,
            slides: slides.len(),
            modified_parts,
            failed_parts,
            removed_nodes,
        })
    }

    /// Remove the selected node kinds from one slide. Returns the number removed.
    fn strip(&self, part: &mut XmlPart) -> Result<usize> {
        let mut doomed = Vec::new();

        if self.options.text {
            doomed.extend(table_blocks(part));
            for shape in part.find_all("sp") {
                if self.classifier.is_watermark(part, shape)? {
                    doomed.push(shape);
                }
            }
        }

        if self.options.background {
            doomed.extend(part.find_all("bg"));
        }

        Ok(part.remove_subtrees(&doomed))
    }
}

/// Table blocks: graphic frames holding a `tbl` and an `extLst`, plus bare
/// `tbl` elements outside any frame that carry their own `extLst`.
fn table_blocks(part: &XmlPart) -> Vec<NodeId> {
    let frames = part.find_all("graphicFrame");
    let framed: Vec<NodeId> = frames
        .iter()
        .flat_map(|&frame| part.find_within(frame, "tbl"))
        .collect();

    let mut blocks: Vec<NodeId> = frames
        .into_iter()
        .filter(|&frame| part.has_descendant(frame, "tbl") && part.has_descendant(frame, "extLst"))
        .collect();

    blocks.extend(
        part.find_all("tbl")
            .into_iter()
            .filter(|tbl| !framed.contains(tbl))
            .filter(|&tbl| part.has_descendant(tbl, "extLst")),
    );
    blocks
}
