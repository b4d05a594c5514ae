//! Removal of a third-party producer's injected logo from slide layouts.
//!
//! Some presentation generators stamp every exported deck with a linked logo
//! picture placed on the slide layouts, plus a hyperlink relationship back to
//! their site. This pass deletes:
//!
//! - `pic` elements on `ppt/slideLayouts/slideLayoutN.xml` that match the
//!   [`VendorSignature`];
//! - `Relationship` records in the paired `_rels/slideLayoutN.xml.rels` parts
//!   whose target points at the vendor's domain.
//!
//! A deck without layouts is reported as [`VendorOutcome::NoLayout`] and
//! returned untouched.

use crate::archive::{layout_rels_name, Archive};
use crate::error::Result;
use crate::session::{Progress, Session};
use crate::xml::{edit_part, NodeId, XmlPart};

/// Heuristic markers of the vendor's injected content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSignature {
    /// Product name looked for in picture names and descriptions (case-insensitive).
    pub vendor_token: String,
    /// Logo file name looked for in picture descriptions (case-insensitive).
    pub filename_token: String,
    /// Domain looked for in relationship targets (case-insensitive).
    pub domain_token: String,
}

impl Default for VendorSignature {
    fn default() -> Self {
        Self {
            vendor_token: "gamma".to_string(),
            filename_token: "made-with-gamma".to_string(),
            domain_token: "gamma.app".to_string(),
        }
    }
}

impl VendorSignature {
    /// Whether the `pic` element `pic` was injected by the vendor.
    ///
    /// Any one of these is enough: a `hlinkClick` below the picture, the
    /// filename token in its description, or the vendor token in its name or
    /// description.
    #[must_use]
    pub fn matches_picture(&self, part: &XmlPart, pic: NodeId) -> bool {
        if part.has_descendant(pic, "hlinkClick") {
            return true;
        }

        let Some(&props) = part.find_within(pic, "cNvPr").first() else {
            return false;
        };
        let name = part.attribute(props, "name").unwrap_or_default();
        let descr = part.attribute(props, "descr").unwrap_or_default();

        contains_ignore_case(&descr, &self.filename_token)
            || contains_ignore_case(&name, &self.vendor_token)
            || contains_ignore_case(&descr, &self.vendor_token)
    }

    /// Whether a relationship target points at the vendor.
    #[must_use]
    pub fn matches_target(&self, target: &str) -> bool {
        contains_ignore_case(target, &self.domain_token)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// How a vendor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorOutcome {
    /// The archive has no slide layouts; output is the source bytes.
    NoLayout,
    /// Layouts were inspected and nothing matched.
    NoWatermark,
    /// At least one picture or relationship was removed.
    Cleaned,
}

/// Result of a vendor run.
#[derive(Debug, Clone)]
pub struct VendorReport {
    /// How the run ended.
    pub outcome: VendorOutcome,
    /// Output archive bytes.
    pub output: Vec<u8>,
    /// Layout pictures removed.
    pub pictures_removed: usize,
    /// Relationship records removed.
    pub relationships_removed: usize,
    /// Parts rewritten, in processing order.
    pub modified_parts: Vec<String>,
    /// Parts skipped because they could not be parsed.
    pub failed_parts: Vec<String>,
    /// `output.len() - source.len()`, for diagnostics only.
    pub size_delta: i64,
}

/// Signature-driven stripper over slide layouts and their relationships.
#[derive(Debug, Clone, Default)]
pub struct VendorStripper {
    signature: VendorSignature,
}

impl VendorStripper {
    /// Stripper for the built-in vendor signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stripper for a specific signature.
    #[must_use]
    pub fn with_signature(signature: VendorSignature) -> Self {
        Self { signature }
    }

    /// The signature in use.
    #[must_use]
    pub fn signature(&self) -> &VendorSignature {
        &self.signature
    }

    /// Run the layout and relationship passes over the archive in `source`.
    ///
    /// `progress` is called once per layout and once per relationship part.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CorruptArchive`] if `source` is not a zip
    /// archive and [`crate::Error::Io`] if it cannot be re-serialized. Parse
    /// failures of single parts are logged and skipped.
    pub fn run(
        &self,
        session: &mut Session,
        source: &[u8],
        mut progress: impl FnMut(Progress),
    ) -> Result<VendorReport> {
        session.reset();
        let mut archive = Archive::load(source)?;
        let log = session.log_mut();

        let layouts = archive.layout_parts();
        if layouts.is_empty() {
            log.warn(format!(
                "no slide layouts found; not a {} document",
                self.signature.vendor_token
            ));
            return Ok(VendorReport {
                outcome: VendorOutcome::NoLayout,
                output: source.to_vec(),
                pictures_removed: 0,
                relationships_removed: 0,
                modified_parts: Vec::new(),
                failed_parts: Vec::new(),
                size_delta: 0,
            });
        }

        let rels: Vec<String> = layouts
            .iter()
            .filter_map(|layout| layout_rels_name(layout))
            .filter(|name| archive.get(name).is_some())
            .collect();
        log.info(format!(
            "found {} layout(s), {} relationship part(s)",
            layouts.len(),
            rels.len()
        ));

        let total = layouts.len() + rels.len();
        let mut done = 0;
        let mut replacements = Vec::new();
        let mut failed_parts = Vec::new();
        let mut pictures_removed = 0;
        let mut relationships_removed = 0;

        for name in &layouts {
            let bytes = archive.get(name).unwrap_or_default();
            let mut removed = 0;
            let edited = edit_part(name, bytes, |part| {
                removed = self.strip_layout(part);
                Ok(removed)
            });
            match edited {
                Ok(Some(out)) => {
                    log.success(format!("{name}: removed {removed} logo picture(s)"));
                    pictures_removed += removed;
                    replacements.push((name.clone(), out));
                }
                Ok(None) => log.info(format!("{name}: no logo pictures")),
                Err(e) => {
                    log.error(format!("{e}; part left unchanged"));
                    failed_parts.push(name.clone());
                }
            }
            done += 1;
            progress(Progress { done, total });
        }

        for name in &rels {
            let bytes = archive.get(name).unwrap_or_default();
            let mut removed = 0;
            let edited = edit_part(name, bytes, |part| {
                removed = self.strip_relationships(part);
                Ok(removed)
            });
            match edited {
                Ok(Some(out)) => {
                    log.success(format!("{name}: removed {removed} relationship(s)"));
                    relationships_removed += removed;
                    replacements.push((name.clone(), out));
                }
                Ok(None) => log.info(format!("{name}: no vendor relationships")),
                Err(e) => {
                    log.error(format!("{e}; part left unchanged"));
                    failed_parts.push(name.clone());
                }
            }
            done += 1;
            progress(Progress { done, total });
        }

        let outcome = if replacements.is_empty() {
            log.info(format!(
                "no {} watermark found",
                self.signature.vendor_token
            ));
            VendorOutcome::NoWatermark
        } else {
            VendorOutcome::Cleaned
        };

        let modified_parts: Vec<String> = replacements.iter().map(|(n, _)| n.clone()).collect();
        for (name, out) in replacements {
            archive.replace(&name, out);
        }
        let output = archive.serialize()?;

        let size_delta = byte_len(&output) - byte_len(source);
        if outcome == VendorOutcome::Cleaned {
            log.success(format!(
                "removed {pictures_removed} picture(s) and {relationships_removed} relationship(s); size changed by {size_delta} bytes"
            ));
        }

        Ok(VendorReport {
            outcome,
            output,
            pictures_removed,
            relationships_removed,
            modified_parts,
            failed_parts,
            size_delta,
        })
    }

    fn strip_layout(&self, part: &mut XmlPart) -> usize {
        let doomed: Vec<NodeId> = part
            .find_all("pic")
            .into_iter()
            .filter(|&pic| self.signature.matches_picture(part, pic))
            .collect();
        part.remove_subtrees(&doomed)
    }

    fn strip_relationships(&self, part: &mut XmlPart) -> usize {
        let doomed: Vec<NodeId> = part
            .find_all("Relationship")
            .into_iter()
            .filter(|&rel| {
                part.attribute(rel, "Target")
                    .is_some_and(|target| self.signature.matches_target(&target))
            })
            .collect();
        part.remove_subtrees(&doomed)
    }
}

fn byte_len(bytes: &[u8]) -> i64 {
    i64::try_from(bytes.len()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::build_zip;

    const LINKED_LOGO: &str = r#"<p:sldLayout xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree><p:pic><p:nvPicPr><p:cNvPr id="7" name="Picture 6"><a:hlinkClick r:id="rId3"/></p:cNvPr></p:nvPicPr></p:pic><p:pic><p:nvPicPr><p:cNvPr id="8" name="Company logo" descr="logo.png"/></p:nvPicPr></p:pic></p:spTree></p:cSld></p:sldLayout>"#;

    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="slideMaster" Target="../slideMasters/slideMaster1.xml"/><Relationship Id="rId3" Type="hyperlink" Target="https://GAMMA.app/?utm_source=export" TargetMode="External"/></Relationships>"#;

    fn pic_with(name: &str, descr: &str) -> String {
        format!(
            r#"<p:sldLayout xmlns:p="p"><p:pic><p:nvPicPr><p:cNvPr id="1" name="{name}" descr="{descr}"/></p:nvPicPr></p:pic></p:sldLayout>"#
        )
    }

    #[test]
    fn signature_matches_each_marker_alone() {
        let sig = VendorSignature::default();
        for (name, descr, expected) in [
            ("Logo", "made-with-GAMMA.png", true),
            ("Gamma badge", "", true),
            ("Picture 2", "Created in gamma", true),
            ("Picture 2", "company logo", false),
        ] {
            let part = XmlPart::parse(pic_with(name, descr).as_bytes()).unwrap();
            let pic = part.find_all("pic")[0];
            assert_eq!(sig.matches_picture(&part, pic), expected, "{name} / {descr}");
        }
        assert!(sig.matches_target("https://gamma.app/docs"));
        assert!(!sig.matches_target("../media/image1.png"));
    }

    #[test]
    fn hyperlinked_picture_is_removed_alone() {
        let zip = build_zip(&[
            ("ppt/slideLayouts/slideLayout1.xml", LINKED_LOGO.as_bytes()),
            ("ppt/slideLayouts/_rels/slideLayout1.xml.rels", RELS.as_bytes()),
        ]);
        let mut session = Session::new();
        let report = VendorStripper::new().run(&mut session, &zip, |_| {}).unwrap();

        assert_eq!(report.outcome, VendorOutcome::Cleaned);
        assert_eq!(report.pictures_removed, 1);
        assert_eq!(report.relationships_removed, 1);

        let archive = Archive::load(&report.output).unwrap();
        let layout =
            String::from_utf8(archive.get("ppt/slideLayouts/slideLayout1.xml").unwrap().to_vec()).unwrap();
        assert!(!layout.contains("hlinkClick"));
        assert!(layout.contains("Company logo"));

        let rels = String::from_utf8(
            archive
                .get("ppt/slideLayouts/_rels/slideLayout1.xml.rels")
                .unwrap()
                .to_vec(),
        )
        .unwrap();
        assert!(rels.contains("slideMaster1.xml"));
        assert!(!rels.to_lowercase().contains("gamma.app"));
    }

    #[test]
    fn missing_layouts_short_circuit() {
        let zip = build_zip(&[("ppt/slides/slide1.xml", b"<p:sld/>")]);
        let mut session = Session::new();
        let report = VendorStripper::new().run(&mut session, &zip, |_| {}).unwrap();
        assert_eq!(report.outcome, VendorOutcome::NoLayout);
        assert_eq!(report.output, zip);
        assert_eq!(session.log().count(crate::session::Severity::Warning), 1);
    }

    #[test]
    fn clean_layouts_report_no_watermark() {
        let layout = pic_with("Picture 2", "company logo");
        let zip = build_zip(&[("ppt/slideLayouts/slideLayout1.xml", layout.as_bytes())]);
        let report = VendorStripper::new()
            .run(&mut Session::new(), &zip, |_| {})
            .unwrap();
        assert_eq!(report.outcome, VendorOutcome::NoWatermark);
        assert!(report.modified_parts.is_empty());

        let archive = Archive::load(&report.output).unwrap();
        assert_eq!(
            archive.get("ppt/slideLayouts/slideLayout1.xml").unwrap(),
            layout.as_bytes()
        );
    }

    #[test]
    fn malformed_layout_is_logged_and_kept() {
        let zip = build_zip(&[
            ("ppt/slideLayouts/slideLayout1.xml", b"<p:sldLayout><p:pic>"),
            ("ppt/slideLayouts/slideLayout2.xml", LINKED_LOGO.as_bytes()),
        ]);
        let mut session = Session::new();
        let report = VendorStripper::new().run(&mut session, &zip, |_| {}).unwrap();
        assert_eq!(report.outcome, VendorOutcome::Cleaned);
        assert_eq!(report.failed_parts, vec!["ppt/slideLayouts/slideLayout1.xml"]);
        assert_eq!(report.modified_parts, vec!["ppt/slideLayouts/slideLayout2.xml"]);
    }
}
