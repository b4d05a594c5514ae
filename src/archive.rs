//! In-memory zip container with selective entry replacement.
//!
//! An [`Archive`] is loaded once, has zero or more entries replaced, and is
//! serialized back. Entries that were never replaced are re-emitted with their
//! loaded content, name, order, compression method and timestamp, so a
//! document surgery run only changes the parts it actually edited.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const LAYOUT_PREFIX: &str = "ppt/slideLayouts/slideLayout";
const LAYOUT_RELS_DIR: &str = "ppt/slideLayouts/_rels/";

/// One named entry of an [`Archive`].
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    compression: CompressionMethod,
    last_modified: Option<zip::DateTime>,
    unix_mode: Option<u32>,
}

impl ArchiveEntry {
    /// Entry path inside the archive.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed entry content. Empty for directories.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether this entry is a directory marker.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn options(&self) -> SimpleFileOptions {
        let method = match self.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let mut options = SimpleFileOptions::default().compression_method(method);
        if let Some(modified) = self.last_modified {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = self.unix_mode {
            options = options.unix_permissions(mode);
        }
        options
    }
}

/// The complete entry set of one packaged document.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Read every entry of a zip archive into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if `bytes` is not a readable zip
    /// archive or any entry fails to decompress. No partial archive is returned.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut archive = Archive::default();

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)
                    .map_err(|e| Error::CorruptArchive(format!("{}: {e}", file.name())))?;
            }

            archive.push(ArchiveEntry {
                name: file.name().to_string(),
                data,
                is_dir: file.is_dir(),
                compression: file.compression(),
                last_modified: file.last_modified(),
                unix_mode: file.unix_mode(),
            });
        }

        log::debug!("loaded archive with {} entries", archive.len());
        Ok(archive)
    }

    /// Overwrite the content of `name`, or append it as a new file entry.
    pub fn replace(&mut self, name: &str, data: Vec<u8>) {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].data = data;
            self.entries[i].is_dir = false;
            return;
        }

        self.push(ArchiveEntry {
            name: name.to_string(),
            data,
            is_dir: false,
            compression: CompressionMethod::Deflated,
            last_modified: None,
            unix_mode: None,
        });
    }

    /// Write all entries, in load order, into a new zip archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the zip writer fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), entry.options())
                    .map_err(write_error)?;
            } else {
                zip.start_file(entry.name.as_str(), entry.options())
                    .map_err(write_error)?;
                zip.write_all(&entry.data)?;
            }
        }

        Ok(zip.finish().map_err(write_error)?.into_inner())
    }

    /// Content of the entry called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entry(name).map(ArchiveEntry::data)
    }

    /// The entry called `name`.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Entries in load order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slide part names (`ppt/slides/slideN.xml`), ordered by `N`.
    #[must_use]
    pub fn slide_parts(&self) -> Vec<String> {
        self.numbered_parts(slide_number)
    }

    /// Slide layout part names (`ppt/slideLayouts/slideLayoutN.xml`), ordered by `N`.
    #[must_use]
    pub fn layout_parts(&self) -> Vec<String> {
        self.numbered_parts(layout_number)
    }

    fn numbered_parts(&self, number: fn(&str) -> Option<u32>) -> Vec<String> {
        let mut parts: Vec<(u32, &str)> = self
            .entries
            .iter()
            .filter(|e| !e.is_dir)
            .filter_map(|e| number(&e.name).map(|n| (n, e.name.as_str())))
            .collect();
        parts.sort_by_key(|&(n, _)| n);
        parts.into_iter().map(|(_, name)| name.to_string()).collect()
    }

    fn push(&mut self, entry: ArchiveEntry) {
        if let Some(&i) = self.index.get(&entry.name) {
            log::warn!("duplicate archive entry {}, keeping the last copy", entry.name);
            self.entries[i] = entry;
            return;
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
    }
}

fn write_error(err: zip::result::ZipError) -> Error {
    Error::Io(std::io::Error::other(err))
}

/// `N` of a `<prefix>N.xml` name, where `N` is all digits.
fn numbered(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Slide number of a `ppt/slides/slideN.xml` part name.
#[must_use]
pub fn slide_number(name: &str) -> Option<u32> {
    numbered(name, SLIDE_PREFIX)
}

/// Layout number of a `ppt/slideLayouts/slideLayoutN.xml` part name.
#[must_use]
pub fn layout_number(name: &str) -> Option<u32> {
    numbered(name, LAYOUT_PREFIX)
}

/// Relationship part paired with a layout part.
///
/// `ppt/slideLayouts/slideLayout3.xml` pairs with
/// `ppt/slideLayouts/_rels/slideLayout3.xml.rels`.
#[must_use]
pub fn layout_rels_name(layout: &str) -> Option<String> {
    let n = layout_number(layout)?;
    Some(format!("{LAYOUT_RELS_DIR}slideLayout{n}.xml.rels"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a zip in memory from `(name, content)` pairs; names ending in `/` become directories.
    pub(crate) fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn sample() -> Vec<u8> {
        build_zip(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("ppt/", b""),
            ("ppt/slides/slide10.xml", b"<p:sld>ten</p:sld>"),
            ("ppt/slides/slide2.xml", b"<p:sld>two</p:sld>"),
            ("ppt/media/image1.png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 255]),
            ("ppt/slideLayouts/slideLayout1.xml", b"<p:sldLayout/>"),
        ])
    }

    #[test]
    fn round_trip_preserves_every_entry() {
        let archive = Archive::load(&sample()).unwrap();
        let reloaded = Archive::load(&archive.serialize().unwrap()).unwrap();

        assert_eq!(archive.len(), reloaded.len());
        for (a, b) in archive.entries().zip(reloaded.entries()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.data(), b.data());
            assert_eq!(a.is_dir(), b.is_dir());
        }
    }

    #[test]
    fn replace_changes_only_the_named_entry() {
        let mut archive = Archive::load(&sample()).unwrap();
        archive.replace("ppt/slides/slide2.xml", b"<p:sld/>".to_vec());

        let reloaded = Archive::load(&archive.serialize().unwrap()).unwrap();
        assert_eq!(reloaded.get("ppt/slides/slide2.xml").unwrap(), b"<p:sld/>");
        assert_eq!(
            reloaded.get("ppt/slides/slide10.xml").unwrap(),
            b"<p:sld>ten</p:sld>"
        );
        assert_eq!(
            reloaded.get("ppt/media/image1.png").unwrap(),
            &[0x89, b'P', b'N', b'G', 0, 1, 2, 255]
        );
        assert_eq!(reloaded.len(), archive.len());
    }

    #[test]
    fn replace_unknown_name_appends() {
        let mut archive = Archive::load(&sample()).unwrap();
        let before = archive.len();
        archive.replace("docProps/custom.xml", b"<x/>".to_vec());
        assert_eq!(archive.len(), before + 1);
        assert_eq!(archive.entries().last().unwrap().name(), "docProps/custom.xml");
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        assert!(matches!(
            Archive::load(b"definitely not a zip"),
            Err(Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn slide_parts_are_sorted_numerically() {
        let archive = Archive::load(&sample()).unwrap();
        assert_eq!(
            archive.slide_parts(),
            vec!["ppt/slides/slide2.xml", "ppt/slides/slide10.xml"]
        );
        assert_eq!(
            archive.layout_parts(),
            vec!["ppt/slideLayouts/slideLayout1.xml"]
        );
    }

    #[test]
    fn part_name_conventions() {
        assert_eq!(slide_number("ppt/slides/slide7.xml"), Some(7));
        assert_eq!(slide_number("ppt/slides/_rels/slide7.xml.rels"), None);
        assert_eq!(slide_number("ppt/slides/slide.xml"), None);
        assert_eq!(slide_number("ppt/slides/slideA.xml"), None);
        assert_eq!(layout_number("ppt/slideLayouts/slideLayout12.xml"), Some(12));
        assert_eq!(
            layout_rels_name("ppt/slideLayouts/slideLayout12.xml").as_deref(),
            Some("ppt/slideLayouts/_rels/slideLayout12.xml.rels")
        );
        assert_eq!(layout_rels_name("ppt/slides/slide1.xml"), None);
    }
}
