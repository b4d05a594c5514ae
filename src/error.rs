//! Error types for the watermark-surgeon crate.

/// Errors that can occur during region reconstruction and document surgery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rectangle has zero area or its origin lies outside the buffer.
    #[error("invalid region {width}x{height} at ({x},{y}) for {buffer_width}x{buffer_height} buffer")]
    InvalidRegion {
        /// Region left edge.
        x: u32,
        /// Region top edge.
        y: u32,
        /// Region width.
        width: u32,
        /// Region height.
        height: u32,
        /// Buffer width in pixels.
        buffer_width: u32,
        /// Buffer height in pixels.
        buffer_height: u32,
    },

    /// A pixel access fell outside the buffer.
    #[error("pixel ({x},{y}) out of bounds for {width}x{height} buffer")]
    OutOfBounds {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Buffer width in pixels.
        width: u32,
        /// Buffer height in pixels.
        height: u32,
    },

    /// Crop-splice would leave an image with no columns.
    #[error("region of width {region_width} is too large to crop from {width}px wide image")]
    RegionTooLarge {
        /// Width of the slice that was requested.
        region_width: u32,
        /// Width of the buffer.
        width: u32,
    },

    /// The input bytes are not a readable zip archive.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// An archive part could not be parsed as XML.
    #[error("malformed XML in {part}: {message}")]
    MalformedXml {
        /// Archive entry name (empty when parsing detached text).
        part: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The input does not match the kind the operation expects.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error occurred while decoding or encoding an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::CorruptArchive(err.to_string())
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedInput("report.docx".to_string());
        assert!(unsupported.to_string().contains("report.docx"));

        let too_large = Error::RegionTooLarge {
            region_width: 64,
            width: 64,
        };
        assert!(too_large.to_string().contains("64px"));

        let invalid = Error::InvalidRegion {
            x: 3,
            y: 4,
            width: 0,
            height: 10,
            buffer_width: 20,
            buffer_height: 30,
        };
        let msg = invalid.to_string();
        assert!(msg.contains("0x10"));
        assert!(msg.contains("(3,4)"));
        assert!(msg.contains("20x30"));
    }

    #[test]
    fn malformed_xml_names_the_part() {
        let err = Error::MalformedXml {
            part: "ppt/slides/slide2.xml".to_string(),
            message: "unexpected end".to_string(),
        };
        assert!(err.to_string().contains("ppt/slides/slide2.xml"));
    }
}
