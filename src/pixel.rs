//! Bounds-checked RGBA pixel grid and the rectangles that address it.

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// A rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle from its origin and size.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    /// Whether the rectangle covers no pixels.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `(x, y)` lies inside the rectangle. Accepts coordinates outside the buffer.
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= i64::from(self.x)
            && y >= i64::from(self.y)
            && i128::from(x) < i128::from(self.right())
            && i128::from(y) < i128::from(self.bottom())
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

impl std::str::FromStr for Rect {
    type Err = Error;

    /// Parse `X,Y,WIDTH,HEIGHT`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::UnsupportedInput(format!("region '{s}': {e}")))?;

        match parts.as_slice() {
            &[x, y, width, height] => Ok(Self::new(x, y, width, height)),
            _ => Err(Error::UnsupportedInput(format!(
                "region '{s}' must be X,Y,WIDTH,HEIGHT"
            ))),
        }
    }
}

/// A row-major RGBA pixel grid, four bytes per pixel.
///
/// All region algorithms read and write through [`PixelBuffer::get`] and
/// [`PixelBuffer::set`], which clip against the buffer edges independently of
/// any requested rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Create a buffer filled with `fill`.
    #[must_use]
    pub fn new(width: u32, height: u32, fill: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, fill),
        }
    }

    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedInput`] if `bytes.len() != width * height * 4`.
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        RgbaImage::from_raw(width, height, bytes)
            .filter(|_| len as u64 == u64::from(width) * u64::from(height) * 4)
            .map(|image| Self { image })
            .ok_or_else(|| {
                Error::UnsupportedInput(format!(
                    "{len} bytes cannot back a {width}x{height} RGBA buffer"
                ))
            })
    }

    /// Buffer width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Buffer height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw row-major RGBA bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Whether `(x, y)` addresses a pixel of this buffer.
    #[must_use]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width()) && y < i64::from(self.height())
    }

    /// Read the pixel at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the coordinate lies outside the buffer.
    pub fn get(&self, x: i64, y: i64) -> Result<Rgba<u8>> {
        let (px, py) = self.checked(x, y)?;
        Ok(*self.image.get_pixel(px, py))
    }

    /// Write the pixel at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the coordinate lies outside the buffer.
    pub fn set(&mut self, x: i64, y: i64, value: Rgba<u8>) -> Result<()> {
        let (px, py) = self.checked(x, y)?;
        self.image.put_pixel(px, py, value);
        Ok(())
    }

    /// Copy the clipped rectangle into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegion`] if nothing of `rect` overlaps the buffer.
    pub fn extract(&self, rect: Rect) -> Result<PixelBuffer> {
        let clipped = self.clip(rect)?;
        let mut out = PixelBuffer::new(clipped.width, clipped.height, Rgba([0, 0, 0, 0]));
        for dy in 0..clipped.height {
            for dx in 0..clipped.width {
                let px = self.get(i64::from(clipped.x + dx), i64::from(clipped.y + dy))?;
                out.set(i64::from(dx), i64::from(dy), px)?;
            }
        }
        Ok(out)
    }

    /// Write `src` with its top-left corner at `(x, y)`, dropping pixels that fall off the edge.
    pub fn paste(&mut self, src: &PixelBuffer, x: u32, y: u32) {
        for sy in 0..src.height() {
            for sx in 0..src.width() {
                let (tx, ty) = (i64::from(x) + i64::from(sx), i64::from(y) + i64::from(sy));
                if self.in_bounds(tx, ty) {
                    let px = *src.image.get_pixel(sx, sy);
                    self.image.put_pixel(
                        u32::try_from(tx).unwrap_or_default(),
                        u32::try_from(ty).unwrap_or_default(),
                        px,
                    );
                }
            }
        }
    }

    /// Intersect `rect` with the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRegion`] if the intersection is empty.
    pub fn clip(&self, rect: Rect) -> Result<Rect> {
        let right = rect.right().min(u64::from(self.width()));
        let bottom = rect.bottom().min(u64::from(self.height()));
        if rect.is_degenerate() || u64::from(rect.x) >= right || u64::from(rect.y) >= bottom {
            return Err(self.invalid(rect));
        }
        #[allow(clippy::cast_possible_truncation)]
        let (width, height) = (
            (right - u64::from(rect.x)) as u32,
            (bottom - u64::from(rect.y)) as u32,
        );
        Ok(Rect::new(rect.x, rect.y, width, height))
    }

    /// Build the [`Error::InvalidRegion`] for `rect` against this buffer.
    pub(crate) fn invalid(&self, rect: Rect) -> Error {
        Error::InvalidRegion {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            buffer_width: self.width(),
            buffer_height: self.height(),
        }
    }

    /// Unwrap into the underlying image.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn checked(&self, x: i64, y: i64) -> Result<(u32, u32)> {
        if !self.in_bounds(x, y) {
            return Err(Error::OutOfBounds {
                x,
                y,
                width: self.width(),
                height: self.height(),
            });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let coords = (x as u32, y as u32);
        Ok(coords)
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}
