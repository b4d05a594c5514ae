//! Region reconstruction strategies.
//!
//! Each strategy takes a [`PixelBuffer`] and a [`Rect`] and rewrites the buffer
//! so an overlay mark inside the rectangle disappears:
//!
//! - **Inpaint-fill**: every pixel in the rectangle becomes the mean of the
//!   surrounding pixels that lie *outside* the rectangle. Single pass; interior
//!   pixels of rectangles wider than `2 * radius + 1` have no exterior samples
//!   and are left as they are.
//! - **Crop-splice**: the full-height column band `[x, x + width)` is removed
//!   and the two remaining halves are joined.
//! - **Box-blur**: every pixel in the rectangle is averaged with its
//!   neighbourhood, indexed linearly over a sub-buffer copy.
//!
//! Rectangles are validated before any pixel is touched.

use image::Rgba;

use crate::error::{Error, Result};
use crate::pixel::{PixelBuffer, Rect};

/// Default sampling radius for inpaint-fill.
pub const DEFAULT_INPAINT_RADIUS: u32 = 5;

/// Default neighbourhood radius for box-blur.
pub const DEFAULT_BLUR_RADIUS: u32 = 10;

/// Reconstruction strategy selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Strategy {
    /// Fill the region from the mean of its exterior neighbourhood.
    Inpaint,
    /// Cut the region's column band out of the image.
    Crop,
    /// Box-blur the region in place.
    Blur,
}

/// Tunables for the reconstruction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Half-size of the square neighbourhood sampled by inpaint-fill.
    pub inpaint_radius: u32,
    /// Half-size of the square neighbourhood averaged by box-blur.
    pub blur_radius: u32,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
            blur_radius: DEFAULT_BLUR_RADIUS,
        }
    }
}

/// Apply `strategy` to `rect` of `buffer`.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] for degenerate or off-buffer rectangles and
/// [`Error::RegionTooLarge`] when a crop would leave no columns. The buffer is
/// untouched on error.
pub fn reconstruct(
    buffer: &mut PixelBuffer,
    rect: Rect,
    strategy: Strategy,
    opts: &ReconstructOptions,
) -> Result<()> {
    log::debug!("reconstructing {rect} with {strategy:?}");
    match strategy {
        Strategy::Inpaint => inpaint_fill(buffer, rect, opts.inpaint_radius),
        Strategy::Crop => crop_splice(buffer, rect),
        Strategy::Blur => box_blur(buffer, rect, opts.blur_radius),
    }
}

/// Reject zero-area rectangles and rectangles whose origin lies outside the buffer.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`].
pub fn validate(buffer: &PixelBuffer, rect: Rect) -> Result<()> {
    if rect.is_degenerate() || rect.x >= buffer.width() || rect.y >= buffer.height() {
        return Err(buffer.invalid(rect));
    }
    Ok(())
}

/// Replace each pixel in `rect` with the mean RGB of its exterior neighbours.
///
/// Neighbours are drawn from the `(2 * radius + 1)` square centred on the pixel,
/// restricted to pixels inside the buffer and outside `rect`. Alpha is kept.
/// Pixels with no qualifying neighbour stay unchanged.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if `rect` fails [`validate`].
pub fn inpaint_fill(buffer: &mut PixelBuffer, rect: Rect, radius: u32) -> Result<()> {
    validate(buffer, rect)?;
    let target = buffer.clip(rect)?;
    let r = i64::from(radius);

    for py in target.y..target.y + target.height {
        for px in target.x..target.x + target.width {
            let (x, y) = (i64::from(px), i64::from(py));
            let mut sum = [0u64; 3];
            let mut count = 0u64;

            for dy in -r..=r {
                for dx in -r..=r {
                    let (sx, sy) = (x + dx, y + dy);
                    // Only exterior pixels seed the fill
                    if rect.contains(sx, sy) || !buffer.in_bounds(sx, sy) {
                        continue;
                    }
                    let sample = buffer.get(sx, sy)?;
                    for ch in 0..3 {
                        sum[ch] += u64::from(sample[ch]);
                    }
                    count += 1;
                }
            }

            if count == 0 {
                continue;
            }

            let mut pixel = buffer.get(x, y)?;
            for ch in 0..3 {
                pixel[ch] = mean(sum[ch], count);
            }
            buffer.set(x, y, pixel)?;
        }
    }

    Ok(())
}

/// Remove the full-height column band `[rect.x, rect.x + rect.width)`.
///
/// The buffer shrinks to exactly `width - rect.width` columns. `rect.y` and
/// `rect.height` are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if `rect` fails [`validate`] or the band
/// runs past the right edge, and [`Error::RegionTooLarge`] if no column would
/// remain.
pub fn crop_splice(buffer: &mut PixelBuffer, rect: Rect) -> Result<()> {
    validate(buffer, rect)?;
    let (width, height) = (buffer.width(), buffer.height());
    if rect.width >= width {
        return Err(Error::RegionTooLarge {
            region_width: rect.width,
            width,
        });
    }
    if rect.right() > u64::from(width) {
        return Err(buffer.invalid(rect));
    }

    let new_width = width - rect.width;
    let mut out = PixelBuffer::new(new_width, height, Rgba([0, 0, 0, 0]));
    for y in 0..height {
        for x in 0..new_width {
            let src_x = if x < rect.x { x } else { x + rect.width };
            let px = buffer.get(i64::from(src_x), i64::from(y))?;
            out.set(i64::from(x), i64::from(y), px)?;
        }
    }

    *buffer = out;
    Ok(())
}

/// Box-blur the pixels of `rect`.
///
/// A sub-buffer covering `rect` plus a `radius` apron (clipped to the buffer)
/// is copied out. For each pixel of `rect` the RGB channels become the mean of
/// the sub-buffer pixels at linear offsets `dy * sub_width + dx`,
/// `dx, dy in -radius..=radius`. Offsets leaving the sub-buffer's linear range
/// are skipped; offsets that run past a row edge wrap into the neighbouring row.
/// Sums read from the unmodified copy. Only `rect` pixels change.
///
/// # Errors
///
/// Returns [`Error::InvalidRegion`] if `rect` fails [`validate`].
pub fn box_blur(buffer: &mut PixelBuffer, rect: Rect, radius: u32) -> Result<()> {
    validate(buffer, rect)?;
    let target = buffer.clip(rect)?;

    let x0 = target.x.saturating_sub(radius);
    let y0 = target.y.saturating_sub(radius);
    #[allow(clippy::cast_possible_truncation)]
    let x1 = (target.right() + u64::from(radius)).min(u64::from(buffer.width())) as u32;
    #[allow(clippy::cast_possible_truncation)]
    let y1 = (target.bottom() + u64::from(radius)).min(u64::from(buffer.height())) as u32;
    let window = Rect::new(x0, y0, x1 - x0, y1 - y0);

    let mut sub = buffer.extract(window)?;
    let snapshot = sub.as_bytes().to_vec();
    let sub_width = i64::from(sub.width());
    let len = sub_width * i64::from(sub.height());
    let r = i64::from(radius);

    for ty in target.y..target.y + target.height {
        for tx in target.x..target.x + target.width {
            let (lx, ly) = (i64::from(tx - x0), i64::from(ty - y0));
            let i = ly * sub_width + lx;
            let mut sum = [0u64; 3];
            let mut count = 0u64;

            for dy in -r..=r {
                for dx in -r..=r {
                    let idx = i + dy * sub_width + dx;
                    if idx < 0 || idx >= len {
                        continue;
                    }
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let base = idx as usize * 4;
                    for ch in 0..3 {
                        sum[ch] += u64::from(snapshot[base + ch]);
                    }
                    count += 1;
                }
            }

            let mut pixel = sub.get(lx, ly)?;
            for ch in 0..3 {
                pixel[ch] = mean(sum[ch], count);
            }
            sub.set(lx, ly, pixel)?;
        }
    }

    buffer.paste(&sub, x0, y0);
    Ok(())
}

/// Integer mean of `count` channel samples, ties rounded to even.
fn mean(sum: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    let (quotient, remainder) = (sum / count, sum % count);
    let rounded = match (2 * remainder).cmp(&count) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
        std::cmp::Ordering::Less => quotient,
    };
    u8::try_from(rounded).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buffer whose channels encode the pixel position: `r = 10x + y`, `g = x * y`.
    fn marker_buffer(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, Rgba([0, 0, 0, 255]));
        for y in 0..height {
            for x in 0..width {
                #[allow(clippy::cast_possible_truncation)]
                let px = Rgba([(10 * x + y) as u8, (x * y) as u8, x as u8, 255]);
                buf.set(i64::from(x), i64::from(y), px).unwrap();
            }
        }
        buf
    }

    #[test]
    fn degenerate_rectangles_leave_buffer_untouched() {
        for strategy in [Strategy::Inpaint, Strategy::Crop, Strategy::Blur] {
            for rect in [Rect::new(2, 2, 0, 3), Rect::new(2, 2, 3, 0)] {
                let mut buf = marker_buffer(8, 8);
                let before = buf.clone();
                let err = reconstruct(&mut buf, rect, strategy, &ReconstructOptions::default());
                assert!(matches!(err, Err(Error::InvalidRegion { .. })));
                assert_eq!(buf.as_bytes(), before.as_bytes());
            }
        }
    }

    #[test]
    fn origin_outside_buffer_is_invalid() {
        let mut buf = marker_buffer(8, 8);
        let err = inpaint_fill(&mut buf, Rect::new(8, 0, 2, 2), 5);
        assert!(matches!(err, Err(Error::InvalidRegion { .. })));
    }

    #[test]
    fn crop_full_width_is_too_large() {
        let mut buf = marker_buffer(12, 4);
        let before = buf.clone();
        let err = crop_splice(&mut buf, Rect::new(0, 0, 12, 1));
        assert!(matches!(
            err,
            Err(Error::RegionTooLarge {
                region_width: 12,
                width: 12
            })
        ));
        assert_eq!(buf, before);
    }

    #[test]
    fn crop_joins_left_and_right_columns() {
        let original = marker_buffer(10, 3);
        let mut buf = original.clone();
        crop_splice(&mut buf, Rect::new(3, 1, 4, 1)).unwrap();

        assert_eq!(buf.width(), 6);
        assert_eq!(buf.height(), 3);
        for y in 0..3 {
            for x in 0..6i64 {
                let src = if x < 3 { x } else { x + 4 };
                assert_eq!(buf.get(x, y).unwrap(), original.get(src, y).unwrap());
            }
        }
    }

    #[test]
    fn crop_band_past_right_edge_is_invalid() {
        let mut buf = marker_buffer(10, 2);
        let before = buf.clone();
        let err = crop_splice(&mut buf, Rect::new(7, 0, 5, 2));
        assert!(matches!(err, Err(Error::InvalidRegion { .. })));
        assert_eq!(buf, before);
    }

    #[test]
    fn crop_band_ending_at_right_edge_shrinks_by_rect_width() {
        let original = marker_buffer(10, 2);
        let mut buf = original.clone();
        crop_splice(&mut buf, Rect::new(7, 0, 3, 2)).unwrap();
        assert_eq!(buf.width(), 7);
        assert_eq!(buf.get(6, 1).unwrap(), original.get(6, 1).unwrap());
    }

    #[test]
    fn mean_rounds_ties_to_even() {
        assert_eq!(mean(5, 2), 2);
        assert_eq!(mean(7, 2), 4);
        assert_eq!(mean(5, 3), 2);
        assert_eq!(mean(4, 3), 1);
        assert_eq!(mean(0, 0), 0);
    }

    #[test]
    fn inpaint_single_pixel_is_exact_exterior_mean() {
        let mut buf = marker_buffer(5, 5);
        buf.set(2, 2, Rgba([0, 0, 0, 77])).unwrap();

        inpaint_fill(&mut buf, Rect::new(2, 2, 1, 1), 1).unwrap();

        // The ring around (2,2) is symmetric, so each bilinear marker averages to its centre value.
        assert_eq!(buf.get(2, 2).unwrap(), Rgba([22, 4, 2, 77]));
    }

    #[test]
    fn inpaint_clips_neighbourhood_at_buffer_edge() {
        let mut buf = PixelBuffer::new(4, 4, Rgba([40, 80, 120, 255]));
        buf.set(0, 0, Rgba([255, 255, 255, 10])).unwrap();
        inpaint_fill(&mut buf, Rect::new(0, 0, 1, 1), 5).unwrap();
        assert_eq!(buf.get(0, 0).unwrap(), Rgba([40, 80, 120, 10]));
    }

    #[test]
    fn inpaint_without_exterior_samples_keeps_pixels() {
        let mut buf = marker_buffer(3, 3);
        let before = buf.clone();
        inpaint_fill(&mut buf, Rect::new(0, 0, 3, 3), 5).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn inpaint_rect_past_edge_is_clipped() {
        let mut buf = PixelBuffer::new(6, 6, Rgba([10, 10, 10, 255]));
        buf.set(5, 5, Rgba([250, 0, 0, 255])).unwrap();
        inpaint_fill(&mut buf, Rect::new(5, 5, 10, 10), 2).unwrap();
        assert_eq!(buf.get(5, 5).unwrap(), Rgba([10, 10, 10, 255]));
    }

    #[test]
    fn blur_of_uniform_region_is_identity() {
        let mut buf = PixelBuffer::new(30, 30, Rgba([5, 6, 7, 200]));
        let before = buf.clone();
        box_blur(&mut buf, Rect::new(5, 5, 10, 10), DEFAULT_BLUR_RADIUS).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn blur_leaves_pixels_outside_rect_alone() {
        let mut original = marker_buffer(20, 20);
        original.set(7, 7, Rgba([255, 255, 255, 255])).unwrap();
        let mut buf = original.clone();
        let rect = Rect::new(6, 6, 4, 4);
        box_blur(&mut buf, rect, 2).unwrap();

        for y in 0..20i64 {
            for x in 0..20i64 {
                if !rect.contains(x, y) {
                    assert_eq!(buf.get(x, y).unwrap(), original.get(x, y).unwrap());
                }
            }
        }
        assert_ne!(buf.get(7, 7).unwrap(), original.get(7, 7).unwrap());
    }
}
