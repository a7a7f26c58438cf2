//! Screenshot images and exact pixel comparison
//!
//! Two renders are "pixel-equal" only when their dimensions match and an
//! exact, zero-tolerance per-pixel comparison finds zero differing pixels.
//! A dimension mismatch is the cheap subtype of mismatch: it short-circuits
//! the pixel walk entirely.

use crate::error::DriverError;

/// RGBA8 raster image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// Width in physical pixels
    pub width: u32,
    /// Height in physical pixels
    pub height: u32,
    /// RGBA8 pixel buffer, row-major, `width * height * 4` bytes
    pub data: Vec<u8>,
}

impl RasterImage {
    /// Build an image from an RGBA8 buffer
    ///
    /// # Panics
    /// Panics if the buffer length is not `width * height * 4`.
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "RGBA buffer length mismatch"
        );
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode a PNG screenshot into RGBA8
    pub fn from_png_bytes(bytes: &[u8]) -> Result<Self, DriverError> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self {
            width,
            height,
            data: decoded.into_raw(),
        })
    }

    /// Encode as PNG (diagnostic dumps)
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, DriverError> {
        let mut out = Vec::new();
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| {
                DriverError::Screenshot("raster buffer does not match dimensions".to_string())
            })?;
        image::DynamicImage::ImageRgba8(buffer)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)?;
        Ok(out)
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Outcome of comparing a current render against a baseline
#[derive(Debug, Clone)]
pub enum PixelComparison {
    /// Dimensions differ; pixels were never compared
    SizeMismatch {
        /// Baseline dimensions
        expected: (u32, u32),
        /// Current dimensions
        actual: (u32, u32),
    },
    /// Dimensions match; exact per-pixel comparison ran
    Pixels {
        /// Number of differing pixels (zero means pixel-equal)
        differing: u64,
        /// Diff visualization: desaturated baseline with differing pixels in red
        diff: RasterImage,
    },
}

impl PixelComparison {
    /// True iff dimensions matched and zero pixels differ
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Pixels { differing: 0, .. })
    }
}

/// Compare a current render against its baseline, zero tolerance
#[must_use]
pub fn compare(baseline: &RasterImage, current: &RasterImage) -> PixelComparison {
    if baseline.dimensions() != current.dimensions() {
        return PixelComparison::SizeMismatch {
            expected: baseline.dimensions(),
            actual: current.dimensions(),
        };
    }

    let mut differing = 0u64;
    let mut diff = Vec::with_capacity(baseline.data.len());

    for (base_px, cur_px) in baseline.data.chunks_exact(4).zip(current.data.chunks_exact(4)) {
        if base_px == cur_px {
            // Desaturate matching pixels so differences stand out.
            let gray = ((u16::from(base_px[0])
                + u16::from(base_px[1])
                + u16::from(base_px[2]))
                / 3) as u8;
            diff.extend_from_slice(&[gray, gray, gray, base_px[3]]);
        } else {
            differing += 1;
            diff.extend_from_slice(&[255, 0, 0, 255]);
        }
    }

    PixelComparison::Pixels {
        differing,
        diff: RasterImage::new(baseline.width, baseline.height, diff),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RasterImage {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        RasterImage::new(width, height, data)
    }

    #[test]
    fn identical_images_match() {
        let a = solid(4, 4, [10, 20, 30, 255]);
        let b = a.clone();
        let cmp = compare(&a, &b);
        assert!(cmp.is_match());
        match cmp {
            PixelComparison::Pixels { differing, .. } => assert_eq!(differing, 0),
            PixelComparison::SizeMismatch { .. } => panic!("sizes match"),
        }
    }

    #[test]
    fn single_pixel_difference_is_a_mismatch() {
        let a = solid(4, 4, [10, 20, 30, 255]);
        let mut b = a.clone();
        b.data[0] ^= 1; // off by one in one channel
        let cmp = compare(&a, &b);
        assert!(!cmp.is_match());
        match cmp {
            PixelComparison::Pixels { differing, diff } => {
                assert_eq!(differing, 1);
                // Differing pixel painted red in the visualization.
                assert_eq!(&diff.data[0..4], &[255, 0, 0, 255]);
            }
            PixelComparison::SizeMismatch { .. } => panic!("sizes match"),
        }
    }

    #[test]
    fn dimension_mismatch_short_circuits() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        let b = solid(4, 5, [0, 0, 0, 255]);
        match compare(&a, &b) {
            PixelComparison::SizeMismatch { expected, actual } => {
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 5));
            }
            PixelComparison::Pixels { .. } => panic!("expected size mismatch"),
        }
    }

    #[test]
    fn png_round_trip_preserves_pixels() {
        let a = solid(3, 2, [1, 2, 3, 255]);
        let png = a.to_png_bytes().unwrap();
        let back = RasterImage::from_png_bytes(&png).unwrap();
        assert_eq!(a, back);
    }
}
