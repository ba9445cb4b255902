use crate::error::CoreError;

/// A decoded thumbnail: RGBA pixels, 4 bytes per pixel, row-major order.
///
/// This is the unit the cache stores and accounts for; its cost is the
/// length of the pixel buffer, not an entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl Thumbnail {
    /// Wrap an RGBA buffer, checking that its length matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> crate::Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(CoreError::InvalidBuffer {
                width,
                height,
                expected,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A square thumbnail filled with one colour.
    pub fn solid(side: u32, rgba: [u8; 4]) -> Self {
        Self {
            width: side,
            height: side,
            pixels: rgba.repeat(side as usize * side as usize),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Bytes of decoded pixel data held by this thumbnail.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_thumbnail_size_matches_area() {
        let t = Thumbnail::solid(200, [1, 2, 3, 255]);
        assert_eq!(t.byte_size(), 200 * 200 * 4);
        assert_eq!(t.pixel(199, 199), Some([1, 2, 3, 255]));
        assert_eq!(t.pixel(200, 0), None);
    }

    #[test]
    fn from_rgba_rejects_short_buffer() {
        let err = Thumbnail::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidBuffer {
                expected: 16,
                len: 15,
                ..
            }
        ));
    }
}
