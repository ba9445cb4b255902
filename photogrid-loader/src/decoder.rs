//! Bounded-memory thumbnail decoding.
//!
//! Every decode probes the image bounds first, picks a power-of-two
//! subsampling factor from them, decodes at that reduced resolution, and
//! finally scales and centre-crops to an exact square.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage, RgbaImage};
use jpeg_decoder::PixelFormat;
use tracing::debug;

use photogrid_core::{LoaderConfig, Thumbnail, MAX_SOURCE_PIXELS};

use crate::error::DecodeError;
use crate::memory::host_memory;

/// Largest reduction a JPEG's IDCT can apply while decoding.
const MAX_DCT_SCALE: u32 = 8;

// ---------------------------------------------------------------------------
// Subsampling arithmetic
// ---------------------------------------------------------------------------

/// Largest power of two that is `<= n` (0 for 0).
///
/// Folds the high bit into every lower bit, then subtracts the value shifted
/// right by one, leaving only the top bit.
#[inline]
pub fn round_down_pow2(mut n: u32) -> u32 {
    n |= n >> 1;
    n |= n >> 2;
    n |= n >> 4;
    n |= n >> 8;
    n |= n >> 16;
    n - (n >> 1)
}

/// Subsampling factor for a `width × height` source and a square `target`.
///
/// `ceil(min(width, height) / target)` rounded down to a power of two, and
/// never less than 1.
pub fn sample_factor(width: u32, height: u32, target: u32) -> u32 {
    if target == 0 {
        return 1;
    }
    let scale = width.min(height) as f64 / target as f64;
    let ceil = scale.ceil();
    if ceil < 1.0 {
        return 1;
    }
    round_down_pow2(ceil as u32).max(1)
}

// ---------------------------------------------------------------------------
// Codec seam
// ---------------------------------------------------------------------------

/// The image-decoding collaborator: bounds probing and subsampled decode.
pub trait Codec: Send + Sync {
    /// Read `(width, height)` without allocating a pixel buffer.
    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decode `path` reduced by `sample` in each dimension.
    fn decode_sampled(&self, path: &Path, sample: u32) -> Result<RgbaImage, DecodeError>;
}

/// [`Codec`] backed by `jpeg-decoder` for JPEG and the `image` crate for
/// everything else.
///
/// JPEGs are reduced inside the IDCT (by up to 1/8), so the full-resolution
/// buffer is never allocated; any factor beyond that is applied to the
/// already reduced buffer. `image` has no such scaling, so other formats are
/// decoded whole and subsampled right after. Both paths run under an
/// allocation limit derived from the source pixel limit.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    max_source_pixels: u64,
}

impl ImageCodec {
    pub fn new(max_source_pixels: u64) -> Self {
        Self { max_source_pixels }
    }

    fn max_alloc(&self) -> u64 {
        self.max_source_pixels.saturating_mul(4)
    }

    fn open(path: &Path) -> Result<ImageReader<BufReader<File>>, DecodeError> {
        let io_err = |source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };
        ImageReader::open(path)
            .map_err(io_err)?
            .with_guessed_format()
            .map_err(io_err)
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(MAX_SOURCE_PIXELS)
    }
}

impl ImageCodec {
    /// Decode a JPEG with the IDCT doing as much of `sample` as it can.
    ///
    /// `Ok(None)` for colour models the `image` path handles better (CMYK,
    /// 16-bit grey); nothing has been decoded in that case.
    fn decode_jpeg_scaled(
        &self,
        path: &Path,
        sample: u32,
    ) -> Result<Option<RgbaImage>, DecodeError> {
        let jpeg_err = |source| DecodeError::Jpeg {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
        let max_buffer = usize::try_from(self.max_alloc()).unwrap_or(usize::MAX);
        decoder.set_max_decoding_buffer_size(max_buffer);
        decoder.read_info().map_err(jpeg_err)?;
        let Some(info) = decoder.info() else {
            return Ok(None);
        };
        if !matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) {
            return Ok(None);
        }

        let (src_w, src_h) = (u32::from(info.width), u32::from(info.height));
        let dct = sample.clamp(1, MAX_DCT_SCALE);
        let requested_w = u16::try_from((src_w / dct).max(1)).unwrap_or(u16::MAX);
        let requested_h = u16::try_from((src_h / dct).max(1)).unwrap_or(u16::MAX);
        let (w, h) = decoder.scale(requested_w, requested_h).map_err(jpeg_err)?;
        let pixels = decoder.decode().map_err(jpeg_err)?;

        let (w, h) = (u32::from(w), u32::from(h));
        let img = match info.pixel_format {
            PixelFormat::L8 => GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
            _ => RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
        };
        let Some(img) = img else {
            return Err(DecodeError::EmptyImage {
                path: path.to_path_buf(),
            });
        };

        let (out_w, out_h) = ((src_w / sample).max(1), (src_h / sample).max(1));
        let img = if img.width() > out_w || img.height() > out_h {
            img.resize_exact(out_w, out_h, FilterType::Nearest)
        } else {
            img
        };
        debug!(
            path = %path.display(),
            sample,
            dct,
            decoded_w = w,
            decoded_h = h,
            "Decoded JPEG at reduced scale"
        );
        Ok(Some(img.into_rgba8()))
    }
}

impl Codec for ImageCodec {
    fn probe(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        Self::open(path)?
            .into_dimensions()
            .map_err(|source| DecodeError::Image {
                path: path.to_path_buf(),
                source,
            })
    }

    fn decode_sampled(&self, path: &Path, sample: u32) -> Result<RgbaImage, DecodeError> {
        let mut reader = Self::open(path)?;
        if sample > 1 && reader.format() == Some(ImageFormat::Jpeg) {
            if let Some(img) = self.decode_jpeg_scaled(path, sample)? {
                return Ok(img);
            }
        }

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc());
        reader.limits(limits);

        let img = reader.decode().map_err(|source| DecodeError::Image {
            path: path.to_path_buf(),
            source,
        })?;

        let sample = sample.max(1);
        let img = if sample > 1 {
            let w = (img.width() / sample).max(1);
            let h = (img.height() / sample).max(1);
            img.resize_exact(w, h, FilterType::Nearest)
        } else {
            img
        };
        Ok(img.into_rgba8())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Produces a square thumbnail for a path. Called from worker threads only.
pub trait Decode: Send + Sync {
    fn decode(&self, path: &Path, target: u32) -> Result<Thumbnail, DecodeError>;
}

/// The probe / subsample / crop pipeline over a [`Codec`].
pub struct ThumbnailDecoder<C = ImageCodec> {
    codec: C,
    max_source_pixels: u64,
}

impl ThumbnailDecoder<ImageCodec> {
    pub fn from_config(config: &LoaderConfig) -> Self {
        let limit = config.source_pixel_limit(host_memory(config));
        debug!(max_source_pixels = limit, "Source pixel limit");
        Self::new(ImageCodec::new(limit), limit)
    }
}

impl<C: Codec> ThumbnailDecoder<C> {
    pub fn new(codec: C, max_source_pixels: u64) -> Self {
        Self {
            codec,
            max_source_pixels,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C: Codec> Decode for ThumbnailDecoder<C> {
    fn decode(&self, path: &Path, target: u32) -> Result<Thumbnail, DecodeError> {
        if target == 0 {
            return Err(DecodeError::InvalidTarget(target));
        }

        let (width, height) = self.codec.probe(path)?;
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage {
                path: path.to_path_buf(),
            });
        }
        if width as u64 * height as u64 > self.max_source_pixels {
            return Err(DecodeError::TooLarge {
                path: path.to_path_buf(),
                width,
                height,
                limit: self.max_source_pixels,
            });
        }

        let sample = sample_factor(width, height, target);
        let decoded = self.codec.decode_sampled(path, sample)?;
        debug!(
            path = %path.display(),
            width,
            height,
            sample,
            decoded_w = decoded.width(),
            decoded_h = decoded.height(),
            "Decoded source"
        );

        let square = DynamicImage::ImageRgba8(decoded)
            .resize_to_fill(target, target, FilterType::Triangle)
            .into_rgba8();
        let (w, h) = square.dimensions();
        Ok(Thumbnail::from_rgba(w, h, square.into_raw())?)
    }
}
