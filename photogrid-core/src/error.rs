use thiserror::Error;

/// Errors originating from the photogrid data model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid thumbnail size: {0} (must be >= 1)")]
    InvalidThumbnailSize(u32),

    #[error("invalid pixel buffer: {width}×{height} RGBA needs {expected} bytes, got {len}")]
    InvalidBuffer {
        width: u32,
        height: u32,
        expected: usize,
        len: usize,
    },

    #[error("index {index} out of range for a collection of {len} images")]
    IndexOutOfRange { index: usize, len: usize },
}
