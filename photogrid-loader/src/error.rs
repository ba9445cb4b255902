use std::path::PathBuf;

use thiserror::Error;

/// Errors from the coordination layer.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("collection has not been built yet")]
    NotReady,

    #[error(transparent)]
    Core(#[from] photogrid_core::CoreError),
}

/// A thumbnail could not be produced. Never fatal: the slot keeps its
/// placeholder and nothing is retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Jpeg {
        path: PathBuf,
        #[source]
        source: jpeg_decoder::Error,
    },

    #[error("decoder panicked on {}", path.display())]
    Panicked { path: PathBuf },

    #[error("{} reports an empty image", path.display())]
    EmptyImage { path: PathBuf },

    #[error("{} is {width}×{height}, above the {limit} pixel limit", path.display())]
    TooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        limit: u64,
    },

    #[error("invalid thumbnail target size: {0}")]
    InvalidTarget(u32),

    #[error(transparent)]
    Buffer(#[from] photogrid_core::CoreError),
}
