pub mod cache;
pub mod collection;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod thumbnail;

// Re-export primary types for convenience.
pub use cache::{cache_budget, CacheStats, PutOutcome, ThumbnailCache, BYTES_PER_PIXEL};
pub use collection::{Collection, CollectionState};
pub use config::{LoaderConfig, MAX_SOURCE_PIXELS, MIN_SOURCE_PIXELS};
pub use descriptor::{ImageDescriptor, Rotation};
pub use error::CoreError;
pub use thumbnail::Thumbnail;

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
