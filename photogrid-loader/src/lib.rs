pub mod coordinator;
pub mod decoder;
pub mod enumerator;
pub mod error;
pub mod memory;
pub mod pool;

pub use coordinator::{Bound, Coordinator, GridView, Resolution, SlotId, Waker};
pub use decoder::{round_down_pow2, sample_factor, Codec, Decode, ImageCodec, ThumbnailDecoder};
pub use enumerator::{CollectionSource, DirectorySource};
pub use error::{DecodeError, LoaderError};
pub use memory::host_memory;
pub use pool::WorkerPool;

/// Convenience result type for the loader crate.
pub type Result<T> = std::result::Result<T, LoaderError>;
