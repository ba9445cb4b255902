use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Tunables for the thumbnail pipeline.
///
/// Every field has a default so a partial JSON object (or none at all) is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Side length of the square thumbnails, in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    /// The cache may use at most `1 / memory_divisor` of host memory.
    #[serde(default = "default_memory_divisor")]
    pub memory_divisor: u64,
    /// Use this many bytes as "host memory" instead of asking the OS.
    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,
    /// Upper bound on decode workers. Defaults to the available parallelism.
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Extra workers above the first retire after this long without work.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Images whose probed pixel count exceeds this fail instead of decoding.
    /// Unset means derived from each worker's share of memory, see
    /// [`LoaderConfig::source_pixel_limit`].
    #[serde(default)]
    pub max_source_pixels: Option<u64>,
}

/// Floor for the derived source limit: a 64 MP photo always decodes.
pub const MIN_SOURCE_PIXELS: u64 = 64_000_000;
/// Ceiling for the derived source limit (24k × 24k).
pub const MAX_SOURCE_PIXELS: u64 = 576_000_000;

fn default_thumbnail_size() -> u32 {
    200
}
fn default_memory_divisor() -> u64 {
    4
}
fn default_idle_timeout_secs() -> u64 {
    60
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: default_thumbnail_size(),
            memory_divisor: default_memory_divisor(),
            memory_limit_bytes: None,
            max_workers: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            max_source_pixels: None,
        }
    }
}

impl LoaderConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.thumbnail_size == 0 {
            return Err(CoreError::InvalidThumbnailSize(self.thumbnail_size));
        }
        Ok(())
    }

    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Largest source, in pixels, a single decode may take on.
    ///
    /// The configured value when set. Otherwise every worker gets an equal
    /// share of `host_memory / memory_divisor` at 4 bytes per pixel, kept
    /// within [`MIN_SOURCE_PIXELS`, `MAX_SOURCE_PIXELS`].
    pub fn source_pixel_limit(&self, host_memory: u64) -> u64 {
        if let Some(limit) = self.max_source_pixels {
            return limit;
        }
        let share = host_memory / self.memory_divisor.max(1) / self.worker_limit() as u64;
        (share / 4).clamp(MIN_SOURCE_PIXELS, MAX_SOURCE_PIXELS)
    }

    /// Worker ceiling: the configured value or the host's parallelism, at least 1.
    pub fn worker_limit(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}
