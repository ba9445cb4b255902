use photogrid_core::LoaderConfig;
use sysinfo::System;
use tracing::debug;

/// Memory the cache budget is derived from, in bytes.
///
/// `memory_limit_bytes` wins when set; otherwise the OS's available memory,
/// falling back to total memory on platforms that do not report it.
pub fn host_memory(config: &LoaderConfig) -> u64 {
    if let Some(limit) = config.memory_limit_bytes {
        return limit;
    }
    let mut sys = System::new();
    sys.refresh_memory();
    let available = sys.available_memory();
    let memory = if available == 0 {
        sys.total_memory()
    } else {
        available
    };
    debug!(memory, "Detected host memory");
    memory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_limit_overrides_detection() {
        let cfg = LoaderConfig {
            memory_limit_bytes: Some(1234),
            ..LoaderConfig::default()
        };
        assert_eq!(host_memory(&cfg), 1234);
    }
}
