//! Factories for the shared registry and rate limiter
//!
//! ## File storage
//! - One JSON file per collection under `data_dir`
//! - Collections are loaded at start-up so unreadable data is reported
//!   before the first request
//!
//! ## Memory storage
//! - Nothing survives a restart; meant for demos and tests

use crate::config::{RateLimitConfig, StorageConfig, StorageType};
use anyhow::{Context, Result};
use campstore::{Registry, SlidingWindowLimiter, Storage};
use std::time::Duration;

/// Create the registry holding `applicants` and `messages`
pub fn create_registry(config: &StorageConfig) -> Result<Registry> {
    let storage = match config.storage_type {
        StorageType::File => Storage::Files(config.data_dir.clone()),
        StorageType::Memory => Storage::Memory,
    };

    let registry = Registry::new(storage);
    registry.open_all().with_context(|| match config.storage_type {
        StorageType::File => format!(
            "failed to open collections in {}",
            config.data_dir.display()
        ),
        StorageType::Memory => "failed to open in-memory collections".to_string(),
    })?;

    Ok(registry)
}

/// Create the per-client submission limiter
pub fn create_rate_limiter(config: &RateLimitConfig) -> SlidingWindowLimiter {
    SlidingWindowLimiter::builder()
        .limit(config.limit)
        .window(config.window_duration())
        .cleanup_interval(Duration::from_secs(config.cleanup_interval))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_registry_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("data");

        let registry = create_registry(&StorageConfig {
            storage_type: StorageType::File,
            data_dir: data_dir.clone(),
        })
        .unwrap();

        assert!(data_dir.is_dir());
        assert_eq!(registry.names(), ["applicants", "messages"]);
    }

    #[test]
    fn test_memory_registry_ignores_data_dir() {
        let registry = create_registry(&StorageConfig {
            storage_type: StorageType::Memory,
            data_dir: PathBuf::from("/nonexistent/campstore"),
        })
        .unwrap();

        assert_eq!(registry.storage(), &Storage::Memory);
    }

    #[test]
    fn test_rate_limiter_uses_config() {
        let limiter = create_rate_limiter(&RateLimitConfig {
            limit: 2,
            window: 30,
            cleanup_interval: 60,
        });

        assert_eq!(limiter.limit(), 2);
        assert_eq!(limiter.window(), Duration::from_secs(30));
    }
}
