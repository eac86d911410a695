//! Storage configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_max_page_size() -> i64 {
    200
}

/// Tunables for the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on a single row-lock wait, in milliseconds. A checkout
    /// that cannot lock a row within this bound fails with `LockTimeout`
    /// and rolls back.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Largest page size the cart aggregator will serve.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl StoreConfig {
    /// The lock wait bound as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_page_size, 200);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"lock_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.max_page_size, 200);
    }
}
