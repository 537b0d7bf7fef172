//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Construction parameters for an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Order pool capacity: the peak number of concurrently live order
    /// records. The request ring is sized to the smallest power of two
    /// that covers it.
    pub max_orders: usize,
    /// Optional CPU core to pin the worker thread to.
    pub core_id: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_orders: 1 << 20,
            core_id: None,
        }
    }
}

impl EngineConfig {
    /// Config with the given pool capacity and no pinning.
    pub fn with_max_orders(max_orders: usize) -> Self {
        Self {
            max_orders,
            core_id: None,
        }
    }

    /// Load configuration from `PULSE_LOB_*` environment variables.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::Environment::with_prefix("PULSE_LOB"))
            .build()?;

        cfg.try_deserialize()
    }

    /// Load configuration from a file, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("PULSE_LOB"))
            .build()?;

        cfg.try_deserialize()
    }

    /// Ring capacity derived from the pool size: the smallest power of
    /// two >= `max_orders`.
    pub fn ring_capacity(&self) -> usize {
        self.max_orders.next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_orders, 1 << 20);
        assert_eq!(cfg.core_id, None);
    }

    #[test]
    fn test_ring_capacity_rounds_up() {
        assert_eq!(EngineConfig::with_max_orders(1).ring_capacity(), 1);
        assert_eq!(EngineConfig::with_max_orders(1000).ring_capacity(), 1024);
        assert_eq!(EngineConfig::with_max_orders(1024).ring_capacity(), 1024);
        assert_eq!(EngineConfig::with_max_orders(1025).ring_capacity(), 2048);
    }
}
