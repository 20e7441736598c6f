//! Typed configuration for the bus, loadable from a TOML file or built in code.

use std::path::Path;
use std::time::Duration;

use crate::region::layout::QUEUE_CAPACITY;
use crate::Result;

#[cfg_attr(feature = "config", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "config", serde(default))]
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Appended to the fixed region name; bump whenever the wire layout changes.
    pub region_version: String,
    /// Size in bytes of the named region's backing mapping.
    pub region_size: usize,
    /// Per-subscription bounded event queue capacity. Must equal
    /// [`QUEUE_CAPACITY`]; present so the value is visible and auditable in a
    /// config file rather than hidden purely in source.
    pub queue_capacity: usize,
    /// `Subscribe` poll timeout used by the subscriber loop.
    #[cfg_attr(feature = "config", serde(with = "duration_millis"))]
    pub subscribe_poll_timeout: Duration,
    /// Watcher loop tick interval (liveness + `CleanUpUnusedResources`).
    #[cfg_attr(feature = "config", serde(with = "duration_millis"))]
    pub watcher_tick_interval: Duration,
    /// How long the parent thread waits on the subscriber loop's started latch.
    #[cfg_attr(feature = "config", serde(with = "duration_millis"))]
    pub started_latch_timeout: Duration,
    /// Grace window given to each loop on shutdown, before forcible join.
    #[cfg_attr(feature = "config", serde(with = "duration_millis"))]
    pub shutdown_grace_step: Duration,
    /// Number of grace-window steps attempted before a forced join.
    pub shutdown_grace_steps: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            region_version: "v1".to_string(),
            region_size: 8 * 1024 * 1024,
            queue_capacity: QUEUE_CAPACITY,
            subscribe_poll_timeout: Duration::from_secs(1),
            watcher_tick_interval: Duration::from_secs(20),
            started_latch_timeout: Duration::from_secs(5),
            shutdown_grace_step: Duration::from_millis(50),
            shutdown_grace_steps: 5,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity != QUEUE_CAPACITY {
            return Err(crate::Error::InvariantViolated(
                "queue_capacity does not match the compiled region layout",
            ));
        }
        Ok(())
    }

    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    #[cfg(not(feature = "config"))]
    pub fn from_toml_file(_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::default())
    }
}

#[cfg(feature = "config")]
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(all(test, feature = "config"))]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = BusConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let parsed = BusConfig::from_toml_str(&text).expect("parse");
        assert_eq!(parsed.region_size, cfg.region_size);
        assert_eq!(parsed.watcher_tick_interval, cfg.watcher_tick_interval);
    }

    #[test]
    fn mismatched_queue_capacity_is_rejected() {
        let mut cfg = BusConfig::default();
        cfg.queue_capacity = 4;
        assert!(cfg.validate().is_err());
    }
}
