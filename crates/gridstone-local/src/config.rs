//! Base cluster configuration.
//!
//! `GridConfig` is the flat string-keyed option map shared by every
//! Gridstone component. Components read the keys they care about through
//! the typed accessors; unknown keys pass through untouched so a test can
//! carry engine options the harness never interprets.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known configuration keys.
pub mod keys {
    /// Coordinator RPC port. `0` binds an ephemeral port.
    pub const COORDINATOR_PORT: &str = "coordinator.port";

    /// Address the coordinator listener binds to.
    pub const COORDINATOR_BIND_ADDRESS: &str = "coordinator.bind-address";

    /// Web/administrative endpoint port. Absent means no web endpoint.
    pub const WEB_PORT: &str = "web.port";

    /// Scratch directory used by running components.
    pub const SCRATCH_DIRS: &str = "scratch.dirs";

    /// Global default timeout, in milliseconds.
    pub const DEFAULT_TIMEOUT_MS: &str = "grid.default-timeout-ms";

    /// Number of task managers started by the shared-process cluster.
    pub const TASK_MANAGER_COUNT: &str = "taskmanager.count";

    /// Execution slots per task manager.
    pub const TASK_MANAGER_SLOTS: &str = "taskmanager.slots";

    /// Managed memory budget per task manager, in MiB.
    pub const TASK_MANAGER_MANAGED_MEMORY_MB: &str = "taskmanager.managed-memory-mb";
}

/// Default coordinator port when none is configured.
pub const DEFAULT_COORDINATOR_PORT: u16 = 6230;

/// Default bind address when none is configured.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default global timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Managed memory default applied by cluster startup when the caller did
/// not pin one.
pub(crate) const DEFAULT_MANAGED_MEMORY_MB: u64 = 256;

/// Flat configuration map for a Gridstone cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridConfig {
    entries: BTreeMap<String, String>,
}

impl GridConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Sets a raw value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Removes a key, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// Whether `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the configuration is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `key` parsed as `u16`.
    pub fn get_u16(&self, key: &str) -> Result<Option<u16>> {
        self.parse_with(key, str::parse)
    }

    /// Sets a `u16` value.
    pub fn set_u16(&mut self, key: impl Into<String>, value: u16) {
        self.set(key, value.to_string());
    }

    /// Returns `key` parsed as `u32`.
    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        self.parse_with(key, str::parse)
    }

    /// Sets a `u32` value.
    pub fn set_u32(&mut self, key: impl Into<String>, value: u32) {
        self.set(key, value.to_string());
    }

    /// Returns `key` parsed as `u64`.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.parse_with(key, str::parse)
    }

    /// Sets a `u64` value.
    pub fn set_u64(&mut self, key: impl Into<String>, value: u64) {
        self.set(key, value.to_string());
    }

    /// Returns `key` as a filesystem path.
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    /// Sets a filesystem path value.
    pub fn set_path(&mut self, key: impl Into<String>, value: &Path) {
        self.set(key, value.display().to_string());
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflict.
    pub fn merge(&mut self, other: &GridConfig) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Freezes the configuration into a read-only view.
    pub fn frozen(self) -> FrozenGridConfig {
        FrozenGridConfig { inner: self }
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parses a configuration from TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn parse_with<T, E>(&self, key: &str, parse: impl Fn(&str) -> std::result::Result<T, E>) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).map_err(|_| Error::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Read-only view of a [`GridConfig`].
///
/// Handed to components that must not mutate shared configuration after
/// startup, such as the administrative client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenGridConfig {
    inner: GridConfig,
}

impl FrozenGridConfig {
    /// Returns the raw value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key)
    }

    /// Returns `key` parsed as `u16`.
    pub fn get_u16(&self, key: &str) -> Result<Option<u16>> {
        self.inner.get_u16(key)
    }

    /// Returns `key` parsed as `u64`.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.inner.get_u64(key)
    }

    /// Whether `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    /// Clones the frozen entries back into a mutable configuration.
    pub fn thaw(&self) -> GridConfig {
        self.inner.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_round_trip() {
        let mut config = GridConfig::new();
        config.set_u16(keys::COORDINATOR_PORT, 6230);
        config.set_u64(keys::DEFAULT_TIMEOUT_MS, 2500);
        config.set(keys::COORDINATOR_BIND_ADDRESS, "127.0.0.1");

        assert_eq!(config.get_u16(keys::COORDINATOR_PORT).unwrap(), Some(6230));
        assert_eq!(config.get_u64(keys::DEFAULT_TIMEOUT_MS).unwrap(), Some(2500));
        assert_eq!(config.get(keys::COORDINATOR_BIND_ADDRESS), Some("127.0.0.1"));
        assert_eq!(config.get_u16(keys::WEB_PORT).unwrap(), None);
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let mut config = GridConfig::new();
        config.set(keys::COORDINATOR_PORT, "not-a-port");

        let err = config.get_u16(keys::COORDINATOR_PORT).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref key, .. } if key == keys::COORDINATOR_PORT));
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = GridConfig::new();
        base.set("a", "1");
        base.set("b", "2");

        let mut overrides = GridConfig::new();
        overrides.set("b", "20");
        overrides.set("c", "30");

        base.merge(&overrides);
        assert_eq!(base.get("a"), Some("1"));
        assert_eq!(base.get("b"), Some("20"));
        assert_eq!(base.get("c"), Some("30"));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = GridConfig::new();
        config.set_u16(keys::COORDINATOR_PORT, 0);
        config.set(keys::COORDINATOR_BIND_ADDRESS, "127.0.0.1");
        config.set_path(keys::SCRATCH_DIRS, Path::new("/tmp/gridstone"));

        let serialized = config.to_toml().unwrap();
        let parsed = GridConfig::from_toml(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_frozen_view_has_no_mutators() {
        let mut config = GridConfig::new();
        config.set_u16(keys::COORDINATOR_PORT, 7001);

        let frozen = config.frozen();
        assert_eq!(frozen.get_u16(keys::COORDINATOR_PORT).unwrap(), Some(7001));

        // The only way back to a mutable map is an explicit copy.
        let mut thawed = frozen.thaw();
        thawed.set_u16(keys::COORDINATOR_PORT, 7002);
        assert_eq!(frozen.get_u16(keys::COORDINATOR_PORT).unwrap(), Some(7001));
    }
}
