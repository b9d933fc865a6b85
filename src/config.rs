//! Configuration loading and validation (spec §6).
//!
//! The reference monitor hardcodes its target list (`records::TARGETS`);
//! this crate instead loads a TOML document matching the schema below,
//! following the same `serde` + `toml` pairing the rest of the retrieved
//! connectivity-monitor pack uses for config. Defaults are provided via
//! `#[serde(default = "...")]` functions rather than a blanket `Default`
//! derive so a partially-specified document still validates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::endpoint::{parse_targets, Endpoint, RawTarget};
use crate::errors::ConfigError;

fn default_interval_seconds() -> f64 {
    5.0
}

fn default_timeout_seconds() -> f64 {
    5.0
}

fn default_graph_width() -> u32 {
    0
}

const MIN_INTERVAL_SECONDS: f64 = 0.25;
const MIN_TIMEOUT_SECONDS: f64 = 0.1;

/// `[endpoints]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EndpointsSection {
    pub targets: Vec<RawTarget>,
}

// RawTarget only derives Deserialize upstream; round-tripping a loaded
// config back to TOML re-serializes the normalized form instead, so a
// hand-written Serialize/PartialEq pair avoids forcing Serialize onto the
// untagged enum (which does not round-trip unambiguously).
impl Serialize for RawTarget {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            RawTarget::Bare(s) => serializer.serialize_str(s),
            RawTarget::Structured { url, name, protocol, ip_version, primary_check_type } => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("url", url)?;
                if let Some(name) = name {
                    map.serialize_entry("name", name)?;
                }
                if let Some(protocol) = protocol {
                    map.serialize_entry("protocol", protocol)?;
                }
                if let Some(ip_version) = ip_version {
                    map.serialize_entry("ip_version", ip_version)?;
                }
                if let Some(primary_check_type) = primary_check_type {
                    map.serialize_entry("primary_check_type", primary_check_type)?;
                }
                map.end()
            }
        }
    }
}

impl PartialEq for RawTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawTarget::Bare(a), RawTarget::Bare(b)) => a == b,
            (
                RawTarget::Structured { url: u1, name: n1, protocol: p1, ip_version: v1, primary_check_type: c1 },
                RawTarget::Structured { url: u2, name: n2, protocol: p2, ip_version: v2, primary_check_type: c2 },
            ) => u1 == u2 && n1 == n2 && p1 == p2 && v1 == v2 && c1 == c2,
            _ => false,
        }
    }
}

/// `[dns]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct DnsSection {
    #[serde(default)]
    pub custom_servers: Vec<String>,
}

/// `[checks]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChecksSection {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

impl Default for ChecksSection {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// `[ui]` table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UiSection {
    #[serde(default = "default_graph_width")]
    pub graph_width: u32,
}

impl Default for UiSection {
    fn default() -> Self {
        Self { graph_width: default_graph_width() }
    }
}

/// The full, deserialized config document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub endpoints: EndpointsSection,
    #[serde(default)]
    pub dns: DnsSection,
    #[serde(default)]
    pub checks: ChecksSection,
    #[serde(default)]
    pub ui: UiSection,
}

impl Config {
    /// Validates numeric bounds and cross-field constraints, per spec §6 /
    /// §4.3 (`timeout_seconds` capped at `interval_seconds`, since a tick
    /// barrier shorter than the probe deadline would let ticks overlap).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checks.interval_seconds < MIN_INTERVAL_SECONDS {
            return Err(ConfigError::BelowMinimum {
                key: "checks.interval_seconds",
                value: self.checks.interval_seconds,
                min: MIN_INTERVAL_SECONDS,
            });
        }
        if self.checks.timeout_seconds < MIN_TIMEOUT_SECONDS {
            return Err(ConfigError::BelowMinimum {
                key: "checks.timeout_seconds",
                value: self.checks.timeout_seconds,
                min: MIN_TIMEOUT_SECONDS,
            });
        }
        if self.checks.timeout_seconds > self.checks.interval_seconds {
            return Err(ConfigError::TimeoutExceedsInterval {
                timeout: self.checks.timeout_seconds,
                interval: self.checks.interval_seconds,
            });
        }
        Ok(())
    }

    /// Parses and validates the endpoint list, per C1.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        parse_targets(&self.endpoints.targets)
    }

    /// The default config contents `hydraping init` writes: cloudflare's
    /// DNS resolver as a single starter target, matching the reference
    /// monitor's own default target list in spirit.
    pub fn default_toml() -> String {
        r#"[endpoints]
targets = ["1.1.1.1", "https://example.com"]

[dns]
custom_servers = []

[checks]
interval_seconds = 5.0
timeout_seconds = 5.0

[ui]
graph_width = 0
"#
        .to_string()
    }
}

/// Resolves the default config path: `$XDG_CONFIG_HOME/hydraping/settings.toml`,
/// or the platform equivalent via `dirs::config_dir()`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir().map(|d| d.join("hydraping").join("settings.toml")).ok_or(ConfigError::NoConfigDir)
}

/// Loads and validates a config file from `path`.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = toml::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

/// Writes a fresh default config to `path`. Idempotent unless `force` is
/// set: a second invocation without `--force` reports
/// [`ConfigError::AlreadyExists`] rather than overwriting (spec §8).
pub fn init(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists { path: path.display().to_string() });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, Config::default_toml()).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_and_validates() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.checks.interval_seconds, 5.0);
        assert_eq!(config.ui.graph_width, 0);
    }

    #[test]
    fn round_trip_preserves_equality() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn timeout_above_interval_is_rejected() {
        let config = Config {
            endpoints: EndpointsSection { targets: vec![RawTarget::Bare("1.1.1.1".to_string())] },
            dns: DnsSection::default(),
            checks: ChecksSection { interval_seconds: 1.0, timeout_seconds: 2.0 },
            ui: UiSection::default(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::TimeoutExceedsInterval { .. })));
    }

    #[test]
    fn interval_below_minimum_is_rejected() {
        let config = Config {
            endpoints: EndpointsSection { targets: vec![RawTarget::Bare("1.1.1.1".to_string())] },
            dns: DnsSection::default(),
            checks: ChecksSection { interval_seconds: 0.01, timeout_seconds: 0.01 },
            ui: UiSection::default(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::BelowMinimum { .. })));
    }

    #[test]
    fn init_then_init_without_force_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        init(&path, false).unwrap();
        assert!(matches!(init(&path, false), Err(ConfigError::AlreadyExists { .. })));
        init(&path, true).unwrap();
    }
}
