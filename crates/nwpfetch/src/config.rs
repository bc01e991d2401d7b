use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nwpfetch_fetch::RetryPolicy;
use nwpfetch_source::convert::Converter;
use nwpfetch_source::ecmwf::{DEFAULT_BASE_URL, DEFAULT_RESOLUTION, Layout};
use nwpfetch_source::mercator::{DEFAULT_DATASETS, DEFAULT_PROGRAM};
use serde::Deserialize;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "nwpfetch.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub fetch:    FetchConfig,
    pub ecmwf:    EcmwfConfig,
    pub mercator: MercatorConfig,
    pub convert:  ConvertConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub max_attempts:         u32,
    pub attempt_timeout_secs: u64,
    pub backoff_unit_secs:    u64,
    pub backoff_cap_secs:     u64,
    pub min_size_bytes:       u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts:         5,
            attempt_timeout_secs: 300,
            backoff_unit_secs:    1,
            backoff_cap_secs:     30,
            min_size_bytes:       1024,
        }
    }
}

impl FetchConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(self.max_attempts)
            .attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
            .backoff_unit(Duration::from_secs(self.backoff_unit_secs))
            .backoff_cap(Duration::from_secs(self.backoff_cap_secs))
            .min_size(self.min_size_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcmwfConfig {
    pub output_root: PathBuf,
    pub base_url:    String,
    pub resolution:  String,
}

impl Default for EcmwfConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("/data/nwpoms-forecast/ECMWF"),
            base_url:    DEFAULT_BASE_URL.to_string(),
            resolution:  DEFAULT_RESOLUTION.to_string(),
        }
    }
}

impl EcmwfConfig {
    pub fn layout(&self) -> Layout {
        Layout::new(&self.output_root).resolution(&self.resolution)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MercatorConfig {
    pub output_root:        PathBuf,
    pub program:            PathBuf,
    pub datasets:           Vec<String>,
    pub window_start_hours: u32,
    pub window_days:        u32,
}

impl Default for MercatorConfig {
    fn default() -> Self {
        Self {
            output_root:        PathBuf::from("/data/nwpoms-forecast/MERCATOR"),
            program:            PathBuf::from(DEFAULT_PROGRAM),
            datasets:           DEFAULT_DATASETS.map(String::from).to_vec(),
            window_start_hours: 12,
            window_days:        7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub wgrib2:       PathBuf,
    pub max_attempts: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            wgrib2:       PathBuf::from("wgrib2"),
            max_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read `explicit` if given, else `./nwpfetch.toml` if present, else
    /// fall back to the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.exists() {
                    return Ok(Self::default());
                }
                local
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// wgrib2 driver sharing the fetch backoff settings.
    pub fn converter(&self) -> Converter {
        Converter::new(&self.convert.wgrib2)
            .max_attempts(self.convert.max_attempts)
            .backoff(
                Duration::from_secs(self.fetch.backoff_unit_secs),
                Duration::from_secs(self.fetch.backoff_cap_secs),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch.policy(), RetryPolicy::default());
        assert_eq!(config.mercator.datasets.len(), 4);
        assert_eq!(config.ecmwf.resolution, "0p25");
        assert_eq!(config.convert.max_attempts, 3);
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            [fetch]
            max_attempts = 2
            min_size_bytes = 4096

            [mercator]
            datasets = ["cmems_mod_glo_phy_anfc_merged-sl_PT1H-i"]
            "#,
        )
        .unwrap();

        let policy = config.fetch.policy();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.min_size, 4096);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(300));
        assert_eq!(config.mercator.datasets.len(), 1);
        assert_eq!(config.mercator.window_days, 7);
        assert_eq!(config.ecmwf, EcmwfConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(Config::from_toml("[fetch]\nretries = 3\n").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[ecmwf]\noutput_root = \"/srv/ecmwf\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.ecmwf.output_root, PathBuf::from("/srv/ecmwf"));

        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_layout_uses_configured_resolution() {
        let mut config = Config::default();
        config.ecmwf.resolution = "0p4-beta".into();
        assert_eq!(config.ecmwf.layout().resolution, "0p4-beta");
    }
}
