//! Process-wide configuration.
//!
//! Defaults can be overridden through environment variables, read once the
//! first time [`global`] is called:
//!
//! - `ARRAYFLOW_DEVICE`: device name used when a block asks for `"Auto"`.
//! - `ARRAYFLOW_SOURCE_BUFFER_LEN`: elements posted per call by random sources.
//! - `ARRAYFLOW_CONSTANT_BUFFER_LEN`: elements posted per call by constant sources.
//! - `ARRAYFLOW_PINNED_POOL_LIMIT`: bytes of pinned staging memory kept per backend.

use crate::error::{BlockError, Result};
use std::env;

/// Sentinel device name meaning "first cached device".
pub const AUTO_DEVICE: &str = "Auto";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub default_device: String,
    pub source_buffer_len: usize,
    pub constant_buffer_len: usize,
    pub pinned_pool_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: AUTO_DEVICE.to_owned(),
            source_buffer_len: 8192,
            constant_buffer_len: 1024,
            pinned_pool_limit: 64 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn with_default_device(mut self, name: impl Into<String>) -> Self {
        self.default_device = name.into();
        self
    }

    pub fn with_source_buffer_len(mut self, len: usize) -> Self {
        self.source_buffer_len = len;
        self
    }

    pub fn with_constant_buffer_len(mut self, len: usize) -> Self {
        self.constant_buffer_len = len;
        self
    }

    pub fn with_pinned_pool_limit(mut self, bytes: usize) -> Self {
        self.pinned_pool_limit = bytes;
        self
    }

    /// Builds a config from `ARRAYFLOW_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(device) = lookup("ARRAYFLOW_DEVICE") {
            config.default_device = device;
        }
        if let Some(len) = parse_len(&lookup, "ARRAYFLOW_SOURCE_BUFFER_LEN")? {
            config.source_buffer_len = len;
        }
        if let Some(len) = parse_len(&lookup, "ARRAYFLOW_CONSTANT_BUFFER_LEN")? {
            config.constant_buffer_len = len;
        }
        if let Some(bytes) = parse_len(&lookup, "ARRAYFLOW_PINNED_POOL_LIMIT")? {
            config.pinned_pool_limit = bytes;
        }
        Ok(config)
    }
}

fn parse_len(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(0) | Err(_) => Err(BlockError::invalid(format!(
                "{key} must be a positive integer, got \"{raw}\""
            ))),
            Ok(n) => Ok(Some(n)),
        },
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Config = Config::from_env().unwrap_or_else(|err| {
        log::warn!("ignoring environment configuration: {err}");
        Config::default()
    });
}

/// The configuration shared by every block in this process.
pub fn global() -> &'static Config {
    &GLOBAL_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.default_device, AUTO_DEVICE);
        assert_eq!(c.source_buffer_len, 8192);
        assert_eq!(c.constant_buffer_len, 1024);
    }

    #[test]
    fn lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ARRAYFLOW_DEVICE", "x86_64 CPU"),
            ("ARRAYFLOW_SOURCE_BUFFER_LEN", "256"),
        ]
        .into_iter()
        .collect();
        let c = Config::from_lookup(|k| vars.get(k).map(|v| (*v).to_owned())).unwrap();
        assert_eq!(c.default_device, "x86_64 CPU");
        assert_eq!(c.source_buffer_len, 256);
        assert_eq!(c.constant_buffer_len, 1024);
    }

    #[test]
    fn rejects_bad_lengths() {
        let bad = Config::from_lookup(|k| (k == "ARRAYFLOW_CONSTANT_BUFFER_LEN").then(|| "0".into()));
        assert!(bad.is_err());
        let bad = Config::from_lookup(|k| (k == "ARRAYFLOW_PINNED_POOL_LIMIT").then(|| "lots".into()));
        assert!(bad.is_err());
    }

    #[test]
    fn builder() {
        let c = Config::default().with_default_device("gpu0").with_source_buffer_len(16);
        assert_eq!(c.default_device, "gpu0");
        assert_eq!(c.source_buffer_len, 16);
    }
}
