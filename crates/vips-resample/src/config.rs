//! Engine startup configuration, loaded from defaults plus environment.

use serde::{Deserialize, Serialize};

pub const ENV_PROGRAM_NAME: &str = "VIPS_PROGRAM_NAME";
pub const ENV_CONCURRENCY: &str = "VIPS_CONCURRENCY";
pub const ENV_CACHE_MAX_OPS: &str = "VIPS_CACHE_MAX_OPS";
pub const ENV_CACHE_MAX_MEM: &str = "VIPS_CACHE_MAX_MEM";

/// Errors raised while loading or validating [`VipsConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{key} {reason}")]
    OutOfRange {
        key: &'static str,
        reason: &'static str,
    },
}

/// Settings applied once when the native engine starts.
///
/// `None` leaves the engine's own default in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VipsConfig {
    pub program_name: String,
    pub concurrency: Option<u32>,
    pub cache_max_ops: Option<u32>,
    pub cache_max_mem: Option<u64>,
}

impl Default for VipsConfig {
    fn default() -> Self {
        Self {
            program_name: "vips-resample".into(),
            concurrency: None,
            cache_max_ops: None,
            cache_max_mem: None,
        }
    }
}

impl VipsConfig {
    /// Load from process environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let g = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = g(ENV_PROGRAM_NAME) {
            config.program_name = name.trim().to_owned();
        }
        if let Some(v) = g(ENV_CONCURRENCY) {
            config.concurrency = Some(parse(ENV_CONCURRENCY, &v)?);
        }
        if let Some(v) = g(ENV_CACHE_MAX_OPS) {
            config.cache_max_ops = Some(parse(ENV_CACHE_MAX_OPS, &v)?);
        }
        if let Some(v) = g(ENV_CACHE_MAX_MEM) {
            config.cache_max_mem = Some(parse(ENV_CACHE_MAX_MEM, &v)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Builder: override the worker thread count.
    pub fn with_concurrency(mut self, threads: u32) -> Self {
        self.concurrency = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program_name.trim().is_empty() {
            return Err(ConfigError::OutOfRange {
                key: ENV_PROGRAM_NAME,
                reason: "must not be empty",
            });
        }
        if self.program_name.contains('\0') {
            return Err(ConfigError::Invalid {
                key: ENV_PROGRAM_NAME,
                value: self.program_name.clone(),
            });
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::OutOfRange {
                key: ENV_CONCURRENCY,
                reason: "must be at least 1",
            });
        }
        if self.cache_max_ops.is_some_and(|ops| ops > i32::MAX as u32) {
            return Err(ConfigError::OutOfRange {
                key: ENV_CACHE_MAX_OPS,
                reason: "does not fit a native int",
            });
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_owned(),
    })
}
