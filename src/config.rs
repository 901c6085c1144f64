use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default entry lifetime when a query does not specify one.
    pub default_ttl_secs: u64,
    /// Bound on any single cache-layer read or write.
    pub layer_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Interval between aggregation flush cycles.
    pub flush_interval_secs: u64,
    /// Bound on a single summary-sink write.
    pub sink_timeout_ms: u64,
    /// Where the SQLite summary sink lives.
    pub database_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 60,
            layer_timeout_ms: 250,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 15 * 60,
            sink_timeout_ms: 10_000,
            database_url: "sqlite:./dbtrail.sqlite".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn layer_timeout(&self) -> Duration {
        Duration::from_millis(self.layer_timeout_ms)
    }
}

impl TrackingConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }
}

/// Load configuration from an optional `dbtrail` file plus `DBTRAIL__`
/// prefixed environment variables (e.g. `DBTRAIL__CACHE__DEFAULT_TTL_SECS`).
pub fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::with_name("dbtrail").required(false))
        .add_source(config::Environment::with_prefix("DBTRAIL").separator("__"))
        .build()
        .map_err(|err| Error::Config(err.to_string()))?;

    let cfg: Config = config
        .try_deserialize()
        .map_err(|err| Error::Config(err.to_string()))?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.cache.default_ttl_secs == 0 {
        return Err(Error::Config(
            "cache.default_ttl_secs must be greater than zero".to_string(),
        ));
    }
    if cfg.cache.layer_timeout_ms == 0 {
        return Err(Error::Config(
            "cache.layer_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if cfg.tracking.flush_interval_secs == 0 {
        return Err(Error::Config(
            "tracking.flush_interval_secs must be greater than zero".to_string(),
        ));
    }
    if cfg.tracking.database_url.is_empty() {
        return Err(Error::Config(
            "tracking.database_url must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.default_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.tracking.flush_interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_validation_rejects_zero_ttl() {
        let mut cfg = Config::default();
        cfg.cache.default_ttl_secs = 0;
        assert!(matches!(validate_config(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_empty_database_url() {
        let mut cfg = Config::default();
        cfg.tracking.database_url.clear();
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("database_url"));
    }
}
