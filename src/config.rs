//! Configuration Module
//!
//! Expiration, refresh and size policies for the in-memory cache, loadable from
//! environment variables or from a flat serde representation.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CacheError, Result};

// == Expiration ==
/// When an entry leaves the cache on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Entries stay until evicted or invalidated.
    #[default]
    Never,
    /// Entries expire `ttl` after they were written. With `reset_on_read`, every
    /// hit restarts the countdown.
    Ttl { ttl: Duration, reset_on_read: bool },
}

impl Expiration {
    /// Returns the configured TTL, if any.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiration::Never => None,
            Expiration::Ttl { ttl, .. } => Some(*ttl),
        }
    }

    /// Returns true if reads restart the TTL countdown.
    pub fn resets_on_read(&self) -> bool {
        matches!(
            self,
            Expiration::Ttl {
                reset_on_read: true,
                ..
            }
        )
    }
}

// == Cache Config ==
/// Validated cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL policy
    pub expiration: Expiration,
    /// Period of the background refresh timer, None = no periodic refresh
    pub refresh_interval: Option<Duration>,
    /// Every hit schedules a background refresh
    pub refresh_after_read: bool,
    /// Minimum time since the last successful write before a read-triggered or
    /// explicit refresh runs. Timer ticks ignore it.
    pub cooldown: Duration,
    /// Maximum number of entries, None = unbounded
    pub limit: Option<usize>,
}

impl CacheConfig {
    /// Expire entries `ttl` after they were written.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiration = Expiration::Ttl {
            ttl,
            reset_on_read: false,
        };
        self
    }

    /// Expire entries `ttl` after they were last written or read.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.expiration = Expiration::Ttl {
            ttl,
            reset_on_read: true,
        };
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Refresh in the background after every hit, at most once per `cooldown`.
    pub fn with_refresh_after_read(mut self, cooldown: Duration) -> Self {
        self.refresh_after_read = true;
        self.cooldown = cooldown;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if any refresh trigger is configured.
    pub fn refreshes(&self) -> bool {
        self.refresh_interval.is_some() || self.refresh_after_read
    }

    /// Checks the invariants the builder helpers cannot enforce on their own.
    pub fn validate(&self) -> Result<()> {
        if self.limit == Some(0) {
            return Err(CacheError::InvalidConfig(
                "limit must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval == Some(Duration::ZERO) {
            return Err(CacheError::InvalidConfig(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.expiration.ttl() == Some(Duration::ZERO) {
            return Err(CacheError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if !self.cooldown.is_zero() && !self.refreshes() {
            return Err(CacheError::InvalidConfig(
                "cooldown requires a refresh interval or refresh after read".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_TTL_MS` - TTL in milliseconds (default: no expiration)
    /// - `MEMO_RESET_TTL_ON_READ` - restart TTL on every hit (default: false)
    /// - `MEMO_REFRESH_INTERVAL_MS` - periodic refresh period (default: none)
    /// - `MEMO_REFRESH_AFTER_READ` - refresh in the background after hits (default: false)
    /// - `MEMO_COOLDOWN_MS` - minimum time between demand refreshes (default: none)
    /// - `MEMO_LIMIT` - maximum number of entries (default: unbounded)
    pub fn from_env() -> Result<Self> {
        let options = CacheOptions {
            ttl_in_ms: env_parse("MEMO_TTL_MS"),
            reset_ttl_on_read: env_flag("MEMO_RESET_TTL_ON_READ"),
            refresh_interval_in_ms: env_parse("MEMO_REFRESH_INTERVAL_MS"),
            refresh_after_read: env_flag("MEMO_REFRESH_AFTER_READ"),
            cooldown_in_ms: env_parse("MEMO_COOLDOWN_MS"),
            limit: env_parse("MEMO_LIMIT"),
        };
        Self::try_from(options)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// == Cache Options ==
/// Flat, serializable form of the cache options.
///
/// Field names follow the memoizer's option table (`ttlInMs`, `resetTTLOnRead`,
/// ...). Convert into a [`CacheConfig`] with `TryFrom`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheOptions {
    pub ttl_in_ms: Option<u64>,
    #[serde(rename = "resetTTLOnRead")]
    pub reset_ttl_on_read: bool,
    pub refresh_interval_in_ms: Option<u64>,
    pub refresh_after_read: bool,
    pub cooldown_in_ms: Option<u64>,
    pub limit: Option<usize>,
}

impl TryFrom<CacheOptions> for CacheConfig {
    type Error = CacheError;

    fn try_from(options: CacheOptions) -> Result<Self> {
        let expiration = match options.ttl_in_ms {
            Some(ms) => Expiration::Ttl {
                ttl: Duration::from_millis(ms),
                reset_on_read: options.reset_ttl_on_read,
            },
            None => {
                if options.reset_ttl_on_read {
                    warn!("resetTTLOnRead has no effect without ttlInMs");
                }
                Expiration::Never
            }
        };

        let refresh_interval = options.refresh_interval_in_ms.map(Duration::from_millis);
        if options.cooldown_in_ms.is_some()
            && refresh_interval.is_none()
            && !options.refresh_after_read
        {
            return Err(CacheError::InvalidConfig(
                "cooldownInMs requires refreshIntervalInMs or refreshAfterRead".to_string(),
            ));
        }

        let config = CacheConfig {
            expiration,
            refresh_interval,
            refresh_after_read: options.refresh_after_read,
            cooldown: Duration::from_millis(options.cooldown_in_ms.unwrap_or(0)),
            limit: options.limit,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.expiration, Expiration::Never);
        assert!(config.refresh_interval.is_none());
        assert!(!config.refresh_after_read);
        assert!(config.limit.is_none());
        assert_eq!(config.cooldown, Duration::ZERO);
    }

    #[test]
    fn test_config_builders() {
        let config = CacheConfig::default()
            .with_idle_ttl(Duration::from_millis(500))
            .with_refresh_after_read(Duration::from_millis(100))
            .with_limit(8);

        assert_eq!(config.expiration.ttl(), Some(Duration::from_millis(500)));
        assert!(config.expiration.resets_on_read());
        assert!(config.refresh_after_read);
        assert_eq!(config.cooldown, Duration::from_millis(100));
        assert_eq!(config.limit, Some(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_options_deserialize_table_names() {
        let json = r#"{
            "ttlInMs": 1000,
            "resetTTLOnRead": true,
            "refreshIntervalInMs": 250,
            "refreshAfterRead": true,
            "cooldownInMs": 50,
            "limit": 3
        }"#;
        let options: CacheOptions = serde_json::from_str(json).unwrap();
        let config = CacheConfig::try_from(options).unwrap();

        assert_eq!(
            config.expiration,
            Expiration::Ttl {
                ttl: Duration::from_millis(1000),
                reset_on_read: true
            }
        );
        assert_eq!(config.refresh_interval, Some(Duration::from_millis(250)));
        assert!(config.refresh_after_read);
        assert_eq!(config.cooldown, Duration::from_millis(50));
        assert_eq!(config.limit, Some(3));
    }

    #[test]
    fn test_options_empty_object_is_default() {
        let options: CacheOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(CacheConfig::try_from(options).unwrap(), CacheConfig::default());
    }

    #[test]
    fn test_options_reject_unknown_fields() {
        let result: std::result::Result<CacheOptions, _> =
            serde_json::from_str(r#"{"ttl": 5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_cooldown_without_refresh_trigger_is_rejected() {
        let options = CacheOptions {
            cooldown_in_ms: Some(10),
            ..Default::default()
        };
        assert!(matches!(
            CacheConfig::try_from(options),
            Err(CacheError::InvalidConfig(_))
        ));
        assert!(CacheConfig::default()
            .with_cooldown(Duration::from_millis(10))
            .validate()
            .is_err());
    }

    #[test]
    fn test_cooldown_with_periodic_refresh_only() {
        let options: CacheOptions =
            serde_json::from_str(r#"{"refreshIntervalInMs": 100, "cooldownInMs": 50}"#).unwrap();
        let config = CacheConfig::try_from(options).unwrap();

        assert_eq!(config.refresh_interval, Some(Duration::from_millis(100)));
        assert!(!config.refresh_after_read);
        assert_eq!(config.cooldown, Duration::from_millis(50));
    }

    #[test]
    fn test_reset_without_ttl_is_ignored() {
        let options = CacheOptions {
            reset_ttl_on_read: true,
            ..Default::default()
        };
        let config = CacheConfig::try_from(options).unwrap();
        assert_eq!(config.expiration, Expiration::Never);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let options = CacheOptions {
            limit: Some(0),
            ..Default::default()
        };
        assert!(CacheConfig::try_from(options).is_err());
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        assert!(CacheConfig::default()
            .with_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CacheConfig::default()
            .with_refresh_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "MEMO_TTL_MS",
            "MEMO_RESET_TTL_ON_READ",
            "MEMO_REFRESH_INTERVAL_MS",
            "MEMO_REFRESH_AFTER_READ",
            "MEMO_COOLDOWN_MS",
            "MEMO_LIMIT",
        ] {
            env::remove_var(name);
        }

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config, CacheConfig::default());
    }
}
