//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{AggregatorError, AggregatorResult};

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "TOKENAGG";

/// Thresholds deciding when a merge is worth notifying subscribers about
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificancePolicy {
    /// Relative price change, `|new - old| / max(old, 1)`
    pub min_relative_price_change: f64,
    /// Absolute volume change
    pub min_volume_delta: f64,
    /// `new_volume / old_volume` above which a spike fires
    pub spike_ratio: f64,
}

impl Default for SignificancePolicy {
    fn default() -> Self {
        Self {
            min_relative_price_change: 0.001,
            min_volume_delta: 0.5,
            spike_ratio: 3.0,
        }
    }
}

impl SignificancePolicy {
    pub fn validate(&self) -> AggregatorResult<()> {
        let checks = [
            ("min_relative_price_change", self.min_relative_price_change),
            ("min_volume_delta", self.min_volume_delta),
            ("spike_ratio", self.spike_ratio),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(AggregatorError::Config(format!(
                    "significance.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Complete aggregator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    pub poll_interval_ms: u64,
    pub cache_ttl_secs: u64,
    /// Records persist for `cache_ttl_secs * record_ttl_multiplier`
    pub record_ttl_multiplier: u64,
    pub enable_notifications: bool,
    pub notification_capacity: usize,
    pub default_page_limit: usize,
    /// Max addresses merged concurrently within a cycle
    pub merge_concurrency: usize,
    /// Per-source fetch deadline
    pub source_timeout_ms: u64,
    /// Observation files polled by the file-backed sources
    pub sources: Vec<PathBuf>,
    pub significance: SignificancePolicy,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            cache_ttl_secs: 30,
            record_ttl_multiplier: 4,
            enable_notifications: true,
            notification_capacity: 1024,
            default_page_limit: 20,
            merge_concurrency: 16,
            source_timeout_ms: 5_000,
            sources: Vec::new(),
            significance: SignificancePolicy::default(),
        }
    }
}

impl AggregatorSettings {
    /// Load settings from an optional file, overridden by `TOKENAGG_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> AggregatorResult<Self> {
        Self::load_from(path, None)
    }

    /// Like [`load`](Self::load), reading overrides from `env` instead of the
    /// process environment when given.
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> AggregatorResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings: AggregatorSettings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sources")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> AggregatorResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(AggregatorError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.merge_concurrency == 0 {
            return Err(AggregatorError::Config("merge_concurrency must be > 0".into()));
        }
        if self.default_page_limit == 0 {
            return Err(AggregatorError::Config("default_page_limit must be > 0".into()));
        }
        if self.source_timeout_ms == 0 {
            return Err(AggregatorError::Config("source_timeout_ms must be > 0".into()));
        }
        if self.notification_capacity == 0 {
            return Err(AggregatorError::Config("notification_capacity must be > 0".into()));
        }
        self.significance.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    /// TTL applied to persisted records; `None` disables expiry
    pub fn record_ttl_secs(&self) -> Option<u64> {
        match self.cache_ttl_secs.saturating_mul(self.record_ttl_multiplier) {
            0 => None,
            ttl => Some(ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AggregatorSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.record_ttl_secs(), Some(120));
        assert_eq!(settings.default_page_limit, 20);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let settings = AggregatorSettings {
            cache_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(settings.record_ttl_secs(), None);
    }

    #[test]
    fn test_rejects_bad_policy() {
        let mut settings = AggregatorSettings::default();
        settings.significance.spike_ratio = 0.0;
        assert!(matches!(settings.validate(), Err(AggregatorError::Config(_))));

        let settings = AggregatorSettings {
            merge_concurrency: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_load_layers_file_and_env() {
        let path = std::env::temp_dir().join(format!("tokenagg-settings-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "poll_interval_ms = 2500\ncache_ttl_secs = 10\n\n[significance]\nspike_ratio = 4.0\n",
        )
        .unwrap();

        let settings = AggregatorSettings::load_from(
            Some(&path),
            env(&[
                ("TOKENAGG_SOURCES", "feeds/dexscreener.json,feeds/jupiter.jsonl"),
                ("TOKENAGG_SIGNIFICANCE__SPIKE_RATIO", "5.5"),
                ("TOKENAGG_ENABLE_NOTIFICATIONS", "false"),
                ("UNRELATED_POLL_INTERVAL_MS", "1"),
            ]),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.poll_interval_ms, 2500);
        assert_eq!(settings.record_ttl_secs(), Some(40));
        assert_eq!(
            settings.sources,
            vec![
                PathBuf::from("feeds/dexscreener.json"),
                PathBuf::from("feeds/jupiter.jsonl")
            ]
        );
        assert_eq!(settings.significance.spike_ratio, 5.5);
        assert_eq!(settings.significance.min_volume_delta, 0.5);
        assert!(!settings.enable_notifications);
        assert_eq!(settings.default_page_limit, 20);
    }

    #[test]
    fn test_load_without_file_or_env_is_default() {
        let missing = std::env::temp_dir().join("tokenagg-does-not-exist.toml");
        let settings = AggregatorSettings::load_from(Some(&missing), env(&[])).unwrap();
        assert_eq!(settings, AggregatorSettings::default());
    }

    #[test]
    fn test_load_validates_env_values() {
        let result = AggregatorSettings::load_from(None, env(&[("TOKENAGG_MERGE_CONCURRENCY", "0")]));
        assert!(matches!(result, Err(AggregatorError::Config(_))));

        let result = AggregatorSettings::load_from(
            None,
            env(&[("TOKENAGG_SIGNIFICANCE__MIN_VOLUME_DELTA", "-1")]),
        );
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: AggregatorSettings = serde_json::from_str(
            r#"{"poll_interval_ms": 2500, "significance": {"spike_ratio": 5.0}}"#,
        )
        .unwrap();
        assert_eq!(settings.poll_interval_ms, 2500);
        assert_eq!(settings.cache_ttl_secs, 30);
        assert_eq!(settings.significance.spike_ratio, 5.0);
        assert_eq!(settings.significance.min_volume_delta, 0.5);
    }
}
