//! Settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::MAX_LINK_DISTANCE_KM;
use crate::retry::RetryPolicy;
use crate::storage::BackendConfig;
use crate::{Error, Result};

/// Runtime settings for a `HutGraph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Store to open. Env: `HUTLINK_BACKEND`, default `memory`.
    pub backend: BackendConfig,
    /// Env: `HUTLINK_MAX_RETRIES` (attempts, default 3) and
    /// `HUTLINK_RETRY_BASE_MS` (first backoff, default 1000).
    pub retry: RetryPolicy,
    /// Longest accepted segment. Env: `HUTLINK_MAX_DISTANCE_KM`, default 100.
    pub max_distance_km: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            retry: RetryPolicy::default(),
            max_distance_km: MAX_LINK_DISTANCE_KM,
        }
    }
}

impl Settings {
    /// Load from the process environment, applying defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup. Unset keys take their defaults; set but
    /// unparsable keys are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let backend = match lookup("HUTLINK_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };
        let max_attempts = parse_var(&lookup, "HUTLINK_MAX_RETRIES", defaults.retry.max_attempts)?;
        let base_ms = parse_var(
            &lookup,
            "HUTLINK_RETRY_BASE_MS",
            defaults.retry.base_delay.as_millis() as u64,
        )?;
        let max_distance_km = parse_var(&lookup, "HUTLINK_MAX_DISTANCE_KM", defaults.max_distance_km)?;
        if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
            return Err(Error::Config(format!(
                "HUTLINK_MAX_DISTANCE_KM must be a positive number, got {max_distance_km}"
            )));
        }

        Ok(Self {
            backend,
            retry: RetryPolicy { max_attempts, base_delay: Duration::from_millis(base_ms) },
            max_distance_km,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("HUTLINK_BACKEND", "Memory"),
            ("HUTLINK_MAX_RETRIES", "5"),
            ("HUTLINK_RETRY_BASE_MS", "20"),
            ("HUTLINK_MAX_DISTANCE_KM", "40"),
        ]))
        .unwrap();
        assert_eq!(settings.retry, RetryPolicy { max_attempts: 5, base_delay: Duration::from_millis(20) });
        assert_eq!(settings.max_distance_km, 40.0);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("HUTLINK_MAX_RETRIES", "many")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("HUTLINK_BACKEND", "aura")])),
            Err(Error::Config(_))
        ));
        assert!(Settings::from_lookup(lookup(&[("HUTLINK_MAX_DISTANCE_KM", "-3")])).is_err());
    }
}
