// src/config.rs
//! Runtime configuration, read from the environment (and `.env` when present).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::gemini_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::models::SubscriptionTier;
use crate::services::{MockLatency, DEFAULT_ANALYSIS_TIMEOUT};

pub const DEFAULT_MOCK_FAILURE_RATE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("no data directory available; set VIRA_DATA_DIR")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub data_dir: PathBuf,
    pub analysis_timeout: Duration,
    pub mock_tier: SubscriptionTier,
    pub mock_latency: MockLatency,
    pub mock_failure_rate: f64,
    pub system_prefers_dark: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = match var("VIRA_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir().ok_or(ConfigError::NoDataDir)?.join("vira"),
        };

        let analysis_timeout = match var("VIRA_ANALYSIS_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("VIRA_ANALYSIS_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_ANALYSIS_TIMEOUT,
        };

        let mock_tier = match var("VIRA_MOCK_TIER") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "VIRA_MOCK_TIER",
                value: raw.clone(),
            })?,
            None => SubscriptionTier::Free,
        };

        let mock_latency = match var("VIRA_MOCK_LATENCY_MS") {
            Some(raw) => {
                let ms: u64 = parse_number("VIRA_MOCK_LATENCY_MS", &raw)?;
                MockLatency::uniform(Duration::from_millis(ms))
            }
            None => MockLatency::realistic(),
        };

        let mock_failure_rate = match var("VIRA_MOCK_FAILURE_RATE") {
            Some(raw) => {
                let rate: f64 = parse_number("VIRA_MOCK_FAILURE_RATE", &raw)?;
                if !(0.0..=1.0).contains(&rate) {
                    return Err(ConfigError::Invalid {
                        name: "VIRA_MOCK_FAILURE_RATE",
                        value: raw,
                    });
                }
                rate
            }
            None => DEFAULT_MOCK_FAILURE_RATE,
        };

        let system_prefers_dark = match var("VIRA_SYSTEM_THEME").map(|v| v.to_lowercase()) {
            None => true,
            Some(v) if v == "dark" => true,
            Some(v) if v == "light" => false,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    name: "VIRA_SYSTEM_THEME",
                    value: v,
                })
            }
        };

        Ok(Self {
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("VIRA_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: var("VIRA_GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            data_dir,
            analysis_timeout,
            mock_tier,
            mock_latency,
            mock_failure_rate,
            system_prefers_dark,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("VIRA_DATA_DIR", "/tmp/vira")]).unwrap();
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.analysis_timeout, Duration::from_secs(600));
        assert_eq!(config.mock_tier, SubscriptionTier::Free);
        assert_eq!(config.mock_failure_rate, DEFAULT_MOCK_FAILURE_RATE);
        assert!(config.system_prefers_dark);
        assert_eq!(config.thumbnail_dir(), PathBuf::from("/tmp/vira/thumbnails"));
        assert!(matches!(config.require_api_key(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("VIRA_DATA_DIR", "/data"),
            ("GEMINI_API_KEY", "key"),
            ("VIRA_ANALYSIS_TIMEOUT_SECS", "30"),
            ("VIRA_MOCK_TIER", "pro"),
            ("VIRA_MOCK_LATENCY_MS", "0"),
            ("VIRA_MOCK_FAILURE_RATE", "0"),
            ("VIRA_SYSTEM_THEME", "Light"),
        ])
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "key");
        assert_eq!(config.analysis_timeout, Duration::from_secs(30));
        assert_eq!(config.mock_tier, SubscriptionTier::Pro);
        assert_eq!(config.mock_latency, MockLatency::none());
        assert_eq!(config.mock_failure_rate, 0.0);
        assert!(!config.system_prefers_dark);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("VIRA_DATA_DIR", "/d"), ("VIRA_ANALYSIS_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { name: "VIRA_ANALYSIS_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("VIRA_DATA_DIR", "/d"), ("VIRA_MOCK_FAILURE_RATE", "1.5")]),
            Err(ConfigError::Invalid { name: "VIRA_MOCK_FAILURE_RATE", .. })
        ));
        assert!(matches!(
            config_from(&[("VIRA_DATA_DIR", "/d"), ("VIRA_MOCK_TIER", "platinum")]),
            Err(ConfigError::Invalid { name: "VIRA_MOCK_TIER", .. })
        ));
    }
}
