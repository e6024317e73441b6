use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};
use tracing::{debug, warn};

use crate::provider::ProviderId;

const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 5.0;

/// Environment variables that override the file, per provider.
const API_KEY_ENV: &[(ProviderId, &str)] = &[
    (ProviderId::OpenWeather, "OPENWEATHER_API_KEY"),
    (ProviderId::WeatherApi, "WEATHERAPI_API_KEY"),
    (ProviderId::Weatherbit, "WEATHERBIT_API_KEY"),
    (ProviderId::Weatherstack, "WEATHERSTACK_API_KEY"),
];
const HTTP_TIMEOUT_ENV: &str = "HTTP_TIMEOUT";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Timeout shared by every outbound request, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: f64,

    /// Example TOML:
    /// [providers.openweathermap]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_http_timeout_secs() -> f64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// [`Config::load`] followed by environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-aggregator", "weather-agg")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply `*_API_KEY` and `HTTP_TIMEOUT` overrides from `lookup`.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for &(id, var) in API_KEY_ENV {
            if let Some(key) = lookup(var).filter(|v| !v.trim().is_empty()) {
                self.upsert_provider_api_key(id, key);
            }
        }

        if let Some(raw) = lookup(HTTP_TIMEOUT_ENV).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 && secs.is_finite() => self.http_timeout_secs = secs,
                _ => warn!(value = %raw, "ignoring invalid {HTTP_TIMEOUT_ENV}"),
            }
        }
    }

    /// Shared transport timeout; falls back to the default for non-positive values.
    pub fn http_timeout(&self) -> Duration {
        if self.http_timeout_secs > 0.0 && self.http_timeout_secs.is_finite() {
            Duration::from_secs_f64(self.http_timeout_secs)
        } else {
            Duration::from_secs_f64(DEFAULT_HTTP_TIMEOUT_SECS)
        }
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
    }

    /// Keyless providers are always enabled.
    pub fn is_provider_enabled(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key()
            || self
                .provider_api_key(provider_id)
                .is_some_and(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_has_only_keyless_provider_enabled() {
        let cfg = Config::default();

        assert!(cfg.is_provider_enabled(ProviderId::OpenMeteo));
        for id in ProviderId::all().iter().filter(|id| id.requires_api_key()) {
            assert!(!cfg.is_provider_enabled(*id));
        }
        assert_eq!(cfg.http_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_enabled(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_replaces_existing_key() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::Weatherbit, "OLD".into());
        cfg.upsert_provider_api_key(ProviderId::Weatherbit, "NEW".into());

        assert_eq!(cfg.provider_api_key(ProviderId::Weatherbit), Some("NEW"));
        assert_eq!(cfg.providers.len(), 1);
    }

    #[test]
    fn blank_key_does_not_enable_provider() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "  ".into());
        assert!(!cfg.is_provider_enabled(ProviderId::WeatherApi));
    }

    #[test]
    fn parses_toml_with_defaults() {
        let cfg = Config::from_toml(
            r#"
            [providers.weatherstack]
            api_key = "WS"
            "#,
        )
        .expect("config must parse");

        assert_eq!(cfg.http_timeout_secs, 5.0);
        assert_eq!(cfg.provider_api_key(ProviderId::Weatherstack), Some("WS"));

        let cfg = Config::from_toml("http_timeout_secs = 2.5").expect("config must parse");
        assert_eq!(cfg.http_timeout(), Duration::from_millis(2500));
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("[providers.openweathermap]"));
        assert_eq!(Config::from_toml(&text).unwrap(), cfg);
    }

    #[test]
    fn env_overrides_keys_and_timeout() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "FROM_FILE".into());

        cfg.apply_env(|name| match name {
            "OPENWEATHER_API_KEY" => Some("FROM_ENV".into()),
            "WEATHERBIT_API_KEY" => Some("WB".into()),
            "WEATHERSTACK_API_KEY" => Some("".into()),
            "HTTP_TIMEOUT" => Some("12".into()),
            _ => None,
        });

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("FROM_ENV"));
        assert_eq!(cfg.provider_api_key(ProviderId::Weatherbit), Some("WB"));
        assert_eq!(cfg.provider_api_key(ProviderId::Weatherstack), None);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn invalid_timeout_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env(|name| (name == "HTTP_TIMEOUT").then(|| "-1".to_string()));
        assert_eq!(cfg.http_timeout_secs, 5.0);

        cfg.http_timeout_secs = 0.0;
        assert_eq!(cfg.http_timeout(), Duration::from_secs(5));
    }
}
