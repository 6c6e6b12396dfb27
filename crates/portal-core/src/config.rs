//! Application configuration management.
//!
//! This module handles loading and saving the portal configuration: the
//! API origin, the destination origin of each external system reachable
//! from the dashboard, and the last email used to log in.
//!
//! Configuration is stored at `~/.config/portal/config.json`. Environment
//! variables (`PORTAL_API_URL`, `PORTAL_FLOTA_URL`, ...) override the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "portal";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Name of the cookie the API sets on login
pub const DEFAULT_COOKIE_NAME: &str = "token";

/// Destination origins of the systems linked from the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SystemUrls {
    pub nomina: Option<String>,
    pub servicios: Option<String>,
    pub flota: Option<String>,
    pub empresas: Option<String>,
    pub conductores: Option<String>,
    /// Falls back to `servicios` when unset
    pub kilometraje: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    #[serde(default)]
    pub systems: SystemUrls,
    pub last_correo: Option<String>,
    pub cookie_name: Option<String>,
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        debug!(api_url = ?config.api_url, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from the environment. `lookup` is injected so the
    /// override rules can be exercised without touching process state.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = read("PORTAL_API_URL") {
            self.api_url = Some(v);
        }
        let systems = [
            ("PORTAL_NOMINA_URL", &mut self.systems.nomina),
            ("PORTAL_SERVICIOS_URL", &mut self.systems.servicios),
            ("PORTAL_FLOTA_URL", &mut self.systems.flota),
            ("PORTAL_EMPRESAS_URL", &mut self.systems.empresas),
            ("PORTAL_CONDUCTORES_URL", &mut self.systems.conductores),
            ("PORTAL_KILOMETRAJE_URL", &mut self.systems.kilometraje),
        ];
        for (key, slot) in systems {
            if let Some(v) = read(key) {
                *slot = Some(v);
            }
        }
    }

    /// Parsed API origin. Required before any transport call.
    pub fn api_base_url(&self) -> Result<Url> {
        let raw = self
            .api_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("API URL not configured (set PORTAL_API_URL)"))?;
        Url::parse(raw).with_context(|| format!("Invalid API URL: {}", raw))
    }

    pub fn cookie_name(&self) -> &str {
        self.cookie_name.as_deref().unwrap_or(DEFAULT_COOKIE_NAME)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_apply_env_overrides_file_values() {
        let mut config = Config {
            api_url: Some("http://file.local".to_string()),
            ..Config::default()
        };
        let env: HashMap<&str, &str> = [
            ("PORTAL_API_URL", "http://env.local:4000"),
            ("PORTAL_FLOTA_URL", "http://flota.local"),
            ("PORTAL_NOMINA_URL", "   "),
        ]
        .into_iter()
        .collect();

        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_url.as_deref(), Some("http://env.local:4000"));
        assert_eq!(config.systems.flota.as_deref(), Some("http://flota.local"));
        // Blank values do not clear anything
        assert_eq!(config.systems.nomina, None);
    }

    #[test]
    fn test_api_base_url_requires_value() {
        assert!(Config::default().api_base_url().is_err());

        let config = Config {
            api_url: Some("http://localhost:4000".to_string()),
            ..Config::default()
        };
        let url = config.api_base_url().expect("valid url");
        assert_eq!(url.as_str(), "http://localhost:4000/");
    }

    #[test]
    fn test_cookie_name_default() {
        assert_eq!(Config::default().cookie_name(), "token");
    }

    #[test]
    fn test_config_parses_without_systems() {
        let json = r#"{"api_url": "http://x", "last_correo": null, "cookie_name": null}"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        assert_eq!(config.systems, SystemUrls::default());
    }
}
