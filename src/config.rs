use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::observation::{CurrencyCode, parse_currencies};

pub const DEFAULT_API_URL: &str = "https://data-api.ecb.europa.eu/service/data/EXR/D..EUR.SP00.A";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Service settings, read from a JSON file. Every key is optional.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub default_currencies: Vec<String>,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub max_requests_per_minute: u32,
    pub block_duration_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            default_currencies: vec!["USD".to_string(), "GBP".to_string(), "CHF".to_string()],
            cache_ttl_secs: 3600,
            request_timeout_secs: 10,
            max_retries: 2,
            max_requests_per_minute: 30,
            block_duration_secs: 600,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    /// Loads the file at `path` and applies environment overrides. A missing
    /// file yields the built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text)
                .with_context(|| format!("Can't parse config file {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Can't read config file {}", path.display()));
            }
        };

        let config = config.with_overrides(|key| std::env::var(key).ok())?;
        config.default_currency_codes()?;

        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies overrides looked up by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ECB_API_URL") {
            self.api_url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        override_parsed(&lookup, "CACHE_TTL_SECS", &mut self.cache_ttl_secs)?;
        override_parsed(&lookup, "ECB_MAX_REQ_PER_MIN", &mut self.max_requests_per_minute)?;
        override_parsed(&lookup, "ECB_BLOCK_DURATION_SECS", &mut self.block_duration_secs)?;
        override_parsed(&lookup, "PORT", &mut self.port)?;

        Ok(self)
    }

    pub fn default_currency_codes(&self) -> Result<BTreeSet<CurrencyCode>> {
        parse_currencies(&self.default_currencies).context("Invalid default_currencies in config")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
    }

    Ok(())
}
